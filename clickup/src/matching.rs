//! Utilitários de normalização de strings para busca por nome
//!
//! Usados pelo [`crate::task_types`] para construir as chaves de índice.

use deunicode::deunicode;

/// Normaliza uma string para comparação
///
/// - Remove acentos (deunicode)
/// - Converte para lowercase
/// - Remove espaços nas bordas
///
/// # Exemplos
///
/// ```
/// use clickup::matching::normalize;
///
/// assert_eq!(normalize("Ação Imediata"), "acao imediata");
/// assert_eq!(normalize("  BUG  "), "bug");
/// ```
pub fn normalize(text: &str) -> String {
    deunicode(text).to_lowercase().trim().to_string()
}

/// Chave com underscore: todo caractere não alfanumérico vira `_`
///
/// ```
/// use clickup::matching::underscore_key;
///
/// assert_eq!(underscore_key("Bug/Issue"), "bug_issue");
/// assert_eq!(underscore_key("bug_issue"), "bug_issue");
/// ```
pub fn underscore_key(text: &str) -> String {
    normalize(text)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Chave compactada: apenas caracteres alfanuméricos
///
/// ```
/// use clickup::matching::compact_key;
///
/// assert_eq!(compact_key("Bug/Issue"), "bugissue");
/// assert_eq!(compact_key("Sub-Tarefa 2"), "subtarefa2");
/// ```
pub fn compact_key(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
