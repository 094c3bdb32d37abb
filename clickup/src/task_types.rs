//! Custom task types do workspace ("Bug/Issue", "Milestone", ...)
//!
//! O registro é montado uma vez a partir de `GET /team/{team_id}/custom_item`
//! e indexa cada nome de quatro formas (exato, minúsculo, com underscore,
//! compactado), de modo que "Bug/Issue", "bug_issue", "bugissue" e
//! "BUG/ISSUE" apontem para o mesmo id sem varrer a lista.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::client::ClickUpClient;
use crate::error::{ClickUpError, Result};
use crate::matching::{compact_key, underscore_key};
use crate::types::CustomItemType;

/// Índices imutáveis de nome -> id dos custom task types
#[derive(Debug, Clone, Default)]
pub struct TaskTypeRegistry {
    exact: HashMap<String, i64>,
    lowercase: HashMap<String, i64>,
    underscored: HashMap<String, i64>,
    compacted: HashMap<String, i64>,
    by_id: HashMap<i64, String>,
    /// Ordem de cadastro (desempate do closest_match)
    order: Vec<(i64, String)>,
}

impl TaskTypeRegistry {
    pub fn new(types: Vec<CustomItemType>) -> Self {
        let mut registry = Self::default();

        for item in types {
            // primeiro nome vence em colisões de índice
            registry.exact.entry(item.name.clone()).or_insert(item.id);
            registry
                .lowercase
                .entry(item.name.to_lowercase())
                .or_insert(item.id);
            registry
                .underscored
                .entry(underscore_key(&item.name))
                .or_insert(item.id);
            registry
                .compacted
                .entry(compact_key(&item.name))
                .or_insert(item.id);
            registry.by_id.insert(item.id, item.name.clone());
            registry.order.push((item.id, item.name));
        }

        registry
    }

    pub fn id_from_name(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        self.exact
            .get(name)
            .or_else(|| self.lowercase.get(&name.to_lowercase()))
            .or_else(|| self.underscored.get(&underscore_key(name)))
            .or_else(|| self.compacted.get(&compact_key(name)))
            .copied()
    }

    pub fn name_from_id(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(|s| s.as_str())
    }

    /// Nome cadastrado mais parecido com `input`
    ///
    /// Match por qualquer índice retorna direto. Senão, pontua cada candidato:
    /// prefixo +5, substring +3, +1 por caractere de `input` presente no nome
    /// (sem diferenciar maiúsculas). Empates ficam com o primeiro cadastrado;
    /// pontuação zero não sugere nada.
    pub fn closest_match(&self, input: &str) -> Option<&str> {
        if let Some(id) = self.id_from_name(input) {
            return self.name_from_id(id);
        }

        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for (_, name) in &self.order {
            let candidate = name.to_lowercase();
            let mut score = 0;
            if candidate.starts_with(&needle) {
                score += 5;
            }
            if candidate.contains(&needle) {
                score += 3;
            }
            score += needle.chars().filter(|c| candidate.contains(*c)).count();

            if score > best.map_or(0, |(_, s)| s) {
                best = Some((name.as_str(), score));
            }
        }

        best.map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|(_, name)| name.as_str()).collect()
    }
}

/// Handle compartilhado do registro de task types
///
/// Carregado uma vez por workspace; `reset` descarta o registro para forçar
/// uma nova carga.
#[derive(Debug, Clone, Default)]
pub struct TaskTypes {
    registry: Arc<RwLock<Option<Arc<TaskTypeRegistry>>>>,
}

impl TaskTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busca os task types do workspace e substitui o registro atual
    pub async fn load(&self, client: &ClickUpClient, team_id: &str) -> Result<usize> {
        let types = client.get_custom_item_types(team_id).await?;
        let registry = TaskTypeRegistry::new(types);
        let count = registry.len();

        *self.registry.write().await = Some(Arc::new(registry));
        tracing::info!("🏷️ {} task types carregados do workspace {}", count, team_id);
        Ok(count)
    }

    pub async fn reset(&self) {
        *self.registry.write().await = None;
        tracing::debug!("Registro de task types descartado");
    }

    pub async fn is_loaded(&self) -> bool {
        self.registry.read().await.is_some()
    }

    pub async fn registry(&self) -> Option<Arc<TaskTypeRegistry>> {
        self.registry.read().await.clone()
    }

    /// Resolve um nome para id ou devolve INVALID_PARAMETER com uma sugestão
    pub async fn resolve_or_suggest(&self, name: &str) -> Result<i64> {
        let registry = self.registry().await.ok_or_else(|| {
            ClickUpError::workspace("Task types not loaded for this workspace")
                .with_detail("task_type", name)
        })?;

        if let Some(id) = registry.id_from_name(name) {
            return Ok(id);
        }

        let message = match registry.closest_match(name) {
            Some(suggestion) => format!(
                "Unknown task type '{}'. Did you mean '{}'?",
                name, suggestion
            ),
            None => format!(
                "Unknown task type '{}'. Available: {}",
                name,
                registry.names().join(", ")
            ),
        };
        Err(ClickUpError::invalid_parameter(message).with_detail("task_type", name))
    }
}
