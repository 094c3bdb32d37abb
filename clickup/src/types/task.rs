//! Task types do ClickUp
//!
//! Apenas a parte da tarefa que o núcleo lê: identificação, lista dona e os
//! custom fields embutidos (GET /task/{task_id}).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::TaskCustomField;

/// Referência a uma entidade (list, folder, space)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Snapshot de uma tarefa retornada pela API v2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Lista dona da tarefa (read-only)
    #[serde(default)]
    pub list: Option<EntityRef>,

    #[serde(default)]
    pub folder: Option<EntityRef>,

    #[serde(default)]
    pub space: Option<EntityRef>,

    /// Custom task type (null = task padrão)
    #[serde(default)]
    pub custom_item_id: Option<i64>,

    #[serde(default)]
    pub custom_fields: Vec<TaskCustomField>,
}

impl TaskSnapshot {
    pub fn list_id(&self) -> Option<&str> {
        self.list.as_ref().map(|l| l.id.as_str())
    }

    pub fn custom_field(&self, field_id: &str) -> Option<&TaskCustomField> {
        self.custom_fields.iter().find(|f| f.id == field_id)
    }
}

/// A API devolve ids ora como string, ora como número
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "id inválido: esperado string ou número, recebido {}",
            other
        ))),
    }
}
