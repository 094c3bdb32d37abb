//! Custom task types (GET /team/{team_id}/custom_item)

use serde::{Deserialize, Serialize};

/// Um custom task type do workspace ("Bug", "Milestone", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomItemType {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CustomItemType {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            name_plural: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomItemsResponse {
    #[serde(default)]
    pub custom_items: Vec<CustomItemType>,
}
