//! Custom Fields do ClickUp
//!
//! A API do ClickUp suporta ~20 tipos de custom fields. Para escrita, eles se
//! dividem em duas famílias:
//!
//! - **Escalares** (text, number, drop_down, date, checkbox...): `{"value": <raw>}`
//! - **Relacionamentos** (tasks, users, list_relationship): `{"value": {"add": [...], "rem": [...]}}`
//!
//! ⚠️ IMPORTANTE: Enviar um array cru para um campo de relacionamento faz a API
//! responder 200 e descartar o valor silenciosamente.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Tipo declarado de um custom field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    ShortText,
    Number,
    Currency,
    Dropdown,
    Labels,
    Date,
    Checkbox,
    Email,
    Phone,
    Url,
    /// Rating (a API chama de `emoji`)
    Emoji,
    Location,
    Attachment,
    Formula,
    AutomaticProgress,
    ManualProgress,
    Tasks,
    Users,
    ListRelationship,
    /// Tag que este crate ainda não conhece
    Other(String),
    /// Sentinela: tipo não resolvido, nenhuma transformação é aplicada
    #[default]
    Unknown,
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::ShortText => "short_text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Dropdown => "drop_down",
            FieldType::Labels => "labels",
            FieldType::Date => "date",
            FieldType::Checkbox => "checkbox",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Emoji => "emoji",
            FieldType::Location => "location",
            FieldType::Attachment => "attachment",
            FieldType::Formula => "formula",
            FieldType::AutomaticProgress => "automatic_progress",
            FieldType::ManualProgress => "manual_progress",
            FieldType::Tasks => "tasks",
            FieldType::Users => "users",
            FieldType::ListRelationship => "list_relationship",
            FieldType::Other(tag) => tag.as_str(),
            FieldType::Unknown => "unknown",
        }
    }

    /// Campos cujo valor é um conjunto de referências (escrita add/rem)
    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            FieldType::Tasks | FieldType::Users | FieldType::ListRelationship
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldType::Unknown)
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "text" => FieldType::Text,
            "short_text" => FieldType::ShortText,
            "number" => FieldType::Number,
            "currency" => FieldType::Currency,
            "drop_down" | "dropdown" => FieldType::Dropdown,
            "labels" => FieldType::Labels,
            "date" => FieldType::Date,
            "checkbox" => FieldType::Checkbox,
            "email" => FieldType::Email,
            "phone" => FieldType::Phone,
            "url" => FieldType::Url,
            "emoji" | "rating" => FieldType::Emoji,
            "location" => FieldType::Location,
            "attachment" => FieldType::Attachment,
            "formula" => FieldType::Formula,
            "automatic_progress" => FieldType::AutomaticProgress,
            "manual_progress" => FieldType::ManualProgress,
            "tasks" => FieldType::Tasks,
            "users" => FieldType::Users,
            "list_relationship" => FieldType::ListRelationship,
            "" | "unknown" => FieldType::Unknown,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        FieldType::from(tag.as_str())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadado de um custom field (GET /list/{list_id}/field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldMeta {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_config: Option<Value>,
}

/// Resposta de GET /list/{list_id}/field
#[derive(Debug, Clone, Deserialize)]
pub struct ListFieldsResponse {
    #[serde(default)]
    pub fields: Vec<CustomFieldMeta>,
}

/// Custom field embutido em uma task (GET /task/{task_id})
///
/// `value` fica ausente quando o campo nunca foi preenchido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCustomField {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: Option<Value>,
}

impl TaskCustomField {
    pub fn has_value(&self) -> bool {
        !matches!(self.value, None | Some(Value::Null))
    }

    /// Ausente, null, string vazia, array vazio ou objeto vazio
    pub fn is_empty(&self) -> bool {
        match &self.value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }

    pub fn as_meta(&self) -> CustomFieldMeta {
        CustomFieldMeta {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_default(),
            field_type: self.field_type.clone(),
            type_config: None,
        }
    }
}

/// Valor de escrita de um custom field
///
/// União fechada: o transformador só precisa lidar com estes dois formatos.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Relationship { add: Vec<Value>, rem: Vec<Value> },
}

impl FieldValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        FieldValue::Scalar(value.into())
    }

    pub fn relationship(add: Vec<Value>, rem: Vec<Value>) -> Self {
        FieldValue::Relationship { add, rem }
    }

    /// Interpreta um valor JSON fornecido pelo chamador
    ///
    /// Reconhece instruções já embrulhadas, tanto `{"add": [...], "rem": [...]}`
    /// quanto o payload completo `{"value": {"add": ..., "rem": ...}}`.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                if let Some(rel) = relationship_from_map(&map) {
                    return rel;
                }
                if map.len() == 1 {
                    if let Some(Value::Object(inner)) = map.get("value") {
                        if let Some(rel) = relationship_from_map(inner) {
                            return rel;
                        }
                    }
                }
                FieldValue::Scalar(Value::Object(map))
            }
            other => FieldValue::Scalar(other),
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldValue::Relationship { .. })
    }

    /// Itens a adicionar (vazio para escalares)
    pub fn added(&self) -> &[Value] {
        match self {
            FieldValue::Relationship { add, .. } => add,
            FieldValue::Scalar(_) => &[],
        }
    }

    /// Conteúdo do campo `value` do payload
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::Relationship { add, rem } => json!({ "add": add, "rem": rem }),
        }
    }

    /// Corpo completo do POST /task/{task_id}/field/{field_id}
    pub fn into_payload(self) -> Value {
        json!({ "value": self.to_json() })
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::from_json(value)
    }
}

fn relationship_from_map(map: &Map<String, Value>) -> Option<FieldValue> {
    if map.is_empty() || !map.keys().all(|k| k == "add" || k == "rem") {
        return None;
    }

    fn items(value: Option<&Value>) -> Option<Vec<Value>> {
        match value {
            None | Some(Value::Null) => Some(Vec::new()),
            Some(Value::Array(items)) => Some(items.clone()),
            Some(_) => None,
        }
    }

    Some(FieldValue::Relationship {
        add: items(map.get("add"))?,
        rem: items(map.get("rem"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_tags() {
        assert_eq!(FieldType::from("drop_down"), FieldType::Dropdown);
        assert_eq!(FieldType::from("list_relationship"), FieldType::ListRelationship);
        assert_eq!(FieldType::from("emoji"), FieldType::Emoji);
        assert_eq!(FieldType::from("votes"), FieldType::Other("votes".to_string()));
        assert_eq!(FieldType::from(""), FieldType::Unknown);

        assert!(FieldType::Tasks.is_relationship());
        assert!(FieldType::Users.is_relationship());
        assert!(!FieldType::Labels.is_relationship());
    }

    #[test]
    fn test_meta_deserializes_type_tag() {
        let meta: CustomFieldMeta = serde_json::from_value(json!({
            "id": "f-1",
            "name": "Blocked by",
            "type": "tasks",
            "type_config": {}
        }))
        .unwrap();
        assert_eq!(meta.field_type, FieldType::Tasks);

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["type"], "tasks");
    }

    #[test]
    fn test_task_field_emptiness() {
        let field: TaskCustomField =
            serde_json::from_value(json!({"id": "f", "type": "tasks"})).unwrap();
        assert!(!field.has_value());
        assert!(field.is_empty());

        let field: TaskCustomField =
            serde_json::from_value(json!({"id": "f", "type": "tasks", "value": []})).unwrap();
        assert!(field.has_value());
        assert!(field.is_empty());

        let field: TaskCustomField =
            serde_json::from_value(json!({"id": "f", "type": "number", "value": 0})).unwrap();
        assert!(!field.is_empty());
    }

    #[test]
    fn test_from_json_recognises_wrapped_values() {
        let direct = FieldValue::from_json(json!({"add": ["a"], "rem": []}));
        assert_eq!(direct, FieldValue::relationship(vec![json!("a")], vec![]));

        let payload = FieldValue::from_json(json!({"value": {"add": ["a"]}}));
        assert_eq!(payload, FieldValue::relationship(vec![json!("a")], vec![]));

        // objetos comuns (ex: location) continuam escalares
        let location = json!({"location": {"lat": 1.0, "lng": 2.0}});
        assert_eq!(
            FieldValue::from_json(location.clone()),
            FieldValue::Scalar(location)
        );

        // "add" com valor não-array não é instrução de relacionamento
        let odd = json!({"add": "x"});
        assert_eq!(FieldValue::from_json(odd.clone()), FieldValue::Scalar(odd));
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(FieldValue::scalar(5).into_payload(), json!({"value": 5}));
        assert_eq!(
            FieldValue::relationship(vec![json!("t1")], vec![json!("t2")]).into_payload(),
            json!({"value": {"add": ["t1"], "rem": ["t2"]}})
        );
    }
}
