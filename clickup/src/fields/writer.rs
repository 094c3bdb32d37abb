//! Escrita de custom fields com verificação
//!
//! Protocolo em duas fases, sem atomicidade:
//!
//! 1. Resolve o tipo, transforma o valor e faz o POST pelo executor
//! 2. Relê a task e confere se o campo ficou preenchido
//!
//! ⚠️ A API do ClickUp responde 200 para escritas de relacionamento que
//! referenciam entidades inexistentes e simplesmente descarta o valor. Por
//! isso, SÓ para tipos de relacionamento, um campo vazio depois de uma escrita
//! não-vazia é reportado como falha (`success: false, verified: true`). Para
//! escalares a ausência não é sinalizada: o valor pode ter sido limpo de
//! propósito.

use serde::Serialize;
use serde_json::Value;

use crate::client::ClickUpClient;
use crate::error::{ClickUpError, ErrorKind, Result};
use crate::fields::resolver::FieldTypeResolver;
use crate::fields::transform::{interpret, transform};
use crate::types::{FieldType, FieldValue, TaskSnapshot};

/// Opções de `set_value`
#[derive(Debug, Clone, Default)]
pub struct SetValueOptions {
    pub skip_verification: bool,
    /// Tipo já conhecido pelo chamador (pula a resolução)
    pub known_type: Option<FieldType>,
}

/// Resultado de uma escrita de custom field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetCustomFieldResult {
    pub success: bool,
    /// Se a releitura de verificação chegou a rodar
    pub verified: bool,
    pub field_id: String,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl SetCustomFieldResult {
    fn ok(field_id: &str, field_type: FieldType, verified: bool) -> Self {
        Self {
            success: true,
            verified,
            field_id: field_id.to_string(),
            field_type,
            error: None,
            error_kind: None,
        }
    }

    fn failed(field_id: &str, field_type: FieldType, error: &ClickUpError) -> Self {
        Self {
            success: false,
            verified: false,
            field_id: field_id.to_string(),
            field_type,
            error: Some(error.to_string()),
            error_kind: Some(error.kind),
        }
    }
}

/// Um item de escrita em lote
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub id: String,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CustomFieldWriter {
    client: ClickUpClient,
    resolver: FieldTypeResolver,
}

impl CustomFieldWriter {
    pub fn new(client: ClickUpClient, resolver: FieldTypeResolver) -> Self {
        Self { client, resolver }
    }

    pub fn resolver(&self) -> &FieldTypeResolver {
        &self.resolver
    }

    /// Grava um custom field e, salvo `skip_verification`, confirma a persistência
    ///
    /// Erros da própria escrita (rede, 4xx, 5xx) são devolvidos como `Err`.
    /// Falhas de verificação voltam como resultado estruturado.
    pub async fn set_value(
        &self,
        task_id: &str,
        field_id: &str,
        value: Value,
        options: SetValueOptions,
    ) -> Result<SetCustomFieldResult> {
        if task_id.trim().is_empty() || field_id.trim().is_empty() {
            return Err(ClickUpError::invalid_parameter(
                "task_id and field_id are required to set a custom field",
            )
            .with_detail("task_id", task_id)
            .with_detail("field_id", field_id));
        }

        let field_type = match options.known_type {
            Some(field_type) => field_type,
            None => self.resolver.resolve(field_id, Some(task_id)).await,
        };

        let write_value = transform(interpret(value, &field_type), &field_type);
        let carries_references = carries_references(&write_value);

        tracing::info!(
            "✏️ Gravando campo {} ({}) na task {}",
            field_id,
            field_type,
            task_id
        );

        self.client
            .set_custom_field_value(task_id, field_id, &write_value.into_payload())
            .await?;

        if options.skip_verification {
            return Ok(SetCustomFieldResult::ok(field_id, field_type, false));
        }

        match self.client.get_task(task_id).await {
            Ok(task) => {
                let result = self
                    .verify(&task, field_id, field_type, carries_references)
                    .await;
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Escrita do campo {} aceita, mas a releitura da task {} falhou: {}",
                    field_id,
                    task_id,
                    e
                );
                let mut result = SetCustomFieldResult::ok(field_id, field_type, false);
                result.error = Some(format!("Write accepted but verification read failed: {}", e));
                Ok(result)
            }
        }
    }

    /// Grava vários campos de uma task, um por vez, sem interromper em falhas
    pub async fn set_values(
        &self,
        task_id: &str,
        updates: &[FieldUpdate],
    ) -> Vec<SetCustomFieldResult> {
        let mut results = Vec::with_capacity(updates.len());

        for update in updates {
            let result = match self
                .set_value(task_id, &update.id, update.value.clone(), SetValueOptions::default())
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    let field_type = self.resolver.resolve(&update.id, None).await;
                    SetCustomFieldResult::failed(&update.id, field_type, &e)
                }
            };
            results.push(result);
        }

        let failures = results.iter().filter(|r| !r.success).count();
        if failures > 0 {
            tracing::warn!(
                "⚠️ {}/{} campos da task {} não foram gravados",
                failures,
                results.len(),
                task_id
            );
        }
        results
    }

    async fn verify(
        &self,
        task: &TaskSnapshot,
        field_id: &str,
        resolved_type: FieldType,
        carries_references: bool,
    ) -> SetCustomFieldResult {
        let field = task.custom_field(field_id);

        // tipo não resolvido antes da escrita: usa o tipo declarado na releitura
        let field_type = match field {
            Some(field) if resolved_type.is_unknown() && !field.field_type.is_unknown() => {
                self.resolver
                    .remember(field_id, field.field_type.clone())
                    .await;
                field.field_type.clone()
            }
            _ => resolved_type,
        };

        let is_empty = field.map_or(true, |f| f.is_empty());

        if field_type.is_relationship() && carries_references && is_empty {
            let message = format!(
                "Relationship field {} ({}) is empty after writing task {}: ClickUp accepted the request but dropped the value. Check that the referenced ids exist and are accessible.",
                field_id, field_type, task.id
            );
            tracing::warn!("❌ {}", message);
            return SetCustomFieldResult {
                success: false,
                verified: true,
                field_id: field_id.to_string(),
                field_type,
                error: Some(message),
                error_kind: None,
            };
        }

        if is_empty {
            tracing::debug!("Campo {} vazio após escrita na task {}", field_id, task.id);
        } else {
            tracing::info!("✅ Campo {} verificado na task {}", field_id, task.id);
        }
        SetCustomFieldResult::ok(field_id, field_type, true)
    }
}

/// Se a escrita referencia algo que deveria aparecer na releitura
fn carries_references(value: &FieldValue) -> bool {
    match value {
        FieldValue::Relationship { add, .. } => !add.is_empty(),
        FieldValue::Scalar(Value::Null) => false,
        FieldValue::Scalar(Value::Array(items)) => !items.is_empty(),
        FieldValue::Scalar(Value::String(s)) => !s.is_empty(),
        FieldValue::Scalar(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::WorkspaceCache;
    use crate::client::test_client;
    use httpmock::prelude::*;
    use serde_json::json;

    fn writer(base_url: &str) -> CustomFieldWriter {
        let client = test_client(base_url);
        let resolver = FieldTypeResolver::new(client.clone(), WorkspaceCache::default());
        CustomFieldWriter::new(client, resolver)
    }

    #[tokio::test]
    async fn test_relationship_write_then_verified_read() {
        let server = MockServer::start_async().await;
        let list_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/list/L/field");
                then.status(200).json_body(json!({
                    "fields": [{"id": "F", "name": "Projetos", "type": "list_relationship"}]
                }));
            })
            .await;
        let write_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/task/T/field/F")
                    .json_body(json!({"value": {"add": ["X"], "rem": []}}));
                then.status(200).json_body(json!({}));
            })
            .await;
        let read_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({
                    "id": "T",
                    "list": {"id": "L"},
                    "custom_fields": [
                        {"id": "F", "type": "list_relationship", "value": [{"id": "X"}]}
                    ]
                }));
            })
            .await;

        let writer = writer(&server.base_url());
        writer.resolver().prime_list("L").await.unwrap();

        let result = writer
            .set_value("T", "F", json!(["X"]), SetValueOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.verified);
        assert_eq!(result.field_type, FieldType::ListRelationship);
        assert_eq!(list_mock.hits_async().await, 1);
        assert_eq!(write_mock.hits_async().await, 1);
        assert_eq!(read_mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_relationship_write_is_reported_not_thrown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/task/T/field/F");
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({
                    "id": "T",
                    "custom_fields": [{"id": "F", "type": "tasks"}]
                }));
            })
            .await;

        let result = writer(&server.base_url())
            .set_value(
                "T",
                "F",
                json!(["does-not-exist"]),
                SetValueOptions {
                    known_type: Some(FieldType::Tasks),
                    ..SetValueOptions::default()
                },
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.verified);
        assert!(result.error.as_deref().unwrap_or_default().contains("dropped"));
    }

    #[tokio::test]
    async fn test_empty_scalar_after_write_is_not_flagged() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/task/T/field/N")
                    .json_body(json!({"value": "observação"}));
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({"id": "T", "custom_fields": []}));
            })
            .await;

        let result = writer(&server.base_url())
            .set_value(
                "T",
                "N",
                json!("observação"),
                SetValueOptions {
                    known_type: Some(FieldType::Text),
                    ..SetValueOptions::default()
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.verified);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_scalar_object_value_is_posted_unchanged() {
        let server = MockServer::start_async().await;
        let write_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/task/T/field/N")
                    .json_body(json!({"value": {"add": ["x"]}}));
                then.status(200).json_body(json!({}));
            })
            .await;

        let result = writer(&server.base_url())
            .set_value(
                "T",
                "N",
                json!({"add": ["x"]}),
                SetValueOptions {
                    skip_verification: true,
                    known_type: Some(FieldType::Text),
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(write_mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_skip_verification_issues_only_the_write() {
        let server = MockServer::start_async().await;
        let write_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/task/T/field/F");
                then.status(200).json_body(json!({}));
            })
            .await;
        let read_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({"id": "T"}));
            })
            .await;

        let result = writer(&server.base_url())
            .set_value(
                "T",
                "F",
                json!(3),
                SetValueOptions {
                    skip_verification: true,
                    known_type: Some(FieldType::Number),
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.verified);
        assert_eq!(write_mock.hits_async().await, 1);
        assert_eq!(read_mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_write_error_propagates_with_kind() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/task/T/field/F");
                then.status(400).json_body(json!({"err": "Value is not a valid number", "ECODE": "FIELD_012"}));
            })
            .await;

        let err = writer(&server.base_url())
            .set_value(
                "T",
                "F",
                json!("abc"),
                SetValueOptions {
                    known_type: Some(FieldType::Number),
                    ..SetValueOptions::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.detail("task_id"), Some("T"));
        assert_eq!(err.detail("field_id"), Some("F"));
    }

    #[tokio::test]
    async fn test_batch_continues_after_individual_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({
                    "id": "T",
                    "list": {"id": "L"},
                    "custom_fields": [
                        {"id": "A", "type": "number", "value": 8},
                        {"id": "C", "type": "users"}
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/list/L/field");
                then.status(200).json_body(json!({
                    "fields": [
                        {"id": "A", "type": "number"},
                        {"id": "B", "type": "text"},
                        {"id": "C", "type": "users"}
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/task/T/field/A");
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/task/T/field/B");
                then.status(500).json_body(json!({"err": "Internal error"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/task/T/field/C")
                    .json_body(json!({"value": {"add": [999], "rem": []}}));
                then.status(200).json_body(json!({}));
            })
            .await;

        let results = writer(&server.base_url())
            .set_values(
                "T",
                &[
                    FieldUpdate::new("A", json!(8)),
                    FieldUpdate::new("B", json!("nota")),
                    FieldUpdate::new("C", json!(999)),
                ],
            )
            .await;

        assert_eq!(results.len(), 3);

        assert!(results[0].success && results[0].verified);
        assert_eq!(results[0].field_type, FieldType::Number);

        assert!(!results[1].success);
        assert!(!results[1].verified);
        assert_eq!(results[1].error_kind, Some(ErrorKind::ServerError));
        assert_eq!(results[1].field_type, FieldType::Text);

        assert!(!results[2].success);
        assert!(results[2].verified);
        assert_eq!(results[2].field_type, FieldType::Users);
    }

    #[tokio::test]
    async fn test_unresolved_type_is_learned_from_the_reread() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/task/T/field/F")
                    .json_body(json!({"value": ["X"]}));
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task/T");
                then.status(200).json_body(json!({
                    "id": "T",
                    "custom_fields": [{"id": "F", "type": "tasks", "value": []}]
                }));
            })
            .await;

        let writer = writer(&server.base_url());
        let result = writer
            .set_value(
                "T",
                "F",
                json!(["X"]),
                SetValueOptions {
                    known_type: Some(FieldType::Unknown),
                    ..SetValueOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.field_type, FieldType::Tasks);
        assert!(!result.success);
        assert!(result.verified);
        assert_eq!(writer.resolver().resolve("F", None).await, FieldType::Tasks);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected_before_any_request() {
        let err = writer("http://127.0.0.1:9")
            .set_value("", "F", json!(1), SetValueOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_result_serialization() {
        let result = SetCustomFieldResult::ok("F", FieldType::Tasks, true);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({
            "success": true,
            "verified": true,
            "field_id": "F",
            "field_type": "tasks"
        }));
    }
}
