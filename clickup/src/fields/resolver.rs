//! Resolução do tipo declarado de um custom field
//!
//! Ordem:
//! 1. Cache local (`field:{id}`, categoria CUSTOM_FIELDS)
//! 2. Com uma task de dica: busca a task, descobre a lista dona, busca/cacheia
//!    todos os campos da lista e tenta de novo
//! 3. Último recurso: o custom field embutido na própria task
//!
//! Nunca falha: sem resposta, devolve [`FieldType::Unknown`].

use crate::cache::{field_type_key, list_fields_key, CacheCategory, WorkspaceCache};
use crate::client::ClickUpClient;
use crate::error::Result;
use crate::types::{CustomFieldMeta, FieldType};

#[derive(Clone, Debug)]
pub struct FieldTypeResolver {
    client: ClickUpClient,
    cache: WorkspaceCache,
}

impl FieldTypeResolver {
    pub fn new(client: ClickUpClient, cache: WorkspaceCache) -> Self {
        Self { client, cache }
    }

    pub async fn resolve(&self, field_id: &str, task_hint: Option<&str>) -> FieldType {
        if let Some(field_type) = self.cached_type(field_id).await {
            return field_type;
        }

        let Some(task_id) = task_hint else {
            tracing::debug!("Tipo do campo {} desconhecido e sem task de dica", field_id);
            return FieldType::Unknown;
        };

        let task = match self.client.get_task(task_id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Não foi possível ler a task {} para resolver o campo {}: {}",
                    task_id,
                    field_id,
                    e
                );
                return FieldType::Unknown;
            }
        };

        if let Some(list_id) = task.list_id() {
            match self.list_fields(list_id).await {
                Ok(fields) => {
                    if let Some(meta) = fields.iter().find(|f| f.id == field_id) {
                        // a lista pode estar em cache sem a entrada do campo
                        self.remember(field_id, meta.field_type.clone()).await;
                        return meta.field_type.clone();
                    }
                }
                Err(e) => {
                    tracing::warn!("⚠️ Falha ao buscar campos da lista {}: {}", list_id, e);
                }
            }
        }

        match task.custom_field(field_id) {
            Some(field) if !field.field_type.is_unknown() => {
                self.remember(field_id, field.field_type.clone()).await;
                field.field_type.clone()
            }
            _ => {
                tracing::warn!(
                    "⚠️ Campo {} não encontrado na task {} nem na sua lista",
                    field_id,
                    task_id
                );
                FieldType::Unknown
            }
        }
    }

    /// Metadados de todos os campos de uma lista (cacheados por 30 min)
    ///
    /// Um miss busca a lista inteira e repovoa o tipo de cada campo.
    pub async fn list_fields(&self, list_id: &str) -> Result<Vec<CustomFieldMeta>> {
        let key = list_fields_key(list_id);
        if let Some(fields) = self
            .cache
            .get::<Vec<CustomFieldMeta>>(CacheCategory::CustomFields, &key)
            .await
        {
            return Ok(fields);
        }

        let fields = self.client.get_list_fields(list_id).await?;
        for meta in &fields {
            self.remember(&meta.id, meta.field_type.clone()).await;
        }
        self.cache
            .set(CacheCategory::CustomFields, key, fields.clone())
            .await;

        tracing::info!("📋 {} custom fields da lista {} em cache", fields.len(), list_id);
        Ok(fields)
    }

    /// Pré-carrega os tipos de uma lista
    pub async fn prime_list(&self, list_id: &str) -> Result<usize> {
        Ok(self.list_fields(list_id).await?.len())
    }

    pub async fn remember(&self, field_id: &str, field_type: FieldType) {
        self.cache
            .set(CacheCategory::CustomFields, field_type_key(field_id), field_type)
            .await;
    }

    async fn cached_type(&self, field_id: &str) -> Option<FieldType> {
        self.cache
            .get::<FieldType>(CacheCategory::CustomFields, &field_type_key(field_id))
            .await
    }
}
