//! Tipos do ClickUp API
//!
//! - **CustomFieldMeta / FieldType**: metadados e tipos de custom fields
//! - **FieldValue**: valor de escrita (escalar ou add/rem de relacionamento)
//! - **TaskSnapshot**: tarefa lida com seus custom fields embutidos
//! - **CustomItemType**: custom task types do workspace
//!
//! ## ⚠️ Notas Importantes
//!
//! - **Relacionamentos** (tasks, users, list_relationship) exigem `{add, rem}`
//! - **IDs** chegam ora como string, ora como número; são normalizados para String

pub mod custom_field;
pub mod custom_item;
pub mod task;

pub use custom_field::{
    CustomFieldMeta, FieldType, FieldValue, ListFieldsResponse, TaskCustomField,
};
pub use custom_item::{CustomItemType, CustomItemsResponse};
pub use task::{EntityRef, TaskSnapshot};
