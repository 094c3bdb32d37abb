//! Custom fields: resolução de tipo, transformação de valor e escrita verificada

pub mod resolver;
pub mod transform;
pub mod writer;

pub use resolver::FieldTypeResolver;
pub use transform::{interpret, transform, transform_json};
pub use writer::{CustomFieldWriter, FieldUpdate, SetCustomFieldResult, SetValueOptions};
