//! Transformação de valores de custom fields para o formato de escrita
//!
//! Função pura, sem I/O:
//!
//! - Tipos escalares (e `Unknown`) passam o valor adiante sem alteração
//! - Relacionamentos viram `{add, rem}`; um valor simples vira "adiciona tudo,
//!   não remove nada"
//! - Reaplicar a transformação não embrulha de novo

use serde_json::Value;

use crate::types::{FieldType, FieldValue};

/// Lê o valor do chamador conforme o tipo do campo
///
/// `{add, rem}` só é interpretado como instrução de relacionamento em campos
/// de relacionamento (ou de tipo desconhecido); nos demais o objeto segue cru.
pub fn interpret(value: Value, field_type: &FieldType) -> FieldValue {
    if field_type.is_relationship() || field_type.is_unknown() {
        FieldValue::from_json(value)
    } else {
        FieldValue::Scalar(value)
    }
}

/// Ajusta `value` ao formato esperado pela API para `field_type`
pub fn transform(value: FieldValue, field_type: &FieldType) -> FieldValue {
    if !field_type.is_relationship() {
        return value;
    }

    match value {
        FieldValue::Relationship { .. } => value,
        FieldValue::Scalar(raw) => match FieldValue::from_json(raw) {
            wrapped @ FieldValue::Relationship { .. } => wrapped,
            FieldValue::Scalar(Value::Null) => FieldValue::relationship(Vec::new(), Vec::new()),
            FieldValue::Scalar(Value::Array(items)) => FieldValue::relationship(items, Vec::new()),
            FieldValue::Scalar(single) => FieldValue::relationship(vec![single], Vec::new()),
        },
    }
}

/// Atalho JSON -> payload completo (`{"value": ...}`)
pub fn transform_json(value: Value, field_type: &FieldType) -> Value {
    transform(interpret(value, field_type), field_type).into_payload()
}
