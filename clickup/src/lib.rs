//! Núcleo de execução e consistência de dados para a API ClickUp
//!
//! Este crate concentra tudo que fala com o ClickUp em nome do gateway de
//! intenções:
//!
//! - Executor com rate limit (espaçamento mínimo, backoff exponencial em 429)
//! - Cache do workspace com TTL por categoria e invalidação por mudança de topologia
//! - Resolução de tipos de custom fields (cache -> lista dona -> campo embutido)
//! - Transformação de valores para o formato de escrita (`{add, rem}`)
//! - Escrita de custom fields com verificação por releitura
//! - Registro de custom task types com busca tolerante e sugestão
//! - Classificação de erros em um conjunto fechado ([`ErrorKind`])
//!
//! # API ClickUp v2
//!
//! - **Custom Fields**: `GET /list/{list_id}/field`, `POST /task/{task_id}/field/{field_id}`
//! - **Tasks**: `GET /task/{task_id}`
//! - **Task types**: `GET /team/{team_id}/custom_item`
//!
//! ## Nomenclatura
//! O crate usa `workspace_id` no lado de fora, mapeado para `team_id` na API v2.
//!
//! # Exemplo Básico
//!
//! ```rust,ignore
//! use clickup::{ClickUpClient, CustomFieldWriter, FieldTypeResolver, WorkspaceCache};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> clickup::Result<()> {
//!     let api_token = std::env::var("CLICKUP_API_TOKEN")
//!         .expect("CLICKUP_API_TOKEN não configurado");
//!
//!     let client = ClickUpClient::new(api_token)?;
//!     let resolver = FieldTypeResolver::new(client.clone(), WorkspaceCache::default());
//!     let writer = CustomFieldWriter::new(client, resolver);
//!
//!     let result = writer
//!         .set_value("86abc", "field-uuid", json!(["86xyz"]), Default::default())
//!         .await?;
//!     println!("success={} verified={}", result.success, result.verified);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod fields;
pub mod matching;
pub mod rate_limit;
pub mod task_types;
pub mod types;

pub use cache::{CacheCategory, CacheStats, CacheTtls, TopologyChange, WorkspaceCache};
pub use client::{ClickUpClient, ClientConfig, DEFAULT_BASE_URL};
pub use error::{classify_status, classify_transport, ClickUpError, ErrorKind, Result};
pub use fields::{
    CustomFieldWriter, FieldTypeResolver, FieldUpdate, SetCustomFieldResult, SetValueOptions,
};
pub use rate_limit::{ExecutorConfig, RateLimitStats, RateLimitedExecutor, RetryPolicy};
pub use task_types::{TaskTypeRegistry, TaskTypes};
pub use types::{FieldType, FieldValue};
