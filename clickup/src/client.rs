//! Cliente HTTP para a API do ClickUp
//!
//! Toda requisição é montada como uma closure reexecutável e entregue ao
//! [`RateLimitedExecutor`]: o cliente nunca fala com a rede por fora dele.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClickUpError, Result, TransportFailure};
use crate::rate_limit::{ApiResponse, ExecutorConfig, RateLimitStats, RateLimitedExecutor};
use crate::types::{
    CustomFieldMeta, CustomItemType, CustomItemsResponse, ListFieldsResponse, TaskSnapshot,
};

pub const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

/// Configuração do cliente
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub total_timeout: Duration,
    pub connect_timeout: Duration,
    pub executor: ExecutorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            total_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Cliente para interagir com a API do ClickUp (v2)
///
/// Clonar o cliente compartilha o mesmo executor: todos os clones respeitam o
/// mesmo espaçamento e o mesmo backoff (um fluxo lógico por token).
#[derive(Clone, Debug)]
pub struct ClickUpClient {
    http_client: HttpClient,
    api_token: String,
    base_url: String,
    executor: Arc<RateLimitedExecutor>,
}

impl ClickUpClient {
    /// Cria um novo cliente ClickUp
    ///
    /// # Argumentos
    ///
    /// * `api_token` - Personal Token (`pk_...`) ou access token OAuth2
    ///
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::with_config(api_token, ClientConfig::default())
    }

    /// Cria um novo cliente com timeouts customizados
    pub fn with_timeouts(
        api_token: impl Into<String>,
        total_timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        Self::with_config(
            api_token,
            ClientConfig {
                total_timeout: Duration::from_secs(total_timeout_secs),
                connect_timeout: Duration::from_secs(connect_timeout_secs),
                ..ClientConfig::default()
            },
        )
    }

    pub fn with_config(api_token: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(ClickUpError::invalid_parameter("ClickUp API token is empty"));
        }

        let http_client = HttpClient::builder()
            .timeout(config.total_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClickUpError::unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            executor: Arc::new(RateLimitedExecutor::new(config.executor)),
        })
    }

    /// Header Authorization: tokens pessoais vão crus, OAuth2 com `Bearer`
    fn authorization(&self) -> String {
        if self.api_token.starts_with("pk_") || self.api_token.starts_with("Bearer ") {
            self.api_token.clone()
        } else {
            format!("Bearer {}", self.api_token)
        }
    }

    /// Envia uma requisição através do executor
    async fn send(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, endpoint);
        let authorization = self.authorization();

        self.executor
            .execute(endpoint, || {
                tracing::debug!("{} {}", method, url);
                let mut request = self
                    .http_client
                    .request(method.clone(), &url)
                    .header("Authorization", &authorization)
                    .header("Content-Type", "application/json");
                if let Some(body) = body {
                    request = request.json(body);
                }
                async move {
                    let response = request.send().await.map_err(TransportFailure::from)?;
                    ApiResponse::read(response).await
                }
            })
            .await
    }

    /// Executa uma requisição GET e parseia JSON
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.send(Method::GET, endpoint, None).await?.json()
    }

    /// Executa uma requisição POST e parseia JSON
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T> {
        tracing::debug!(
            "POST {} with body: {}",
            endpoint,
            serde_json::to_string(body).unwrap_or_default()
        );
        self.send(Method::POST, endpoint, Some(body)).await?.json()
    }

    /// Custom fields acessíveis em uma lista
    ///
    /// GET /list/{list_id}/field
    pub async fn get_list_fields(&self, list_id: &str) -> Result<Vec<CustomFieldMeta>> {
        require_id("list_id", list_id)?;
        let endpoint = format!("/list/{}/field", urlencoding::encode(list_id));
        let response: ListFieldsResponse = self
            .get_json(&endpoint)
            .await
            .map_err(|e| e.with_detail("list_id", list_id))?;

        tracing::debug!("📋 Lista {} tem {} custom fields", list_id, response.fields.len());
        Ok(response.fields)
    }

    /// Lê uma tarefa com seus custom fields embutidos
    ///
    /// GET /task/{task_id}
    pub async fn get_task(&self, task_id: &str) -> Result<TaskSnapshot> {
        require_id("task_id", task_id)?;
        let endpoint = format!("/task/{}", urlencoding::encode(task_id));
        self.get_json(&endpoint)
            .await
            .map_err(|e| e.with_detail("task_id", task_id))
    }

    /// Grava o valor de um custom field
    ///
    /// POST /task/{task_id}/field/{field_id} com `payload` já no formato
    /// `{"value": ...}`.
    pub async fn set_custom_field_value(
        &self,
        task_id: &str,
        field_id: &str,
        payload: &Value,
    ) -> Result<()> {
        require_id("task_id", task_id)?;
        require_id("field_id", field_id)?;
        let endpoint = format!(
            "/task/{}/field/{}",
            urlencoding::encode(task_id),
            urlencoding::encode(field_id)
        );
        let _response: Value = self
            .post_json(&endpoint, payload)
            .await
            .map_err(|e| e.with_detail("task_id", task_id).with_detail("field_id", field_id))?;
        Ok(())
    }

    /// Custom task types do workspace
    ///
    /// GET /team/{team_id}/custom_item
    pub async fn get_custom_item_types(&self, team_id: &str) -> Result<Vec<CustomItemType>> {
        if team_id.trim().is_empty() {
            return Err(ClickUpError::workspace("workspace_id (team_id) não configurado"));
        }
        let endpoint = format!("/team/{}/custom_item", urlencoding::encode(team_id));
        let response: CustomItemsResponse = self
            .get_json(&endpoint)
            .await
            .map_err(|e| e.with_detail("team_id", team_id))?;
        Ok(response.custom_items)
    }

    /// Obtém a URL base da API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Obtém o token de autenticação
    pub fn token(&self) -> &str {
        &self.api_token
    }

    pub fn executor(&self) -> &RateLimitedExecutor {
        &self.executor
    }

    pub async fn rate_limit_stats(&self) -> RateLimitStats {
        self.executor.stats().await
    }
}

fn require_id(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClickUpError::invalid_parameter(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Cliente apontado para um mock server, sem espaçamento entre requisições
#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> ClickUpClient {
    use crate::rate_limit::RetryPolicy;

    ClickUpClient::with_config(
        "pk_test",
        ClientConfig {
            base_url: base_url.to_string(),
            executor: ExecutorConfig {
                min_spacing: Duration::ZERO,
                retry: RetryPolicy {
                    max_attempts: 2,
                    base_delay: Duration::from_millis(10),
                    multiplier: 2.0,
                    max_delay: Duration::from_millis(50),
                },
                ..ExecutorConfig::default()
            },
            ..ClientConfig::default()
        },
    )
    .unwrap()
}
