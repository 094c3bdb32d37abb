//! Bootstrap do gateway de intenções ClickUp
//!
//! - Carrega `.env` (se existir) e as configurações
//! - Monta o `GatewayContext` (cliente, executor, cache, custom fields)
//! - Carrega os custom task types do workspace
//!
//! Qualquer falha encerra o processo com código != 0.

use anyhow::Context;

use clickup_gateway::config::Settings;
use clickup_gateway::utils::logging::*;
use clickup_gateway::GatewayContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    init_tracing();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    let settings = Settings::new().context("Failed to load settings")?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let context = GatewayContext::new(settings).context("Failed to build gateway context")?;
    log_gateway_startup(context.workspace_id());

    let task_types = match context.load_task_types().await {
        Ok(count) => count,
        Err(e) => {
            log_clickup_api_error("/team/{team_id}/custom_item", None, &e.to_string());
            return Err(e).context("Failed to load task types");
        }
    };

    log_rate_limit_stats(&context.client.rate_limit_stats().await);
    log_cache_stats(&context.cache.stats().await);
    log_gateway_ready(task_types);

    Ok(())
}
