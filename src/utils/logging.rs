use clickup::{CacheStats, RateLimitStats, SetCustomFieldResult};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Inicializa o tracing (RUST_LOG, padrão `info`)
///
/// Chamadas repetidas são ignoradas.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_gateway_startup(workspace_id: &str) {
    info!("🚀 ClickUp gateway starting for workspace {}", workspace_id);
}

pub fn log_gateway_ready(task_types: usize) {
    info!("✅ Gateway ready - {} task types loaded", task_types);
}

pub fn log_clickup_api_error(endpoint: &str, status: Option<u16>, error: &str) {
    error!("ClickUp API error: {} - Status: {:?} - Error: {}", endpoint, status, error);
}

pub fn log_field_write(task_id: &str, result: &SetCustomFieldResult) {
    if result.success {
        info!(
            "✏️ Custom field {} ({}) written on task {} - verified: {}",
            result.field_id, result.field_type, task_id, result.verified
        );
    } else {
        warn!(
            "❌ Custom field {} ({}) not written on task {}: {}",
            result.field_id,
            result.field_type,
            task_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

pub fn log_rate_limit_stats(stats: &RateLimitStats) {
    debug!("Rate limit stats: {:?}", stats);
}

pub fn log_cache_stats(stats: &CacheStats) {
    debug!("Cache stats: {:?}", stats);
}
