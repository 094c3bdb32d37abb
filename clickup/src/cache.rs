//! Cache TTL do workspace
//!
//! Guarda leituras caras (hierarquia, membros, tags, metadados de custom
//! fields) por categoria. Regras:
//!
//! - Nenhuma entrada é devolvida depois do TTL, mesmo sem `invalidate`
//! - Um miss nunca bloqueia esperando recarga; quem chama decide buscar
//! - Escritas concorrentes na mesma chave: vence o último `set`
//! - Qualquer mudança estrutural (list/folder/task/field) deve invalidar a
//!   categoria afetada ANTES de reportar sucesso ([`WorkspaceCache::invalidate_for_change`])

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

/// Classe de TTL de uma entrada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Hierarchy,
    Members,
    Tags,
    CustomFields,
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheCategory::Hierarchy => "hierarchy",
            CacheCategory::Members => "members",
            CacheCategory::Tags => "tags",
            CacheCategory::CustomFields => "custom_fields",
        };
        f.write_str(name)
    }
}

/// TTLs por categoria
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtls {
    pub hierarchy: Duration,
    pub members: Duration,
    pub tags: Duration,
    pub custom_fields: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            hierarchy: Duration::from_secs(5 * 60),
            members: Duration::from_secs(10 * 60),
            tags: Duration::from_secs(15 * 60),
            custom_fields: Duration::from_secs(30 * 60),
        }
    }
}

impl CacheTtls {
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Hierarchy => self.hierarchy,
            CacheCategory::Members => self.members,
            CacheCategory::Tags => self.tags,
            CacheCategory::CustomFields => self.custom_fields,
        }
    }
}

/// Mudança estrutural no workspace que torna entradas obsoletas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyChange {
    List,
    Folder,
    Task,
    /// Campo criado/alterado/removido em uma lista
    Field {
        list_id: String,
        field_id: Option<String>,
    },
    Members,
    Tags,
}

/// Chave dos metadados de custom fields de uma lista
pub fn list_fields_key(list_id: &str) -> String {
    format!("list:{}", list_id)
}

/// Chave do tipo resolvido de um custom field
pub fn field_type_key(field_id: &str) -> String {
    format!("field:{}", field_id)
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Estatísticas do cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Cache TTL compartilhado entre todos os chamadores
///
/// Clonar o handle é barato: os clones compartilham o mesmo armazenamento.
#[derive(Clone)]
pub struct WorkspaceCache {
    ttls: CacheTtls,
    entries: Arc<RwLock<HashMap<(CacheCategory, String), CacheEntry>>>,
    counters: Arc<CacheCounters>,
}

impl fmt::Debug for WorkspaceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceCache")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl Default for WorkspaceCache {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

impl WorkspaceCache {
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            ttls,
            entries: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(CacheCounters::default()),
        }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Lê uma entrada válida; entradas expiradas são removidas e contam como miss
    pub async fn get<T>(&self, category: CacheCategory, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let map_key = (category, key.to_string());
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&map_key) {
                Some(entry) if !entry.is_expired(now) => {
                    if let Some(value) = entry.value.downcast_ref::<T>() {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(value.clone());
                    }
                    tracing::debug!("Cache {}:{} com tipo diferente do pedido", category, key);
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(_) => {}
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // expirada: remove se ainda for a mesma entrada velha
        let mut entries = self.entries.write().await;
        if entries
            .get(&map_key)
            .map(|entry| entry.is_expired(Instant::now()))
            .unwrap_or(false)
        {
            entries.remove(&map_key);
            tracing::debug!("⌛ Cache {}:{} expirado", category, key);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Grava com o TTL padrão da categoria
    pub async fn set<T>(&self, category: CacheCategory, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        let ttl = self.ttls.ttl_for(category);
        self.set_with_ttl(category, key, value, ttl).await;
    }

    pub async fn set_with_ttl<T>(
        &self,
        category: CacheCategory,
        key: impl Into<String>,
        value: T,
        ttl: Duration,
    ) where
        T: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            value: Arc::new(value),
            created_at: Instant::now(),
            ttl,
        };
        self.entries
            .write()
            .await
            .insert((category, key.into()), entry);
    }

    pub async fn invalidate(&self, category: CacheCategory, key: &str) {
        let removed = self
            .entries
            .write()
            .await
            .remove(&(category, key.to_string()))
            .is_some();
        if removed {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("🗑️ Cache invalidado: {}:{}", category, key);
        }
    }

    pub async fn invalidate_category(&self, category: CacheCategory) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(entry_category, _), _| *entry_category != category);
        let removed = before - entries.len();
        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!("🗑️ Categoria {} invalidada ({} entradas)", category, removed);
    }

    /// Invalida o que uma mudança estrutural torna obsoleto
    pub async fn invalidate_for_change(&self, change: &TopologyChange) {
        match change {
            TopologyChange::List | TopologyChange::Folder | TopologyChange::Task => {
                self.invalidate_category(CacheCategory::Hierarchy).await;
            }
            TopologyChange::Field { list_id, field_id } => {
                self.invalidate(CacheCategory::CustomFields, &list_fields_key(list_id))
                    .await;
                if let Some(field_id) = field_id {
                    self.invalidate(CacheCategory::CustomFields, &field_type_key(field_id))
                        .await;
                }
            }
            TopologyChange::Members => self.invalidate_category(CacheCategory::Members).await,
            TopologyChange::Tags => self.invalidate_category(CacheCategory::Tags).await,
        }
    }

    /// Devolve a entrada em cache ou executa `fetch` e guarda o resultado
    ///
    /// Erros de `fetch` não são cacheados.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        category: CacheCategory,
        key: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get::<T>(category, key).await {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(category, key.to_string(), value.clone()).await;
        Ok(value)
    }

    /// Pré-aquece uma entrada em segundo plano sem bloquear quem chamou
    pub fn refresh_in_background<T, F, Fut>(
        &self,
        category: CacheCategory,
        key: impl Into<String>,
        fetch: F,
    ) -> JoinHandle<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.into();
        tokio::spawn(async move {
            match fetch().await {
                Ok(value) => {
                    cache.set(category, key.clone(), value).await;
                    tracing::debug!("♻️ Cache {}:{} pré-aquecido", category, key);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Falha ao pré-aquecer cache {}:{}: {}", category, key, e);
                }
            }
        })
    }

    /// Remove todas as entradas expiradas
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Esvazia o cache (isolamento de testes)
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}
