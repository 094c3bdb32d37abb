// Biblioteca do gateway de intenções ClickUp
// Expõe módulos para uso em testes e binários

pub mod config;
pub mod utils;

use clickup::{
    ClickUpClient, CustomFieldWriter, FieldTypeResolver, TaskTypes, WorkspaceCache,
};

use crate::config::Settings;
use crate::utils::AppResult;

/// Handles compartilhados do gateway
///
/// Um contexto por credencial: todos os componentes usam o mesmo cliente
/// (portanto o mesmo executor) e o mesmo cache. Clonar é barato.
#[derive(Clone, Debug)]
pub struct GatewayContext {
    pub settings: Settings,
    pub client: ClickUpClient,
    pub cache: WorkspaceCache,
    pub resolver: FieldTypeResolver,
    pub fields: CustomFieldWriter,
    pub task_types: TaskTypes,
}

impl GatewayContext {
    pub fn new(settings: Settings) -> AppResult<Self> {
        let client = ClickUpClient::with_config(settings.clickup.token.clone(), settings.client_config())?;
        let cache = WorkspaceCache::new(settings.cache_ttls());
        let resolver = FieldTypeResolver::new(client.clone(), cache.clone());
        let fields = CustomFieldWriter::new(client.clone(), resolver.clone());

        Ok(Self {
            settings,
            client,
            cache,
            resolver,
            fields,
            task_types: TaskTypes::new(),
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.settings.clickup.workspace_id
    }

    /// Carrega os custom task types do workspace configurado
    pub async fn load_task_types(&self) -> AppResult<usize> {
        let count = self.task_types.load(&self.client, self.workspace_id()).await?;
        Ok(count)
    }
}
