use crate::config::RepositoryConfig;
use crate::core::Result;
use crate::entity::Entity;
use crate::executor::{InMemoryExecutor, QueryExecutor};
use crate::mapping::MappingRegistry;
use crate::repository::RepositoryBuilder;
use crate::session::UnitOfWork;
use std::sync::Arc;

/// Entry point tying a validated mapping to an executor.
///
/// Units of work and repositories obtained from the same store share the
/// executor, so they see each other's committed rows.
#[derive(Clone)]
pub struct Store {
    registry: Arc<MappingRegistry>,
    memory: Arc<InMemoryExecutor>,
    executor: Arc<dyn QueryExecutor>,
    config: RepositoryConfig,
}

impl Store {
    /// In-memory store over `registry`. The mapping is validated here.
    pub fn in_memory(registry: MappingRegistry) -> Result<Self> {
        Self::with_config(registry, RepositoryConfig::default())
    }

    pub fn with_config(registry: MappingRegistry, config: RepositoryConfig) -> Result<Self> {
        registry.validate()?;
        config.validate()?;
        let registry = Arc::new(registry);
        let memory = Arc::new(InMemoryExecutor::new(registry.clone()));
        let executor: Arc<dyn QueryExecutor> = memory.clone();
        log::info!(
            "Store ready with {} mapped entit(ies)",
            registry.entity_names().count()
        );
        Ok(Self {
            registry,
            memory,
            executor,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// The concrete executor, for statistics and row counts.
    pub fn executor(&self) -> &InMemoryExecutor {
        &self.memory
    }

    /// Opens a unit of work with the store's configuration.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        self.begin_with(self.config.clone()).await
    }

    /// Opens a unit of work with its own configuration.
    pub async fn begin_with(&self, config: RepositoryConfig) -> Result<UnitOfWork> {
        config.validate()?;
        UnitOfWork::begin(self.executor.clone(), self.registry.clone(), config).await
    }

    /// Starts a repository definition for `E` with the store's configuration.
    pub fn repository<E: Entity>(&self) -> RepositoryBuilder<E> {
        RepositoryBuilder::new(self.registry.clone()).config(self.config.clone())
    }
}
