use std::{fmt, future::Future, sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine, gateway::Gateway, gateway::SqlGateway};

mod ledger;
mod list;
mod report;
mod transactions;

pub use report::ROLLUP_PAGE_SIZE;

/// Entry point of the ledger.
///
/// Cheap to clone: every clone shares the same gateway.
#[derive(Clone)]
pub struct Engine {
    gateway: Arc<dyn Gateway>,
    storage_timeout: Option<Duration>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("storage_timeout", &self.storage_timeout)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Runs one gateway call, abandoning it once the storage timeout elapses.
    async fn bounded<T>(&self, call: impl Future<Output = ResultEngine<T>>) -> ResultEngine<T> {
        match self.storage_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                EngineError::Internal(format!("storage call timed out after {limit:?}"))
            })?,
            None => call.await,
        }
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidArgument(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    gateway: Option<Arc<dyn Gateway>>,
    storage_timeout: Option<Duration>,
}

impl EngineBuilder {
    /// Use a SQL database through [`SqlGateway`].
    pub fn database(self, db: DatabaseConnection) -> EngineBuilder {
        self.gateway(SqlGateway::new(db))
    }

    /// Use any gateway implementation.
    pub fn gateway(mut self, gateway: impl Gateway + 'static) -> EngineBuilder {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    /// Upper bound for every single storage call.
    pub fn storage_timeout(mut self, limit: Duration) -> EngineBuilder {
        self.storage_timeout = Some(limit);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let gateway = self
            .gateway
            .ok_or_else(|| EngineError::InvalidArgument("missing gateway".to_string()))?;
        Ok(Engine {
            gateway,
            storage_timeout: self.storage_timeout,
        })
    }
}
