//! Personal-finance ledger core.
//!
//! Transactions move money in or out of origins. Each origin keeps a running
//! total which the engine adjusts incrementally on every create, update and
//! delete of a transaction, and a query side lists transactions by owner,
//! period or subject with their origin attached.

pub use error::{EngineError, ErrorKind};
pub use gateway::{Gateway, GatewayCall, MemoryGateway, SqlGateway};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, ROLLUP_PAGE_SIZE};
pub use origins::Origin;
pub use query::{DateRange, Page, PageRequest, Sort, TransactionFilter};
pub use reconcile::{Effect, Leg};
pub use report::{OriginSummary, Rollup};
pub use transactions::{
    Direction, EnrichedTransaction, NewTransaction, Transaction, TransactionUpdate,
};

mod error;
pub mod gateway;
mod money;
mod ops;
pub mod origins;
pub mod query;
pub mod reconcile;
mod report;
pub mod transactions;

type ResultEngine<T> = Result<T, EngineError>;
