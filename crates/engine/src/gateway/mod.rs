//! Persistence gateway.
//!
//! The engine only talks to storage through [`Gateway`]. Identifiers are
//! owned by the gateway: the engine passes them through untouched.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    MoneyCents, NewTransaction, Origin, ResultEngine, Transaction, TransactionFilter,
    query::Sort,
};

mod memory;
mod sql;

pub use memory::{GatewayCall, MemoryGateway};
pub use sql::SqlGateway;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Stores a new transaction, assigning its id and `updated_at`.
    async fn insert_transaction(&self, draft: &NewTransaction) -> ResultEngine<Transaction>;

    async fn find_transaction(&self, id: &str) -> ResultEngine<Option<Transaction>>;

    /// Overwrites the stored record with `next`, but only while it still
    /// matches `previous` (same `updated_at`, origin, amount and direction).
    ///
    /// `KeyNotFound` if absent, `StaleRecord` if it changed since `previous`
    /// was read.
    async fn update_transaction(
        &self,
        previous: &Transaction,
        next: &Transaction,
    ) -> ResultEngine<Transaction>;

    /// Removes the record while it still matches `previous`. Same errors as
    /// [`update_transaction`](Self::update_transaction).
    async fn delete_transaction(&self, previous: &Transaction) -> ResultEngine<()>;

    async fn count_transactions(&self, filter: &TransactionFilter) -> ResultEngine<u64>;

    async fn find_transaction_page(
        &self,
        filter: &TransactionFilter,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> ResultEngine<Vec<Transaction>>;

    /// Creates an origin with a zero total.
    async fn insert_origin(&self, user_id: &str, name: &str) -> ResultEngine<Origin>;

    async fn find_origin(&self, id: &str) -> ResultEngine<Option<Origin>>;

    /// Resolves many origins at once. Unknown ids are simply missing from the
    /// returned map.
    async fn lookup_origins(&self, ids: &[String]) -> ResultEngine<HashMap<String, Origin>>;

    async fn origins_by_user(&self, user_id: &str) -> ResultEngine<Vec<Origin>>;

    /// Overwrites the name, and the total only when one is given. A `None`
    /// total leaves the stored value untouched. `KeyNotFound` if absent.
    async fn update_origin(
        &self,
        id: &str,
        name: &str,
        total: Option<MoneyCents>,
    ) -> ResultEngine<Origin>;

    /// `KeyNotFound` if absent.
    async fn delete_origin(&self, id: &str) -> ResultEngine<()>;

    /// Adds `delta` to the stored total in a single store-level update and
    /// returns the origin as written. `KeyNotFound` if absent,
    /// `InvalidArgument` if the new total would overflow.
    ///
    /// Implementations must not read the total, add in process and write it
    /// back: concurrent callers would lose updates.
    async fn increment_origin_total(&self, id: &str, delta: MoneyCents) -> ResultEngine<Origin>;
}
