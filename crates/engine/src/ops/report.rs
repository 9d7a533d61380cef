use crate::{ResultEngine, Rollup, Transaction};

use super::Engine;

/// Page size used when walking a period for a rollup.
pub const ROLLUP_PAGE_SIZE: u64 = 200;

impl Engine {
    /// Builds the income/expense rollup of one month for a user.
    ///
    /// Walks every page of [`transactions_by_date`](Self::transactions_by_date)
    /// and combines it with the current origin totals.
    pub async fn monthly_rollup(&self, user_id: &str, year: i32, month: u32) -> ResultEngine<Rollup> {
        let mut transactions: Vec<Transaction> = Vec::new();
        let mut page = 1;
        loop {
            let result = self
                .transactions_by_date(user_id, page, ROLLUP_PAGE_SIZE, year, Some(month))
                .await?;
            transactions.extend(result.items.into_iter().map(|item| item.transaction));
            if page >= result.total_pages {
                break;
            }
            page += 1;
        }

        let origins = self.origins(user_id).await?;
        tracing::debug!(user_id, year, month, rows = transactions.len(), "rollup built");
        Rollup::build(user_id, year, month, &transactions, &origins)
    }
}
