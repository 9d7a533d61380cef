use std::collections::BTreeSet;

use crate::{
    EnrichedTransaction, ResultEngine, Transaction,
    query::{DateRange, Page, PageRequest, Sort, TransactionFilter},
};

use super::Engine;

impl Engine {
    /// Lists every transaction of a user, newest first.
    pub async fn transactions_by_user(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
    ) -> ResultEngine<Page<EnrichedTransaction>> {
        let request = PageRequest::new(page, limit)?;
        self.transactions_page(&TransactionFilter::user(user_id), request)
            .await
    }

    /// Lists the transactions of a user created in a calendar year, or in one
    /// month of it when `month` is given and non-zero.
    pub async fn transactions_by_date(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
        year: i32,
        month: Option<u32>,
    ) -> ResultEngine<Page<EnrichedTransaction>> {
        let request = PageRequest::new(page, limit)?;
        let range = DateRange::calendar(year, month)?;
        self.transactions_page(&TransactionFilter::user(user_id).created_in(range), request)
            .await
    }

    /// Lists the transactions of a user with exactly this subject, and this
    /// counterparty when one is given.
    pub async fn transactions_by_subject(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
        subject: &str,
        counterparty: Option<&str>,
    ) -> ResultEngine<Page<EnrichedTransaction>> {
        let request = PageRequest::new(page, limit)?;
        let filter = TransactionFilter::user(user_id).subject(subject, counterparty);
        self.transactions_page(&filter, request).await
    }

    /// Runs a filtered listing: count first, then the page, then enrichment.
    ///
    /// Pages past the end come back empty.
    pub async fn transactions_page(
        &self,
        filter: &TransactionFilter,
        request: PageRequest,
    ) -> ResultEngine<Page<EnrichedTransaction>> {
        let total_documents = self
            .bounded(self.gateway.count_transactions(filter))
            .await?;

        let rows = if request.skip() >= total_documents {
            Vec::new()
        } else {
            self.bounded(self.gateway.find_transaction_page(
                filter,
                Sort::CreatedAtDesc,
                request.skip(),
                request.limit(),
            ))
            .await?
        };
        tracing::debug!(
            user_id = %filter.user_id,
            page = request.page(),
            rows = rows.len(),
            total_documents,
            "transactions listed"
        );

        Ok(Page {
            items: self.enrich(rows).await?,
            page: request.page(),
            limit: request.limit(),
            total_documents,
            total_pages: request.total_pages(total_documents),
        })
    }

    /// Attaches origin snapshots. Missing or dangling references just get no
    /// snapshot.
    pub(super) async fn enrich(
        &self,
        rows: Vec<Transaction>,
    ) -> ResultEngine<Vec<EnrichedTransaction>> {
        let ids: Vec<String> = rows
            .iter()
            .filter_map(|tx| tx.origin_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let origins = if ids.is_empty() {
            Default::default()
        } else {
            self.bounded(self.gateway.lookup_origins(&ids)).await?
        };

        Ok(rows
            .into_iter()
            .map(|transaction| {
                let origin = transaction
                    .origin_id
                    .as_ref()
                    .and_then(|id| origins.get(id))
                    .cloned();
                EnrichedTransaction {
                    transaction,
                    origin,
                }
            })
            .collect())
    }
}
