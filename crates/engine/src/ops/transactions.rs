use chrono::Utc;

use crate::{
    EngineError, EnrichedTransaction, NewTransaction, ResultEngine, Transaction,
    TransactionUpdate,
    reconcile::{self, Effect, Leg},
    transactions::{normalize_origin_id, validate_amount},
};

use super::Engine;

impl Engine {
    /// Records a new transaction and credits/debits its origin.
    pub async fn create_transaction(&self, draft: NewTransaction) -> ResultEngine<Transaction> {
        validate_amount(draft.amount)?;
        let draft = NewTransaction {
            origin_id: normalize_origin_id(draft.origin_id.as_deref()),
            ..draft
        };
        if let Some(origin_id) = draft.origin_id.as_deref() {
            self.origin(origin_id, &draft.user_id).await?;
        }

        let new = Effect::new(draft.origin_id.as_deref(), draft.amount, draft.direction);
        let legs = reconcile::plan(None, Some(new))?;
        // The id is assigned on insert, which comes after reconciliation.
        self.apply_legs(None, &legs).await?;

        let tx = match self.bounded(self.gateway.insert_transaction(&draft)).await {
            Ok(tx) => tx,
            Err(err) => return Err(self.compensate(None, &legs, err).await),
        };
        tracing::info!(
            transaction_id = %tx.id,
            user_id = %tx.user_id,
            legs = legs.len(),
            "transaction created"
        );
        Ok(tx)
    }

    /// Replaces the mutable fields of a transaction, reconciling the balance
    /// effect of the change.
    ///
    /// Changes that keep origin, amount and direction identical do not touch
    /// any origin. The write only lands if the record is still the one the
    /// legs were planned against; otherwise the legs are undone and
    /// `StaleRecord` is returned.
    pub async fn update_transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
        update: TransactionUpdate,
    ) -> ResultEngine<Transaction> {
        validate_amount(update.amount)?;
        let old = self.owned_transaction(transaction_id, user_id).await?;
        let origin_id = normalize_origin_id(update.origin_id.as_deref());
        if let Some(new_origin) = origin_id.as_deref()
            && old.origin_id.as_deref() != Some(new_origin)
        {
            self.origin(new_origin, user_id).await?;
        }

        let new = Transaction {
            id: old.id.clone(),
            user_id: old.user_id.clone(),
            origin_id,
            amount: update.amount,
            direction: update.direction,
            subject: update.subject,
            counterparty: update.counterparty,
            description: update.description,
            created_label: update.created_label,
            created_at: old.created_at,
            updated_at: Utc::now(),
        };

        let legs = reconcile::plan(Some(Effect::from(&old)), Some(Effect::from(&new)))?;
        self.apply_legs(Some(&old.id), &legs).await?;

        let tx = match self
            .bounded(self.gateway.update_transaction(&old, &new))
            .await
        {
            Ok(tx) => tx,
            Err(err) => return Err(self.compensate(Some(&old.id), &legs, err).await),
        };
        tracing::info!(transaction_id, user_id, legs = legs.len(), "transaction updated");
        Ok(tx)
    }

    /// Deletes a transaction after reversing its balance effect.
    pub async fn delete_transaction(&self, transaction_id: &str, user_id: &str) -> ResultEngine<()> {
        let old = self.owned_transaction(transaction_id, user_id).await?;
        let legs = reconcile::plan(Some(Effect::from(&old)), None)?;
        self.apply_legs(Some(&old.id), &legs).await?;

        if let Err(err) = self.bounded(self.gateway.delete_transaction(&old)).await {
            return Err(self.compensate(Some(&old.id), &legs, err).await);
        }
        tracing::info!(transaction_id, user_id, legs = legs.len(), "transaction deleted");
        Ok(())
    }

    /// Return a transaction of `user_id` with its origin snapshot.
    pub async fn transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> ResultEngine<EnrichedTransaction> {
        let tx = self.owned_transaction(transaction_id, user_id).await?;
        let mut enriched = self.enrich(vec![tx]).await?;
        enriched
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
    }

    async fn owned_transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> ResultEngine<Transaction> {
        self.bounded(self.gateway.find_transaction(transaction_id))
            .await?
            .filter(|tx| tx.user_id == user_id)
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
    }

    /// Applies legs in order. If a leg fails after an earlier one succeeded,
    /// the failure is reported as a partial reconciliation and nothing is
    /// retried.
    async fn apply_legs(&self, transaction_id: Option<&str>, legs: &[Leg]) -> ResultEngine<()> {
        let mut applied: Option<&Leg> = None;
        for leg in legs {
            match self.adjust(&leg.origin_id, leg.delta).await {
                Ok(_) => applied = Some(leg),
                Err(err) => {
                    let Some(done) = applied else {
                        return Err(err);
                    };
                    let transaction_id = transaction_id.unwrap_or("<unsaved>");
                    tracing::error!(
                        transaction_id,
                        applied_origin_id = %done.origin_id,
                        applied_direction = done.direction().as_str(),
                        applied_amount = %done.magnitude(),
                        pending_origin_id = %leg.origin_id,
                        pending_direction = leg.direction().as_str(),
                        pending_amount = %leg.magnitude(),
                        error = %err,
                        "reconciliation stopped between legs, origins need repair"
                    );
                    return Err(EngineError::PartialReconciliation {
                        transaction_id: transaction_id.to_string(),
                        applied_origin_id: done.origin_id.clone(),
                        pending_origin_id: leg.origin_id.clone(),
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(())
    }

    /// Undoes legs whose transaction write failed and hands back the error to
    /// report. A failing undo is logged and turned into `Internal`.
    async fn compensate(
        &self,
        transaction_id: Option<&str>,
        legs: &[Leg],
        cause: EngineError,
    ) -> EngineError {
        let transaction_id = transaction_id.unwrap_or("<unsaved>");
        for leg in legs.iter().rev() {
            let undo = leg.reversed();
            if let Err(err) = self.adjust(&undo.origin_id, undo.delta).await {
                tracing::error!(
                    transaction_id,
                    origin_id = %undo.origin_id,
                    direction = undo.direction().as_str(),
                    amount = %undo.magnitude(),
                    error = %err,
                    cause = %cause,
                    "failed to undo reconciliation after a failed write, origin needs repair"
                );
                return EngineError::Internal(format!(
                    "transaction {transaction_id} not written and origin {} left adjusted",
                    undo.origin_id
                ));
            }
        }
        if !legs.is_empty() {
            tracing::warn!(transaction_id, error = %cause, "transaction write failed, legs undone");
        }
        cause
    }
}
