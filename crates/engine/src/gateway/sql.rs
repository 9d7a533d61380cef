use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue, Condition, DatabaseConnection, DbErr, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, NewTransaction, Origin, ResultEngine, Transaction,
    TransactionFilter, origins, query::Sort, transactions,
};

use super::Gateway;

/// Gateway backed by a relational database through sea-orm.
#[derive(Clone, Debug)]
pub struct SqlGateway {
    database: DatabaseConnection,
}

impl SqlGateway {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Tells a conditional write that matched no row apart: stale or gone.
    async fn stale_or_missing(&self, id: &str) -> EngineError {
        match transactions::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await
        {
            Ok(Some(_)) => EngineError::StaleRecord(id.to_string()),
            Ok(None) => EngineError::KeyNotFound("transaction not exists".to_string()),
            Err(err) => err.into(),
        }
    }
}

fn filter_condition(filter: &TransactionFilter) -> Condition {
    let mut condition =
        Condition::all().add(transactions::Column::UserId.eq(filter.user_id.clone()));
    if let Some(range) = filter.created {
        condition = condition
            .add(transactions::Column::CreatedAt.gte(range.from))
            .add(transactions::Column::CreatedAt.lt(range.to));
    }
    if let Some(subject) = &filter.subject {
        condition = condition.add(transactions::Column::Subject.eq(subject.clone()));
    }
    if let Some(counterparty) = &filter.counterparty {
        condition = condition.add(transactions::Column::Counterparty.eq(counterparty.clone()));
    }
    condition
}

/// Matches the stored row only while it still has the version `previous`
/// was read at.
fn version_condition(previous: &Transaction) -> Condition {
    let origin = match &previous.origin_id {
        Some(origin_id) => transactions::Column::OriginId.eq(origin_id.clone()),
        None => transactions::Column::OriginId.is_null(),
    };
    Condition::all()
        .add(transactions::Column::Id.eq(previous.id.clone()))
        .add(transactions::Column::UpdatedAt.eq(previous.updated_at))
        .add(origin)
        .add(transactions::Column::AmountMinor.eq(previous.amount.cents()))
        .add(transactions::Column::Direction.eq(previous.direction.as_str()))
}

/// Unique-constraint violations become `ExistingKey`, the rest stays a
/// database error.
fn map_write_err(err: DbErr, key: &str) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::ExistingKey(key.to_string()),
        _ => err.into(),
    }
}

#[async_trait]
impl Gateway for SqlGateway {
    async fn insert_transaction(&self, draft: &NewTransaction) -> ResultEngine<Transaction> {
        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: draft.user_id.clone(),
            origin_id: draft.origin_id.clone(),
            amount: draft.amount,
            direction: draft.direction,
            subject: draft.subject.clone(),
            counterparty: draft.counterparty.clone(),
            description: draft.description.clone(),
            created_label: draft.created_label.clone(),
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        transactions::ActiveModel::from(&tx)
            .insert(&self.database)
            .await
            .map_err(|err| map_write_err(err, &tx.id))?;
        Ok(tx)
    }

    async fn find_transaction(&self, id: &str) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn update_transaction(
        &self,
        previous: &Transaction,
        next: &Transaction,
    ) -> ResultEngine<Transaction> {
        let mut active = transactions::ActiveModel::from(next);
        active.id = ActiveValue::Unchanged(next.id.clone());
        let result = transactions::Entity::update_many()
            .set(active)
            .filter(version_condition(previous))
            .exec(&self.database)
            .await
            .map_err(|err| map_write_err(err, &next.id))?;
        if result.rows_affected == 0 {
            return Err(self.stale_or_missing(&previous.id).await);
        }
        Ok(next.clone())
    }

    async fn delete_transaction(&self, previous: &Transaction) -> ResultEngine<()> {
        let result = transactions::Entity::delete_many()
            .filter(version_condition(previous))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(self.stale_or_missing(&previous.id).await);
        }
        Ok(())
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> ResultEngine<u64> {
        let total = transactions::Entity::find()
            .filter(filter_condition(filter))
            .count(&self.database)
            .await?;
        Ok(total)
    }

    async fn find_transaction_page(
        &self,
        filter: &TransactionFilter,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> ResultEngine<Vec<Transaction>> {
        let query = transactions::Entity::find().filter(filter_condition(filter));
        let query = match sort {
            Sort::CreatedAtDesc => query
                .order_by_desc(transactions::Column::CreatedAt)
                .order_by_desc(transactions::Column::Id),
            Sort::CreatedAtAsc => query
                .order_by_asc(transactions::Column::CreatedAt)
                .order_by_asc(transactions::Column::Id),
        };
        let rows = query.offset(skip).limit(limit).all(&self.database).await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn insert_origin(&self, user_id: &str, name: &str) -> ResultEngine<Origin> {
        let now = Utc::now();
        let origin = Origin {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            total: MoneyCents::ZERO,
            created_at: now,
            updated_at: now,
        };
        origins::ActiveModel::from(&origin)
            .insert(&self.database)
            .await
            .map_err(|err| map_write_err(err, name))?;
        Ok(origin)
    }

    async fn find_origin(&self, id: &str) -> ResultEngine<Option<Origin>> {
        let model = origins::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?;
        Ok(model.map(Origin::from))
    }

    async fn lookup_origins(&self, ids: &[String]) -> ResultEngine<HashMap<String, Origin>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let models = origins::Entity::find()
            .filter(origins::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.database)
            .await?;
        Ok(models
            .into_iter()
            .map(|model| (model.id.clone(), Origin::from(model)))
            .collect())
    }

    async fn origins_by_user(&self, user_id: &str) -> ResultEngine<Vec<Origin>> {
        let models = origins::Entity::find()
            .filter(origins::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(origins::Column::Name)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Origin::from).collect())
    }

    async fn update_origin(
        &self,
        id: &str,
        name: &str,
        total: Option<MoneyCents>,
    ) -> ResultEngine<Origin> {
        let mut update = origins::Entity::update_many()
            .col_expr(origins::Column::Name, Expr::value(name.to_string()))
            .col_expr(origins::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(total) = total {
            update = update.col_expr(origins::Column::TotalMinor, Expr::value(total.cents()));
        }
        let result = update
            .filter(origins::Column::Id.eq(id.to_string()))
            .exec(&self.database)
            .await
            .map_err(|err| map_write_err(err, name))?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("origin not exists".to_string()));
        }
        self.find_origin(id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))
    }

    async fn delete_origin(&self, id: &str) -> ResultEngine<()> {
        let result = origins::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("origin not exists".to_string()));
        }
        Ok(())
    }

    async fn increment_origin_total(&self, id: &str, delta: MoneyCents) -> ResultEngine<Origin> {
        // The increment is a single UPDATE evaluated by the database; the
        // surrounding transaction only makes the read-back see our own write.
        // The headroom filter keeps SQLite from promoting an overflowing sum
        // to REAL.
        let headroom = if delta.cents() >= 0 {
            origins::Column::TotalMinor.lte(i64::MAX - delta.cents())
        } else {
            origins::Column::TotalMinor.gte(i64::MIN - delta.cents())
        };
        let db_tx = self.database.begin().await?;
        let result = origins::Entity::update_many()
            .col_expr(
                origins::Column::TotalMinor,
                Expr::col(origins::Column::TotalMinor).add(delta.cents()),
            )
            .col_expr(origins::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(origins::Column::Id.eq(id.to_string()))
            .filter(headroom)
            .exec(&db_tx)
            .await?;
        if result.rows_affected == 0 {
            let exists = origins::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .is_some();
            return Err(if exists {
                EngineError::InvalidArgument("amount too large".to_string())
            } else {
                EngineError::KeyNotFound("origin not exists".to_string())
            });
        }
        let model = origins::Entity::find_by_id(id.to_string())
            .one(&db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))?;
        db_tx.commit().await?;
        Ok(Origin::from(model))
    }
}
