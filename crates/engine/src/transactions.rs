//! Transaction primitives.
//!
//! A `Transaction` records money moving in or out of at most one origin. The
//! amount is always positive; the [`Direction`] says which way it moves.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, Origin, ResultEngine};

/// Which way a transaction moves an origin balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Increases the origin balance.
    Credit,
    /// Decreases the origin balance.
    Debit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Self::Credit => 1,
            Self::Debit => -1,
        }
    }

    /// Applies the direction to a magnitude.
    pub fn apply(self, amount: MoneyCents) -> MoneyCents {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid direction: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the gateway on insert.
    pub id: String,
    pub user_id: String,
    /// `None` means unattributed: the transaction never touches a balance.
    pub origin_id: Option<String>,
    pub amount: MoneyCents,
    pub direction: Direction,
    pub subject: String,
    pub counterparty: String,
    pub description: String,
    /// Creation date as typed by the client. Kept verbatim, never parsed.
    pub created_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The amount combined with its direction (credit positive).
    pub fn signed_amount(&self) -> MoneyCents {
        self.direction.apply(self.amount)
    }
}

/// Input for a new transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: String,
    pub origin_id: Option<String>,
    pub amount: MoneyCents,
    pub direction: Direction,
    pub subject: String,
    pub counterparty: String,
    pub description: String,
    pub created_label: String,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(
        user_id: &str,
        amount: MoneyCents,
        direction: Direction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            origin_id: None,
            amount,
            direction,
            subject: String::new(),
            counterparty: String::new(),
            description: String::new(),
            created_label: created_at.format("%Y-%m-%d").to_string(),
            created_at,
        }
    }

    pub fn origin(mut self, origin_id: &str) -> Self {
        self.origin_id = Some(origin_id.to_string());
        self
    }

    pub fn subject(mut self, subject: &str, counterparty: &str) -> Self {
        self.subject = subject.to_string();
        self.counterparty = counterparty.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Replacement for the mutable fields of a stored transaction.
///
/// `id`, `user_id` and `created_at` are never touched by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub origin_id: Option<String>,
    pub amount: MoneyCents,
    pub direction: Direction,
    pub subject: String,
    pub counterparty: String,
    pub description: String,
    pub created_label: String,
}

impl From<&Transaction> for TransactionUpdate {
    fn from(tx: &Transaction) -> Self {
        Self {
            origin_id: tx.origin_id.clone(),
            amount: tx.amount,
            direction: tx.direction,
            subject: tx.subject.clone(),
            counterparty: tx.counterparty.clone(),
            description: tx.description.clone(),
            created_label: tx.created_label.clone(),
        }
    }
}

/// A transaction together with a read-time snapshot of its origin.
///
/// The snapshot is only ever built by the query side; it is not part of the
/// stored record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnrichedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// Empty or blank origin references mean "unattributed".
pub(crate) fn normalize_origin_id(origin_id: Option<&str>) -> Option<String> {
    origin_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn validate_amount(amount: MoneyCents) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidArgument(
            "amount must be > 0".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub origin_id: Option<String>,
    pub amount_minor: i64,
    pub direction: String,
    pub subject: String,
    pub counterparty: String,
    pub description: String,
    pub created_label: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.clone()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            origin_id: ActiveValue::Set(tx.origin_id.clone()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            direction: ActiveValue::Set(tx.direction.as_str().to_string()),
            subject: ActiveValue::Set(tx.subject.clone()),
            counterparty: ActiveValue::Set(tx.counterparty.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            created_label: ActiveValue::Set(tx.created_label.clone()),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            origin_id: model.origin_id,
            amount: MoneyCents::new(model.amount_minor),
            direction: Direction::try_from(model.direction.as_str())?,
            subject: model.subject,
            counterparty: model.counterparty,
            description: model.description,
            created_label: model.created_label,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn direction_round_trips_storage_text() {
        for direction in [Direction::Credit, Direction::Debit] {
            assert_eq!(Direction::try_from(direction.as_str()).unwrap(), direction);
        }
        assert_eq!(
            Direction::try_from("Income"),
            Err(EngineError::InvalidArgument(
                "invalid direction: Income".to_string()
            ))
        );
    }

    #[test]
    fn signed_amount_follows_direction() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let draft = NewTransaction::new("alice", MoneyCents::new(4000), Direction::Debit, at);
        let tx = Transaction {
            id: "t1".to_string(),
            user_id: draft.user_id,
            origin_id: None,
            amount: draft.amount,
            direction: draft.direction,
            subject: draft.subject,
            counterparty: draft.counterparty,
            description: draft.description,
            created_label: draft.created_label,
            created_at: at,
            updated_at: at,
        };
        assert_eq!(tx.signed_amount(), MoneyCents::new(-4000));
        assert_eq!(tx.created_label, "2024-03-01");
        assert_eq!(Direction::Credit.sign(), 1);
    }

    #[test]
    fn blank_origin_ids_are_unattributed() {
        assert_eq!(normalize_origin_id(Some("  ")), None);
        assert_eq!(normalize_origin_id(None), None);
        assert_eq!(normalize_origin_id(Some(" o1 ")), Some("o1".to_string()));
    }
}
