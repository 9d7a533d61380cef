//! Read-only rollups handed to the reporting side.

use std::collections::HashMap;

use serde::Serialize;

use crate::{Direction, MoneyCents, Origin, ResultEngine, Transaction};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OriginSummary {
    pub origin_id: String,
    pub origin_name: String,
    pub total_income: MoneyCents,
    pub total_expenses: MoneyCents,
    /// Current running balance, not limited to the period.
    pub origin_balance: MoneyCents,
}

/// Income and expenses of one user over a period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub total_income: MoneyCents,
    pub total_expenses: MoneyCents,
    /// Sum of the current totals of every origin of the user.
    pub net_balance: MoneyCents,
    pub origins: Vec<OriginSummary>,
}

impl Rollup {
    /// Aggregates the period's transactions against the user's origins.
    ///
    /// Transactions without an origin, or pointing at an origin not in
    /// `origins`, count towards the overall totals only. Sums that overflow
    /// are `InvalidArgument`.
    pub fn build(
        user_id: &str,
        year: i32,
        month: u32,
        transactions: &[Transaction],
        origins: &[Origin],
    ) -> ResultEngine<Self> {
        let mut per_origin: HashMap<&str, (MoneyCents, MoneyCents)> = origins
            .iter()
            .map(|o| (o.id.as_str(), (MoneyCents::ZERO, MoneyCents::ZERO)))
            .collect();
        let mut total_income = MoneyCents::ZERO;
        let mut total_expenses = MoneyCents::ZERO;

        for tx in transactions {
            let slot = tx
                .origin_id
                .as_deref()
                .and_then(|id| per_origin.get_mut(id));
            match tx.direction {
                Direction::Credit => {
                    total_income = total_income.try_add(tx.amount)?;
                    if let Some((income, _)) = slot {
                        *income = income.try_add(tx.amount)?;
                    }
                }
                Direction::Debit => {
                    total_expenses = total_expenses.try_add(tx.amount)?;
                    if let Some((_, expenses)) = slot {
                        *expenses = expenses.try_add(tx.amount)?;
                    }
                }
            }
        }

        let summaries = origins
            .iter()
            .map(|origin| {
                let (income, expenses) = per_origin
                    .get(origin.id.as_str())
                    .copied()
                    .unwrap_or_default();
                OriginSummary {
                    origin_id: origin.id.clone(),
                    origin_name: origin.name.clone(),
                    total_income: income,
                    total_expenses: expenses,
                    origin_balance: origin.total,
                }
            })
            .collect();

        let net_balance = origins
            .iter()
            .try_fold(MoneyCents::ZERO, |sum, o| sum.try_add(o.total))?;

        Ok(Self {
            user_id: user_id.to_string(),
            year,
            month,
            total_income,
            total_expenses,
            net_balance,
            origins: summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn origin(id: &str, total: i64) -> Origin {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Origin {
            id: id.to_string(),
            user_id: "alice".to_string(),
            name: id.to_uppercase(),
            total: MoneyCents::new(total),
            created_at: at,
            updated_at: at,
        }
    }

    fn tx(origin_id: Option<&str>, cents: i64, direction: Direction) -> Transaction {
        let at = Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap();
        Transaction {
            id: format!("{origin_id:?}-{cents}"),
            user_id: "alice".to_string(),
            origin_id: origin_id.map(ToString::to_string),
            amount: MoneyCents::new(cents),
            direction,
            subject: String::new(),
            counterparty: String::new(),
            description: String::new(),
            created_label: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn splits_income_and_expenses_per_origin() {
        let origins = vec![origin("bank", 150_000), origin("cash", 2_000)];
        let transactions = vec![
            tx(Some("bank"), 200_000, Direction::Credit),
            tx(Some("bank"), 50_000, Direction::Debit),
            tx(Some("cash"), 1_000, Direction::Debit),
            tx(None, 700, Direction::Credit),
            tx(Some("gone"), 300, Direction::Debit),
        ];

        let rollup = Rollup::build("alice", 2024, 2, &transactions, &origins).unwrap();

        assert_eq!(rollup.total_income, MoneyCents::new(200_700));
        assert_eq!(rollup.total_expenses, MoneyCents::new(51_300));
        assert_eq!(rollup.net_balance, MoneyCents::new(152_000));
        assert_eq!(rollup.origins.len(), 2);
        assert_eq!(rollup.origins[0].total_income, MoneyCents::new(200_000));
        assert_eq!(rollup.origins[0].total_expenses, MoneyCents::new(50_000));
        assert_eq!(rollup.origins[1].total_expenses, MoneyCents::new(1_000));
        assert_eq!(rollup.origins[1].origin_balance, MoneyCents::new(2_000));
    }

    #[test]
    fn overflowing_sums_are_rejected() {
        let origins = vec![origin("bank", i64::MAX), origin("cash", 1)];
        let err = Rollup::build("alice", 2024, 2, &[], &origins).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);

        let transactions = vec![
            tx(Some("bank"), i64::MAX, Direction::Credit),
            tx(None, 1, Direction::Credit),
        ];
        let err = Rollup::build("alice", 2024, 2, &transactions, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }
}
