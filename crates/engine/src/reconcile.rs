//! Balance reconciliation planning.
//!
//! A transaction transition `(old, new)` contributes `signed(new) -
//! signed(old)` to the origins involved. When both sides point at the same
//! origin the two contributions collapse into a single leg; when they point
//! at different origins the old one is reversed and the new one applied.
//!
//! Planning is pure. Executing the legs is done by the engine.

use serde::Serialize;

use crate::{Direction, MoneyCents, ResultEngine, Transaction};

/// What a transaction state contributes to origin balances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Effect<'a> {
    pub origin_id: Option<&'a str>,
    pub signed_amount: MoneyCents,
}

impl<'a> Effect<'a> {
    pub fn new(origin_id: Option<&'a str>, amount: MoneyCents, direction: Direction) -> Self {
        Self {
            origin_id,
            signed_amount: direction.apply(amount),
        }
    }
}

impl<'a> From<&'a Transaction> for Effect<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self::new(tx.origin_id.as_deref(), tx.amount, tx.direction)
    }
}

/// One atomic adjustment of one origin total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Leg {
    pub origin_id: String,
    pub delta: MoneyCents,
}

impl Leg {
    pub fn direction(&self) -> Direction {
        if self.delta.cents() < 0 {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }

    pub fn magnitude(&self) -> MoneyCents {
        MoneyCents::new(self.delta.cents().saturating_abs())
    }

    pub fn reversed(&self) -> Self {
        Self {
            origin_id: self.origin_id.clone(),
            delta: -self.delta,
        }
    }
}

/// Computes the legs for a transition. `None` on the old side is a create,
/// `None` on the new side a delete.
///
/// Returns at most two legs, never a zero one. When there are two, the first
/// reverses the old origin and the second credits the new one.
pub fn plan(old: Option<Effect<'_>>, new: Option<Effect<'_>>) -> ResultEngine<Vec<Leg>> {
    let old = old.and_then(|e| e.origin_id.map(|id| (id, e.signed_amount)));
    let new = new.and_then(|e| e.origin_id.map(|id| (id, e.signed_amount)));

    let legs = match (old, new) {
        (None, None) => Vec::new(),
        (None, Some((to, amount))) => vec![leg(to, amount)],
        (Some((from, amount)), None) => vec![leg(from, -amount)],
        (Some((from, old_amount)), Some((to, new_amount))) if from == to => {
            vec![leg(to, new_amount.try_sub(old_amount)?)]
        }
        (Some((from, old_amount)), Some((to, new_amount))) => {
            vec![leg(from, -old_amount), leg(to, new_amount)]
        }
    };

    Ok(legs.into_iter().filter(|l| !l.delta.is_zero()).collect())
}

fn leg(origin_id: &str, delta: MoneyCents) -> Leg {
    Leg {
        origin_id: origin_id.to_string(),
        delta,
    }
}
