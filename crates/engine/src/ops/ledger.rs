use crate::{EngineError, MoneyCents, Origin, ResultEngine};

use super::{Engine, normalize_required_name};

impl Engine {
    /// Adds `delta` to an origin total and returns the new total.
    ///
    /// The addition happens inside the store as one atomic update, so
    /// concurrent adjustments of the same origin never overwrite each other.
    pub async fn adjust(&self, origin_id: &str, delta: MoneyCents) -> ResultEngine<MoneyCents> {
        let origin = self
            .bounded(self.gateway.increment_origin_total(origin_id, delta))
            .await?;
        tracing::debug!(origin_id, %delta, total = %origin.total, "origin adjusted");
        Ok(origin.total)
    }

    /// Return an origin owned by `user_id`.
    pub async fn origin(&self, origin_id: &str, user_id: &str) -> ResultEngine<Origin> {
        self.bounded(self.gateway.find_origin(origin_id))
            .await?
            .filter(|origin| origin.user_id == user_id)
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))
    }

    /// All origins of a user, by name.
    pub async fn origins(&self, user_id: &str) -> ResultEngine<Vec<Origin>> {
        self.bounded(self.gateway.origins_by_user(user_id)).await
    }

    /// Creates an empty origin (total 0).
    pub async fn new_origin(&self, user_id: &str, name: &str) -> ResultEngine<Origin> {
        let name = normalize_required_name(name, "origin")?;
        let origin = self
            .bounded(self.gateway.insert_origin(user_id, &name))
            .await?;
        tracing::info!(origin_id = %origin.id, user_id, "origin created");
        Ok(origin)
    }

    /// Explicit user edit of an origin record.
    ///
    /// Unlike [`adjust`](Self::adjust), a `total` here replaces the stored
    /// balance: it is a manual correction, not a transaction effect. Without
    /// a `total` the stored balance is never written, so adjustments racing
    /// with a rename are kept.
    pub async fn update_origin(
        &self,
        origin_id: &str,
        user_id: &str,
        name: Option<&str>,
        total: Option<MoneyCents>,
    ) -> ResultEngine<Origin> {
        let current = self.origin(origin_id, user_id).await?;
        let name = match name {
            Some(name) => normalize_required_name(name, "origin")?,
            None => current.name,
        };
        let origin = self
            .bounded(self.gateway.update_origin(origin_id, &name, total))
            .await?;
        tracing::info!(origin_id, user_id, total = %origin.total, "origin updated");
        Ok(origin)
    }

    /// Deletes an origin. Transactions still pointing at it are left alone and
    /// simply lose their origin snapshot.
    pub async fn delete_origin(&self, origin_id: &str, user_id: &str) -> ResultEngine<()> {
        self.origin(origin_id, user_id).await?;
        self.bounded(self.gateway.delete_origin(origin_id)).await?;
        tracing::info!(origin_id, user_id, "origin deleted");
        Ok(())
    }
}
