//! Get-or-create reconciliation of per-account data categories.
//!
//! Every category holds exactly one row per account. Loading a category that
//! has no row yet writes the category's default and reads it back once.
//! Work on one category is serialised so overlapping loads and saves never
//! race each other into a second row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::queued_remote::QueuedRemote;
use super::{
    CategoryDescriptor, DataCategory, IdentitySource, Record, RecordId, RemoteError,
    RemoteErrorKind, RemoteRow,
};

/// Outcome of loading one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    /// Category name.
    pub name: &'static str,
    /// Loaded record or the failure that prevented it.
    pub result: Result<Record, RemoteError>,
}

/// Load outcomes of several categories, addressable by typed category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedCategories {
    outcomes: Vec<CategoryOutcome>,
}

impl LoadedCategories {
    /// Outcomes in load order.
    pub fn outcomes(&self) -> &[CategoryOutcome] {
        &self.outcomes
    }

    /// Decode the outcome for `category`, `None` when it was not loaded.
    pub fn get<T: DeserializeOwned>(
        &self,
        category: &DataCategory<T>,
    ) -> Option<Result<T, RemoteError>> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.name == category.name())
            .map(|outcome| match &outcome.result {
                Ok(record) => category.decode(record),
                Err(err) => Err(err.clone()),
            })
    }

    /// Names of the categories that failed to load.
    pub fn failed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.name)
    }

    /// Whether every category loaded.
    pub fn all_loaded(&self) -> bool {
        self.failed().next().is_none()
    }
}

impl From<Vec<CategoryOutcome>> for LoadedCategories {
    fn from(outcomes: Vec<CategoryOutcome>) -> Self {
        Self { outcomes }
    }
}

/// Category loading and saving for the signed-in account.
#[derive(Clone)]
pub struct DataSyncService {
    remote: QueuedRemote,
    identity: Arc<dyn IdentitySource>,
    category_locks: Arc<Mutex<HashMap<&'static str, Arc<AsyncMutex<()>>>>>,
}

impl DataSyncService {
    /// Create a service addressing the account reported by `identity`.
    pub fn new(remote: QueuedRemote, identity: Arc<dyn IdentitySource>) -> Self {
        Self {
            remote,
            identity,
            category_locks: Arc::default(),
        }
    }

    /// Exclusive access to `category` for one lookup-then-write sequence.
    async fn lock_category(&self, category: &'static str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .category_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(category).or_default())
        };
        lock.lock_owned().await
    }

    fn owner(&self) -> Result<RecordId, RemoteError> {
        self.identity
            .current_identity()
            .map(|identity| identity.remote_record_id().clone())
            .ok_or_else(|| RemoteError::unauthenticated("no authenticated identity"))
    }

    async fn fetch_first(
        &self,
        owner: &RecordId,
        category: &'static str,
    ) -> Result<Option<RemoteRow>, RemoteError> {
        let rows = self.remote.fetch_record(owner.clone(), category, 1).await?;
        Ok(rows.into_iter().next())
    }

    /// Load one category's record, creating it from the default when absent.
    ///
    /// Fails with `Unauthenticated` without issuing a call when no identity
    /// is present. Failures other than "no row" are returned unchanged.
    pub async fn load_record(
        &self,
        category: &dyn CategoryDescriptor,
    ) -> Result<Record, RemoteError> {
        let owner = self.owner()?;
        let name = category.name();
        let _guard = self.lock_category(name).await;

        match self.fetch_first(&owner, name).await {
            Ok(Some(row)) => {
                debug!(category = name, row_id = %row.row_id, "category loaded");
                category.validate(&row.fields)?;
                Ok(row.fields)
            }
            Ok(None) => self.materialise(&owner, category).await,
            Err(err) if err.kind() == RemoteErrorKind::RecordNotFound => {
                self.materialise(&owner, category).await
            }
            Err(err) => {
                warn!(category = name, kind = %err.kind(), error = %err, "category fetch failed");
                Err(err)
            }
        }
    }

    async fn materialise(
        &self,
        owner: &RecordId,
        category: &dyn CategoryDescriptor,
    ) -> Result<Record, RemoteError> {
        let name = category.name();
        info!(category = name, "category has no record; writing default");
        let default = category.default_record()?;
        let row_id = self
            .remote
            .insert_record(owner.clone(), name, default)
            .await?;
        debug!(category = name, %row_id, "default record inserted");

        match self.fetch_first(owner, name).await? {
            Some(row) => {
                category.validate(&row.fields)?;
                Ok(row.fields)
            }
            None => Err(RemoteError::not_found(format!(
                "category {name} is still empty after writing its default"
            ))),
        }
    }

    /// Load and decode one typed category.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use client::domain::game_data::STAGE;
    /// use client::domain::{
    ///     DataSyncService, Identity, IdentitySource, QueuedRemote, RecordId, RemoteCallQueue,
    /// };
    /// use client::outbound::memory::InMemoryRemoteService;
    ///
    /// struct Fixed(Identity);
    /// impl IdentitySource for Fixed {
    ///     fn current_identity(&self) -> Option<Identity> {
    ///         Some(self.0.clone())
    ///     }
    /// }
    ///
    /// let queue = Arc::new(RemoteCallQueue::new(Arc::new(InMemoryRemoteService::new())));
    /// let identity = Identity::new(RecordId::new("row-1").unwrap(), None);
    /// let remote = QueuedRemote::new(queue.clone());
    /// let sync = DataSyncService::new(remote, Arc::new(Fixed(identity)));
    ///
    /// let stage = queue.drive(sync.load_category(&STAGE), 16).unwrap().unwrap();
    /// assert_eq!(stage.stage, 1);
    /// ```
    pub async fn load_category<T>(&self, category: &DataCategory<T>) -> Result<T, RemoteError>
    where
        T: Serialize + DeserializeOwned,
    {
        let record = self.load_record(category).await?;
        category.decode(&record)
    }

    /// Load several categories concurrently through the one queue.
    ///
    /// Completes once every load has resolved; outcomes are independent and
    /// reported in input order.
    pub async fn load_all(&self, categories: &[&dyn CategoryDescriptor]) -> Vec<CategoryOutcome> {
        join_all(categories.iter().map(|category| async move {
            CategoryOutcome {
                name: category.name(),
                result: self.load_record(*category).await,
            }
        }))
        .await
    }

    /// Write `value` to the account's row, inserting the row when absent.
    pub async fn save_category<T: Serialize>(
        &self,
        category: &DataCategory<T>,
        value: &T,
    ) -> Result<(), RemoteError> {
        let owner = self.owner()?;
        let name = category.name();
        let record = category.encode(value)?;
        let _guard = self.lock_category(name).await;

        let existing = match self.fetch_first(&owner, name).await {
            Ok(row) => row,
            Err(err) if err.kind() == RemoteErrorKind::RecordNotFound => None,
            Err(err) => return Err(err),
        };
        match existing {
            Some(row) => {
                self.remote
                    .update_record(owner, name, row.row_id, record)
                    .await?;
                debug!(category = name, "category updated");
            }
            None => {
                let row_id = self.remote.insert_record(owner, name, record).await?;
                debug!(category = name, %row_id, "category inserted");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "data_sync_service_tests.rs"]
mod tests;
