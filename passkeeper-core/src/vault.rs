//! Record store facade.
//!
//! Forwards record operations to a [`DocumentStore`] and applies the display
//! order to whatever comes back. The store sees one independent write per
//! operation; there are no transactions.

use std::sync::Arc;

use crate::ordering;
use crate::{
    Clock, CredentialPatch, CredentialRecord, NewCredential, PassKeeperResult, RecordDraft,
    RecordUpdate, SystemClock,
};

/// Hosted document store holding credential records, implemented by the
/// platform or by [`crate::firebase::FirestoreStore`].
///
/// Failures carry the store's code in [`crate::PassKeeperError::Store`].
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a new record and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    async fn create(&self, draft: RecordDraft) -> PassKeeperResult<String>;

    /// Returns every record whose owner is `owner_id`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    async fn query_by_owner(&self, owner_id: String) -> PassKeeperResult<Vec<CredentialRecord>>;

    /// Writes the fields present in `update` to record `id`.
    ///
    /// # Errors
    ///
    /// Returns the store's failure, including when `id` does not exist.
    async fn update(&self, id: String, update: RecordUpdate) -> PassKeeperResult<()>;

    /// Removes record `id` for good.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    async fn delete(&self, id: String) -> PassKeeperResult<()>;
}

/// Credential operations for the signed-in user.
#[derive(uniffi::Object)]
pub struct CredentialVault {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Creates a vault with an explicit time source.
    #[must_use]
    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl CredentialVault {
    /// Creates a vault over `store` using wall-clock time.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Adds a credential for `owner_id` and returns the new record id.
    ///
    /// New records are unpinned and stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns a validation error, before touching the store, if any field is
    /// empty; otherwise the store's failure.
    pub async fn add(&self, owner_id: String, credential: NewCredential) -> PassKeeperResult<String> {
        credential.validate()?;
        let draft = RecordDraft::new(&owner_id, credential, self.clock.now());
        let id = self.store.create(draft).await?;
        log::info!("added record {id} for {owner_id}");
        Ok(id)
    }

    /// Lists `owner_id`'s records in display order.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    pub async fn list(&self, owner_id: String) -> PassKeeperResult<Vec<CredentialRecord>> {
        let records = self.store.query_by_owner(owner_id).await?;
        for record in records.iter().filter(|r| !r.pin_invariant_holds()) {
            log::warn!(
                "record {} has is_pinned={} but pinned_at={:?}",
                record.id,
                record.is_pinned,
                record.pinned_at
            );
        }
        Ok(ordering::order(&records))
    }

    /// Deletes record `id`.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    pub async fn delete(&self, id: String) -> PassKeeperResult<()> {
        self.store.delete(id.clone()).await?;
        log::info!("deleted record {id}");
        Ok(())
    }

    /// Edits the supplied fields of record `id` and refreshes `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns a validation error, before touching the store, if a supplied
    /// field is empty; otherwise the store's failure.
    pub async fn update(&self, id: String, patch: CredentialPatch) -> PassKeeperResult<()> {
        patch.validate()?;
        self.store
            .update(id, RecordUpdate::edit(patch, self.clock.now()))
            .await
    }

    /// Flips the pin flag of record `id` away from `current_pinned`.
    ///
    /// The flag is not re-read from the store: the caller's last rendered value
    /// decides the direction, so two clients toggling from stale state can
    /// cancel each other out.
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    pub async fn toggle_pin(&self, id: String, current_pinned: bool) -> PassKeeperResult<()> {
        let update = RecordUpdate::toggle_pin(current_pinned, self.clock.now());
        self.store.update(id.clone(), update).await?;
        log::debug!("record {id} pinned={}", !current_pinned);
        Ok(())
    }
}
