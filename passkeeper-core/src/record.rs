//! Credential record model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PassKeeperError, PassKeeperResult, Timestamp};

const REDACTED: &str = "<redacted>";

/// A stored credential entry.
///
/// `pinned_at` is `Some` exactly when `is_pinned` is true. `id`, `owner_id` and
/// `created_at` never change once the store has assigned them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct CredentialRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Identifier of the owning account.
    pub owner_id: String,
    /// Free-text label, typically a site or service name.
    pub purpose: String,
    /// Username or email used on that site.
    pub account: String,
    /// The credential value itself. Never logged.
    pub secret: String,
    /// Whether the record is pinned to the top of the list.
    pub is_pinned: bool,
    /// When the record was last pinned.
    pub pinned_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Time of the last mutation.
    pub updated_at: Timestamp,
}

impl CredentialRecord {
    /// Whether `pinned_at` agrees with `is_pinned`.
    #[must_use]
    pub const fn pin_invariant_holds(&self) -> bool {
        self.is_pinned == self.pinned_at.is_some()
    }

    /// Applies a store update in place. `id`, `owner_id` and `created_at` are
    /// left untouched.
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(purpose) = &update.purpose {
            self.purpose.clone_from(purpose);
        }
        if let Some(account) = &update.account {
            self.account.clone_from(account);
        }
        if let Some(secret) = &update.secret {
            self.secret.clone_from(secret);
        }
        match update.pin {
            Some(PinState::Pinned { at }) => {
                self.is_pinned = true;
                self.pinned_at = Some(at);
            }
            Some(PinState::Unpinned) => {
                self.is_pinned = false;
                self.pinned_at = None;
            }
            None => {}
        }
        self.updated_at = update.updated_at;
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("purpose", &self.purpose)
            .field("account", &self.account)
            .field("secret", &REDACTED)
            .field("is_pinned", &self.is_pinned)
            .field("pinned_at", &self.pinned_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// User input for a new credential.
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct NewCredential {
    /// Site or service name.
    pub purpose: String,
    /// Username or email.
    pub account: String,
    /// The credential value.
    pub secret: String,
}

impl NewCredential {
    /// Checks that every field is filled in.
    ///
    /// # Errors
    ///
    /// Returns [`PassKeeperError::Validation`] naming the first empty field.
    pub fn validate(&self) -> PassKeeperResult<()> {
        require_filled("purpose", &self.purpose)?;
        require_filled("account", &self.account)?;
        require_filled("secret", &self.secret)
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("purpose", &self.purpose)
            .field("account", &self.account)
            .field("secret", &REDACTED)
            .finish()
    }
}

/// Partial edit of a credential. Absent fields are left as they are.
#[derive(Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct CredentialPatch {
    /// New label.
    pub purpose: Option<String>,
    /// New username or email.
    pub account: Option<String>,
    /// New credential value.
    pub secret: Option<String>,
}

impl CredentialPatch {
    /// Checks that every supplied field is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`PassKeeperError::Validation`] naming the first empty field.
    pub fn validate(&self) -> PassKeeperResult<()> {
        for (field, value) in [
            ("purpose", &self.purpose),
            ("account", &self.account),
            ("secret", &self.secret),
        ] {
            if let Some(value) = value {
                require_filled(field, value)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPatch")
            .field("purpose", &self.purpose)
            .field("account", &self.account)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// A record as handed to the store for creation, before it has an id.
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct RecordDraft {
    /// Identifier of the owning account.
    pub owner_id: String,
    /// Site or service name.
    pub purpose: String,
    /// Username or email.
    pub account: String,
    /// The credential value.
    pub secret: String,
    /// Always false for new records.
    pub is_pinned: bool,
    /// Always `None` for new records.
    pub pinned_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Equal to `created_at` for new records.
    pub updated_at: Timestamp,
}

impl RecordDraft {
    /// Builds an unpinned draft stamped with `now`.
    #[must_use]
    pub fn new(owner_id: &str, credential: NewCredential, now: Timestamp) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            purpose: credential.purpose,
            account: credential.account,
            secret: credential.secret,
            is_pinned: false,
            pinned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches the store-assigned id.
    #[must_use]
    pub fn into_record(self, id: String) -> CredentialRecord {
        CredentialRecord {
            id,
            owner_id: self.owner_id,
            purpose: self.purpose,
            account: self.account,
            secret: self.secret,
            is_pinned: self.is_pinned,
            pinned_at: self.pinned_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for RecordDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDraft")
            .field("owner_id", &self.owner_id)
            .field("purpose", &self.purpose)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Pin transition written alongside an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum PinState {
    /// The record becomes pinned at the given time.
    Pinned {
        /// Pin time.
        at: Timestamp,
    },
    /// The record becomes unpinned; `pinned_at` is cleared.
    Unpinned,
}

/// Field-level update sent to the store. Only `Some` fields are written;
/// `updated_at` is always written.
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct RecordUpdate {
    /// New label.
    pub purpose: Option<String>,
    /// New username or email.
    pub account: Option<String>,
    /// New credential value.
    pub secret: Option<String>,
    /// Pin transition.
    pub pin: Option<PinState>,
    /// Mutation time.
    pub updated_at: Timestamp,
}

impl RecordUpdate {
    /// Update carrying the fields of an edit.
    #[must_use]
    pub fn edit(patch: CredentialPatch, now: Timestamp) -> Self {
        Self {
            purpose: patch.purpose,
            account: patch.account,
            secret: patch.secret,
            pin: None,
            updated_at: now,
        }
    }

    /// Update flipping the pin flag away from `current_pinned`.
    #[must_use]
    pub const fn toggle_pin(current_pinned: bool, now: Timestamp) -> Self {
        let pin = if current_pinned {
            PinState::Unpinned
        } else {
            PinState::Pinned { at: now }
        };
        Self {
            purpose: None,
            account: None,
            secret: None,
            pin: Some(pin),
            updated_at: now,
        }
    }
}

impl fmt::Debug for RecordUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordUpdate")
            .field("purpose", &self.purpose)
            .field("account", &self.account)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .field("pin", &self.pin)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

fn require_filled(field: &str, value: &str) -> PassKeeperResult<()> {
    if value.trim().is_empty() {
        return Err(PassKeeperError::validation(field, "must not be empty"));
    }
    Ok(())
}
