//! In-memory implementations of the platform traits for testing.
//!
//! None of these talk to a network or persist anything. They mimic the error
//! codes of the hosted services closely enough to drive the facades through
//! their failure paths.

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    validate_email, AuthUser, BiometricAuthenticator, BiometricPrompt, Clock, CredentialRecord,
    DocumentStore, IdentityProvider, PassKeeperError, PassKeeperResult, RecordDraft, RecordUpdate,
    SettingsStore, Timestamp, MIN_PASSWORD_LENGTH,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Identity provider
// =============================================================================

struct Account {
    uid: String,
    password: String,
    display_name: Option<String>,
}

/// Identity provider keeping accounts in a map, keyed by email.
///
/// Rejections use the same codes as Firebase Auth (`auth/user-not-found`,
/// `auth/wrong-password`, `auth/email-already-in-use`, `auth/weak-password`,
/// `auth/invalid-email`).
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    next_uid: AtomicU64,
    refuse_sign_out: AtomicBool,
    reset_emails: Mutex<Vec<String>>,
}

impl InMemoryIdentityProvider {
    /// Creates a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `sign_out` fail with `auth/network-request-failed`.
    pub fn refuse_sign_out(&self) {
        self.refuse_sign_out.store(true, Ordering::SeqCst);
    }

    /// Addresses password-reset emails were sent to, in order.
    #[must_use]
    pub fn reset_emails(&self) -> Vec<String> {
        locked(&self.reset_emails).clone()
    }

    fn user(email: &str, account: &Account) -> AuthUser {
        AuthUser {
            uid: account.uid.clone(),
            email: Some(email.to_string()),
            display_name: account.display_name.clone(),
        }
    }
}

fn check_email(email: &str) -> PassKeeperResult<()> {
    validate_email(email).map_err(|_| PassKeeperError::auth("auth/invalid-email"))
}

#[async_trait::async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(&self, email: String, password: String) -> PassKeeperResult<AuthUser> {
        check_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PassKeeperError::auth("auth/weak-password"));
        }
        let mut accounts = locked(&self.accounts);
        if accounts.contains_key(&email) {
            return Err(PassKeeperError::auth("auth/email-already-in-use"));
        }
        let account = Account {
            uid: format!("uid-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1),
            password,
            display_name: None,
        };
        let user = Self::user(&email, &account);
        accounts.insert(email, account);
        Ok(user)
    }

    async fn sign_in(&self, email: String, password: String) -> PassKeeperResult<AuthUser> {
        check_email(&email)?;
        let accounts = locked(&self.accounts);
        let account = accounts
            .get(&email)
            .ok_or_else(|| PassKeeperError::auth("auth/user-not-found"))?;
        if account.password != password {
            return Err(PassKeeperError::auth("auth/wrong-password"));
        }
        Ok(Self::user(&email, account))
    }

    async fn sign_out(&self) -> PassKeeperResult<()> {
        if self.refuse_sign_out.load(Ordering::SeqCst) {
            return Err(PassKeeperError::auth("auth/network-request-failed"));
        }
        Ok(())
    }

    async fn update_display_name(
        &self,
        user: AuthUser,
        display_name: String,
    ) -> PassKeeperResult<AuthUser> {
        let mut accounts = locked(&self.accounts);
        let (email, account) = accounts
            .iter_mut()
            .find(|(_, account)| account.uid == user.uid)
            .ok_or_else(|| PassKeeperError::auth("auth/user-not-found"))?;
        account.display_name = Some(display_name);
        Ok(Self::user(email, account))
    }

    async fn send_password_reset_email(&self, email: String) -> PassKeeperResult<()> {
        check_email(&email)?;
        if !locked(&self.accounts).contains_key(&email) {
            return Err(PassKeeperError::auth("auth/user-not-found"));
        }
        locked(&self.reset_emails).push(email);
        Ok(())
    }
}

// =============================================================================
// Document store
// =============================================================================

/// Document store keeping records in a map, keyed by generated id.
///
/// Every trait call is counted, including calls that fail.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    records: Mutex<BTreeMap<String, CredentialRecord>>,
    next_id: AtomicU64,
    calls: AtomicU64,
    fail_next: Mutex<Option<String>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` as is, bypassing the trait. Used to seed fixtures,
    /// including records that break the pin invariant.
    pub fn insert(&self, record: CredentialRecord) {
        locked(&self.records).insert(record.id.clone(), record);
    }

    /// The stored record with `id`, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<CredentialRecord> {
        locked(&self.records).get(id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        locked(&self.records).len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        locked(&self.records).is_empty()
    }

    /// Number of trait calls received so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next trait call fail with store code `code`.
    pub fn fail_next(&self, code: &str) {
        *locked(&self.fail_next) = Some(code.to_string());
    }

    fn begin_call(&self) -> PassKeeperResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match locked(&self.fail_next).take() {
            Some(code) => Err(PassKeeperError::store(code, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, draft: RecordDraft) -> PassKeeperResult<String> {
        self.begin_call()?;
        let id = format!("doc-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        locked(&self.records).insert(id.clone(), draft.into_record(id.clone()));
        Ok(id)
    }

    async fn query_by_owner(&self, owner_id: String) -> PassKeeperResult<Vec<CredentialRecord>> {
        self.begin_call()?;
        Ok(locked(&self.records)
            .values()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: String, update: RecordUpdate) -> PassKeeperResult<()> {
        self.begin_call()?;
        let mut records = locked(&self.records);
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PassKeeperError::store("not-found", format!("no document {id}")))?;
        record.apply(&update);
        Ok(())
    }

    async fn delete(&self, id: String) -> PassKeeperResult<()> {
        self.begin_call()?;
        locked(&self.records).remove(&id);
        Ok(())
    }
}

// =============================================================================
// Settings store
// =============================================================================

/// Settings store backed by a map.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose reads and writes always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            values: Mutex::default(),
            failing: true,
        }
    }

    fn check(&self) -> PassKeeperResult<()> {
        if self.failing {
            return Err(PassKeeperError::Settings {
                error: "storage unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: String) -> PassKeeperResult<Option<String>> {
        self.check()?;
        Ok(locked(&self.values).get(&key).cloned())
    }

    async fn set(&self, key: String, value: String) -> PassKeeperResult<()> {
        self.check()?;
        locked(&self.values).insert(key, value);
        Ok(())
    }
}

// =============================================================================
// Biometric authenticator
// =============================================================================

/// Biometric authenticator replaying a fixed list of challenge outcomes.
///
/// Once the list is exhausted every further challenge fails.
pub struct ScriptedBiometric {
    hardware: Result<bool, String>,
    enrolled: bool,
    outcomes: Mutex<VecDeque<bool>>,
    challenges: AtomicU64,
    last_prompt: Mutex<Option<BiometricPrompt>>,
}

impl ScriptedBiometric {
    /// Device with the given capabilities answering challenges with `outcomes`.
    #[must_use]
    pub fn new(hardware: bool, enrolled: bool, outcomes: Vec<bool>) -> Self {
        Self {
            hardware: Ok(hardware),
            enrolled,
            outcomes: Mutex::new(outcomes.into()),
            challenges: AtomicU64::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Device without biometric hardware.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(false, false, Vec::new())
    }

    /// Device whose capability queries fail.
    #[must_use]
    pub fn failing_capability() -> Self {
        Self {
            hardware: Err("capability query failed".to_string()),
            ..Self::new(true, true, Vec::new())
        }
    }

    /// Number of challenges shown so far.
    #[must_use]
    pub fn challenges(&self) -> u64 {
        self.challenges.load(Ordering::SeqCst)
    }

    /// The prompt of the most recent challenge.
    #[must_use]
    pub fn last_prompt(&self) -> Option<BiometricPrompt> {
        locked(&self.last_prompt).clone()
    }
}

#[async_trait::async_trait]
impl BiometricAuthenticator for ScriptedBiometric {
    async fn has_hardware(&self) -> PassKeeperResult<bool> {
        self.hardware
            .clone()
            .map_err(|error| PassKeeperError::Unexpected { error })
    }

    async fn is_enrolled(&self) -> PassKeeperResult<bool> {
        Ok(self.enrolled)
    }

    async fn authenticate(&self, prompt: BiometricPrompt) -> PassKeeperResult<bool> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        *locked(&self.last_prompt) = Some(prompt);
        Ok(locked(&self.outcomes).pop_front().unwrap_or(false))
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
