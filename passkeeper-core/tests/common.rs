#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};

use passkeeper_core::memory::{
    InMemoryDocumentStore, InMemoryIdentityProvider, ManualClock, MemorySettingsStore,
    ScriptedBiometric,
};
use passkeeper_core::{
    AppContext, AuthStateListener, AuthUser, CredentialVault, NewCredential, SessionManager,
    VisibilityGate,
};

/// Listener recording every transition it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Option<String>>>,
}

impl RecordingListener {
    /// Uids seen so far; `None` for sign-outs.
    pub fn events(&self) -> Vec<Option<String>> {
        self.events.lock().unwrap().clone()
    }
}

impl AuthStateListener for RecordingListener {
    fn on_auth_state_changed(&self, user: Option<AuthUser>) {
        self.events.lock().unwrap().push(user.map(|user| user.uid));
    }
}

/// Everything an app screen talks to, wired to in-memory backends.
pub struct Harness {
    pub provider: Arc<InMemoryIdentityProvider>,
    pub store: Arc<InMemoryDocumentStore>,
    pub settings: Arc<MemorySettingsStore>,
    pub clock: Arc<ManualClock>,
    pub context: AppContext,
    pub vault: CredentialVault,
}

impl Harness {
    pub async fn new() -> Self {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let session = Arc::new(SessionManager::new(provider.clone()));
        let context = AppContext::load(settings.clone(), session).await;
        let vault = CredentialVault::with_clock(store.clone(), clock.clone());
        Self {
            provider,
            store,
            settings,
            clock,
            context,
            vault,
        }
    }

    /// Registers `email` with a fixed password and returns its uid.
    pub async fn signed_up(&self, email: &str) -> String {
        self.context
            .session()
            .register(email.to_string(), "secret1".to_string(), "Mei".to_string())
            .await
            .unwrap()
            .uid
    }

    /// Adds a credential labelled `purpose` at time `at`.
    pub async fn add_at(&self, owner: &str, purpose: &str, at: u64) -> String {
        self.clock.set(at);
        self.vault
            .add(
                owner.to_string(),
                NewCredential {
                    purpose: purpose.to_string(),
                    account: format!("{purpose}@example.com"),
                    secret: format!("{purpose}-secret"),
                },
            )
            .await
            .unwrap()
    }

    /// Ids of `owner`'s records in display order.
    pub async fn listed_ids(&self, owner: &str) -> Vec<String> {
        self.vault
            .list(owner.to_string())
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect()
    }
}

pub fn gate(outcomes: Vec<bool>) -> (VisibilityGate, Arc<ScriptedBiometric>) {
    let biometric = Arc::new(ScriptedBiometric::new(true, true, outcomes));
    (VisibilityGate::new(biometric.clone()), biometric)
}
