//! `passkeeper-core` holds the client logic of the PassKeeper password manager.
//!
//! Persistence and authentication live in hosted services (Firebase Auth and
//! Cloud Firestore by default). This crate shapes records, orders them for
//! display, gates plaintext reveal behind the device biometric prompt and
//! forwards everything else to platform-provided collaborators:
//!
//! - [`IdentityProvider`]: account creation, sign-in, password reset
//! - [`DocumentStore`]: owner-filtered credential documents
//! - [`BiometricAuthenticator`]: on-device biometric challenge
//! - [`SettingsStore`]: persisted key-value settings (active locale)
//!
//! The [`firebase`] module ships REST implementations of the first two; the
//! other two are implemented by the host application.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod clock;
pub use clock::*;

mod context;
pub use context::*;

mod error;
pub use error::*;

pub mod firebase;

pub mod i18n;
pub use i18n::{Locale, Translator};

pub mod logger;

pub mod memory;

pub mod ordering;

mod record;
pub use record::*;

mod session;
pub use session::*;

mod settings;
pub use settings::*;

mod vault;
pub use vault::*;

mod visibility;
pub use visibility::*;

uniffi::setup_scaffolding!("passkeeper_core");
