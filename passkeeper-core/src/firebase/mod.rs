//! REST backends for Firebase Auth and Cloud Firestore.
//!
//! [`FirebaseIdentity`] implements [`crate::IdentityProvider`] and
//! [`FirestoreStore`] implements [`crate::DocumentStore`]. Errors keep the
//! codes the Firebase JS SDK reports (`auth/wrong-password`,
//! `permission-denied`, ...) so the app's message mapping works unchanged.

mod config;
pub use config::*;

mod firestore;
pub use firestore::FirestoreStore;

mod http;

mod identity;
pub use identity::FirebaseIdentity;
