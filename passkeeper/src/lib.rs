//! Foreign-language bindings for PassKeeper.
//!
//! This crate only re-exports [`passkeeper_core`] together with its `uniffi`
//! scaffolding so a single `cdylib`/`staticlib` can be shipped to the apps.

pub use passkeeper_core::*;

passkeeper_core::uniffi_reexport_scaffolding!();
