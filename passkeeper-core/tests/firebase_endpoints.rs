//! Firebase backends built from a config that skipped validation.

use std::sync::Arc;

use passkeeper_core::firebase::{FirebaseConfig, FirebaseIdentity};
use passkeeper_core::{IdentityProvider, PassKeeperError};

fn emulator_config() -> FirebaseConfig {
    FirebaseConfig {
        identity_endpoint: "http://127.0.0.1:9".to_string(),
        secure_token_endpoint: "http://127.0.0.1:9".to_string(),
        ..FirebaseConfig::new("key", "demo")
    }
}

fn assert_endpoint_rejected(err: &PassKeeperError) {
    assert!(
        matches!(err, PassKeeperError::Validation { field, .. } if field == "endpoint"),
        "expected an endpoint validation error, got {err:?}"
    );
}

#[tokio::test]
async fn test_plain_http_endpoint_is_an_error_not_a_panic() {
    let identity = Arc::new(FirebaseIdentity::new(emulator_config()));

    let err = identity
        .sign_in("mei@example.com".to_string(), "secret1".to_string())
        .await
        .unwrap_err();
    assert_endpoint_rejected(&err);

    let err = identity
        .send_password_reset_email("mei@example.com".to_string())
        .await
        .unwrap_err();
    assert_endpoint_rejected(&err);

    let err = identity.restore("refresh".to_string()).await.unwrap_err();
    assert_endpoint_rejected(&err);
    assert_eq!(identity.current_uid().await, None);
}
