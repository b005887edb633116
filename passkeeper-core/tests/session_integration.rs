//! End-to-end flows through the session facade and the app context.

mod common;

use std::sync::Arc;

use common::{Harness, RecordingListener};
use passkeeper_core::{
    auth_error_message, AuthScreen, Locale, PassKeeperError, LANGUAGE_SETTING_KEY,
    SettingsStore,
};

fn auth_code(err: PassKeeperError) -> String {
    match err {
        PassKeeperError::Auth { code } => code,
        other => panic!("expected an auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_notifies_once_and_sets_display_name() {
    let harness = Harness::new().await;
    let session = harness.context.session();
    let listener = Arc::new(RecordingListener::default());
    let _subscription = session.on_auth_state_change(listener.clone());

    let user = session
        .register(
            "mei@example.com".to_string(),
            "secret1".to_string(),
            "Mei".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(user.display_name.as_deref(), Some("Mei"));
    assert_eq!(session.current_user(), Some(user.clone()));
    assert_eq!(listener.events(), [Some(user.uid)]);
}

#[tokio::test]
async fn test_login_errors_map_to_localized_messages() {
    let harness = Harness::new().await;
    harness.signed_up("mei@example.com").await;
    let session = harness.context.session();
    session.logout().await.unwrap();

    let err = session
        .login("mei@example.com".to_string(), "wrong!".to_string())
        .await
        .unwrap_err();
    let code = auth_code(err);
    assert_eq!(
        auth_error_message(&code, AuthScreen::Login, harness.context.locale()),
        "密码错误"
    );
    assert_eq!(session.current_user(), None);

    let err = session
        .register(
            "mei@example.com".to_string(),
            "secret1".to_string(),
            "Mei".to_string(),
        )
        .await
        .unwrap_err();
    let code = auth_code(err);
    assert_eq!(
        auth_error_message(&code, AuthScreen::Register, Locale::Ja),
        Locale::Ja.translate("register.emailInUse")
    );
}

#[tokio::test]
async fn test_empty_login_never_reaches_provider() {
    let harness = Harness::new().await;
    let err = harness
        .context
        .session()
        .login(String::new(), "secret1".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PassKeeperError::Validation { field, .. } if field == "email"));
}

#[tokio::test]
async fn test_refused_logout_keeps_session() {
    let harness = Harness::new().await;
    let uid = harness.signed_up("mei@example.com").await;
    let session = harness.context.session();
    let listener = Arc::new(RecordingListener::default());
    let _subscription = session.on_auth_state_change(listener.clone());

    harness.provider.refuse_sign_out();
    assert!(session.logout().await.is_err());
    assert_eq!(session.current_user().map(|user| user.uid), Some(uid));
    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn test_cancelled_subscription_stops_notifications() {
    let harness = Harness::new().await;
    let session = harness.context.session();
    let kept = Arc::new(RecordingListener::default());
    let cancelled = Arc::new(RecordingListener::default());
    let dropped = Arc::new(RecordingListener::default());
    let _kept_subscription = session.on_auth_state_change(kept.clone());
    let subscription = session.on_auth_state_change(cancelled.clone());
    drop(session.on_auth_state_change(dropped.clone()));

    subscription.cancel();
    subscription.cancel();
    let uid = harness.signed_up("mei@example.com").await;
    session.logout().await.unwrap();

    assert_eq!(kept.events(), [Some(uid), None]);
    assert!(cancelled.events().is_empty());
    assert!(dropped.events().is_empty());
}

#[tokio::test]
async fn test_password_reset_validates_before_sending() {
    let harness = Harness::new().await;
    harness.signed_up("mei@example.com").await;
    let session = harness.context.session();

    let err = session
        .request_password_reset("mei-at-example.com".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PassKeeperError::Validation { .. }));
    assert!(harness.provider.reset_emails().is_empty());

    let err = session
        .request_password_reset("ken@example.com".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PassKeeperError::Auth { code } if code == "auth/user-not-found"));

    session
        .request_password_reset("mei@example.com".to_string())
        .await
        .unwrap();
    assert_eq!(harness.provider.reset_emails(), ["mei@example.com"]);
}

#[tokio::test]
async fn test_language_switch_is_persisted() {
    let harness = Harness::new().await;
    assert_eq!(harness.context.locale(), Locale::Zh);
    assert_eq!(harness.context.t("home.title"), "密码管家");

    assert_eq!(harness.context.switch_locale().await.unwrap(), Locale::Ja);
    assert_eq!(
        harness
            .settings
            .get(LANGUAGE_SETTING_KEY.to_string())
            .await
            .unwrap()
            .as_deref(),
        Some("ja")
    );
    assert_eq!(harness.context.t("home.unknownKey"), "home.unknownKey");
}
