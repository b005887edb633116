//! End-to-end flows through the credential vault and the reveal gate.

mod common;

use common::{gate, Harness};
use passkeeper_core::{
    CredentialPatch, CredentialRecord, Locale, NewCredential, PassKeeperError, RevealState,
};

#[tokio::test]
async fn test_pinning_two_of_three_orders_them_first() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;

    let first = harness.add_at(&owner, "one", 1_000).await;
    let second = harness.add_at(&owner, "two", 2_000).await;
    let third = harness.add_at(&owner, "three", 3_000).await;
    assert_eq!(
        harness.listed_ids(&owner).await,
        [third.clone(), second.clone(), first.clone()]
    );

    harness.clock.set(4_000);
    harness.vault.toggle_pin(third.clone(), false).await.unwrap();
    harness.clock.set(5_000);
    harness.vault.toggle_pin(second.clone(), false).await.unwrap();

    assert_eq!(harness.listed_ids(&owner).await, [second, third, first]);
}

#[tokio::test]
async fn test_toggle_stamps_pin_and_update_time() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;
    let id = harness.add_at(&owner, "mail", 1_000).await;

    harness.clock.set(7_777);
    harness.vault.toggle_pin(id.clone(), false).await.unwrap();

    let record = harness.store.get(&id).unwrap();
    assert!(record.is_pinned);
    assert_eq!(record.pinned_at, Some(7_777));
    assert_eq!(record.updated_at, 7_777);
    assert_eq!(record.created_at, 1_000);
}

#[tokio::test]
async fn test_empty_account_is_rejected_before_the_store() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;

    let err = harness
        .vault
        .add(
            owner,
            NewCredential {
                purpose: "mail".to_string(),
                account: String::new(),
                secret: "pw".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PassKeeperError::Validation { field, .. } if field == "account"));
    assert_eq!(harness.store.calls(), 0);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_records_are_scoped_to_their_owner() {
    let harness = Harness::new().await;
    let mei = harness.signed_up("mei@example.com").await;
    let ken = harness.signed_up("ken@example.com").await;
    let meis = harness.add_at(&mei, "mail", 1_000).await;
    let kens = harness.add_at(&ken, "bank", 2_000).await;

    assert_eq!(harness.listed_ids(&mei).await, [meis]);
    assert_eq!(harness.listed_ids(&ken).await, [kens]);
    assert!(harness.listed_ids("nobody").await.is_empty());
}

#[tokio::test]
async fn test_inconsistent_pin_data_is_still_listed() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;
    let pinned = harness.add_at(&owner, "mail", 1_000).await;
    harness.clock.set(2_000);
    harness.vault.toggle_pin(pinned.clone(), false).await.unwrap();

    harness.store.insert(CredentialRecord {
        id: "legacy".to_string(),
        owner_id: owner.clone(),
        purpose: "old".to_string(),
        account: "old@example.com".to_string(),
        secret: "old".to_string(),
        is_pinned: true,
        pinned_at: None,
        created_at: 500,
        updated_at: 500,
    });

    assert_eq!(
        harness.listed_ids(&owner).await,
        [pinned, "legacy".to_string()]
    );
}

#[tokio::test]
async fn test_edit_then_failure_then_recovery() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;
    let id = harness.add_at(&owner, "mail", 1_000).await;

    harness.clock.set(3_000);
    harness
        .vault
        .update(
            id.clone(),
            CredentialPatch {
                account: Some("new@example.com".to_string()),
                ..CredentialPatch::default()
            },
        )
        .await
        .unwrap();
    let record = harness.store.get(&id).unwrap();
    assert_eq!(record.account, "new@example.com");
    assert_eq!(record.secret, "mail-secret");
    assert_eq!(record.updated_at, 3_000);

    harness.store.fail_next("permission-denied");
    let err = harness.vault.delete(id.clone()).await.unwrap_err();
    assert!(matches!(err, PassKeeperError::Store { code, .. } if code == "permission-denied"));
    assert!(harness.store.get(&id).is_some());

    harness.vault.delete(id.clone()).await.unwrap();
    assert!(harness.listed_ids(&owner).await.is_empty());
}

#[tokio::test]
async fn test_reveal_flow_over_a_listed_record() {
    let harness = Harness::new().await;
    let owner = harness.signed_up("mei@example.com").await;
    let id = harness.add_at(&owner, "mail", 1_000).await;
    let (gate, biometric) = gate(vec![false, true]);

    let records = harness.vault.list(owner.clone()).await.unwrap();
    assert_eq!(gate.state(&records[0].id), RevealState::Hidden);

    let err = gate.reveal(id.clone(), Locale::Ja).await.unwrap_err();
    assert!(matches!(err, PassKeeperError::BiometricDenied));
    assert_eq!(
        harness.context.t("biometric.failed"),
        "身份验证失败，无法查看密码"
    );

    gate.reveal(id.clone(), harness.context.locale()).await.unwrap();
    assert!(gate.is_revealed(&id));
    assert_eq!(biometric.challenges(), 2);

    // The host resets the gate whenever it reloads the list.
    harness.vault.list(owner).await.unwrap();
    gate.reset();
    assert_eq!(gate.state(&id), RevealState::Hidden);
}
