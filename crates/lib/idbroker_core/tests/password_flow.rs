//! Email/password signup, login and reset against the in-memory directory.

mod common;

use common::harness;
use idbroker_core::IdentityError;
use idbroker_core::hashing::hash_reset_token;

#[tokio::test]
async fn signup_login_profile_scenario() {
    let h = harness();

    let signed_up = h
        .broker
        .signup("Ann", "ann@test.com", "correct horse")
        .await
        .unwrap();
    let logged_in = h
        .broker
        .login("ann@test.com", Some("correct horse"), None)
        .await
        .unwrap();
    assert_eq!(signed_up.id, logged_in.id);
    assert_eq!(logged_in.expires_in, None);

    let profile = h.broker.get_profile(&logged_in.id).await.unwrap();
    assert_eq!(profile.id, logged_in.id);
    assert_eq!(profile.name, "Ann");
    assert_eq!(profile.display_name, "Ann");
    assert_eq!(profile.email.as_deref(), Some("ann@test.com"));
    assert_eq!(profile.provider, None);
    assert!(profile.password);
    assert!(profile.linked.is_empty());
}

#[tokio::test]
async fn signup_rejects_an_existing_email() {
    let h = harness();
    h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap();

    let err = h
        .broker
        .signup("Other Ann", "ann@test.com", "pw2")
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Conflict(_)));
    assert_eq!(h.directory.active_identities().await, 1);

    // the original password still works
    assert!(h.broker.login("ann@test.com", Some("pw"), None).await.is_ok());
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let h = harness();
    h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap();

    let wrong = h
        .broker
        .login("ann@test.com", Some("nope"), None)
        .await
        .unwrap_err();
    assert!(matches!(wrong, IdentityError::Unauthorized(_)));
    assert_eq!(wrong.status().as_u16(), 401);

    let unknown = h
        .broker
        .login("bob@test.com", Some("pw"), None)
        .await
        .unwrap_err();
    assert!(matches!(unknown, IdentityError::NotFound(_)));

    let neither = h.broker.login("ann@test.com", None, None).await.unwrap_err();
    assert!(matches!(neither, IdentityError::Validation(_)));

    let both = h
        .broker
        .login("ann@test.com", Some("pw"), Some("reset"))
        .await
        .unwrap_err();
    assert!(matches!(both, IdentityError::Validation(_)));
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let h = harness();
    let id = h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap().id;

    let reset = h.broker.forgot_password("ann@test.com").await.unwrap();
    assert_eq!(reset.len(), 32);

    let stored = h.broker.records().get_records(&id, &["reset"]).await.unwrap();
    assert_eq!(stored.get("reset"), Some(&hash_reset_token(&reset)));

    h.broker
        .login("ann@test.com", None, Some(&reset))
        .await
        .unwrap();
    let again = h
        .broker
        .login("ann@test.com", None, Some(&reset))
        .await
        .unwrap_err();
    assert!(matches!(again, IdentityError::Unauthorized(_)));
}

#[tokio::test]
async fn wrong_reset_token_is_rejected_and_kept() {
    let h = harness();
    h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap();
    let reset = h.broker.forgot_password("ann@test.com").await.unwrap();

    let err = h
        .broker
        .login("ann@test.com", None, Some("not-the-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));
    assert!(h.broker.login("ann@test.com", None, Some(&reset)).await.is_ok());
}

#[tokio::test]
async fn forgot_password_mails_the_reset_link() {
    let h = harness();
    h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap();
    let reset = h.broker.forgot_password("ann@test.com").await.unwrap();

    let sent = h.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ann@test.com");
    assert!(sent[0].text.contains(&format!("/reset/ann@test.com/{reset}")));

    let err = h.broker.forgot_password("bob@test.com").await.unwrap_err();
    assert!(matches!(err, IdentityError::NotFound(_)));
    assert_eq!(h.mail.sent().len(), 1);
}

#[tokio::test]
async fn update_password_replaces_the_old_one() {
    let h = harness();
    let id = h.broker.signup("Ann", "ann@test.com", "old").await.unwrap().id;

    h.broker.update_password(&id, "new").await.unwrap();
    assert!(h.broker.login("ann@test.com", Some("new"), None).await.is_ok());
    assert!(h.broker.login("ann@test.com", Some("old"), None).await.is_err());
}

#[tokio::test]
async fn login_points_at_the_email() {
    let h = harness();
    let id = h.broker.signup("Ann", "ann@test.com", "pw").await.unwrap().id;

    let current = h.broker.current_login(&id).await.unwrap();
    assert_eq!(current.provider, None);
    assert_eq!(current.token.as_deref(), Some("ann@test.com"));
}
