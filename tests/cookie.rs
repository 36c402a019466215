//! Session cookie sign/verify/rotation properties (spec §8's cookie
//! invariants), exercised as integration tests against the public
//! `cookie` and `credentials` modules.

use firebase_session_auth::credentials::SigningKeyList;
use firebase_session_auth::cookie::{self, CookiePayload};
use firebase_session_auth::ErrorCode;

fn payload() -> CookiePayload {
    CookiePayload {
        id_token: "id-token-value".to_string(),
        refresh_token: "refresh-token-value".to_string(),
        custom_token: None,
    }
}

#[test]
fn signed_cookie_round_trips_under_the_same_key() {
    let keys = SigningKeyList::new(vec!["key-a".into()]).unwrap();
    let value = cookie::sign(&payload(), &keys).unwrap();
    let verified = cookie::verify(&value, &keys).unwrap();
    assert_eq!(verified.id_token, "id-token-value");
    assert_eq!(verified.refresh_token, "refresh-token-value");
    assert!(verified.custom_token.is_none());
}

#[test]
fn rotated_key_list_still_verifies_a_cookie_signed_under_the_old_head() {
    let mut signing_keys = SigningKeyList::new(vec!["key-a".into()]).unwrap();
    let value = cookie::sign(&payload(), &signing_keys).unwrap();

    signing_keys.rotate("key-b".into());
    assert_eq!(signing_keys.signing_key(), "key-b");

    let verified = cookie::verify(&value, &signing_keys).unwrap();
    assert_eq!(verified.id_token, "id-token-value");
}

#[test]
fn a_cookie_signed_under_an_unknown_key_is_rejected() {
    let signing_keys = SigningKeyList::new(vec!["key-a".into()]).unwrap();
    let value = cookie::sign(&payload(), &signing_keys).unwrap();

    let other_keys = SigningKeyList::new(vec!["key-z".into()]).unwrap();
    let err = cookie::verify(&value, &other_keys).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidCredential);
}

#[test]
fn a_cookie_dropped_from_the_acceptance_window_after_rotation_is_rejected() {
    let mut signing_keys = SigningKeyList::new(vec!["key-a".into()]).unwrap();
    let value = cookie::sign(&payload(), &signing_keys).unwrap();

    signing_keys.rotate("key-b".into());
    let pruned = SigningKeyList::new(vec!["key-b".into()]).unwrap();
    let _ = signing_keys;

    let err = cookie::verify(&value, &pruned).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidCredential);
}

#[test]
fn a_malformed_cookie_value_is_rejected_without_panicking() {
    let signing_keys = SigningKeyList::new(vec!["key-a".into()]).unwrap();
    assert!(cookie::verify("not-a-valid-cookie", &signing_keys).is_err());
    assert!(cookie::verify("", &signing_keys).is_err());
}
