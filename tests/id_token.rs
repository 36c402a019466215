//! Verify-and-refresh scenario (spec §8 scenario 5): an expired ID token
//! paired with a refresh token is exchanged for a fresh pair and
//! re-verified, with the decoded `uid` unchanged. The refresh-token
//! exchange is reached through the `FIREBASE_AUTH_EMULATOR_HOST` redirect
//! rather than a live call to Google.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::ops::Add;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use biscuit::jwa::SignatureAlgorithm;
use biscuit::jwk::RSAKeyParameters;
use biscuit::jws::{Header, RegisteredHeader, Secret};
use biscuit::{ClaimsSet, Empty, RegisteredClaims, SingleOrMultiple, StringOrUri, JWT};
use chrono::{Duration, Utc};
use serde_json::json;

use firebase_session_auth::id_token::verify_and_refresh_expired_id_token;
use firebase_session_auth::identity::IdentityClient;
use firebase_session_auth::jwt::{IdTokenClaims, VerifyOptions};
use firebase_session_auth::ErrorCode;

const TEST_KID: &str = "test-kid-1";
const TEST_PROJECT: &str = "demo-project";

const TEST_KEY_PKCS8_DER_BASE64: &str = "MIIEvAIBADANBgkqhkiG9w0BAQEFAASCBKYwggSiAgEAAoIBAQCNo7P9Kkkg5Pd9/WqvjeUXYBvBFKSBaWGmAaIVSEiqMkgdFF/z9IaOuQUfps+ImngNAT1jnFVTdqwatjrkFPm9laB7EQ8iSpMLDz1ScvOl1fxPdaInQzGhGMyHOL3ylNHDsYYkFGottCiz8n4Ga+4E609o9rj/KGrfxk/Y8akjMT3bGyEm6u9lyOfXFgTrosO+naMjlJpGZ/4Jcd3ZPY7HuSlpaIe3P/nlYyvIL1gpwSCFBeJO1WrJi9U/YKZbM+PlV4hLY3KCChk4/ZYMvokwEE6m/rKZaJE/PmV5o3EMfGCd1fYkvJpe8bkksBjmqiJkZ4c5SDaEQ7AhndZ1FpybAgMBAAECggEAJPYJLBFyz+CwLPKKepFerQDpfTMz0ol7b+SRNViNjcxdQSll+LVgv7HMgnv3QEB+/3XJXUsYgRVAyB+xsn8+xJhdLoA/IMWxJXuulutkZWw30UxzKifAtbdQ+CB4gOsQ6i5TQOsK4i5XSM4I0QgtLp9xM4TetccITKjlgUlex83YWo+nGGuS4wOSfqPPmiqCBPw4dZiUJRoGXMP5uF5qBUBlKSc1eDUOjCfZX25fH74eFpAKvfWdgzb2drwK279uDk1iLPPjsNc3ucbSFNQs0XheegbHCnZRrWhbQz259KIbgzn2Dk97DAP1auvAQExQENM9TXZdkrhykW2wSDWqYQKBgQDDQDOFhSJYqpRfjjLoZtxlHuli//eryQrWm/4cNwDDOyNT8cFzF20soGtToon8C3aK9/8wsUw1WWqbNqoqLqiL+HxABx6aOuLml71XG6nHz1hztrMFdxZjopU0zJ/RL5/oU3pFN5zbC9lE7U1SBDJeyhi56Yh0pOzLronQHK3aIwKBgQC5tVcDL71XrEoJA9hzKN0PU1vKwUBG/cP4HRft4IGtOhmOEm07IiLBRqsuHCElLit7KlGMnKmUY5QiNTkcWHWFhltwlpFMAeSTw40/orMSqjLAaFu1BObJ1SdHb0wOenQ5OJU2eceelHcRDGhEl/k9lUnj53ravBJ299HOZIjvKQKBgCx99r+YROlbhY/4wVUAC3znfFtY5ME6gMPCrDcVuZDDaxt33ZMyZWhj7dETGspaelrUhEw+OpV1mLthy4jtNO8gYn/cn3aZsJbHQRgWb6vebdOAcG7wYiO2KrXrYweyCIhSbWxUbePkYVA5mwLzfd7nwpaqxrN92Y/YaAMKZfttAoGAFLbDY9mZVwQiperF4+J09daocG8pykFX8H7eQmw+SqImY5Bump/uHHzTbys4DzudIfnQasy2pZSN21rwadb8FM6tuFszDbVQV6MCSEzPiI9vZcK+J+zKCU07Ol6RrzO9bvx+uDrRJ0EMHtyxbKU+6b2TJlaVf3xm2to9jrXsCDECgYBqROOMHaNoQZGPm3cEmLaHi+r7TXSWijhZ7p/0+ZkVWVljaCTqQG0OHDh75NAIZJEGmtRBCa85/kzUl6agfLrW1nMIELSKAS2XLDHPvX2cFIOnisNgYo4wPmZo8hqrQAEpy0Kz3t9lchSkIGUeOvGUJvrqfn9zKgDhqekbhei/Aw==";

const TEST_KEY_N: &str = "jaOz_SpJIOT3ff1qr43lF2AbwRSkgWlhpgGiFUhIqjJIHRRf8_SGjrkFH6bPiJp4DQE9Y5xVU3asGrY65BT5vZWgexEPIkqTCw89UnLzpdX8T3WiJ0MxoRjMhzi98pTRw7GGJBRqLbQos_J-BmvuBOtPaPa4_yhq38ZP2PGpIzE92xshJurvZcjn1xYE66LDvp2jI5SaRmf-CXHd2T2Ox7kpaWiHtz_55WMryC9YKcEghQXiTtVqyYvVP2CmWzPj5VeIS2NyggoZOP2WDL6JMBBOpv6ymWiRPz5leaNxDHxgndX2JLyaXvG5JLAY5qoiZGeHOUg2hEOwIZ3WdRacmw";

fn test_key_pair() -> Arc<ring::signature::RsaKeyPair> {
    let der = STANDARD.decode(TEST_KEY_PKCS8_DER_BASE64).expect("valid base64 test key");
    Arc::new(ring::signature::RsaKeyPair::from_pkcs8(&der).expect("valid PKCS8 RSA key"))
}

fn test_resolver() -> HashMap<String, RSAKeyParameters> {
    let params: RSAKeyParameters = serde_json::from_value(json!({"kty": "RSA", "n": TEST_KEY_N, "e": "AQAB"})).expect("valid JWK fixture");
    let mut resolver = HashMap::new();
    resolver.insert(TEST_KID.to_string(), params);
    resolver
}

fn verify_options() -> VerifyOptions {
    VerifyOptions::new(TEST_PROJECT, "https://securetoken.google.com/demo-project")
}

fn sign_id_token(subject: &str, auth_time: i64, issued: chrono::DateTime<Utc>, expiry: chrono::DateTime<Utc>) -> String {
    let header: Header<Empty> = Header::from(RegisteredHeader {
        algorithm: SignatureAlgorithm::RS256,
        key_id: Some(TEST_KID.to_string()),
        ..Default::default()
    });
    let claims = ClaimsSet::<IdTokenClaims> {
        registered: RegisteredClaims {
            issuer: Some(StringOrUri::from_str("https://securetoken.google.com/demo-project").unwrap()),
            subject: Some(StringOrUri::from_str(subject).unwrap()),
            audience: Some(SingleOrMultiple::Single(StringOrUri::from_str(TEST_PROJECT).unwrap())),
            issued_at: Some(biscuit::Timestamp::from(issued)),
            expiry: Some(biscuit::Timestamp::from(expiry)),
            ..Default::default()
        },
        private: IdTokenClaims { auth_time, ..Default::default() },
    };
    let jwt: JWT<IdTokenClaims, Empty> = JWT::new_decoded(header, claims);
    let secret = Secret::RsaKeyPair(test_key_pair());
    jwt.encode(&secret).unwrap().encoded().unwrap().encode()
}

fn spawn_refresh_exchange_server(fresh_id_token: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind an ephemeral port");
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let body = format!(r#"{{"id_token":"{}","refresh_token":"new-refresh-token"}}"#, fresh_id_token);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    addr.to_string()
}

#[tokio::test]
async fn an_expired_token_is_refreshed_and_the_new_token_decodes_the_same_uid() {
    let now = Utc::now();
    let expired = sign_id_token("uid-1", now.timestamp() - 7200, now - Duration::hours(2), now - Duration::hours(1));
    let fresh = sign_id_token("uid-1", now.timestamp(), now, now.add(Duration::hours(1)));

    let emulator_host = spawn_refresh_exchange_server(fresh);
    std::env::set_var("FIREBASE_AUTH_EMULATOR_HOST", &emulator_host);

    let identity = IdentityClient::new(TEST_PROJECT, "fake-api-key", reqwest::Client::new());
    let resolver = test_resolver();
    let options = verify_options();

    let tokens = verify_and_refresh_expired_id_token(&expired, "old-refresh-token", &resolver, &options, &identity)
        .await
        .expect("expired token refreshes successfully");

    assert_eq!(tokens.decoded.uid, "uid-1");
    assert_eq!(tokens.refresh_token, "new-refresh-token");

    std::env::remove_var("FIREBASE_AUTH_EMULATOR_HOST");
}

#[tokio::test]
async fn a_non_expiry_verification_error_is_not_retried_against_the_refresh_endpoint() {
    // No server is spawned: if the refresh path were mistakenly taken,
    // the connection would fail and this would surface as a network
    // error instead of the expected NoMatchingKid.
    let now = Utc::now();
    let header: Header<Empty> = Header::from(RegisteredHeader {
        algorithm: SignatureAlgorithm::RS256,
        key_id: Some("unknown-kid".to_string()),
        ..Default::default()
    });
    let claims = ClaimsSet::<IdTokenClaims> {
        registered: RegisteredClaims {
            issuer: Some(StringOrUri::from_str("https://securetoken.google.com/demo-project").unwrap()),
            subject: Some(StringOrUri::from_str("uid-1").unwrap()),
            audience: Some(SingleOrMultiple::Single(StringOrUri::from_str(TEST_PROJECT).unwrap())),
            issued_at: Some(biscuit::Timestamp::from(now)),
            expiry: Some(biscuit::Timestamp::from(now.add(Duration::hours(1)))),
            ..Default::default()
        },
        private: IdTokenClaims::default(),
    };
    let jwt: JWT<IdTokenClaims, Empty> = JWT::new_decoded(header, claims);
    let token = jwt.encode(&Secret::RsaKeyPair(test_key_pair())).unwrap().encoded().unwrap().encode();

    let identity = IdentityClient::new(TEST_PROJECT, "fake-api-key", reqwest::Client::new());
    let resolver = test_resolver();
    let options = verify_options();

    let err = verify_and_refresh_expired_id_token(&token, "refresh-token", &resolver, &options, &identity)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::NoMatchingKid);
}
