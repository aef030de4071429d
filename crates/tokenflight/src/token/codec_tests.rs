// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use proptest::prelude::*;

use super::*;
use crate::test_support::encode_token;
use crate::token::{status_of, TokenStatus, REFRESH_THRESHOLD_SECS};

fn token_with_payload(payload: &str) -> String {
    format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}

#[test]
fn decodes_full_claim_set() -> anyhow::Result<()> {
    let token = token_with_payload(concat!(
        r#"{"userId":42,"name":"Mina","role":"admin","termsAccepted":true,"#,
        r#""iat":1700000000,"exp":1700003600}"#,
    ));
    let claims = decode(&token)?;
    assert_eq!(claims.subject_id, 42);
    assert_eq!(claims.display_name, "Mina");
    assert_eq!(claims.role, "admin");
    assert!(claims.terms_accepted);
    assert_eq!(claims.issued_at, Some(1_700_000_000));
    assert_eq!(claims.expires_at, Some(1_700_003_600));
    Ok(())
}

#[test]
fn missing_fields_take_defaults() -> anyhow::Result<()> {
    let claims = decode(&token_with_payload(r#"{"userId":5}"#))?;
    assert_eq!(claims.subject_id, 5);
    assert_eq!(claims.expires_at, None);
    assert!(!claims.terms_accepted);
    Ok(())
}

#[test]
fn accepts_url_safe_characters() -> anyhow::Result<()> {
    // "?>?" encodes to "Pz4_" in base64url and "Pz4/" in standard base64.
    let token = token_with_payload(r#"{"name":"?>?","exp":10}"#);
    assert!(token.contains('_'));
    let claims = decode(&token)?;
    assert_eq!(claims.display_name, "?>?");
    Ok(())
}

#[test]
fn accepts_padded_payload() -> anyhow::Result<()> {
    let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"userId":12}"#);
    assert!(payload.ends_with("=="));
    let claims = decode(&format!("h.{payload}.s"))?;
    assert_eq!(claims.subject_id, 12);
    Ok(())
}

#[yare::parameterized(
    empty           = { "" },
    one_segment     = { "abc" },
    two_segments    = { "abc.def" },
    four_segments   = { "a.b.c.d" },
    empty_payload   = { "a..c" },
    empty_header    = { ".b.c" },
    empty_signature = { "a.b." },
)]
fn rejects_malformed_shape(token: &str) {
    assert_eq!(decode(token), Err(DecodeError::MalformedToken));
}

#[test]
fn rejects_invalid_base64() {
    assert!(matches!(decode("a.!!!!.c"), Err(DecodeError::Base64(_))));
}

#[test]
fn rejects_non_json_payload() {
    let token = token_with_payload("not json");
    assert!(matches!(decode(&token), Err(DecodeError::Json(_))));
}

#[test]
fn null_or_mistyped_claims_take_defaults() -> anyhow::Result<()> {
    let token = token_with_payload(concat!(
        r#"{"userId":"forty-two","name":null,"role":7,"termsAccepted":"yes","#,
        r#""iat":"soon","exp":4000000000}"#,
    ));
    let claims = decode(&token)?;
    assert_eq!(claims.subject_id, 0);
    assert_eq!(claims.display_name, "");
    assert_eq!(claims.role, "");
    assert!(!claims.terms_accepted);
    assert_eq!(claims.issued_at, None);
    assert_eq!(claims.expires_at, Some(4_000_000_000));
    let status = status_of(Some(&token), 1_700_000_000, REFRESH_THRESHOLD_SECS);
    assert_eq!(status, TokenStatus::Valid);
    Ok(())
}

#[test]
fn rejects_wrongly_typed_expiry() {
    let token = token_with_payload(r#"{"userId":42,"exp":"tomorrow"}"#);
    crate::assert_err_contains!(decode(&token), "invalid claims json");
}

proptest! {
    #[test]
    fn decode_inverts_encode(
        subject_id in any::<i64>(),
        display_name in "\\PC{0,24}",
        role in "[a-z]{0,12}",
        terms_accepted in any::<bool>(),
        issued_at in proptest::option::of(0i64..4_000_000_000),
        expires_at in proptest::option::of(0i64..4_000_000_000),
    ) {
        let claims = TokenClaims {
            subject_id,
            display_name,
            role,
            terms_accepted,
            issued_at,
            expires_at,
        };
        prop_assert_eq!(decode(&encode_token(&claims)), Ok(claims));
    }

    #[test]
    fn decode_never_panics(input in "\\PC{0,64}") {
        let _ = decode(&input);
    }
}
