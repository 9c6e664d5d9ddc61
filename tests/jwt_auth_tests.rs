// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that tokens in the shape the auth service issues can be
//! decoded by the auth middleware, catching compatibility issues early.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use vacancy_tracker::middleware::auth::verify_token;

mod common;
use common::create_test_jwt;

const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

#[derive(Serialize)]
struct RawClaims<'a> {
    sub: &'a str,
    exp: i64,
}

fn sign(claims: &RawClaims<'_>, key: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .unwrap()
}

#[test]
fn test_jwt_roundtrip() {
    let token = create_test_jwt(98765432, KEY);

    let user = verify_token(&token, KEY).expect("token should verify");

    assert_eq!(user.user_id, 98765432);
    assert_eq!(user.token, token);
    assert!(user.expires_at > chrono::Utc::now());
}

#[test]
fn test_jwt_wrong_key_rejected() {
    let token = create_test_jwt(1, KEY);
    assert!(verify_token(&token, b"another_signing_key_32_bytes!!!!").is_none());
}

#[test]
fn test_jwt_expired_rejected() {
    let exp = chrono::Utc::now().timestamp() - 3600;
    let token = sign(&RawClaims { sub: "42", exp }, KEY);
    assert!(verify_token(&token, KEY).is_none());
}

#[test]
fn test_jwt_non_numeric_subject_rejected() {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = sign(&RawClaims { sub: "alice", exp }, KEY);
    assert!(verify_token(&token, KEY).is_none());
}

#[test]
fn test_jwt_without_iat_accepted() {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = sign(&RawClaims { sub: "-100200300", exp }, KEY);

    let user = verify_token(&token, KEY).unwrap();
    assert_eq!(user.user_id, -100200300);
    assert_eq!(user.expires_at.timestamp(), exp);
}
