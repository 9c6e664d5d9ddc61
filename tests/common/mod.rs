// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use vacancy_tracker::config::Config;
use vacancy_tracker::db::{FirestoreDb, MemoryDb};
use vacancy_tracker::error::AppError;
use vacancy_tracker::models::{SearchQuery, SubscriptionStatus, UserProfile};
use vacancy_tracker::routes::create_router;
use vacancy_tracker::services::auth_client::IssuedToken;
use vacancy_tracker::services::search::RawListing;
use vacancy_tracker::services::{AuthApi, Messenger, VacancySearch};
use vacancy_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fake Auth Service ───────────────────────────────────────────

/// Scriptable stand-in for the auth service.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeAuth {
    pub invalid: AtomicBool,
    pub validate_fails: AtomicBool,
    pub refresh_fails: AtomicBool,
    /// Refresh sleeps this long (ms) before answering
    pub refresh_delay_ms: AtomicUsize,
    /// Lifetime (s) of refreshed tokens; 0 means one hour
    pub refresh_lifetime_secs: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub issue_calls: AtomicUsize,
    /// Users for whom token issue fails
    pub issue_refused: Mutex<HashSet<i64>>,
    /// Telegram ID reported by the profile lookup
    pub profile_user: Mutex<Option<i64>>,
}

#[allow(dead_code)]
impl FakeAuth {
    pub fn refuse_issue(&self, user_id: i64) {
        self.issue_refused.lock().unwrap().insert(user_id);
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn issue_token(&self, user_id: i64) -> Result<IssuedToken, AppError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        if self.issue_refused.lock().unwrap().contains(&user_id) {
            return Err(AppError::AuthUnavailable("issue refused".to_string()));
        }
        Ok(IssuedToken {
            token: format!("issued-{}", user_id),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn validate(&self, _token: &str) -> Result<bool, AppError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.validate_fails.load(Ordering::SeqCst) {
            return Err(AppError::AuthUnavailable("validate down".to_string()));
        }
        Ok(!self.invalid.load(Ordering::SeqCst))
    }

    async fn refresh(&self, _token: &str) -> Result<IssuedToken, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.refresh_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(AppError::AuthUnavailable("refresh rejected".to_string()));
        }
        let lifetime = match self.refresh_lifetime_secs.load(Ordering::SeqCst) {
            0 => Duration::hours(1),
            secs => Duration::seconds(secs as i64),
        };
        Ok(IssuedToken {
            token: format!("refreshed-{}", n),
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn profile(&self, _token: &str) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            telegram_id: *self.profile_user.lock().unwrap(),
            first_name: Some("Test".to_string()),
            ..Default::default()
        })
    }

    async fn subscription_status(&self, _token: &str) -> Result<SubscriptionStatus, AppError> {
        Ok(SubscriptionStatus {
            active: true,
            days_remaining: 12,
            ..Default::default()
        })
    }
}

// ─── Fake Job Board ──────────────────────────────────────────────

/// Returns the same canned listings for every query, except queries
/// scripted to fail or panic.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeSearch {
    pub results: Mutex<Vec<RawListing>>,
    pub failing_queries: Mutex<HashSet<String>>,
    pub panicking_queries: Mutex<HashSet<String>>,
    pub delay_ms: AtomicUsize,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<SearchQuery>>,
}

#[allow(dead_code)]
impl FakeSearch {
    pub fn set_results(&self, results: Vec<RawListing>) {
        *self.results.lock().unwrap() = results;
    }

    pub fn fail_query(&self, text: &str) {
        self.failing_queries.lock().unwrap().insert(text.to_string());
    }

    pub fn panic_on_query(&self, text: &str) {
        self.panicking_queries
            .lock()
            .unwrap()
            .insert(text.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VacancySearch for FakeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        if self.panicking_queries.lock().unwrap().contains(&query.text) {
            panic!("search blew up for {}", query.text);
        }
        if self.failing_queries.lock().unwrap().contains(&query.text) {
            return Err(AppError::UpstreamSearch("HTTP 503".to_string()));
        }
        Ok(self.results.lock().unwrap().clone())
    }
}

/// Raw job-board item with the given ID and publication time.
#[allow(dead_code)]
pub fn raw_listing(id: &str, published_at: &str) -> RawListing {
    RawListing {
        id: Some(id.to_string()),
        name: Some(format!("Rust developer {}", id)),
        published_at: Some(published_at.to_string()),
        alternate_url: Some(format!("https://hh.ru/vacancy/{}", id)),
        ..Default::default()
    }
}

// ─── Fake Messenger ──────────────────────────────────────────────

/// Records outbound messages; can be scripted to fail a given attempt.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeMessenger {
    pub sent: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    /// 1-based attempt number that fails
    pub fail_on_attempt: Mutex<Option<usize>>,
    pub fail_all: AtomicBool,
}

#[allow(dead_code)]
impl FakeMessenger {
    pub fn fail_on(&self, attempt: usize) {
        *self.fail_on_attempt.lock().unwrap() = Some(attempt);
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send(&self, _token: &str, text: &str) -> Result<(), AppError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_all.load(Ordering::SeqCst)
            || *self.fail_on_attempt.lock().unwrap() == Some(attempt)
        {
            return Err(AppError::Messaging("HTTP 502".to_string()));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ─── Test App ────────────────────────────────────────────────────

/// Router plus handles to every fake behind it.
#[allow(dead_code)]
pub struct TestApp {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub auth: Arc<FakeAuth>,
    pub search: Arc<FakeSearch>,
    pub messenger: Arc<FakeMessenger>,
}

/// Create a test app with in-memory storage and fake collaborators.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let auth = Arc::new(FakeAuth::default());
    let search = Arc::new(FakeSearch::default());
    let messenger = Arc::new(FakeMessenger::default());

    let state = Arc::new(AppState::new(
        config,
        db.clone(),
        auth.clone(),
        search.clone(),
        messenger.clone(),
    ));

    TestApp {
        app: create_router(state.clone()),
        state,
        db,
        auth,
        search,
        messenger,
    }
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: i64, signing_key: &[u8]) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

// ─── Request Helpers ─────────────────────────────────────────────

/// Send a request and decode the JSON body (`Null` when empty).
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[allow(dead_code)]
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, None)
}

#[allow(dead_code)]
pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    request("DELETE", uri, token, None)
}

#[allow(dead_code)]
pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    request("POST", uri, token, Some(body))
}

#[allow(dead_code)]
pub fn put_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    request("PUT", uri, token, Some(body))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
