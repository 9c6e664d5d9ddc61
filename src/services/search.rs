// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! hh.ru vacancy search client and mapping of raw items into listings.

use crate::error::AppError;
use crate::models::{Listing, ListingStatus, SearchQuery};
use crate::time_utils::parse_upstream_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// hh.ru caps a page at 100 items.
const PAGE_SIZE: u32 = 100;

const NOT_SPECIFIED: &str = "Not specified";

/// Job-board search collaborator.
#[async_trait]
pub trait VacancySearch: Send + Sync {
    /// Run a search. Errors (including timeouts) surface as `UpstreamSearch`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, AppError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Salary {
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One item of the hh.ru `/vacancies` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employer: Option<NamedRef>,
    #[serde(default)]
    pub area: Option<NamedRef>,
    #[serde(default)]
    pub schedule: Option<NamedRef>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub alternate_url: Option<String>,
}

impl RawListing {
    /// Map into an unsaved listing. Items without an ID or title are dropped.
    pub fn into_listing(self, user_id: i64, now: DateTime<Utc>) -> Option<Listing> {
        let listing_id = self.id.filter(|id| !id.trim().is_empty())?;
        let title = self.name.filter(|n| !n.trim().is_empty())?;

        let published_at = match self.published_at.as_deref() {
            Some(raw) => parse_upstream_timestamp(raw).unwrap_or_else(|| {
                tracing::warn!(listing_id = %listing_id, raw, "Unparseable published_at, using now");
                now
            }),
            None => now,
        };

        Some(Listing {
            listing_id,
            user_id,
            title,
            employer: name_or(self.employer, NOT_SPECIFIED),
            location: name_or(self.area, NOT_SPECIFIED),
            schedule_type: name_or(self.schedule, NOT_SPECIFIED),
            compensation_text: self
                .salary
                .as_ref()
                .map(format_salary)
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            source_url: self.alternate_url.unwrap_or_default(),
            published_at,
            loaded_at: None,
            status: ListingStatus::New,
            delivered: false,
        })
    }
}

fn name_or(value: Option<NamedRef>, fallback: &str) -> String {
    value
        .and_then(|v| v.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Render a salary range, e.g. `100000 - 150000 RUR`, `from 100000 RUR`.
pub fn format_salary(salary: &Salary) -> String {
    let currency = salary
        .currency
        .as_deref()
        .map(|c| format!(" {}", c))
        .unwrap_or_default();

    match (salary.from, salary.to) {
        (Some(from), Some(to)) => format!("{} - {}{}", from, to, currency),
        (Some(from), None) => format!("from {}{}", from, currency),
        (None, Some(to)) => format!("up to {}{}", to, currency),
        (None, None) => NOT_SPECIFIED.to_string(),
    }
}

/// Query string for `GET /vacancies`.
pub fn build_search_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("text", query.text.clone()),
        ("period", query.lookback_days.to_string()),
        ("per_page", PAGE_SIZE.to_string()),
        ("page", "0".to_string()),
        ("only_with_salary", "false".to_string()),
        ("search_field", "name".to_string()),
    ];

    for work_type in &query.work_types {
        // hybrid has no schedule filter upstream
        match work_type.as_str() {
            "remote" => params.push(("schedule", "remote".to_string())),
            "office" => params.push(("schedule", "fullDay".to_string())),
            _ => {}
        }
    }

    for country in &query.countries {
        match country.as_str() {
            "russia" => params.push(("area", "113".to_string())),
            "belarus" => params.push(("area", "16".to_string())),
            other => tracing::debug!(country = other, "No area mapping"),
        }
    }

    if !query.exclude_keywords.is_empty() {
        params.push(("excluded_text", query.exclude_keywords.join(",")));
    }

    params
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawListing>,
}

/// HTTP client for the hh.ru API.
#[derive(Clone)]
pub struct HhClient {
    http: reqwest::Client,
    base_url: String,
}

impl HhClient {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, AppError> {
        // hh.ru rejects requests without a descriptive User-Agent.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vacancy-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VacancySearch for HhClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, AppError> {
        let url = format!("{}/vacancies", self.base_url);
        let params = build_search_params(query);

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::UpstreamSearch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!("hh.ru rate limit hit (429)");
            }
            return Err(AppError::UpstreamSearch(format!("HTTP {}: {}", status, body)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamSearch(format!("JSON parse error: {}", e)))?;

        tracing::debug!(text = %query.text, count = body.items.len(), "hh.ru search completed");
        Ok(body.items)
    }
}
