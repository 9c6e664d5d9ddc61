// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batched delivery of new listings to users.
//!
//! A flush loads the user's undelivered listings (oldest first), sends them in
//! messages of at most `batch_size` listings, stops at the first failed send,
//! and then marks everything that was sent as delivered in one bulk write.
//! A crash between a send and that write re-sends the batch on the next
//! flush; a listing is never marked delivered without having been sent.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Listing, UserPreferences};
use crate::services::auth_client::Messenger;
use crate::services::bounded;
use crate::time_utils::format_display;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const SEPARATOR_WIDTH: usize = 30;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Undelivered listings found at the start of the flush
    pub pending: usize,
    pub batches_sent: usize,
    /// Listings committed as delivered
    pub delivered: usize,
    /// Still undelivered after the flush
    pub remaining: usize,
}

pub struct NotificationBatcher {
    db: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    batch_size: usize,
    call_timeout: std::time::Duration,
    flush_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl NotificationBatcher {
    pub fn new(
        db: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        batch_size: usize,
        call_timeout: std::time::Duration,
    ) -> Self {
        Self {
            db,
            messenger,
            batch_size: batch_size.max(1),
            call_timeout,
            flush_locks: DashMap::new(),
        }
    }

    /// Send every undelivered listing of `user_id` and commit the delivered
    /// mark for those that went out. Flushes for one user never overlap.
    ///
    /// Returns `Persistence` if the delivered mark could not be written; the
    /// sent listings then stay undelivered and are sent again next time.
    pub async fn flush_undelivered(
        &self,
        user_id: i64,
        token: &str,
    ) -> Result<FlushReport, AppError> {
        let lock = self
            .flush_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.flush_locked(user_id, token).await
        };

        drop(lock);
        self.flush_locks
            .remove_if(&user_id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn flush_locked(&self, user_id: i64, token: &str) -> Result<FlushReport, AppError> {
        let pending = self.pending(user_id).await;
        let mut report = FlushReport {
            pending: pending.len(),
            remaining: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let mut sent_ids: Vec<String> = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let text = render_batch(batch);
            let sent = bounded(self.call_timeout, self.messenger.send(token, &text), || {
                AppError::Messaging("send timed out".to_string())
            })
            .await;

            match sent {
                Ok(()) => {
                    sent_ids.extend(batch.iter().map(|l| l.listing_id.clone()));
                    report.batches_sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        batch = report.batches_sent + 1,
                        error = %e,
                        "Notification send failed, stopping flush"
                    );
                    break;
                }
            }
        }

        if sent_ids.is_empty() {
            return Ok(report);
        }

        bounded(
            self.call_timeout,
            self.db.mark_delivered(user_id, &sent_ids),
            || AppError::Persistence("mark delivered timed out".to_string()),
        )
        .await
        .inspect_err(|e| {
            tracing::error!(
                user_id,
                sent = sent_ids.len(),
                error = %e,
                "Listings sent but delivered mark not committed"
            );
        })?;

        report.delivered = sent_ids.len();
        report.remaining = report.pending - report.delivered;
        tracing::info!(
            user_id,
            batches = report.batches_sent,
            delivered = report.delivered,
            remaining = report.remaining,
            "Notifications flushed"
        );
        Ok(report)
    }

    /// Undelivered listings, oldest first, read from the store on every
    /// flush. A failed read is treated as nothing pending.
    async fn pending(&self, user_id: i64) -> Vec<Listing> {
        match bounded(
            self.call_timeout,
            self.db.undelivered_listings(user_id),
            || AppError::Persistence("undelivered lookup timed out".to_string()),
        )
        .await
        {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Undelivered lookup failed, skipping flush");
                Vec::new()
            }
        }
    }

    /// Send a single free-form message.
    pub async fn send_text(&self, user_id: i64, token: &str, text: &str) -> Result<(), AppError> {
        bounded(self.call_timeout, self.messenger.send(token, text), || {
            AppError::Messaging("send timed out".to_string())
        })
        .await
        .inspect_err(|e| tracing::warn!(user_id, error = %e, "Message send failed"))
    }
}

// ─── Message Rendering ───────────────────────────────────────────

/// Escape text for Telegram MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
        '\\',
    ];
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Render one outbound message for a batch of listings.
pub fn render_batch(listings: &[Listing]) -> String {
    let mut text = if listings.len() == 1 {
        "🎯 *New vacancy found:*\n\n".to_string()
    } else {
        format!(
            "🎯 *{}*\n\n",
            escape_markdown(&format!("New vacancies ({}):", listings.len()))
        )
    };

    let separator = "─".repeat(SEPARATOR_WIDTH);
    for (i, listing) in listings.iter().enumerate() {
        if i > 0 {
            text.push_str(&separator);
            text.push_str("\n\n");
        }
        text.push_str(&render_listing(listing));
    }

    text.push_str("\n🚀 Open the app to see all vacancies\\!");
    text
}

fn render_listing(listing: &Listing) -> String {
    let mut block = format!(
        "*{}*\n📅 {}\n🏢 {}\n📍 {}\n💼 {}\n💰 {}\n",
        escape_markdown(&listing.title),
        escape_markdown(&format_display(listing.published_at)),
        escape_markdown(or_default(&listing.employer, "Not specified")),
        escape_markdown(or_default(&listing.location, "Not specified")),
        escape_markdown(or_default(&listing.schedule_type, "Not specified")),
        escape_markdown(or_default(&listing.compensation_text, "Not specified")),
    );
    if !listing.source_url.is_empty() {
        let url = listing.source_url.replace('\\', "\\\\").replace(')', "\\)");
        block.push_str(&format!("🔗 [Open vacancy]({})\n", url));
    }
    block.push('\n');
    block
}

pub fn test_message() -> String {
    escape_markdown("✅ Test notification: your notifications are working.")
}

/// Report a failure the client ran into back to the user's chat.
pub fn error_message(error: &str) -> String {
    format!(
        "❌ *{}*\n\n{}\n`{}`\n\n{}",
        escape_markdown("An error occurred"),
        escape_markdown("Something went wrong while processing your request:"),
        error.trim().replace('\\', "\\\\").replace('`', "\\`"),
        escape_markdown("Please try again later or contact support."),
    )
}

/// Notice sent after a settings change, when notifications are on.
pub fn settings_updated_message(prefs: &UserPreferences) -> String {
    let lines = [
        "⚙️ Settings updated".to_string(),
        format!("Query: {}", prefs.query_text),
        format!("Period: {} day(s)", prefs.lookback_days),
        format!(
            "Auto-update: {}",
            if prefs.auto_update_enabled {
                format!("every {} min", prefs.auto_update_interval_minutes)
            } else {
                "off".to_string()
            }
        ),
    ];
    escape_markdown(&lines.join("\n"))
}
