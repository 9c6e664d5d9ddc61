// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vacancy-Tracker: job-board search with batched Telegram notifications
//!
//! This crate provides the backend API that searches hh.ru on behalf of
//! Telegram-authenticated users, stores de-duplicated listings per user and
//! delivers new ones through the Telegram bot, both on demand and on a
//! periodic auto-update sweep.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{
    AuthApi, AutoUpdateScheduler, Messenger, NotificationBatcher, PreferencesService, TokenCache,
    VacancySearch, VacancyService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub auth: Arc<dyn AuthApi>,
    pub tokens: Arc<TokenCache>,
    pub preferences: PreferencesService,
    pub notifications: Arc<NotificationBatcher>,
    pub vacancies: Arc<VacancyService>,
    pub scheduler: Arc<AutoUpdateScheduler>,
}

impl AppState {
    /// Wire the services on top of the given collaborators.
    pub fn new(
        config: Config,
        db: Arc<dyn Store>,
        auth: Arc<dyn AuthApi>,
        search: Arc<dyn VacancySearch>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let timeout = config.collaborator_timeout;

        let tokens = Arc::new(TokenCache::new(auth.clone(), timeout));
        let preferences = PreferencesService::new(db.clone(), timeout);
        let notifications = Arc::new(NotificationBatcher::new(
            db.clone(),
            messenger,
            config.notification_batch_size,
            timeout,
        ));
        let vacancies = Arc::new(VacancyService::new(
            db.clone(),
            search,
            preferences.clone(),
            notifications.clone(),
            timeout,
        ));
        let scheduler = Arc::new(AutoUpdateScheduler::new(
            preferences.clone(),
            tokens.clone(),
            auth.clone(),
            vacancies.clone(),
            config.sweep_concurrency,
            timeout,
        ));

        Self {
            config,
            db,
            auth,
            tokens,
            preferences,
            notifications,
            vacancies,
            scheduler,
        }
    }
}
