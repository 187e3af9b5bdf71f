//! Application state shared by HTTP handlers, WebSocket sessions and the
//! reminder scheduler.
//!
//! This module owns:
//!   - the challenge bank and the stats tracker (both over one SQLite handle)
//!   - the no-repeat rotation
//!   - notification settings and the reminder broadcast channel
//!   - the default bank used for seeding and application reset

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::domain::NewChallenge;
use crate::notifications::{NotificationService, Reminder};
use crate::rotation::ChallengeRotation;
use crate::store::{Database, SqliteChallenges, SqliteSettings, SqliteStats, StoreError};
use crate::tracker::StatsTracker;

/// Reminders buffered per subscriber before the slowest one starts lagging.
const REMINDER_BUFFER: usize = 16;

pub struct AppState {
    pub challenges: SqliteChallenges,
    pub tracker: StatsTracker<SqliteChallenges, SqliteStats>,
    pub notifications: NotificationService,
    pub reminders: broadcast::Sender<Reminder>,
    pub defaults: Vec<NewChallenge>,
    rotation: Mutex<ChallengeRotation>,
}

impl AppState {
    /// Build state over an opened database: seed an empty bank, load settings.
    #[instrument(level = "info", skip_all)]
    pub fn new(db: Database, cfg: &AppConfig) -> Result<Self, StoreError> {
        Self::with_rotation(db, cfg, ChallengeRotation::new())
    }

    pub fn with_rotation(
        db: Database,
        cfg: &AppConfig,
        rotation: ChallengeRotation,
    ) -> Result<Self, StoreError> {
        let challenges = SqliteChallenges::new(db.clone());
        let defaults = cfg.default_challenges();
        let seeded = challenges.seed_if_empty(&defaults)?;
        let total = challenges.count()?;
        info!(target: "challenge", seeded, total, "Startup challenge inventory");

        let notifications =
            NotificationService::load(SqliteSettings::new(db.clone()), cfg.notification_defaults())?;
        let current = notifications.current();
        info!(
            target: "reminder",
            enabled = current.enabled,
            interval_minutes = current.interval_minutes,
            "Notification settings loaded"
        );

        let (reminders, _rx) = broadcast::channel(REMINDER_BUFFER);
        Ok(Self {
            tracker: StatsTracker::new(challenges.clone(), SqliteStats::new(db)),
            challenges,
            notifications,
            reminders,
            defaults,
            rotation: Mutex::new(rotation),
        })
    }

    /// The rotation is a plain shown-set; a panic mid-pick leaves it usable.
    pub fn rotation(&self) -> MutexGuard<'_, ChallengeRotation> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
