//! Reminder settings and the periodic reminder scheduler.
//!
//! Settings are persisted in the `settings` table and published on a watch
//! channel; the scheduler task follows that channel and emits a `Reminder`
//! on a broadcast channel every `interval_minutes` while enabled. Delivering
//! reminders to the desktop is left to whoever subscribes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::error::CoreError;
use crate::store::{SqliteSettings, StoreError};

pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;
pub const MIN_INTERVAL_MINUTES: u32 = 15;
pub const MAX_INTERVAL_MINUTES: u32 = 240;

const KEY_ENABLED: &str = "notification_enabled";
const KEY_INTERVAL: &str = "notification_interval_minutes";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub interval_minutes: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl NotificationSettings {
    pub fn validated(self) -> Result<Self, CoreError> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(CoreError::InvalidInput(format!(
                "reminder interval must be between {} and {} minutes",
                MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES
            )));
        }
        Ok(self)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// The one thing application reset needs from the notification side.
pub trait NotificationConfig {
    fn restore_defaults(&self) -> Result<(), StoreError>;
}

/// A "time for a challenge" nudge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub title: String,
    pub message: String,
}

impl Default for Reminder {
    fn default() -> Self {
        Self {
            title: "Time for a fitness challenge!".into(),
            message: "Take a break and complete a quick fitness challenge.".into(),
        }
    }
}

pub struct NotificationService {
    store: SqliteSettings,
    defaults: NotificationSettings,
    tx: watch::Sender<NotificationSettings>,
}

impl NotificationService {
    /// Load persisted settings (falling back to `defaults`) and start publishing them.
    pub fn load(store: SqliteSettings, defaults: NotificationSettings) -> Result<Self, StoreError> {
        let current = read_settings(&store, defaults)?;
        let (tx, _rx) = watch::channel(current);
        Ok(Self { store, defaults, tx })
    }

    pub fn current(&self) -> NotificationSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSettings> {
        self.tx.subscribe()
    }

    /// Validate, persist, then publish.
    #[instrument(level = "info", skip(self))]
    pub fn update(&self, settings: NotificationSettings) -> Result<NotificationSettings, CoreError> {
        let settings = settings.validated()?;
        self.persist(settings)?;
        info!(
            target: "reminder",
            enabled = settings.enabled,
            interval_minutes = settings.interval_minutes,
            "Notification settings changed"
        );
        Ok(settings)
    }

    fn persist(&self, settings: NotificationSettings) -> Result<(), StoreError> {
        self.store.set_many(&[
            (KEY_ENABLED, settings.enabled.to_string()),
            (KEY_INTERVAL, settings.interval_minutes.to_string()),
        ])?;
        self.tx.send_replace(settings);
        Ok(())
    }
}

impl NotificationConfig for NotificationService {
    fn restore_defaults(&self) -> Result<(), StoreError> {
        self.persist(self.defaults)
    }
}

fn read_settings(
    store: &SqliteSettings,
    defaults: NotificationSettings,
) -> Result<NotificationSettings, StoreError> {
    let enabled = match store.get(KEY_ENABLED)? {
        Some(v) => v.parse::<bool>().unwrap_or_else(|_| {
            warn!(target: "reminder", value = %v, "Unreadable enabled flag; using default");
            defaults.enabled
        }),
        None => defaults.enabled,
    };
    let interval_minutes = match store.get(KEY_INTERVAL)? {
        Some(v) => v
            .parse::<u32>()
            .ok()
            .filter(|m| (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(m))
            .unwrap_or_else(|| {
                warn!(target: "reminder", value = %v, "Unreadable interval; using default");
                defaults.interval_minutes
            }),
        None => defaults.interval_minutes,
    };
    Ok(NotificationSettings {
        enabled,
        interval_minutes,
    })
}

/// Emit reminders according to the latest settings. Returns when the
/// settings sender is dropped.
pub async fn run_reminders(
    mut settings: watch::Receiver<NotificationSettings>,
    events: broadcast::Sender<Reminder>,
) {
    loop {
        let current = *settings.borrow_and_update();
        if !current.enabled {
            if settings.changed().await.is_err() {
                return;
            }
            continue;
        }

        let period = current.period();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(target: "reminder", interval_minutes = current.interval_minutes, "Reminder schedule started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // No subscribers is fine; nobody is listening right now.
                    let receivers = events.send(Reminder::default()).unwrap_or(0);
                    info!(target: "reminder", receivers, "Reminder published");
                }
                changed = settings.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    info!(target: "reminder", "Reminder schedule restarting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn service(defaults: NotificationSettings) -> NotificationService {
        let store = SqliteSettings::new(Database::open_in_memory().unwrap());
        NotificationService::load(store, defaults).unwrap()
    }

    #[test]
    fn defaults_then_persisted_values() {
        let db = Database::open_in_memory().unwrap();
        let svc = NotificationService::load(SqliteSettings::new(db.clone()), NotificationSettings::default()).unwrap();
        assert_eq!(svc.current(), NotificationSettings::default());

        let wanted = NotificationSettings { enabled: true, interval_minutes: 30 };
        svc.update(wanted).unwrap();
        assert_eq!(svc.current(), wanted);

        let reloaded = NotificationService::load(SqliteSettings::new(db), NotificationSettings::default()).unwrap();
        assert_eq!(reloaded.current(), wanted);
    }

    #[test]
    fn interval_out_of_range_is_rejected() {
        let svc = service(NotificationSettings::default());
        for bad in [0, 14, 241] {
            let err = svc.update(NotificationSettings { enabled: true, interval_minutes: bad }).unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)));
        }
        assert_eq!(svc.current(), NotificationSettings::default());
    }

    #[test]
    fn restore_defaults_publishes() {
        let svc = service(NotificationSettings::default());
        let mut rx = svc.subscribe();
        svc.update(NotificationSettings { enabled: true, interval_minutes: 45 }).unwrap();
        svc.restore_defaults().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), NotificationSettings::default());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_follows_settings() {
        let (settings_tx, settings_rx) = watch::channel(NotificationSettings { enabled: true, interval_minutes: 15 });
        let (events_tx, mut events_rx) = broadcast::channel(8);
        let task = tokio::spawn(run_reminders(settings_rx, events_tx));

        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(events_rx.try_recv().unwrap(), Reminder::default());
        assert!(events_rx.try_recv().is_err());

        settings_tx.send_replace(NotificationSettings { enabled: false, interval_minutes: 15 });
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert!(events_rx.try_recv().is_err());

        drop(settings_tx);
        task.await.unwrap();
    }
}
