//! Runtime configuration: environment variables plus an optional TOML file.
//!
//! See `AppConfig` for the TOML schema. Every field is optional; an absent or
//! unreadable file means built-in defaults.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::NewChallenge;
use crate::notifications::NotificationSettings;
use crate::seeds::default_challenges;

const DEFAULT_DB_DIR: &str = ".rfc";
const DEFAULT_DB_FILE: &str = "rfc_database.db";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub database_path: Option<PathBuf>,
  #[serde(default)]
  pub notifications: NotificationDefaults,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
}

/// Reminder defaults, restored by application reset.
#[derive(Clone, Debug, Deserialize)]
pub struct NotificationDefaults {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default = "default_interval")]
  pub interval_minutes: u32,
}

fn default_interval() -> u32 {
  NotificationSettings::default().interval_minutes
}

impl Default for NotificationDefaults {
  fn default() -> Self {
    let d = NotificationSettings::default();
    Self { enabled: d.enabled, interval_minutes: d.interval_minutes }
  }
}

/// Challenge entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  pub name: String,
  pub description: String,
  pub category: String,
  pub difficulty: u8,
  pub duration_minutes: u32,
  #[serde(default)] pub image_path: Option<String>,
}

impl AppConfig {
  /// Notification defaults, falling back to built-ins when out of range.
  pub fn notification_defaults(&self) -> NotificationSettings {
    let wanted = NotificationSettings {
      enabled: self.notifications.enabled,
      interval_minutes: self.notifications.interval_minutes,
    };
    match wanted.validated() {
      Ok(s) => s,
      Err(e) => {
        warn!(target: "fitchallenge_backend", error = %e, "Ignoring configured notification defaults");
        NotificationSettings::default()
      }
    }
  }

  /// The bank used for seeding and reset. Invalid TOML entries are skipped;
  /// if none survive, the built-in bank is used.
  pub fn default_challenges(&self) -> Vec<NewChallenge> {
    let configured: Vec<NewChallenge> = self
      .challenges
      .iter()
      .filter_map(|c| {
        let candidate = NewChallenge {
          name: c.name.clone(),
          description: c.description.clone(),
          category: c.category.clone(),
          difficulty: c.difficulty,
          duration_minutes: c.duration_minutes,
          image_path: c.image_path.clone(),
        };
        match candidate.validated() {
          Ok(ok) => Some(ok),
          Err(e) => {
            warn!(target: "fitchallenge_backend", name = %c.name, error = %e, "Skipping configured challenge");
            None
          }
        }
      })
      .collect();

    if configured.is_empty() {
      default_challenges()
    } else {
      info!(target: "fitchallenge_backend", count = configured.len(), "Using configured challenge bank");
      configured
    }
  }

  /// DATABASE_PATH, then the TOML value, then `~/.rfc/rfc_database.db`.
  pub fn database_path(&self) -> PathBuf {
    if let Some(p) = std::env::var_os("DATABASE_PATH").filter(|p| !p.is_empty()) {
      return PathBuf::from(p);
    }
    if let Some(p) = &self.database_path {
      return p.clone();
    }
    dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(DEFAULT_DB_DIR)
      .join(DEFAULT_DB_FILE)
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("APP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "fitchallenge_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "fitchallenge_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "fitchallenge_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
