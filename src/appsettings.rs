use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub criterion: String,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReminderSettings {
    pub lead_time_minutes: i64,
    pub timezone: Tz,
}

impl ReminderSettings {
    /// Range is checked by `AppSettings::new`.
    pub fn lead_time(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.lead_time_minutes).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BehaviourSettings {
    pub auto_query_on_start: bool,
    pub refresh_interval_minutes: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub api: ApiSettings,
    pub reminders: ReminderSettings,
    pub storage: StorageSettings,
    pub app: BehaviourSettings,
    pub telegram: Option<TelegramSettings>,
}

impl AppSettings {
    /// Layers built-in defaults, `appsettings` (or `config_file`),
    /// `appsettings.local` and `APP_`-prefixed environment variables.
    pub fn new(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let main_file = match config_file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("appsettings").required(false),
        };

        let settings = Config::builder()
            .set_default("api.base_url", "https://api.cnelep.gob.ec")?
            .set_default("api.criterion", "IDENTIFICACION")?
            .set_default("api.timeout_seconds", 30)?
            .set_default("reminders.lead_time_minutes", 15)?
            .set_default("reminders.timezone", "America/Guayaquil")?
            .set_default("storage.path", "cortes_state.json")?
            .set_default("app.auto_query_on_start", true)?
            .set_default("app.refresh_interval_minutes", 60)?
            .add_source(main_file)
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let settings: Self = settings.try_deserialize()?;
        let lead_time_minutes = settings.reminders.lead_time_minutes;
        if lead_time_minutes < 0 {
            return Err(ConfigError::Message(
                "reminders.lead_time_minutes must not be negative".to_owned(),
            ));
        }
        if TimeDelta::try_minutes(lead_time_minutes).is_none() {
            return Err(ConfigError::Message(format!(
                "reminders.lead_time_minutes is out of range: {lead_time_minutes}"
            )));
        }

        Ok(settings)
    }
}
