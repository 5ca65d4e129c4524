use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_NOTIFICATION_TITLE: &str = "Alarme";
const DEFAULT_NOTIFICATION_CHANNEL: &str = "high_priority";

// Delivery settings from config/app.json. The notification title is a fixed
// string; the body is always the alarm's own title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub title: String,
    pub channel: String,
    pub deliver_while_idle: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            channel: DEFAULT_NOTIFICATION_CHANNEL.to_string(),
            deliver_while_idle: true,
        }
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "Alarme",
        "notificationTitle": DEFAULT_NOTIFICATION_TITLE,
        "notificationChannel": DEFAULT_NOTIFICATION_CHANNEL,
        "deliverWhileIdle": true
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_notification_settings(config_dir: &Path) -> Result<NotificationSettings, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let defaults = NotificationSettings::default();

    let title = app
        .get("notificationTitle")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or(defaults.title);
    let channel = app
        .get("notificationChannel")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or(defaults.channel);
    let deliver_while_idle = app
        .get("deliverWhileIdle")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(defaults.deliver_while_idle);

    Ok(NotificationSettings {
        title,
        channel,
        deliver_while_idle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "alarme-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_default_configs_writes_app_json_once() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let settings = read_notification_settings(&dir.path).expect("read settings");
        assert_eq!(settings, NotificationSettings::default());

        fs::write(
            dir.path.join(APP_JSON),
            "{\"schema\": 1, \"notificationChannel\": \"alarms\"}\n",
        )
        .expect("overwrite config");
        ensure_default_configs(&dir.path).expect("second call keeps file");

        let settings = read_notification_settings(&dir.path).expect("read settings");
        assert_eq!(settings.channel, "alarms");
        assert_eq!(settings.title, DEFAULT_NOTIFICATION_TITLE);
    }

    #[test]
    fn read_notification_settings_rejects_unknown_schema() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), "{\"schema\": 2}\n").expect("write config");

        let result = read_notification_settings(&dir.path);
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }
}
