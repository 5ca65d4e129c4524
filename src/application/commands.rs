use crate::application::bootstrap::bootstrap_workspace;
use crate::application::scheduler::AlarmScheduler;
use crate::infrastructure::alarm_store::AlarmStore;
use crate::infrastructure::config::read_notification_settings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notification_gateway::{FiredNotification, NotificationGateway};
use crate::infrastructure::snapshot_repository::SqliteSnapshotRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState<G: NotificationGateway> {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    scheduler: AlarmScheduler<G, SqliteSnapshotRepository>,
    log_guard: Mutex<()>,
}

impl<G: NotificationGateway> AppState<G> {
    pub fn new(workspace_root: PathBuf, gateway: Arc<G>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let settings = read_notification_settings(&config_dir)?;
        let repository = Arc::new(SqliteSnapshotRepository::new(&bootstrap.database_path));
        let store = Arc::new(AlarmStore::new(repository));
        let scheduler = AlarmScheduler::new(gateway, store).with_settings(settings);

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            scheduler,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn scheduler(&self) -> &AlarmScheduler<G, SqliteSnapshotRepository> {
        &self.scheduler
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartupResponse {
    pub permission: String,
    pub restored: usize,
    pub missed: usize,
    pub recovered_from_corruption: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateAlarmResponse {
    pub id: i64,
    pub scheduled_at: String,
    pub minutes_until_fire: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AlarmListItem {
    pub id: i64,
    pub title: String,
    pub scheduled_at: String,
    pub active: bool,
}

pub async fn initialize_impl<G: NotificationGateway>(
    state: &AppState<G>,
) -> Result<StartupResponse, InfraError> {
    let report = state.scheduler.initialize().await?;

    if report.recovered_from_corruption {
        state.log_error("initialize", "alarm snapshot was corrupt; reset to empty state");
    }
    state.log_info(
        "initialize",
        &format!(
            "permission={} restored={} missed={}",
            report.permission.as_str(),
            report.restored,
            report.missed
        ),
    );

    Ok(StartupResponse {
        permission: report.permission.as_str().to_string(),
        restored: report.restored,
        missed: report.missed,
        recovered_from_corruption: report.recovered_from_corruption,
    })
}

pub async fn create_alarm_impl<G: NotificationGateway>(
    state: &AppState<G>,
    title: String,
    scheduled_at: String,
) -> Result<CreateAlarmResponse, InfraError> {
    let scheduled_at = parse_rfc3339_input(&scheduled_at, "scheduled_at")?;
    let scheduled = state.scheduler.create_alarm(&title, scheduled_at).await?;

    state.log_info(
        "create_alarm",
        &format!(
            "created alarm_id={} fires_in_minutes={}",
            scheduled.alarm.id, scheduled.minutes_until_fire
        ),
    );
    Ok(CreateAlarmResponse {
        id: scheduled.alarm.id,
        scheduled_at: scheduled.alarm.scheduled_at.to_rfc3339(),
        minutes_until_fire: scheduled.minutes_until_fire,
    })
}

pub fn list_alarms_impl<G: NotificationGateway>(
    state: &AppState<G>,
) -> Result<Vec<AlarmListItem>, InfraError> {
    let alarms = state.scheduler.list_alarms()?;
    Ok(alarms
        .into_iter()
        .map(|alarm| AlarmListItem {
            id: alarm.id,
            title: alarm.title.clone(),
            scheduled_at: alarm.scheduled_at.to_rfc3339(),
            active: alarm.is_active(),
        })
        .collect())
}

pub async fn deactivate_alarm_impl<G: NotificationGateway>(
    state: &AppState<G>,
    alarm_id: i64,
) -> Result<bool, InfraError> {
    let existed = state.scheduler.deactivate_alarm(alarm_id).await?;
    state.log_info(
        "deactivate_alarm",
        &format!("deactivated alarm_id={alarm_id} existed={existed}"),
    );
    Ok(existed)
}

pub async fn delete_alarm_impl<G: NotificationGateway>(
    state: &AppState<G>,
    alarm_id: i64,
) -> Result<bool, InfraError> {
    let removed = state.scheduler.delete_alarm(alarm_id).await?;
    state.log_info(
        "delete_alarm",
        &format!("deleted alarm_id={alarm_id} existed={removed}"),
    );
    Ok(removed)
}

pub async fn notification_action_impl<G: NotificationGateway>(
    state: &AppState<G>,
    extra: HashMap<String, serde_json::Value>,
) -> Result<(), InfraError> {
    state
        .scheduler
        .handle_notification_action(FiredNotification { extra })
        .await?;
    state.log_info("notification_action", "processed fired-notification event");
    Ok(())
}

pub async fn test_notification_impl<G: NotificationGateway>(
    state: &AppState<G>,
) -> Result<String, InfraError> {
    let fire_at = state.scheduler.schedule_test_notification().await?;
    state.log_info(
        "test_notification",
        &format!("delivery probe scheduled for {}", fire_at.to_rfc3339()),
    );
    Ok(fire_at.to_rfc3339())
}

fn parse_rfc3339_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::Validation(format!("{field_name} must be RFC3339 date-time: {error}"))
        })
}
