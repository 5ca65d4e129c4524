use crate::application::permission::{PermissionGate, PermissionState};
use crate::domain::models::Alarm;
use crate::infrastructure::alarm_store::{AlarmStore, ResolveOutcome};
use crate::infrastructure::config::NotificationSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notification_gateway::{
    FiredNotification, NotificationGateway, NotificationRequest,
};
use crate::infrastructure::snapshot_repository::SnapshotRepository;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
pub type UpdateListener = Arc<dyn Fn(&[Alarm]) + Send + Sync>;

pub const TEST_NOTIFICATION_ID: i64 = 999_999;
const TEST_NOTIFICATION_DELAY_SECONDS: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAlarm {
    pub alarm: Alarm,
    pub minutes_until_fire: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub permission: PermissionState,
    pub restored: usize,
    pub missed: usize,
    pub recovered_from_corruption: bool,
}

// Reconciles the AlarmStore with the notification gateway; pending OS timers
// are a disposable projection of the active alarm set, never a second source
// of truth. Every mutating handler holds `mutation` for its whole run,
// including persistence and gateway awaits, so handlers serialize.
pub struct AlarmScheduler<G, S>
where
    G: NotificationGateway,
    S: SnapshotRepository,
{
    gateway: Arc<G>,
    store: Arc<AlarmStore<S>>,
    permission: PermissionGate,
    settings: NotificationSettings,
    now_provider: NowProvider,
    listeners: Mutex<Vec<UpdateListener>>,
    mutation: tokio::sync::Mutex<()>,
}

impl<G, S> AlarmScheduler<G, S>
where
    G: NotificationGateway,
    S: SnapshotRepository,
{
    pub fn new(gateway: Arc<G>, store: Arc<AlarmStore<S>>) -> Self {
        Self {
            gateway,
            store,
            permission: PermissionGate::default(),
            settings: NotificationSettings::default(),
            now_provider: Arc::new(Utc::now),
            listeners: Mutex::new(Vec::new()),
            mutation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_settings(mut self, settings: NotificationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn subscribe(&self, listener: UpdateListener) -> Result<(), InfraError> {
        self.lock_listeners()?.push(listener);
        Ok(())
    }

    pub fn permission_state(&self) -> Result<PermissionState, InfraError> {
        self.permission.state()
    }

    pub fn list_alarms(&self) -> Result<Vec<Alarm>, InfraError> {
        self.store.list()
    }

    // OS-level timers are not re-registered on restart; `missed` counts the
    // pending alarms already due so the caller can surface them.
    pub async fn initialize(&self) -> Result<StartupReport, InfraError> {
        let _serial = self.mutation.lock().await;
        let status = self.gateway.request_permission().await?;
        self.permission.record(status)?;

        let summary = self.store.load()?;
        let now = (self.now_provider)();
        let missed = self
            .store
            .list()?
            .iter()
            .filter(|alarm| alarm.is_active() && alarm.scheduled_at <= now)
            .count();

        Ok(StartupReport {
            permission: self.permission.state()?,
            restored: summary.restored,
            missed,
            recovered_from_corruption: summary.recovered_from_corruption,
        })
    }

    pub async fn create_alarm(
        &self,
        title: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<ScheduledAlarm, InfraError> {
        let _serial = self.mutation.lock().await;
        let title = title.trim();
        if title.is_empty() {
            return Err(InfraError::Validation(
                "title must not be empty".to_string(),
            ));
        }
        let now = (self.now_provider)();
        if scheduled_at <= now {
            return Err(InfraError::Validation(
                "scheduled_at must be in the future".to_string(),
            ));
        }
        self.permission.ensure_granted()?;

        let id = now.timestamp_millis();
        let alarm = Alarm::new(id, title, scheduled_at);
        self.store.upsert(alarm.clone())?;

        // A failure past this point leaves the record stored without an OS
        // timer; surfaced to the caller, not retried.
        let request = NotificationRequest::for_alarm(
            id,
            self.settings.title.clone(),
            title,
            scheduled_at,
            self.settings.channel.clone(),
            self.settings.deliver_while_idle,
        );
        self.gateway.schedule(request).await?;

        self.notify_listeners()?;
        Ok(ScheduledAlarm {
            alarm,
            minutes_until_fire: minutes_until(now, scheduled_at),
        })
    }

    pub async fn deactivate_alarm(&self, id: i64) -> Result<bool, InfraError> {
        let _serial = self.mutation.lock().await;
        self.gateway.cancel(id).await?;
        match self.store.mark_resolved(id)? {
            ResolveOutcome::Missing => Ok(false),
            ResolveOutcome::AlreadyResolved => Ok(true),
            ResolveOutcome::Resolved(_) => {
                self.notify_listeners()?;
                Ok(true)
            }
        }
    }

    pub async fn delete_alarm(&self, id: i64) -> Result<bool, InfraError> {
        let _serial = self.mutation.lock().await;
        self.gateway.cancel(id).await?;
        let removed = self.store.remove(id)?;
        if removed {
            self.notify_listeners()?;
        }
        Ok(removed)
    }

    // Unknown ids, malformed extras, and duplicate deliveries are no-ops.
    pub async fn handle_notification_action(
        &self,
        event: FiredNotification,
    ) -> Result<(), InfraError> {
        let _serial = self.mutation.lock().await;
        let Some(id) = event.alarm_id() else {
            return Ok(());
        };
        if let ResolveOutcome::Resolved(_) = self.store.mark_resolved(id)? {
            self.notify_listeners()?;
        }
        Ok(())
    }

    // Delivery probe under a reserved id; never touches the store.
    pub async fn schedule_test_notification(&self) -> Result<DateTime<Utc>, InfraError> {
        let _serial = self.mutation.lock().await;
        self.permission.ensure_granted()?;

        let fire_at = (self.now_provider)() + Duration::seconds(TEST_NOTIFICATION_DELAY_SECONDS);
        let request = NotificationRequest {
            id: TEST_NOTIFICATION_ID,
            title: self.settings.title.clone(),
            body: "notification delivery probe".to_string(),
            fire_at,
            deliver_while_idle: self.settings.deliver_while_idle,
            channel: self.settings.channel.clone(),
            extra: HashMap::from([("probe".to_string(), Value::from(true))]),
        };
        self.gateway.schedule(request).await?;
        Ok(fire_at)
    }

    fn notify_listeners(&self) -> Result<(), InfraError> {
        let snapshot = self.store.list()?;
        for listener in self.lock_listeners()?.iter() {
            listener(&snapshot);
        }
        Ok(())
    }

    fn lock_listeners(&self) -> Result<std::sync::MutexGuard<'_, Vec<UpdateListener>>, InfraError> {
        self.listeners
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("listener lock poisoned: {error}")))
    }
}

fn minutes_until(now: DateTime<Utc>, fire_at: DateTime<Utc>) -> i64 {
    let remaining_ms = (fire_at - now).num_milliseconds();
    (remaining_ms as f64 / 60_000.0).round() as i64
}
