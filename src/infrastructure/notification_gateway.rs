use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub const EXTRA_ALARM_ID: &str = "alarmeId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    pub deliver_while_idle: bool,
    pub channel: String,
    pub extra: HashMap<String, Value>,
}

impl NotificationRequest {
    pub fn for_alarm(
        id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        fire_at: DateTime<Utc>,
        channel: impl Into<String>,
        deliver_while_idle: bool,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            fire_at,
            deliver_while_idle,
            channel: channel.into(),
            extra: HashMap::from([(EXTRA_ALARM_ID.to_string(), Value::from(id))]),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FiredNotification {
    pub extra: HashMap<String, Value>,
}

impl FiredNotification {
    pub fn for_alarm(id: i64) -> Self {
        Self {
            extra: HashMap::from([(EXTRA_ALARM_ID.to_string(), Value::from(id))]),
        }
    }

    // Platform layers may stringify extras, so a numeric string also counts.
    pub fn alarm_id(&self) -> Option<i64> {
        let value = self.extra.get(EXTRA_ALARM_ID)?;
        if let Some(id) = value.as_i64() {
            return Some(id);
        }
        value.as_str()?.trim().parse().ok()
    }
}

// cancel is idempotent by contract: a missing id must not error.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError>;

    async fn schedule(&self, request: NotificationRequest) -> Result<(), InfraError>;

    async fn cancel(&self, id: i64) -> Result<(), InfraError>;
}

#[derive(Debug)]
pub struct InMemoryNotificationGateway {
    permission: PermissionStatus,
    pending: Mutex<HashMap<i64, NotificationRequest>>,
    schedule_failures: Mutex<u32>,
    cancelled: Mutex<Vec<i64>>,
}

impl Default for InMemoryNotificationGateway {
    fn default() -> Self {
        Self::new(PermissionStatus::Granted)
    }
}

impl InMemoryNotificationGateway {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission,
            pending: Mutex::new(HashMap::new()),
            schedule_failures: Mutex::new(0),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_schedules(&self, count: u32) {
        if let Ok(mut failures) = self.schedule_failures.lock() {
            *failures = count;
        }
    }

    pub fn pending_ids(&self) -> Vec<i64> {
        self.pending
            .lock()
            .map(|pending| {
                let mut ids = pending.keys().copied().collect::<Vec<_>>();
                ids.sort_unstable();
                ids
            })
            .unwrap_or_default()
    }

    pub fn pending_request(&self, id: i64) -> Option<NotificationRequest> {
        self.pending.lock().ok()?.get(&id).cloned()
    }

    pub fn cancelled_ids(&self) -> Vec<i64> {
        self.cancelled
            .lock()
            .map(|cancelled| cancelled.clone())
            .unwrap_or_default()
    }

    fn lock_pending(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<i64, NotificationRequest>>, InfraError> {
        self.pending
            .lock()
            .map_err(|error| InfraError::Gateway(format!("pending lock poisoned: {error}")))
    }
}

#[async_trait]
impl NotificationGateway for InMemoryNotificationGateway {
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        Ok(self.permission)
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<(), InfraError> {
        {
            let mut failures = self.schedule_failures.lock().map_err(|error| {
                InfraError::Gateway(format!("failure counter lock poisoned: {error}"))
            })?;
            if *failures > 0 {
                *failures -= 1;
                return Err(InfraError::Gateway(
                    "notification scheduling limit reached".to_string(),
                ));
            }
        }
        self.lock_pending()?.insert(request.id, request);
        Ok(())
    }

    async fn cancel(&self, id: i64) -> Result<(), InfraError> {
        self.cancelled
            .lock()
            .map_err(|error| InfraError::Gateway(format!("cancel log lock poisoned: {error}")))?
            .push(id);
        self.lock_pending()?.remove(&id);
        Ok(())
    }
}
