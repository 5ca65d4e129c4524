pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{
    create_alarm_impl, deactivate_alarm_impl, delete_alarm_impl, initialize_impl,
    list_alarms_impl, notification_action_impl, test_notification_impl, AlarmListItem, AppState,
    CreateAlarmResponse, StartupResponse,
};
pub use application::permission::{PermissionGate, PermissionState};
pub use application::scheduler::{
    AlarmScheduler, NowProvider, ScheduledAlarm, StartupReport, UpdateListener,
};
pub use domain::models::{Alarm, AlarmState};
pub use infrastructure::alarm_store::{AlarmStore, LoadSummary, ResolveOutcome};
pub use infrastructure::error::InfraError;
pub use infrastructure::notification_gateway::{
    FiredNotification, InMemoryNotificationGateway, NotificationGateway, NotificationRequest,
    PermissionStatus,
};
pub use infrastructure::snapshot_repository::{
    InMemorySnapshotRepository, SnapshotRepository, SqliteSnapshotRepository,
};
