use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alarm {
    pub id: i64,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub state: AlarmState,
}

impl Alarm {
    pub fn new(id: i64, title: impl Into<String>, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            scheduled_at,
            state: AlarmState::Pending,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AlarmState::Pending
    }

    pub fn resolve(&mut self) {
        self.state = AlarmState::Resolved;
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err("alarm.id must be positive".to_string());
        }
        validate_non_empty(&self.title, "alarm.title")?;
        Ok(())
    }
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_alarm() -> Alarm {
        Alarm::new(
            1_771_200_000_000,
            "Reuniao importante",
            fixed_time("2026-02-16T09:00:00Z"),
        )
    }

    #[test]
    fn new_alarm_starts_pending() {
        let alarm = sample_alarm();
        assert_eq!(alarm.state, AlarmState::Pending);
        assert!(alarm.is_active());
    }

    #[test]
    fn resolve_is_terminal() {
        let mut alarm = sample_alarm();
        alarm.resolve();
        assert_eq!(alarm.state, AlarmState::Resolved);
        assert!(!alarm.is_active());
    }

    #[test]
    fn validate_accepts_valid_alarm() {
        assert!(sample_alarm().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_title() {
        let mut alarm = sample_alarm();
        alarm.title = "   ".to_string();
        assert!(alarm.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_id() {
        let mut alarm = sample_alarm();
        alarm.id = 0;
        assert!(alarm.validate().is_err());
    }

    #[test]
    fn alarm_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AlarmState::Pending).expect("serialize state"),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&AlarmState::Resolved).expect("serialize state"),
            "\"resolved\""
        );
    }

    #[test]
    fn alarm_supports_serde_roundtrip() {
        let alarm = sample_alarm();
        let roundtrip: Alarm =
            serde_json::from_str(&serde_json::to_string(&alarm).expect("serialize alarm"))
                .expect("deserialize alarm");
        assert_eq!(roundtrip, alarm);
    }
}
