use crate::infrastructure::error::InfraError;
use crate::infrastructure::notification_gateway::PermissionStatus;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

// Gates new scheduling on the permission answer obtained at startup. Alarms
// the OS already holds are unaffected by a denial.
#[derive(Debug, Default)]
pub struct PermissionGate {
    state: Mutex<PermissionState>,
}

impl PermissionGate {
    pub fn record(&self, status: PermissionStatus) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        *state = match status {
            PermissionStatus::Granted => PermissionState::Granted,
            PermissionStatus::Denied => PermissionState::Denied,
        };
        Ok(())
    }

    pub fn state(&self) -> Result<PermissionState, InfraError> {
        Ok(*self.lock_state()?)
    }

    // Only a recorded grant unlocks scheduling; an unanswered request
    // refuses the same way as a denial.
    pub fn ensure_granted(&self) -> Result<(), InfraError> {
        match *self.lock_state()? {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(InfraError::PermissionDenied(
                "enable notifications in the system settings".to_string(),
            )),
            PermissionState::Unknown => Err(InfraError::PermissionDenied(
                "notification permission has not been granted".to_string(),
            )),
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, PermissionState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::PermissionDenied(format!("permission lock poisoned: {error}")))
    }
}
