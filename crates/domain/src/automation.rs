//! Automation state: which script is loaded and where it is bound.
//!
//! There is exactly one automation slot per process. It is either disabled
//! or enabled on a single channel; the script and the last error travel with
//! it so observers can render the whole picture from one notification.

use serde::{Deserialize, Serialize};

use crate::error::ConflictError;
use crate::id::ChannelId;
use crate::log::LogEntry;

/// State pushed to observers on every change.
///
/// The log history is intentionally absent; logs travel on their own
/// subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationState {
    pub script: String,
    pub enabled: bool,
    pub active_channel_id: Option<ChannelId>,
    pub last_error: Option<String>,
}

impl AutomationState {
    /// A channel is bound only while automation is enabled.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.enabled || self.active_channel_id.is_none()
    }

    /// Whether automation is currently bound to `channel`.
    #[must_use]
    pub fn is_active_on(&self, channel: &ChannelId) -> bool {
        self.enabled && self.active_channel_id.as_ref() == Some(channel)
    }

    /// Require automation to be enabled on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::Disabled`] when automation is off and
    /// [`ConflictError::ActiveElsewhere`] when it is bound to another channel.
    pub fn ensure_active_on(&self, channel: &ChannelId) -> Result<(), ConflictError> {
        match (&self.active_channel_id, self.enabled) {
            (Some(active), true) if active == channel => Ok(()),
            (Some(active), true) => Err(ConflictError::ActiveElsewhere {
                active: active.clone(),
                requested: channel.clone(),
            }),
            _ => Err(ConflictError::Disabled),
        }
    }

    /// Require that enabling on `channel` would not steal another binding.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::AlreadyEnabled`] when automation is enabled
    /// on a different channel.
    pub fn ensure_free_for(&self, channel: &ChannelId) -> Result<(), ConflictError> {
        match &self.active_channel_id {
            Some(active) if self.enabled && active != channel => {
                Err(ConflictError::AlreadyEnabled {
                    active: active.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Read-only view handed to new observers: state plus the log history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSnapshot {
    #[serde(flatten)]
    pub state: AutomationState,
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    #[test]
    fn should_start_disabled_without_channel() {
        let state = AutomationState::default();
        assert!(!state.enabled);
        assert!(state.active_channel_id.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn should_flag_channel_bound_while_disabled_as_inconsistent() {
        let state = AutomationState {
            active_channel_id: Some(channel("rs485-1")),
            ..AutomationState::default()
        };
        assert!(!state.is_consistent());
    }

    #[test]
    fn should_report_active_only_on_bound_channel() {
        let state = AutomationState {
            enabled: true,
            active_channel_id: Some(channel("rs485-1")),
            ..AutomationState::default()
        };
        assert!(state.is_active_on(&channel("rs485-1")));
        assert!(!state.is_active_on(&channel("rs485-2")));
    }

    #[test]
    fn should_reject_guard_when_disabled() {
        let state = AutomationState::default();
        assert_eq!(
            state.ensure_active_on(&channel("rs485-1")),
            Err(ConflictError::Disabled)
        );
    }

    #[test]
    fn should_reject_guard_when_active_on_other_channel() {
        let state = AutomationState {
            enabled: true,
            active_channel_id: Some(channel("rs485-1")),
            ..AutomationState::default()
        };
        assert!(state.ensure_active_on(&channel("rs485-1")).is_ok());
        assert_eq!(
            state.ensure_active_on(&channel("rs485-2")),
            Err(ConflictError::ActiveElsewhere {
                active: channel("rs485-1"),
                requested: channel("rs485-2"),
            })
        );
    }

    #[test]
    fn should_allow_enable_on_same_channel_but_not_another() {
        let state = AutomationState {
            enabled: true,
            active_channel_id: Some(channel("rs485-1")),
            ..AutomationState::default()
        };
        assert!(state.ensure_free_for(&channel("rs485-1")).is_ok());
        assert!(matches!(
            state.ensure_free_for(&channel("rs485-2")),
            Err(ConflictError::AlreadyEnabled { .. })
        ));
        assert!(AutomationState::default().ensure_free_for(&channel("rs485-2")).is_ok());
    }

    #[test]
    fn should_flatten_state_into_snapshot_json() {
        let snapshot = AutomationSnapshot {
            state: AutomationState {
                script: "print(1)".to_string(),
                ..AutomationState::default()
            },
            logs: vec![],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["script"], "print(1)");
        assert_eq!(json["enabled"], false);
        assert!(json["logs"].as_array().unwrap().is_empty());
    }
}
