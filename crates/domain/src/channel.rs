//! Channel: one addressable communication line and the events it emits.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::ChannelId;

/// Baud rate applied when an open request does not specify one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Line settings used when opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl ChannelConfig {
    /// Default line settings with the given baud rate.
    #[must_use]
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroBaudRate`] when `baud_rate` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.baud_rate == 0 {
            return Err(ValidationError::ZeroBaudRate);
        }
        Ok(())
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("unsupported data bits: {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("unsupported stop bits: {other}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// Registry view of a configured channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub path: String,
    pub open: bool,
}

/// Something that happened on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One decoded inbound line (delimiter stripped).
    Data(Vec<u8>),
    Open,
    Close,
    Error(String),
    Baud(u32),
}

impl ChannelEvent {
    #[must_use]
    pub fn kind(&self) -> ChannelEventKind {
        match self {
            Self::Data(_) => ChannelEventKind::Data,
            Self::Open => ChannelEventKind::Open,
            Self::Close => ChannelEventKind::Close,
            Self::Error(_) => ChannelEventKind::Error,
            Self::Baud(_) => ChannelEventKind::Baud,
        }
    }

    /// JSON payload relayed to live observers for this event.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Data(bytes) => {
                serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            Self::Open | Self::Close => serde_json::json!({}),
            Self::Error(message) => serde_json::Value::String(message.clone()),
            Self::Baud(baud_rate) => serde_json::json!({ "baud_rate": baud_rate }),
        }
    }
}

/// Discriminant of [`ChannelEvent`], used to select a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelEventKind {
    Data,
    Open,
    Close,
    Error,
    Baud,
}

impl ChannelEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Open => "open",
            Self::Close => "close",
            Self::Error => "error",
            Self::Baud => "baud",
        }
    }
}

impl std::fmt::Display for ChannelEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_9600_8n1() {
        let config = ChannelConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
    }

    #[test]
    fn should_reject_zero_baud_rate() {
        let config = ChannelConfig::with_baud_rate(0);
        assert_eq!(config.validate(), Err(ValidationError::ZeroBaudRate));
    }

    #[test]
    fn should_deserialize_partial_config_with_defaults() {
        let config: ChannelConfig =
            serde_json::from_value(serde_json::json!({"baud_rate": 115_200, "parity": "even"}))
                .unwrap();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.data_bits, DataBits::Eight);
    }

    #[test]
    fn should_reject_unsupported_data_bits() {
        let result: Result<ChannelConfig, _> =
            serde_json::from_value(serde_json::json!({"data_bits": 9}));
        assert!(result.is_err());
    }

    #[test]
    fn should_map_event_to_kind() {
        assert_eq!(
            ChannelEvent::Data(b"x".to_vec()).kind(),
            ChannelEventKind::Data
        );
        assert_eq!(ChannelEvent::Baud(9600).kind(), ChannelEventKind::Baud);
        assert_eq!(ChannelEventKind::Close.to_string(), "close");
    }

    #[test]
    fn should_render_data_payload_as_text() {
        let event = ChannelEvent::Data(b"PING".to_vec());
        assert_eq!(event.payload(), serde_json::json!("PING"));
    }
}
