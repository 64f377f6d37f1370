// ── Domain model ──
//
// The state snapshot published for one switch. Serializes to the flat
// mapping presentation layers consume:
// `input_count`, `source_list`, `source_selected`, `state`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Selected source reported while disconnected.
pub const DEFAULT_SELECTED_SOURCE: &str = "0";

/// Whether a live session with the device exists. Rendered as `on` / `off`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ConnectionState {
    #[default]
    #[serde(rename = "off")]
    #[strum(serialize = "off")]
    Disconnected,
    #[serde(rename = "on")]
    #[strum(serialize = "on")]
    Connected,
}

/// Snapshot of one switch.
///
/// Source identifiers are strings (`"0"`..=`input_count`) for the benefit
/// of presentation layers; the device itself is addressed by integer index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub input_count: u32,
    pub source_list: Arc<[String]>,
    #[serde(rename = "source_selected")]
    pub selected_source: String,
    #[serde(rename = "state")]
    pub connection_state: ConnectionState,
}

impl DeviceState {
    /// The sentinel snapshot: no inputs, no sources, source `"0"`, off.
    pub fn disconnected() -> Self {
        Self {
            input_count: 0,
            source_list: Arc::from([]),
            selected_source: DEFAULT_SELECTED_SOURCE.to_owned(),
            connection_state: ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Source identifiers for a device with `input_count` inputs,
    /// `"0"` through `"{input_count}"` inclusive.
    pub fn source_list_for(input_count: u32) -> Arc<[String]> {
        (0..=input_count).map(|i| i.to_string()).collect()
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn disconnected_default_is_the_sentinel() {
        let state = DeviceState::default();
        assert_eq!(state.input_count, 0);
        assert!(state.source_list.is_empty());
        assert_eq!(state.selected_source, "0");
        assert_eq!(state.connection_state, ConnectionState::Disconnected);
        assert!(!state.is_connected());
    }

    #[test]
    fn source_list_is_inclusive() {
        assert_eq!(&*DeviceState::source_list_for(3), ["0", "1", "2", "3"]);
        assert_eq!(&*DeviceState::source_list_for(0), ["0"]);
    }

    #[test]
    fn serializes_to_publication_mapping() {
        let state = DeviceState {
            input_count: 2,
            source_list: DeviceState::source_list_for(2),
            selected_source: "1".into(),
            connection_state: ConnectionState::Connected,
        };

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({
                "input_count": 2,
                "source_list": ["0", "1", "2"],
                "source_selected": "1",
                "state": "on",
            })
        );
    }

    #[test]
    fn connection_state_displays_as_on_off() {
        assert_eq!(ConnectionState::Connected.to_string(), "on");
        assert_eq!(ConnectionState::Disconnected.to_string(), "off");
        assert_eq!(
            "on".parse::<ConnectionState>().unwrap(),
            ConnectionState::Connected
        );
    }
}
