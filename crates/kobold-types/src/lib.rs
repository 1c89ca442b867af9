use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Model string of the controlled product line.  Vendor listings are filtered
/// down to robots carrying this model before any snapshot is built.
pub const CONTROLLED_MODEL: &str = "VR7";

/// Immutable identity of a robot, captured once at discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotIdentity {
    /// Vendor product / robot identifier used in request paths.
    pub id: String,
    pub name: String,
    pub serial: String,
    pub model: String,
}

/// Normalized robot state shared by both vendor dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotState {
    #[default]
    Idle,
    Cleaning,
    Paused,
    /// Only an external refresh leaves this state.
    Error,
}

impl RobotState {
    pub const ALL: [RobotState; 4] = [
        RobotState::Idle,
        RobotState::Cleaning,
        RobotState::Paused,
        RobotState::Error,
    ];
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotState::Idle => write!(f, "idle"),
            RobotState::Cleaning => write!(f, "cleaning"),
            RobotState::Paused => write!(f, "paused"),
            RobotState::Error => write!(f, "error"),
        }
    }
}

/// The set of actions that are legal in the current [`RobotState`].
///
/// Never constructed by hand outside `kobold-kernel`; it is always derived
/// from a state so that it cannot drift out of sync with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_start: bool,
    pub can_pause: bool,
    pub can_resume: bool,
    pub can_go_to_base: bool,
}

/// A named cleaning zone on the robot's floor-plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// Floor-plan lookup result: the map identifier that scopes a cleaning run
/// and the zones defined on it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Floorplan {
    pub id: String,
    pub zones: Vec<Zone>,
}

/// Normalized, point-in-time view of a robot's state and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub state: RobotState,
    /// 0–100.
    pub battery_percent: u8,
    pub is_docked: bool,
    pub is_charging: bool,
    pub eco_mode: bool,
    pub no_go_lines_enabled: bool,
    pub schedule_enabled: bool,
    pub zones: Vec<Zone>,
    /// Resolved lazily on the first floor-plan scoped start and cached.
    pub floorplan_id: Option<String>,
    /// When the last vendor status report was merged, if ever.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Default for RobotSnapshot {
    fn default() -> Self {
        Self {
            state: RobotState::Idle,
            battery_percent: 100,
            is_docked: true,
            is_charging: false,
            eco_mode: false,
            no_go_lines_enabled: true,
            schedule_enabled: false,
            zones: Vec::new(),
            floorplan_id: None,
            refreshed_at: None,
        }
    }
}

/// Best-effort status parsed from a vendor payload.
///
/// Every field is optional: vendors omit fields freely and a missing field
/// must leave the corresponding snapshot value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: Option<RobotState>,
    pub battery_percent: Option<u8>,
    pub is_docked: Option<bool>,
    pub is_charging: Option<bool>,
    pub schedule_enabled: Option<bool>,
}

/// Outcome of a status refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Updated(StatusReport),
    /// The vendor answered HTTP 304: nothing changed since the last report.
    NotModified,
}

/// A robot returned by a vendor listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredRobot {
    pub identity: RobotIdentity,
    pub snapshot: RobotSnapshot,
}

/// The two vendor HTTP API variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Beehive / Orbital hosts, `Auth0Bearer` tokens, nested `runs[]` bodies.
    Orbital,
    /// Companion host, plain `Bearer` tokens, flat `{action, mode}` bodies.
    Companion,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Orbital => write!(f, "orbital"),
            Dialect::Companion => write!(f, "companion"),
        }
    }
}

/// What an [`ActionIntent`] asks the robot to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Start,
    Pause,
    Resume,
    ReturnToBase,
    SpotClean,
    ZoneClean,
    Locate,
    EmptyBin,
    ToggleEco,
    ToggleNoGo,
    SetSchedule,
}

impl IntentKind {
    pub const ALL: [IntentKind; 11] = [
        IntentKind::Start,
        IntentKind::Pause,
        IntentKind::Resume,
        IntentKind::ReturnToBase,
        IntentKind::SpotClean,
        IntentKind::ZoneClean,
        IntentKind::Locate,
        IntentKind::EmptyBin,
        IntentKind::ToggleEco,
        IntentKind::ToggleNoGo,
        IntentKind::SetSchedule,
    ];

    /// Intents surfaced as switches that should flip back to "off" shortly
    /// after being triggered.
    pub fn is_momentary(self) -> bool {
        matches!(
            self,
            IntentKind::Locate | IntentKind::EmptyBin | IntentKind::SpotClean | IntentKind::ZoneClean
        )
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntentKind::Start => "start",
            IntentKind::Pause => "pause",
            IntentKind::Resume => "resume",
            IntentKind::ReturnToBase => "return_to_base",
            IntentKind::SpotClean => "spot_clean",
            IntentKind::ZoneClean => "zone_clean",
            IntentKind::Locate => "locate",
            IntentKind::EmptyBin => "empty_bin",
            IntentKind::ToggleEco => "toggle_eco",
            IntentKind::ToggleNoGo => "toggle_no_go",
            IntentKind::SetSchedule => "set_schedule",
        };
        f.write_str(name)
    }
}

/// Spot-clean geometry in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotArea {
    pub width: u32,
    pub height: u32,
    pub repeat: u32,
}

impl Default for SpotArea {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            repeat: 1,
        }
    }
}

/// A requested operation, independent of vendor wire format.
///
/// Constructed per call and never persisted.  `id` only exists to correlate
/// log lines of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionIntent {
    pub id: Uuid,
    pub kind: IntentKind,
    /// Target zone for [`IntentKind::ZoneClean`].
    pub zone_id: Option<String>,
    /// For start-class intents: eco override for this run only.
    /// For [`IntentKind::ToggleEco`]: the new setting (`None` flips it).
    pub eco: Option<bool>,
    /// New value for [`IntentKind::ToggleNoGo`] (`None` flips it) and
    /// [`IntentKind::SetSchedule`].
    pub enabled: Option<bool>,
    pub spot: Option<SpotArea>,
}

impl ActionIntent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            zone_id: None,
            eco: None,
            enabled: None,
            spot: None,
        }
    }

    pub fn start() -> Self {
        Self::new(IntentKind::Start)
    }

    pub fn pause() -> Self {
        Self::new(IntentKind::Pause)
    }

    pub fn resume() -> Self {
        Self::new(IntentKind::Resume)
    }

    pub fn return_to_base() -> Self {
        Self::new(IntentKind::ReturnToBase)
    }

    pub fn spot_clean(area: SpotArea) -> Self {
        Self {
            spot: Some(area),
            ..Self::new(IntentKind::SpotClean)
        }
    }

    pub fn zone_clean(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            ..Self::new(IntentKind::ZoneClean)
        }
    }

    pub fn locate() -> Self {
        Self::new(IntentKind::Locate)
    }

    pub fn empty_bin() -> Self {
        Self::new(IntentKind::EmptyBin)
    }

    pub fn toggle_eco(on: bool) -> Self {
        Self {
            eco: Some(on),
            ..Self::new(IntentKind::ToggleEco)
        }
    }

    pub fn toggle_no_go(on: bool) -> Self {
        Self {
            enabled: Some(on),
            ..Self::new(IntentKind::ToggleNoGo)
        }
    }

    pub fn set_schedule(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::new(IntentKind::SetSchedule)
        }
    }

    /// Override the eco setting for this run only.
    pub fn with_eco(mut self, eco: bool) -> Self {
        self.eco = Some(eco);
        self
    }
}

/// Error type spanning transport failures, vendor rejections and local
/// validation failures.
#[derive(Error, Debug, Clone)]
pub enum KoboldError {
    /// Connection-level failure or timeout.  Always eligible for dialect
    /// fallback.
    #[error("Transport Error: {0}")]
    Transport(String),

    /// The vendor answered with a status outside `[200, 300)`.  `body` keeps
    /// whatever diagnostic payload came with it.
    #[error("API Error: HTTP {status}")]
    Api {
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// A 2xx answer whose body could not be decoded.
    #[error("Malformed vendor payload: {0}")]
    Parse(String),

    #[error("Invalid Transition: cannot {intent} while {state}")]
    InvalidTransition {
        intent: IntentKind,
        state: RobotState,
    },

    #[error("Unknown Zone: {0}")]
    UnknownZone(String),

    #[error("{operation} is not implemented by the {dialect} dialect")]
    NotImplemented {
        operation: &'static str,
        dialect: Dialect,
    },

    #[error("Robot {0} already has a command in flight")]
    Busy(String),

    #[error("Robot {0} not found in vendor listing")]
    RobotNotFound(String),

    #[error("No backend dialects configured")]
    NoBackends,
}

impl KoboldError {
    /// `true` for failures that never reached the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            KoboldError::InvalidTransition { .. }
                | KoboldError::UnknownZone(_)
                | KoboldError::NotImplemented { .. }
                | KoboldError::Busy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_matches_fresh_robot() {
        let snap = RobotSnapshot::default();
        assert_eq!(snap.state, RobotState::Idle);
        assert_eq!(snap.battery_percent, 100);
        assert!(snap.is_docked);
        assert!(!snap.eco_mode);
        assert!(snap.no_go_lines_enabled);
        assert!(snap.floorplan_id.is_none());
        assert!(snap.refreshed_at.is_none());
    }

    #[test]
    fn momentary_intents() {
        let momentary: Vec<IntentKind> = IntentKind::ALL
            .into_iter()
            .filter(|k| k.is_momentary())
            .collect();
        assert_eq!(
            momentary,
            vec![
                IntentKind::SpotClean,
                IntentKind::ZoneClean,
                IntentKind::Locate,
                IntentKind::EmptyBin
            ]
        );
    }

    #[test]
    fn intent_constructors_fill_their_fields() {
        let zone = ActionIntent::zone_clean("kitchen");
        assert_eq!(zone.kind, IntentKind::ZoneClean);
        assert_eq!(zone.zone_id.as_deref(), Some("kitchen"));

        let eco = ActionIntent::toggle_eco(true);
        assert_eq!(eco.eco, Some(true));

        let start = ActionIntent::start().with_eco(true);
        assert_eq!(start.kind, IntentKind::Start);
        assert_eq!(start.eco, Some(true));

        // Every intent gets its own correlation id.
        assert_ne!(ActionIntent::start().id, ActionIntent::start().id);
    }

    #[test]
    fn dialect_serializes_lowercase() {
        let json = serde_json::to_string(&Dialect::Companion).unwrap();
        assert_eq!(json, "\"companion\"");
        let back: Dialect = serde_json::from_str("\"orbital\"").unwrap();
        assert_eq!(back, Dialect::Orbital);
    }

    #[test]
    fn kobold_error_display() {
        let err = KoboldError::InvalidTransition {
            intent: IntentKind::Pause,
            state: RobotState::Idle,
        };
        assert_eq!(err.to_string(), "Invalid Transition: cannot pause while idle");
        assert!(err.is_local());

        let api = KoboldError::Api {
            status: 503,
            body: Some(serde_json::json!({"message": "maintenance"})),
        };
        assert!(api.to_string().contains("503"));
        assert!(!api.is_local());

        let ni = KoboldError::NotImplemented {
            operation: "set_schedule",
            dialect: Dialect::Orbital,
        };
        assert!(ni.to_string().contains("orbital"));
    }
}
