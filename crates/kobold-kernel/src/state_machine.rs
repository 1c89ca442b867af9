//! [`RobotStateMachine`] – single owner of a robot's [`RobotSnapshot`].
//!
//! Every mutation of a snapshot goes through this type, in one of three
//! ways:
//!
//! 1. [`RobotStateMachine::plan`] validates an [`ActionIntent`] against the
//!    capability set of the current state and resolves it into a
//!    [`Command`].  Planning never mutates anything; a rejected intent
//!    never reaches the network.
//! 2. [`RobotStateMachine::commit`] applies a [`Command`] optimistically
//!    once the vendor accepted it (or immediately, for local settings).
//! 3. [`RobotStateMachine::merge`] folds a vendor [`StatusReport`] in.
//!    Only fields the vendor actually reported are overwritten; locally
//!    owned settings (eco, no-go lines, zones, floor-plan) are never touched.
//!
//! # Example
//!
//! ```
//! use kobold_kernel::{Command, RobotStateMachine};
//! use kobold_types::{ActionIntent, RobotIdentity, RobotSnapshot, RobotState};
//!
//! let identity = RobotIdentity {
//!     id: "r1".into(),
//!     name: "Rosie".into(),
//!     serial: "SN-1".into(),
//!     model: "VR7".into(),
//! };
//! let mut machine = RobotStateMachine::new(identity, RobotSnapshot::default());
//!
//! // Idle robots cannot pause.
//! assert!(machine.plan(&ActionIntent::pause()).is_err());
//!
//! let command = machine.plan(&ActionIntent::start()).unwrap();
//! assert_eq!(command, Command::Start { eco: false });
//! machine.commit(&command);
//! assert_eq!(machine.state(), RobotState::Cleaning);
//! ```

use chrono::Utc;
use kobold_types::{
    ActionIntent, Capabilities, Floorplan, IntentKind, KoboldError, RobotIdentity, RobotSnapshot,
    RobotState, SpotArea, StatusReport,
};
use tracing::debug;

use crate::capability_manager::{capabilities_for, require};

/// A validated operation, ready to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { eco: bool },
    StartZone { zone_id: String, eco: bool },
    StartSpot { area: SpotArea, eco: bool },
    Pause,
    Resume,
    ReturnToBase,
    SetSchedule(bool),
    Locate,
    EmptyBin,
    /// Local setting; takes effect on the next start or resume.
    SetEco(bool),
    /// Local setting; takes effect on the next start or resume.
    SetNoGoLines(bool),
}

impl Command {
    /// `true` for commands that only change local settings and never issue
    /// a vendor request.
    pub fn is_local(&self) -> bool {
        matches!(self, Command::SetEco(_) | Command::SetNoGoLines(_))
    }
}

/// Holds one robot's identity and snapshot.
#[derive(Debug, Clone)]
pub struct RobotStateMachine {
    identity: RobotIdentity,
    snapshot: RobotSnapshot,
}

impl RobotStateMachine {
    pub fn new(identity: RobotIdentity, snapshot: RobotSnapshot) -> Self {
        Self { identity, snapshot }
    }

    pub fn identity(&self) -> &RobotIdentity {
        &self.identity
    }

    pub fn snapshot(&self) -> &RobotSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> RobotState {
        self.snapshot.state
    }

    /// Capability set derived from the current state.
    pub fn capabilities(&self) -> Capabilities {
        capabilities_for(self.snapshot.state)
    }

    /// Validate `intent` and resolve it into a [`Command`].
    ///
    /// A start or zone clean on a paused robot resumes the paused run.  The
    /// zone of a zone clean must still be known.  Start-class intents use the
    /// intent's eco override when present, the snapshot's eco setting
    /// otherwise.
    ///
    /// # Errors
    ///
    /// - [`KoboldError::InvalidTransition`] – the current state does not
    ///   allow the intent.
    /// - [`KoboldError::UnknownZone`] – a zone clean names a zone the
    ///   snapshot does not know.  Checked before the state.
    pub fn plan(&self, intent: &ActionIntent) -> Result<Command, KoboldError> {
        let state = self.snapshot.state;
        let caps = self.capabilities();
        let eco = intent.eco.unwrap_or(self.snapshot.eco_mode);

        let command = match intent.kind {
            IntentKind::Start if caps.can_resume => Command::Resume,
            IntentKind::Start => {
                require(caps.can_start, intent.kind, state)?;
                Command::Start { eco }
            }
            IntentKind::Pause => {
                require(caps.can_pause, intent.kind, state)?;
                Command::Pause
            }
            IntentKind::Resume => {
                require(caps.can_resume, intent.kind, state)?;
                Command::Resume
            }
            IntentKind::ReturnToBase => {
                require(caps.can_go_to_base, intent.kind, state)?;
                Command::ReturnToBase
            }
            IntentKind::SpotClean => {
                require(caps.can_start, intent.kind, state)?;
                Command::StartSpot {
                    area: intent.spot.unwrap_or_default(),
                    eco,
                }
            }
            IntentKind::ZoneClean => {
                let zone_id = intent.zone_id.clone().unwrap_or_default();
                if !self.snapshot.zones.iter().any(|z| z.id == zone_id) {
                    return Err(KoboldError::UnknownZone(zone_id));
                }
                if caps.can_resume {
                    Command::Resume
                } else {
                    require(caps.can_start, intent.kind, state)?;
                    Command::StartZone { zone_id, eco }
                }
            }
            IntentKind::Locate => Command::Locate,
            IntentKind::EmptyBin => Command::EmptyBin,
            IntentKind::ToggleEco => {
                Command::SetEco(intent.eco.unwrap_or(!self.snapshot.eco_mode))
            }
            IntentKind::ToggleNoGo => {
                Command::SetNoGoLines(intent.enabled.unwrap_or(!self.snapshot.no_go_lines_enabled))
            }
            IntentKind::SetSchedule => {
                Command::SetSchedule(intent.enabled.unwrap_or(!self.snapshot.schedule_enabled))
            }
        };

        debug!(robot = %self.identity.id, intent = %intent.kind, %state, ?command, "intent planned");
        Ok(command)
    }

    /// Apply `command` to the snapshot as if the vendor already carried it
    /// out.  The next refresh corrects any drift.
    pub fn commit(&mut self, command: &Command) {
        let snapshot = &mut self.snapshot;
        match command {
            Command::Start { .. }
            | Command::StartZone { .. }
            | Command::StartSpot { .. }
            | Command::Resume => {
                snapshot.state = RobotState::Cleaning;
                snapshot.is_docked = false;
                snapshot.is_charging = false;
            }
            Command::Pause => snapshot.state = RobotState::Paused,
            Command::ReturnToBase => snapshot.state = RobotState::Idle,
            Command::SetSchedule(enabled) => snapshot.schedule_enabled = *enabled,
            Command::SetEco(on) => snapshot.eco_mode = *on,
            Command::SetNoGoLines(on) => snapshot.no_go_lines_enabled = *on,
            Command::Locate | Command::EmptyBin => {}
        }
    }

    /// Fold a vendor status report into the snapshot.
    pub fn merge(&mut self, report: &StatusReport) {
        let snapshot = &mut self.snapshot;
        if let Some(state) = report.state {
            snapshot.state = state;
        }
        if let Some(battery) = report.battery_percent {
            snapshot.battery_percent = battery.min(100);
        }
        if let Some(docked) = report.is_docked {
            snapshot.is_docked = docked;
        }
        if let Some(charging) = report.is_charging {
            snapshot.is_charging = charging;
        }
        if let Some(schedule) = report.schedule_enabled {
            snapshot.schedule_enabled = schedule;
        }
        snapshot.refreshed_at = Some(Utc::now());
    }

    /// Cache a resolved floor-plan.  Its zones are adopted only when the
    /// snapshot has none yet.
    pub fn set_floorplan(&mut self, floorplan: Floorplan) {
        if self.snapshot.zones.is_empty() {
            self.snapshot.zones = floorplan.zones;
        }
        self.snapshot.floorplan_id = Some(floorplan.id);
    }
}
