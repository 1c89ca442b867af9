//! The backend adapter contract.
//!
//! Kobold never speaks to a vendor host directly.  The dispatcher talks to a
//! [`RobotBackend`], and each dialect implements that contract in its own
//! wire vocabulary:
//!
//! - [`OrbitalAdapter`][crate::orbital_adapter::OrbitalAdapter] – Beehive /
//!   Orbital hosts, `Auth0Bearer` tokens, nested `runs[]` command bodies.
//! - [`CompanionAdapter`][crate::companion_adapter::CompanionAdapter] – the
//!   Companion host, `Bearer` tokens, flat `{action, mode}` command bodies.
//!
//! [`Backend`] is the tagged union of both, chosen once at discovery time by
//! the [`BackendSelector`][crate::selector::BackendSelector].

use async_trait::async_trait;
use kobold_types::{
    Dialect, DiscoveredRobot, Floorplan, KoboldError, Refresh, RobotIdentity, SpotArea,
};

use crate::companion_adapter::CompanionAdapter;
use crate::orbital_adapter::OrbitalAdapter;

pub const DEFAULT_NAVIGATION_MODE: &str = "normal";

/// Settings baked into a whole-home or zone cleaning start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    pub eco: bool,
    pub navigation_mode: String,
    pub no_go_lines: bool,
    /// Floor-plan that scopes the run.  `None` cleans without map scoping.
    pub floorplan_id: Option<String>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            eco: false,
            navigation_mode: DEFAULT_NAVIGATION_MODE.to_string(),
            no_go_lines: true,
            floorplan_id: None,
        }
    }
}

/// Settings baked into a spot-cleaning start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotOptions {
    pub eco: bool,
    pub area: SpotArea,
    pub navigation_mode: String,
}

impl Default for SpotOptions {
    fn default() -> Self {
        Self {
            eco: false,
            area: SpotArea::default(),
            navigation_mode: DEFAULT_NAVIGATION_MODE.to_string(),
        }
    }
}

/// Every vendor dialect must implement this trait.
///
/// # Contract
///
/// * Adapters are stateless with respect to robots: every call receives the
///   [`RobotIdentity`] it acts on and returns fresh data.
/// * `list_robots` returns only robots of the controlled product line.
/// * `refresh` returns [`Refresh::NotModified`] when the vendor reports no
///   change; unknown vendor state strings normalize to `Idle`.
/// * Unsupported operations fail fast with [`KoboldError::NotImplemented`]
///   without sending a request.
#[async_trait]
pub trait RobotBackend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Whether cleaning runs should carry a floor-plan identifier.  When
    /// `true` the dispatcher resolves one through [`RobotBackend::floorplan`]
    /// before the first start.
    fn scopes_runs_by_floorplan(&self) -> bool {
        false
    }

    async fn list_robots(&self) -> Result<Vec<DiscoveredRobot>, KoboldError>;

    async fn refresh(&self, robot: &RobotIdentity) -> Result<Refresh, KoboldError>;

    /// Look up the robot's floor-plan.  `Ok(None)` when the robot has none.
    async fn floorplan(&self, _robot: &RobotIdentity) -> Result<Option<Floorplan>, KoboldError> {
        Ok(None)
    }

    async fn start(&self, robot: &RobotIdentity, options: &StartOptions) -> Result<(), KoboldError>;

    async fn start_zone(
        &self,
        robot: &RobotIdentity,
        zone_id: &str,
        options: &StartOptions,
    ) -> Result<(), KoboldError>;

    async fn start_spot(&self, robot: &RobotIdentity, options: &SpotOptions) -> Result<(), KoboldError>;

    async fn pause(&self, robot: &RobotIdentity) -> Result<(), KoboldError>;

    async fn resume(&self, robot: &RobotIdentity) -> Result<(), KoboldError>;

    async fn return_to_base(&self, robot: &RobotIdentity) -> Result<(), KoboldError>;

    async fn set_schedule(&self, robot: &RobotIdentity, enabled: bool) -> Result<(), KoboldError>;

    /// Make the robot play its "find me" sound.
    async fn locate(&self, robot: &RobotIdentity) -> Result<(), KoboldError>;

    async fn empty_bin(&self, robot: &RobotIdentity) -> Result<(), KoboldError>;
}

/// Tagged union of the two dialect adapters.
pub enum Backend {
    Orbital(OrbitalAdapter),
    Companion(CompanionAdapter),
}

impl Backend {
    fn inner(&self) -> &dyn RobotBackend {
        match self {
            Backend::Orbital(adapter) => adapter,
            Backend::Companion(adapter) => adapter,
        }
    }
}

#[async_trait]
impl RobotBackend for Backend {
    fn dialect(&self) -> Dialect {
        self.inner().dialect()
    }

    fn scopes_runs_by_floorplan(&self) -> bool {
        self.inner().scopes_runs_by_floorplan()
    }

    async fn list_robots(&self) -> Result<Vec<DiscoveredRobot>, KoboldError> {
        self.inner().list_robots().await
    }

    async fn refresh(&self, robot: &RobotIdentity) -> Result<Refresh, KoboldError> {
        self.inner().refresh(robot).await
    }

    async fn floorplan(&self, robot: &RobotIdentity) -> Result<Option<Floorplan>, KoboldError> {
        self.inner().floorplan(robot).await
    }

    async fn start(&self, robot: &RobotIdentity, options: &StartOptions) -> Result<(), KoboldError> {
        self.inner().start(robot, options).await
    }

    async fn start_zone(
        &self,
        robot: &RobotIdentity,
        zone_id: &str,
        options: &StartOptions,
    ) -> Result<(), KoboldError> {
        self.inner().start_zone(robot, zone_id, options).await
    }

    async fn start_spot(&self, robot: &RobotIdentity, options: &SpotOptions) -> Result<(), KoboldError> {
        self.inner().start_spot(robot, options).await
    }

    async fn pause(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.inner().pause(robot).await
    }

    async fn resume(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.inner().resume(robot).await
    }

    async fn return_to_base(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.inner().return_to_base(robot).await
    }

    async fn set_schedule(&self, robot: &RobotIdentity, enabled: bool) -> Result<(), KoboldError> {
        self.inner().set_schedule(robot, enabled).await
    }

    async fn locate(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.inner().locate(robot).await
    }

    async fn empty_bin(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.inner().empty_bin(robot).await
    }
}
