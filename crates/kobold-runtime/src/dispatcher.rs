//! [`CommandDispatcher`] – the façade every caller goes through.
//!
//! One dispatcher owns one robot.  Each call to [`CommandDispatcher::apply`]
//! runs the same pipeline:
//!
//! 1. **Gate** – at most one command per robot may be in flight.  A second
//!    call while one is outstanding is rejected with [`KoboldError::Busy`];
//!    it is never queued.
//! 2. **Plan** – the [`RobotStateMachine`] validates the intent against the
//!    capability set of the last known state.  Rejected intents never reach
//!    the network.
//! 3. **Scope** – whole-home and zone starts on a dialect that scopes runs by
//!    floor-plan resolve the floor-plan once and cache it.  A failed lookup
//!    is logged and the run proceeds unscoped.
//! 4. **Act** – the adapter call is issued with the snapshot's eco and
//!    no-go settings baked in.
//! 5. **Commit** – on success the state machine commits optimistically; on
//!    failure the snapshot is left untouched and the error returned.  A
//!    refresh that changed the state while the request was in flight takes
//!    precedence and the commit is skipped, so only a refresh ever moves a
//!    robot out of `Error`.
//!
//! Refresh failures never block commands.  The last known capability set is
//! used and every [`DispatchOutcome`] is flagged `stale` until a refresh
//! succeeds again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kobold_kernel::{Command, RobotStateMachine};
use kobold_middleware::adapter::DEFAULT_NAVIGATION_MODE;
use kobold_middleware::{Backend, RobotBackend, SpotOptions, StartOptions};
use kobold_types::{
    ActionIntent, Capabilities, Dialect, DiscoveredRobot, KoboldError, Refresh, RobotIdentity,
    RobotSnapshot, Zone,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Delay after which a momentary switch should flip back to off.
pub const MOMENTARY_REVERT_DELAY: Duration = Duration::from_secs(1);

/// Result of a successfully applied intent.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub snapshot: RobotSnapshot,
    /// The most recent refresh failed; `snapshot` may lag the robot.
    pub stale: bool,
    /// Set for momentary intents.  The caller owns the revert timer.
    pub revert_after: Option<Duration>,
}

/// Serializes commands for one robot and keeps its snapshot current.
pub struct CommandDispatcher<B: RobotBackend = Backend> {
    backend: Arc<B>,
    identity: RobotIdentity,
    machine: Mutex<RobotStateMachine>,
    in_flight: Mutex<()>,
    stale: AtomicBool,
}

impl<B: RobotBackend> CommandDispatcher<B> {
    /// Take ownership of a discovered robot.  `backend` is shared by every
    /// robot listed through the same dialect.
    pub fn new(backend: Arc<B>, robot: DiscoveredRobot) -> Self {
        Self {
            backend,
            identity: robot.identity.clone(),
            machine: Mutex::new(RobotStateMachine::new(robot.identity, robot.snapshot)),
            in_flight: Mutex::new(()),
            stale: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &RobotIdentity {
        &self.identity
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub async fn snapshot(&self) -> RobotSnapshot {
        self.machine.lock().await.snapshot().clone()
    }

    pub async fn capabilities(&self) -> Capabilities {
        self.machine.lock().await.capabilities()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Validate and execute `intent`.
    ///
    /// # Errors
    ///
    /// - [`KoboldError::Busy`] – another command for this robot is in flight.
    /// - [`KoboldError::InvalidTransition`] / [`KoboldError::UnknownZone`] –
    ///   rejected locally, no request sent.
    /// - Any adapter error; the snapshot is left unchanged.
    #[instrument(
        skip(self, intent),
        fields(robot = %self.identity.id, intent = %intent.kind, correlation = %intent.id)
    )]
    pub async fn apply(&self, intent: ActionIntent) -> Result<DispatchOutcome, KoboldError> {
        let _gate = self
            .in_flight
            .try_lock()
            .map_err(|_| KoboldError::Busy(self.identity.id.clone()))?;

        let (command, snapshot) = {
            let machine = self.machine.lock().await;
            let command = machine.plan(&intent).inspect_err(|e| {
                info!(error = %e, "intent rejected");
            })?;
            (command, machine.snapshot().clone())
        };

        if !command.is_local() {
            self.execute(&command, &snapshot).await.inspect_err(|e| {
                warn!(error = %e, ?command, "vendor rejected command; state unchanged");
            })?;
        }

        let mut machine = self.machine.lock().await;
        if command.is_local() || machine.state() == snapshot.state {
            machine.commit(&command);
            info!(?command, state = %machine.state(), "command applied");
        } else {
            // A refresh landed while the request was out; its state wins.
            info!(
                ?command,
                planned = %snapshot.state,
                state = %machine.state(),
                "command sent; refreshed state kept"
            );
        }

        Ok(DispatchOutcome {
            snapshot: machine.snapshot().clone(),
            stale: self.is_stale(),
            revert_after: intent.kind.is_momentary().then_some(MOMENTARY_REVERT_DELAY),
        })
    }

    /// Pull a fresh status report from the vendor and merge it.
    ///
    /// HTTP 304 leaves the snapshot exactly as it was.
    ///
    /// # Errors
    ///
    /// Any adapter error.  The stale flag stays raised until a later refresh
    /// succeeds.
    #[instrument(skip(self), fields(robot = %self.identity.id))]
    pub async fn refresh(&self) -> Result<RobotSnapshot, KoboldError> {
        match self.backend.refresh(&self.identity).await {
            Ok(refresh) => {
                self.stale.store(false, Ordering::SeqCst);
                let mut machine = self.machine.lock().await;
                match refresh {
                    Refresh::Updated(report) => machine.merge(&report),
                    Refresh::NotModified => debug!("status not modified"),
                }
                Ok(machine.snapshot().clone())
            }
            Err(e) => {
                self.stale.store(true, Ordering::SeqCst);
                warn!(error = %e, "refresh failed; keeping last known state");
                Err(e)
            }
        }
    }

    /// Look up the robot's zones.  A failed or empty lookup leaves
    /// whole-home cleaning as the only option.
    #[instrument(skip(self), fields(robot = %self.identity.id))]
    pub async fn load_zones(&self) -> Vec<Zone> {
        match self.backend.floorplan(&self.identity).await {
            Ok(Some(floorplan)) => {
                let mut machine = self.machine.lock().await;
                machine.set_floorplan(floorplan);
                machine.snapshot().zones.clone()
            }
            Ok(None) => self.machine.lock().await.snapshot().zones.clone(),
            Err(e) => {
                warn!(error = %e, "zone lookup failed; whole-home cleaning only");
                self.machine.lock().await.snapshot().zones.clone()
            }
        }
    }

    /// Resolved floor-plan id, fetching it on first use.
    async fn floorplan_id(&self, snapshot: &RobotSnapshot) -> Option<String> {
        if let Some(id) = &snapshot.floorplan_id {
            return Some(id.clone());
        }
        match self.backend.floorplan(&self.identity).await {
            Ok(Some(floorplan)) => {
                let id = floorplan.id.clone();
                self.machine.lock().await.set_floorplan(floorplan);
                Some(id)
            }
            Ok(None) => {
                warn!("robot has no floor-plan; cleaning without map scope");
                None
            }
            Err(e) => {
                warn!(error = %e, "floor-plan lookup failed; cleaning without map scope");
                None
            }
        }
    }

    async fn start_options(&self, eco: bool, snapshot: &RobotSnapshot) -> StartOptions {
        let floorplan_id = if self.backend.scopes_runs_by_floorplan() {
            self.floorplan_id(snapshot).await
        } else {
            None
        };
        StartOptions {
            eco,
            navigation_mode: DEFAULT_NAVIGATION_MODE.to_string(),
            no_go_lines: snapshot.no_go_lines_enabled,
            floorplan_id,
        }
    }

    async fn execute(&self, command: &Command, snapshot: &RobotSnapshot) -> Result<(), KoboldError> {
        let robot = &self.identity;
        let backend = &self.backend;
        match command {
            Command::Start { eco } => {
                let options = self.start_options(*eco, snapshot).await;
                backend.start(robot, &options).await
            }
            Command::StartZone { zone_id, eco } => {
                let options = self.start_options(*eco, snapshot).await;
                backend.start_zone(robot, zone_id, &options).await
            }
            Command::StartSpot { area, eco } => {
                let options = SpotOptions {
                    eco: *eco,
                    area: *area,
                    navigation_mode: DEFAULT_NAVIGATION_MODE.to_string(),
                };
                backend.start_spot(robot, &options).await
            }
            Command::Pause => backend.pause(robot).await,
            Command::Resume => backend.resume(robot).await,
            Command::ReturnToBase => backend.return_to_base(robot).await,
            Command::SetSchedule(enabled) => backend.set_schedule(robot, *enabled).await,
            Command::Locate => backend.locate(robot).await,
            Command::EmptyBin => backend.empty_bin(robot).await,
            Command::SetEco(_) | Command::SetNoGoLines(_) => Ok(()),
        }
    }
}
