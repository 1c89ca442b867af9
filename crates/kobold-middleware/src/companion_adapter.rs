//! Companion dialect adapter.
//!
//! [`CompanionAdapter`] speaks the Companion vendor API:
//!
//! * **Auth** – plain `Authorization: Bearer <token>`.
//! * **Host** – a single host; every path lives under `/api/v1`.
//! * **Discovery and status** – `GET /profile/products`.  The endpoint is
//!   account-wide, so unrelated appliances are dropped before any snapshot is
//!   built.  A refresh answered with HTTP 304 means "unchanged".
//! * **Commands** – `POST /products/{id}/commands` with a flat
//!   `{action, mode, ...}` body.

use async_trait::async_trait;
use kobold_types::{
    CONTROLLED_MODEL, Dialect, DiscoveredRobot, KoboldError, Refresh, RobotIdentity, RobotState,
    StatusReport,
};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::adapter::{RobotBackend, SpotOptions, StartOptions};
use crate::payload::{bool_field, id_field, initial_snapshot, percent_field, str_field};
use crate::transport::{Payload, Transport, auth_headers};

pub const COMPANION_URL: &str = "https://api-2-prod.companion.kobold.vorwerk.com";

const API_PATH: &str = "/api/v1";
const ACCEPT: &str = "application/json";
const USER_AGENT: &str = "MyKobold/1.0";

/// Spot widths at or above this size request the large spot pattern.
const LARGE_SPOT_WIDTH: u32 = 400;

/// Map a Companion state string onto the normalized [`RobotState`].
///
/// Unrecognized strings map to [`RobotState::Idle`].
pub fn normalize_state(raw: &str) -> RobotState {
    match raw {
        "idle" | "ready" => RobotState::Idle,
        "cleaning" | "busy" => RobotState::Cleaning,
        "paused" => RobotState::Paused,
        "error" => RobotState::Error,
        other => {
            debug!(state = other, "unrecognized companion state; treating as idle");
            RobotState::Idle
        }
    }
}

fn cleaning_mode(eco: bool) -> &'static str {
    if eco { "eco" } else { "turbo" }
}

/// Adapter for the Companion dialect.
pub struct CompanionAdapter {
    transport: Transport,
    token: String,
    base_url: String,
}

impl CompanionAdapter {
    /// Create an adapter against the production Companion host.
    pub fn new(transport: Transport, token: impl Into<String>) -> Self {
        Self::with_base_url(transport, token, COMPANION_URL)
    }

    pub fn with_base_url(
        transport: Transport,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token: token.into(),
            base_url: base_url.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, KoboldError> {
        auth_headers("Bearer", &self.token, ACCEPT, USER_AGENT)
    }

    async fn products(&self) -> Result<Payload, KoboldError> {
        let (_, payload) = self
            .transport
            .send(
                &self.base_url,
                Method::GET,
                &format!("{API_PATH}/profile/products"),
                &self.headers()?,
                None,
            )
            .await?;
        Ok(payload)
    }

    #[instrument(skip(self, robot, command), fields(robot = %robot.id))]
    async fn send_command(&self, robot: &RobotIdentity, command: Value) -> Result<(), KoboldError> {
        self.transport
            .send(
                &self.base_url,
                Method::POST,
                &format!("{API_PATH}/products/{}/commands", robot.id),
                &self.headers()?,
                Some(&command),
            )
            .await
            .map(|_| ())
    }

    fn is_controlled(product: &Value) -> bool {
        product.get("productType").and_then(Value::as_str) == Some(CONTROLLED_MODEL)
            || product
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| id.contains(CONTROLLED_MODEL))
    }

    fn parse_status(product: &Value) -> StatusReport {
        let Some(status) = product.get("status") else {
            return StatusReport::default();
        };
        StatusReport {
            state: status.get("state").and_then(Value::as_str).map(normalize_state),
            battery_percent: percent_field(status, "battery"),
            is_docked: bool_field(status, "isDocked"),
            is_charging: bool_field(status, "isCharging"),
            schedule_enabled: bool_field(status, "isScheduleEnabled"),
        }
    }

    fn parse_product(product: &Value) -> Option<DiscoveredRobot> {
        let id = id_field(product, &["id"])?;
        let identity = RobotIdentity {
            name: str_field(product, &["name", "nickname"])
                .unwrap_or(CONTROLLED_MODEL)
                .to_string(),
            serial: str_field(product, &["serialNumber", "serial"])
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            model: CONTROLLED_MODEL.to_string(),
            id,
        };
        Some(DiscoveredRobot {
            identity,
            snapshot: initial_snapshot(Self::parse_status(product)),
        })
    }

    fn start_command(options: &StartOptions, zone_id: Option<&str>) -> Value {
        let mut command = Map::new();
        command.insert("action".into(), json!("start"));
        command.insert("mode".into(), json!(cleaning_mode(options.eco)));
        command.insert("useNoGoLines".into(), json!(options.no_go_lines));
        if let Some(zone_id) = zone_id {
            command.insert("zoneId".into(), json!(zone_id));
        }
        Value::Object(command)
    }
}

#[async_trait]
impl RobotBackend for CompanionAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Companion
    }

    #[instrument(skip(self), fields(dialect = "companion"))]
    async fn list_robots(&self) -> Result<Vec<DiscoveredRobot>, KoboldError> {
        let Some(Value::Array(products)) = self.products().await?.into_json() else {
            return Ok(Vec::new());
        };
        Ok(products
            .iter()
            .filter(|p| Self::is_controlled(p))
            .filter_map(Self::parse_product)
            .collect())
    }

    #[instrument(skip(self, robot), fields(robot = %robot.id))]
    async fn refresh(&self, robot: &RobotIdentity) -> Result<Refresh, KoboldError> {
        let products = match self.products().await? {
            Payload::NotModified => return Ok(Refresh::NotModified),
            Payload::Json(Value::Array(products)) => products,
            Payload::Json(_) | Payload::Empty => {
                return Err(KoboldError::Parse("expected a product array".into()));
            }
        };
        let product = products
            .iter()
            .find(|p| {
                p.get("id").and_then(Value::as_str) == Some(robot.id.as_str())
                    || p.get("serialNumber").and_then(Value::as_str) == Some(robot.serial.as_str())
            })
            .ok_or_else(|| KoboldError::RobotNotFound(robot.id.clone()))?;
        Ok(Refresh::Updated(Self::parse_status(product)))
    }

    async fn start(&self, robot: &RobotIdentity, options: &StartOptions) -> Result<(), KoboldError> {
        self.send_command(robot, Self::start_command(options, None)).await
    }

    async fn start_zone(
        &self,
        robot: &RobotIdentity,
        zone_id: &str,
        options: &StartOptions,
    ) -> Result<(), KoboldError> {
        self.send_command(robot, Self::start_command(options, Some(zone_id)))
            .await
    }

    async fn start_spot(&self, robot: &RobotIdentity, options: &SpotOptions) -> Result<(), KoboldError> {
        let spot_size = if options.area.width >= LARGE_SPOT_WIDTH {
            "large"
        } else {
            "small"
        };
        self.send_command(
            robot,
            json!({
                "action": "spotClean",
                "mode": cleaning_mode(options.eco),
                "spotSize": spot_size,
                "repeat": options.area.repeat,
            }),
        )
        .await
    }

    async fn pause(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_command(robot, json!({"action": "pause"})).await
    }

    async fn resume(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_command(robot, json!({"action": "resume"})).await
    }

    async fn return_to_base(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_command(robot, json!({"action": "returnToDock"})).await
    }

    async fn set_schedule(&self, robot: &RobotIdentity, enabled: bool) -> Result<(), KoboldError> {
        let action = if enabled {
            "enableSchedule"
        } else {
            "disableSchedule"
        };
        self.send_command(robot, json!({ "action": action })).await
    }

    async fn locate(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_command(robot, json!({"action": "findMe"})).await
    }

    async fn empty_bin(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_command(robot, json!({"action": "emptyDustbin"})).await
    }
}
