//! Orbital dialect adapter.
//!
//! [`OrbitalAdapter`] speaks the Beehive / Orbital vendor API:
//!
//! * **Auth** – `Authorization: Auth0Bearer <token>` with the versioned
//!   `application/vnd.neato.orbital-http.v1+json` accept type.
//! * **Discovery** – `GET /users/me/robots`, first on the Beehive host and,
//!   should that fail, on the Orbital host.
//! * **Status** – `GET /robots/{id}/features` on the Orbital host.
//! * **Cleaning runs** – `POST /robots/{id}/cleaning/v2` with a nested
//!   `runs[].map` / `runs[].settings` body.  Runs are scoped by a floor-plan
//!   which the dispatcher resolves lazily through [`RobotBackend::floorplan`].
//! * **State actions** – `POST /robots/{id}/state` with `{action}`.
//!
//! Schedule control is not available in this dialect and fails fast.

use async_trait::async_trait;
use kobold_types::{
    CONTROLLED_MODEL, Dialect, DiscoveredRobot, Floorplan, KoboldError, Refresh, RobotIdentity,
    RobotState, StatusReport,
};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::adapter::{RobotBackend, SpotOptions, StartOptions};
use crate::payload::{bool_field, id_field, initial_snapshot, percent_field, str_field, zones_field};
use crate::transport::{Payload, Transport, auth_headers};

pub const BEEHIVE_URL: &str = "https://beehive.ksecosys.com";
pub const ORBITAL_URL: &str = "https://orbital.ksecosys.com";

const ACCEPT: &str = "application/vnd.neato.orbital-http.v1+json";
const USER_AGENT: &str = "MyKobold/3.12.0";
const ROBOTS_PATH: &str = "/users/me/robots";

/// Map an Orbital state string onto the normalized [`RobotState`].
///
/// Unrecognized strings map to [`RobotState::Idle`] so that a firmware
/// vocabulary change never blocks control actions.
pub fn normalize_state(raw: &str) -> RobotState {
    match raw {
        "idle" | "ready" => RobotState::Idle,
        "cleaning" | "busy" => RobotState::Cleaning,
        "paused" | "stopped" => RobotState::Paused,
        "error" => RobotState::Error,
        other => {
            debug!(state = other, "unrecognized orbital state; treating as idle");
            RobotState::Idle
        }
    }
}

/// Older robot listings report the state as a numeric code.
fn state_from_code(code: u64) -> RobotState {
    match code {
        2 => RobotState::Cleaning,
        3 => RobotState::Paused,
        4 => RobotState::Error,
        _ => RobotState::Idle,
    }
}

fn state_field(value: &Value) -> Option<RobotState> {
    match value.get("state")? {
        Value::String(s) => Some(normalize_state(s)),
        Value::Number(n) => n.as_u64().map(state_from_code),
        _ => None,
    }
}

fn cleaning_mode(eco: bool) -> &'static str {
    if eco { "eco" } else { "auto" }
}

/// Adapter for the Orbital dialect.
pub struct OrbitalAdapter {
    transport: Transport,
    token: String,
    beehive_url: String,
    orbital_url: String,
}

impl OrbitalAdapter {
    /// Create an adapter against the production Beehive / Orbital hosts.
    pub fn new(transport: Transport, token: impl Into<String>) -> Self {
        Self::with_hosts(transport, token, BEEHIVE_URL, ORBITAL_URL)
    }

    /// Create an adapter against explicit hosts.  `beehive_url` is only used
    /// for discovery; everything else goes to `orbital_url`.
    pub fn with_hosts(
        transport: Transport,
        token: impl Into<String>,
        beehive_url: impl Into<String>,
        orbital_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token: token.into(),
            beehive_url: beehive_url.into(),
            orbital_url: orbital_url.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, KoboldError> {
        auth_headers("Auth0Bearer", &self.token, ACCEPT, USER_AGENT)
    }

    async fn get(&self, base_url: &str, path: &str) -> Result<Payload, KoboldError> {
        let (_, payload) = self
            .transport
            .send(base_url, Method::GET, path, &self.headers()?, None)
            .await?;
        Ok(payload)
    }

    async fn post(&self, path: &str, body: Value) -> Result<(), KoboldError> {
        self.transport
            .send(&self.orbital_url, Method::POST, path, &self.headers()?, Some(&body))
            .await
            .map(|_| ())
    }

    async fn send_run(&self, robot: &RobotIdentity, run: Value) -> Result<(), KoboldError> {
        self.post(
            &format!("/robots/{}/cleaning/v2", robot.id),
            json!({ "runs": [run] }),
        )
        .await
    }

    async fn send_state_action(&self, robot: &RobotIdentity, action: &str) -> Result<(), KoboldError> {
        self.post(&format!("/robots/{}/state", robot.id), json!({ "action": action }))
            .await
    }

    fn is_controlled(entry: &Value) -> bool {
        entry.get("model").and_then(Value::as_str) == Some(CONTROLLED_MODEL)
            || entry.get("productId").and_then(Value::as_str) == Some(CONTROLLED_MODEL)
    }

    fn parse_robot(entry: &Value) -> Option<DiscoveredRobot> {
        let id = id_field(entry, &["id", "robotId"])?;
        let details = entry.get("details").cloned().unwrap_or(Value::Null);
        let identity = RobotIdentity {
            name: str_field(entry, &["name", "nickname"])
                .unwrap_or(CONTROLLED_MODEL)
                .to_string(),
            serial: str_field(entry, &["serial", "serialNo"])
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            model: CONTROLLED_MODEL.to_string(),
            id,
        };
        let schedules = entry
            .get("availableSchedules")
            .and_then(Value::as_array)
            .map(|s| !s.is_empty());
        let report = StatusReport {
            state: state_field(entry),
            battery_percent: percent_field(&details, "charge"),
            is_docked: bool_field(&details, "isDocked"),
            is_charging: bool_field(&details, "isCharging"),
            schedule_enabled: schedules,
        };
        Some(DiscoveredRobot {
            identity,
            snapshot: initial_snapshot(report),
        })
    }

    fn parse_robots(payload: Payload) -> Vec<DiscoveredRobot> {
        let Some(Value::Array(entries)) = payload.into_json() else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| Self::is_controlled(e))
            .filter_map(Self::parse_robot)
            .collect()
    }

    /// Flat `features` fields, with the nested `details.*` shape accepted as a
    /// fallback.
    fn parse_features(features: &Value) -> StatusReport {
        let details = features.get("details").cloned().unwrap_or(Value::Null);
        StatusReport {
            state: state_field(features),
            battery_percent: percent_field(features, "battery")
                .or_else(|| percent_field(&details, "charge")),
            is_docked: bool_field(features, "isDocked").or_else(|| bool_field(&details, "isDocked")),
            is_charging: bool_field(features, "isCharging")
                .or_else(|| bool_field(&details, "isCharging")),
            schedule_enabled: None,
        }
    }
}

#[async_trait]
impl RobotBackend for OrbitalAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Orbital
    }

    fn scopes_runs_by_floorplan(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(dialect = "orbital"))]
    async fn list_robots(&self) -> Result<Vec<DiscoveredRobot>, KoboldError> {
        let payload = match self.get(&self.beehive_url, ROBOTS_PATH).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "beehive host failed; falling back to orbital host");
                self.get(&self.orbital_url, ROBOTS_PATH).await?
            }
        };
        Ok(Self::parse_robots(payload))
    }

    #[instrument(skip(self, robot), fields(robot = %robot.id))]
    async fn refresh(&self, robot: &RobotIdentity) -> Result<Refresh, KoboldError> {
        let payload = self
            .get(&self.orbital_url, &format!("/robots/{}/features", robot.id))
            .await?;
        Ok(match payload {
            Payload::NotModified => Refresh::NotModified,
            Payload::Empty => Refresh::Updated(StatusReport::default()),
            Payload::Json(features) => Refresh::Updated(Self::parse_features(&features)),
        })
    }

    #[instrument(skip(self, robot), fields(robot = %robot.id))]
    async fn floorplan(&self, robot: &RobotIdentity) -> Result<Option<Floorplan>, KoboldError> {
        let payload = self
            .get(&self.orbital_url, &format!("/robots/{}/floorplans", robot.id))
            .await?;
        let Some(Value::Array(plans)) = payload.into_json() else {
            return Ok(None);
        };
        Ok(plans.first().and_then(|plan| {
            Some(Floorplan {
                id: id_field(plan, &["uuid", "id"])?,
                zones: zones_field(plan, "zones"),
            })
        }))
    }

    async fn start(&self, robot: &RobotIdentity, options: &StartOptions) -> Result<(), KoboldError> {
        self.send_run(
            robot,
            json!({
                "map": {
                    "floorplan_uuid": options.floorplan_id,
                    "zone_uuid": null,
                    "nogo_enabled": options.no_go_lines,
                },
                "settings": {
                    "mode": cleaning_mode(options.eco),
                    "navigation_mode": options.navigation_mode,
                },
            }),
        )
        .await
    }

    async fn start_zone(
        &self,
        robot: &RobotIdentity,
        zone_id: &str,
        options: &StartOptions,
    ) -> Result<(), KoboldError> {
        self.send_run(
            robot,
            json!({
                "map": {
                    "floorplan_uuid": options.floorplan_id,
                    "zone_uuid": zone_id,
                    "nogo_enabled": options.no_go_lines,
                },
                "settings": {
                    "mode": cleaning_mode(options.eco),
                    "navigation_mode": options.navigation_mode,
                },
            }),
        )
        .await
    }

    async fn start_spot(&self, robot: &RobotIdentity, options: &SpotOptions) -> Result<(), KoboldError> {
        self.send_run(
            robot,
            json!({
                "map": {
                    "zone_uuid": null,
                    "spot_cleaning": {
                        "width": options.area.width,
                        "height": options.area.height,
                    },
                },
                "settings": {
                    "mode": cleaning_mode(options.eco),
                    "navigation_mode": options.navigation_mode,
                    "repeat": options.area.repeat,
                },
            }),
        )
        .await
    }

    async fn pause(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_state_action(robot, "pause").await
    }

    async fn resume(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_state_action(robot, "resume").await
    }

    async fn return_to_base(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_state_action(robot, "return_to_base").await
    }

    async fn set_schedule(&self, _robot: &RobotIdentity, _enabled: bool) -> Result<(), KoboldError> {
        Err(KoboldError::NotImplemented {
            operation: "set_schedule",
            dialect: Dialect::Orbital,
        })
    }

    async fn locate(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_state_action(robot, "find_me").await
    }

    async fn empty_bin(&self, robot: &RobotIdentity) -> Result<(), KoboldError> {
        self.send_state_action(robot, "empty_dustbin").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn robot() -> RobotIdentity {
        RobotIdentity {
            id: "r1".into(),
            name: "Rosie".into(),
            serial: "S-1".into(),
            model: "VR7".into(),
        }
    }

    fn adapter(beehive: &MockServer, orbital: &MockServer) -> OrbitalAdapter {
        OrbitalAdapter::with_hosts(Transport::default(), "tok", beehive.uri(), orbital.uri())
    }

    fn robot_listing() -> Value {
        json!([
            {
                "id": "r1",
                "nickname": "Rosie",
                "serialNo": "S-1",
                "model": "VR7",
                "state": "busy",
                "details": {"charge": 64, "isDocked": false, "isCharging": false},
                "availableSchedules": [{"day": 1}]
            },
            {"id": "oven", "name": "Thermomix", "model": "TM6"},
            {"robotId": "r2", "name": "Second", "productId": "VR7"}
        ])
    }

    #[test]
    fn state_table() {
        assert_eq!(normalize_state("ready"), RobotState::Idle);
        assert_eq!(normalize_state("busy"), RobotState::Cleaning);
        assert_eq!(normalize_state("stopped"), RobotState::Paused);
        assert_eq!(normalize_state("error"), RobotState::Error);
        assert_eq!(normalize_state("foo"), RobotState::Idle);
    }

    #[tokio::test]
    async fn list_robots_filters_product_line_and_sends_auth() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/robots"))
            .and(header("authorization", "Auth0Bearer tok"))
            .and(header("accept", ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(robot_listing()))
            .expect(1)
            .mount(&beehive)
            .await;

        let robots = adapter(&beehive, &orbital).list_robots().await.unwrap();
        assert_eq!(robots.len(), 2);

        let first = &robots[0];
        assert_eq!(first.identity.id, "r1");
        assert_eq!(first.identity.name, "Rosie");
        assert_eq!(first.identity.serial, "S-1");
        assert_eq!(first.snapshot.state, RobotState::Cleaning);
        assert_eq!(first.snapshot.battery_percent, 64);
        assert!(!first.snapshot.is_docked);
        assert!(first.snapshot.schedule_enabled);

        assert_eq!(robots[1].identity.id, "r2");
        assert!(orbital.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_robots_falls_back_to_orbital_host() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/users/me/robots"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&beehive)
            .await;
        Mock::given(path("/users/me/robots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(robot_listing()))
            .expect(1)
            .mount(&orbital)
            .await;

        let robots = adapter(&beehive, &orbital).list_robots().await.unwrap();
        assert_eq!(robots.len(), 2);
    }

    #[tokio::test]
    async fn non_array_listing_is_empty() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/users/me/robots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"robots": null})))
            .mount(&beehive)
            .await;

        assert!(adapter(&beehive, &orbital).list_robots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_parses_features() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots/r1/features"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": "paused",
                "battery": 81,
                "isDocked": false,
                "isCharging": false
            })))
            .mount(&orbital)
            .await;

        let refresh = adapter(&beehive, &orbital).refresh(&robot()).await.unwrap();
        assert_eq!(
            refresh,
            Refresh::Updated(StatusReport {
                state: Some(RobotState::Paused),
                battery_percent: Some(81),
                is_docked: Some(false),
                is_charging: Some(false),
                schedule_enabled: None,
            })
        );
    }

    #[tokio::test]
    async fn refresh_with_unknown_state_is_idle() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/robots/r1/features"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "foo"})))
            .mount(&orbital)
            .await;

        let Refresh::Updated(report) = adapter(&beehive, &orbital).refresh(&robot()).await.unwrap()
        else {
            panic!("expected an update");
        };
        assert_eq!(report.state, Some(RobotState::Idle));
    }

    #[tokio::test]
    async fn floorplan_takes_first_plan_and_its_zones() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/robots/r1/floorplans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"uuid": "fp-1", "zones": [{"uuid": "z1", "name": "Kitchen"}]},
                {"uuid": "fp-2"}
            ])))
            .mount(&orbital)
            .await;

        let plan = adapter(&beehive, &orbital).floorplan(&robot()).await.unwrap().unwrap();
        assert_eq!(plan.id, "fp-1");
        assert_eq!(plan.zones.len(), 1);
        assert_eq!(plan.zones[0].name, "Kitchen");
    }

    #[tokio::test]
    async fn empty_floorplan_list_is_none() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/robots/r1/floorplans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&orbital)
            .await;

        assert!(adapter(&beehive, &orbital).floorplan(&robot()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_sends_auto_mode_run() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/robots/r1/cleaning/v2"))
            .and(body_json(json!({
                "runs": [{
                    "map": {"floorplan_uuid": "fp-1", "zone_uuid": null, "nogo_enabled": true},
                    "settings": {"mode": "auto", "navigation_mode": "normal"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&orbital)
            .await;

        let options = StartOptions {
            floorplan_id: Some("fp-1".into()),
            ..StartOptions::default()
        };
        adapter(&beehive, &orbital).start(&robot(), &options).await.unwrap();
    }

    #[tokio::test]
    async fn zone_run_carries_zone_and_eco_mode() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        Mock::given(path("/robots/r1/cleaning/v2"))
            .and(body_json(json!({
                "runs": [{
                    "map": {"floorplan_uuid": null, "zone_uuid": "z1", "nogo_enabled": false},
                    "settings": {"mode": "eco", "navigation_mode": "normal"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&orbital)
            .await;

        let options = StartOptions {
            eco: true,
            no_go_lines: false,
            ..StartOptions::default()
        };
        adapter(&beehive, &orbital)
            .start_zone(&robot(), "z1", &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn state_actions_use_state_endpoint() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;
        for action in ["pause", "resume", "return_to_base", "find_me"] {
            Mock::given(method("POST"))
                .and(path("/robots/r1/state"))
                .and(body_json(json!({"action": action})))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&orbital)
                .await;
        }

        let adapter = adapter(&beehive, &orbital);
        adapter.pause(&robot()).await.unwrap();
        adapter.resume(&robot()).await.unwrap();
        adapter.return_to_base(&robot()).await.unwrap();
        adapter.locate(&robot()).await.unwrap();
    }

    #[tokio::test]
    async fn schedule_fails_fast_without_request() {
        let beehive = MockServer::start().await;
        let orbital = MockServer::start().await;

        let err = adapter(&beehive, &orbital)
            .set_schedule(&robot(), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KoboldError::NotImplemented { dialect: Dialect::Orbital, .. }
        ));
        assert!(orbital.received_requests().await.unwrap().is_empty());
        assert!(beehive.received_requests().await.unwrap().is_empty());
    }
}
