//! Accessory profile – how one robot is presented to the home.
//!
//! A robot always gets the main vacuum control (active on = start, off =
//! pause).  Everything else depends on what the host supports natively and
//! on which optional features the user suppressed:
//!
//! | Switch | Shown when |
//! |---|---|
//! | Eco Mode | host has no native cleaning-mode selector |
//! | NoGo Lines | `nogolines` not disabled |
//! | Spot Clean | `spot` not disabled |
//! | Find Me | `findme` not disabled |
//! | Empty Dustbin | `emptydustbin` not disabled |
//! | one per zone | host has no native room selector |
//!
//! Spot Clean, Find Me, Empty Dustbin and the zone switches are momentary:
//! turning one off is a no-op and they report off whenever read.

use kobold_types::{ActionIntent, IntentKind, RobotIdentity, RobotSnapshot, SpotArea, Zone};

use crate::config::Config;

pub const MANUFACTURER: &str = "Vorwerk";

pub const FEATURE_NO_GO_LINES: &str = "nogolines";
pub const FEATURE_SPOT: &str = "spot";
pub const FEATURE_FIND_ME: &str = "findme";
pub const FEATURE_EMPTY_DUSTBIN: &str = "emptydustbin";

/// What the host can express without falling back to plain switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeSupport {
    pub cleaning_mode: bool,
    pub room_selector: bool,
}

impl NativeSupport {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            cleaning_mode: cfg.native_cleaning_mode,
            room_selector: cfg.native_room_selector,
        }
    }
}

/// Maps the host's 0/1 cleaning-mode selector onto the eco flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningModeMap {
    eco_value: u8,
}

impl Default for CleaningModeMap {
    fn default() -> Self {
        Self { eco_value: 1 }
    }
}

impl CleaningModeMap {
    /// Any non-zero `eco_value` is treated as 1.
    pub fn new(eco_value: u8) -> Self {
        Self {
            eco_value: eco_value.min(1),
        }
    }

    /// Eco flag for a selector value; `None` for values other than 0 and 1.
    pub fn is_eco(&self, value: u8) -> Option<bool> {
        match value {
            0 | 1 => Some(value == self.eco_value),
            _ => None,
        }
    }

    pub fn value_for(&self, eco: bool) -> u8 {
        if eco { self.eco_value } else { 1 - self.eco_value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchKind {
    Eco,
    NoGoLines,
    SpotClean,
    FindMe,
    EmptyDustbin,
    Zone(Zone),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub name: String,
    /// Stable identifier, unique within one accessory.
    pub subtype: String,
    pub kind: SwitchKind,
}

impl Switch {
    fn new(robot_name: &str, label: &str, subtype: impl Into<String>, kind: SwitchKind) -> Self {
        Self {
            name: format!("{robot_name} {label}"),
            subtype: subtype.into(),
            kind,
        }
    }

    pub fn is_momentary(&self) -> bool {
        self.intent_kind().is_momentary()
    }

    fn intent_kind(&self) -> IntentKind {
        match self.kind {
            SwitchKind::Eco => IntentKind::ToggleEco,
            SwitchKind::NoGoLines => IntentKind::ToggleNoGo,
            SwitchKind::SpotClean => IntentKind::SpotClean,
            SwitchKind::FindMe => IntentKind::Locate,
            SwitchKind::EmptyDustbin => IntentKind::EmptyBin,
            SwitchKind::Zone(_) => IntentKind::ZoneClean,
        }
    }

    /// Intent for flipping the switch to `on`.  `None` when a momentary
    /// switch is turned off.
    pub fn intent(&self, on: bool) -> Option<ActionIntent> {
        match &self.kind {
            SwitchKind::Eco => Some(ActionIntent::toggle_eco(on)),
            SwitchKind::NoGoLines => Some(ActionIntent::toggle_no_go(on)),
            SwitchKind::SpotClean => on.then(|| ActionIntent::spot_clean(SpotArea::default())),
            SwitchKind::FindMe => on.then(ActionIntent::locate),
            SwitchKind::EmptyDustbin => on.then(ActionIntent::empty_bin),
            SwitchKind::Zone(zone) => on.then(|| ActionIntent::zone_clean(zone.id.clone())),
        }
    }

    /// Value the switch reports for `snapshot`.
    pub fn is_on(&self, snapshot: &RobotSnapshot) -> bool {
        match self.kind {
            SwitchKind::Eco => snapshot.eco_mode,
            SwitchKind::NoGoLines => snapshot.no_go_lines_enabled,
            _ => false,
        }
    }
}

/// Everything the host needs to present one robot.
#[derive(Debug, Clone)]
pub struct AccessoryProfile {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub native: NativeSupport,
    pub mode_map: CleaningModeMap,
    pub switches: Vec<Switch>,
}

impl AccessoryProfile {
    pub fn build(
        identity: &RobotIdentity,
        zones: &[Zone],
        native: NativeSupport,
        mode_map: CleaningModeMap,
        is_disabled: impl Fn(&str) -> bool,
    ) -> Self {
        let name = identity.name.as_str();
        let mut switches = Vec::new();

        if !native.cleaning_mode {
            switches.push(Switch::new(name, "Eco Mode", "eco", SwitchKind::Eco));
        }
        let optional = [
            (FEATURE_NO_GO_LINES, "NoGo Lines", "nogolines", SwitchKind::NoGoLines),
            (FEATURE_SPOT, "Spot Clean", "spotclean", SwitchKind::SpotClean),
            (FEATURE_FIND_ME, "Find Me", "findme", SwitchKind::FindMe),
            (FEATURE_EMPTY_DUSTBIN, "Empty Dustbin", "emptydustbin", SwitchKind::EmptyDustbin),
        ];
        for (feature, label, subtype, kind) in optional {
            if !is_disabled(feature) {
                switches.push(Switch::new(name, label, subtype, kind));
            }
        }
        if !native.room_selector {
            for zone in zones.iter().filter(|z| !z.id.is_empty() && !z.name.is_empty()) {
                switches.push(Switch::new(
                    name,
                    &zone.name,
                    format!("zone_{}", zone.id),
                    SwitchKind::Zone(zone.clone()),
                ));
            }
        }

        Self {
            name: identity.name.clone(),
            model: identity.model.clone(),
            serial: identity.serial.clone(),
            native,
            mode_map,
            switches,
        }
    }

    pub fn switch(&self, subtype: &str) -> Option<&Switch> {
        self.switches.iter().find(|s| s.subtype == subtype)
    }

    /// Main vacuum control: on starts (or resumes), off pauses.
    pub fn set_active(on: bool) -> ActionIntent {
        if on {
            ActionIntent::start()
        } else {
            ActionIntent::pause()
        }
    }

    /// Intent for the native cleaning-mode selector.  `None` when the host
    /// has no such selector or the value is out of range.
    pub fn set_cleaning_mode(&self, value: u8) -> Option<ActionIntent> {
        if !self.native.cleaning_mode {
            return None;
        }
        self.mode_map.is_eco(value).map(ActionIntent::toggle_eco)
    }

    pub fn cleaning_mode(&self, snapshot: &RobotSnapshot) -> u8 {
        self.mode_map.value_for(snapshot.eco_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> RobotIdentity {
        RobotIdentity {
            id: "r1".into(),
            name: "Rosie".into(),
            serial: "SN-1".into(),
            model: "VR7".into(),
        }
    }

    fn zones() -> Vec<Zone> {
        vec![
            Zone {
                id: "z1".into(),
                name: "Kitchen".into(),
            },
            Zone {
                id: "z2".into(),
                name: String::new(),
            },
        ]
    }

    fn subtypes(profile: &AccessoryProfile) -> Vec<&str> {
        profile.switches.iter().map(|s| s.subtype.as_str()).collect()
    }

    #[test]
    fn full_profile_without_native_support() {
        let profile = AccessoryProfile::build(
            &identity(),
            &zones(),
            NativeSupport::default(),
            CleaningModeMap::default(),
            |_| false,
        );
        assert_eq!(
            subtypes(&profile),
            vec!["eco", "nogolines", "spotclean", "findme", "emptydustbin", "zone_z1"]
        );
        assert_eq!(profile.switch("zone_z1").unwrap().name, "Rosie Kitchen");
    }

    #[test]
    fn native_support_removes_fallback_switches() {
        let native = NativeSupport {
            cleaning_mode: true,
            room_selector: true,
        };
        let profile =
            AccessoryProfile::build(&identity(), &zones(), native, CleaningModeMap::default(), |_| false);
        assert_eq!(subtypes(&profile), vec!["nogolines", "spotclean", "findme", "emptydustbin"]);
    }

    #[test]
    fn disabled_features_are_hidden() {
        let profile = AccessoryProfile::build(
            &identity(),
            &[],
            NativeSupport::default(),
            CleaningModeMap::default(),
            |f| f == FEATURE_SPOT || f == FEATURE_EMPTY_DUSTBIN,
        );
        assert_eq!(subtypes(&profile), vec!["eco", "nogolines", "findme"]);
    }

    #[test]
    fn momentary_switch_off_is_a_no_op() {
        let profile = AccessoryProfile::build(
            &identity(),
            &zones(),
            NativeSupport::default(),
            CleaningModeMap::default(),
            |_| false,
        );
        for subtype in ["spotclean", "findme", "emptydustbin", "zone_z1"] {
            let switch = profile.switch(subtype).unwrap();
            assert!(switch.is_momentary(), "{subtype}");
            assert!(switch.intent(false).is_none(), "{subtype}");
            assert!(switch.intent(true).is_some(), "{subtype}");
        }
        let zone = profile.switch("zone_z1").unwrap().intent(true).unwrap();
        assert_eq!(zone.zone_id.as_deref(), Some("z1"));
    }

    #[test]
    fn setting_switches_report_snapshot_values() {
        let profile = AccessoryProfile::build(
            &identity(),
            &[],
            NativeSupport::default(),
            CleaningModeMap::default(),
            |_| false,
        );
        let mut snapshot = RobotSnapshot::default();
        snapshot.eco_mode = true;
        snapshot.no_go_lines_enabled = false;

        let eco = profile.switch("eco").unwrap();
        assert!(!eco.is_momentary());
        assert!(eco.is_on(&snapshot));
        assert_eq!(eco.intent(false).unwrap().eco, Some(false));
        assert!(!profile.switch("nogolines").unwrap().is_on(&snapshot));
        assert!(!profile.switch("findme").unwrap().is_on(&snapshot));
    }

    #[test]
    fn cleaning_mode_map_defaults_to_one_for_eco() {
        let map = CleaningModeMap::default();
        assert_eq!(map.is_eco(1), Some(true));
        assert_eq!(map.is_eco(0), Some(false));
        assert_eq!(map.is_eco(2), None);
        assert_eq!(map.value_for(true), 1);
    }

    #[test]
    fn cleaning_mode_map_can_be_inverted() {
        let map = CleaningModeMap::new(0);
        assert_eq!(map.is_eco(0), Some(true));
        assert_eq!(map.value_for(false), 1);
        assert_eq!(CleaningModeMap::new(7), CleaningModeMap::default());
    }

    #[test]
    fn native_cleaning_mode_maps_to_eco_toggle() {
        let native = NativeSupport {
            cleaning_mode: true,
            room_selector: false,
        };
        let profile =
            AccessoryProfile::build(&identity(), &[], native, CleaningModeMap::default(), |_| false);
        let intent = profile.set_cleaning_mode(1).unwrap();
        assert_eq!(intent.kind, IntentKind::ToggleEco);
        assert_eq!(intent.eco, Some(true));
        assert!(profile.set_cleaning_mode(3).is_none());

        let mut snapshot = RobotSnapshot::default();
        snapshot.eco_mode = true;
        assert_eq!(profile.cleaning_mode(&snapshot), 1);
    }

    #[test]
    fn cleaning_mode_unavailable_without_native_selector() {
        let profile = AccessoryProfile::build(
            &identity(),
            &[],
            NativeSupport::default(),
            CleaningModeMap::default(),
            |_| false,
        );
        assert!(profile.set_cleaning_mode(1).is_none());
    }

    #[test]
    fn active_control_starts_and_pauses() {
        assert_eq!(AccessoryProfile::set_active(true).kind, IntentKind::Start);
        assert_eq!(AccessoryProfile::set_active(false).kind, IntentKind::Pause);
    }
}
