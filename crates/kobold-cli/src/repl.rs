//! REPL – Read-Eval-Print Loop for the Kobold interactive shell.
//!
//! Supported slash-commands:
//!   /help                 – show this list
//!   /robots, /use <n>     – list robots / switch the active robot
//!   /status, /refresh     – show the cached snapshot / pull a fresh one
//!   /start /pause /resume /dock
//!   /spot /zone <id> /zones /locate /empty
//!   /eco on|off, /mode <0|1>, /nogo on|off, /schedule on|off
//!   /switches, /switch <subtype> on|off
//!   /quit | /exit         – exit the CLI

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use kobold_runtime::{CommandDispatcher, DispatchOutcome};
use kobold_types::{ActionIntent, RobotSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::accessory::{
    AccessoryProfile, FEATURE_EMPTY_DUSTBIN, FEATURE_FIND_ME, FEATURE_NO_GO_LINES,
};

/// A parsed slash-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Robots,
    Use(usize),
    Status,
    Refresh,
    Start,
    Pause,
    Resume,
    Dock,
    Spot,
    Zone(String),
    Zones,
    Locate,
    Empty,
    Eco(bool),
    Mode(u8),
    NoGo(bool),
    Schedule(bool),
    Switches,
    Switch { subtype: String, on: bool },
    Quit,
}

fn parse_on_off(arg: Option<&str>, usage: &str) -> Result<bool, String> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(format!("usage: {usage}")),
    }
}

/// Parse one input line.  The error is a message for the user.
pub fn parse(line: &str) -> Result<ReplCommand, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Err("empty command".into());
    };
    let arg = words.next();

    let command = match cmd {
        "/help" => ReplCommand::Help,
        "/robots" => ReplCommand::Robots,
        "/use" => ReplCommand::Use(
            arg.and_then(|n| n.parse().ok())
                .ok_or("usage: /use <n>")?,
        ),
        "/status" => ReplCommand::Status,
        "/refresh" => ReplCommand::Refresh,
        "/start" => ReplCommand::Start,
        "/pause" => ReplCommand::Pause,
        "/resume" => ReplCommand::Resume,
        "/dock" => ReplCommand::Dock,
        "/spot" => ReplCommand::Spot,
        "/zone" => ReplCommand::Zone(arg.ok_or("usage: /zone <id>")?.to_string()),
        "/zones" => ReplCommand::Zones,
        "/locate" => ReplCommand::Locate,
        "/empty" => ReplCommand::Empty,
        "/eco" => ReplCommand::Eco(parse_on_off(arg, "/eco on|off")?),
        "/mode" => ReplCommand::Mode(
            arg.and_then(|m| m.parse().ok())
                .ok_or("usage: /mode <0|1>")?,
        ),
        "/nogo" => ReplCommand::NoGo(parse_on_off(arg, "/nogo on|off")?),
        "/schedule" => ReplCommand::Schedule(parse_on_off(arg, "/schedule on|off")?),
        "/switches" => ReplCommand::Switches,
        "/switch" => {
            let subtype = arg.ok_or("usage: /switch <subtype> on|off")?.to_string();
            let on = parse_on_off(words.next(), "/switch <subtype> on|off")?;
            ReplCommand::Switch { subtype, on }
        }
        "/quit" | "/exit" => ReplCommand::Quit,
        other => return Err(format!("Unknown command: '{other}'")),
    };
    Ok(command)
}

/// One robot as the shell sees it.
pub struct RobotHandle {
    pub dispatcher: Arc<CommandDispatcher>,
    pub profile: AccessoryProfile,
}

pub struct Session {
    robots: Vec<RobotHandle>,
    current: usize,
}

impl Session {
    pub fn new(robots: Vec<RobotHandle>) -> Self {
        Self { robots, current: 0 }
    }

    fn robot(&self) -> Option<&RobotHandle> {
        self.robots.get(self.current)
    }
}

/// Entry point for the interactive REPL.  Returns on `/quit`, EOF or Ctrl-C.
pub async fn run(mut session: Session) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "kobold>".bold().cyan());
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "⚠  Ctrl-C received – exiting.".yellow().bold());
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(ReplCommand::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(command) => execute(&mut session, command).await,
            Err(message) => println!(
                "{} Type {} for available commands.",
                message.red(),
                "/help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn execute(session: &mut Session, command: ReplCommand) {
    match command {
        ReplCommand::Help => cmd_help(),
        ReplCommand::Robots => cmd_robots(session),
        ReplCommand::Use(n) => {
            if n < session.robots.len() {
                session.current = n;
                cmd_robots(session);
            } else {
                println!("{} {}", "No robot with index".red(), n);
            }
        }
        command => {
            let Some(robot) = session.robot() else {
                println!("{}", "No robot selected.".yellow());
                return;
            };
            robot_command(robot, command).await;
        }
    }
}

async fn robot_command(robot: &RobotHandle, command: ReplCommand) {
    let profile = &robot.profile;
    let intent = match command {
        ReplCommand::Status => {
            print_status(robot).await;
            return;
        }
        ReplCommand::Refresh => {
            match robot.dispatcher.refresh().await {
                Ok(snapshot) => print_snapshot(&snapshot, false),
                Err(e) => println!("{}: {}", "Refresh failed".red(), e),
            }
            return;
        }
        ReplCommand::Zones => {
            print_zones(&robot.dispatcher.snapshot().await);
            return;
        }
        ReplCommand::Switches => {
            print_switches(robot).await;
            return;
        }
        ReplCommand::Start => AccessoryProfile::set_active(true),
        ReplCommand::Pause => AccessoryProfile::set_active(false),
        ReplCommand::Resume => ActionIntent::resume(),
        ReplCommand::Dock => ActionIntent::return_to_base(),
        ReplCommand::Spot => ActionIntent::spot_clean(Default::default()),
        ReplCommand::Zone(id) => ActionIntent::zone_clean(id),
        ReplCommand::Eco(on) => ActionIntent::toggle_eco(on),
        ReplCommand::Schedule(on) => ActionIntent::set_schedule(on),
        ReplCommand::Mode(value) => match profile.set_cleaning_mode(value) {
            Some(intent) => intent,
            None => {
                println!("{}", "Cleaning-mode selector unavailable or value out of range; use /eco.".yellow());
                return;
            }
        },
        ReplCommand::Locate => match switch_intent(profile, FEATURE_FIND_ME, true) {
            Some(intent) => intent,
            None => return,
        },
        ReplCommand::Empty => match switch_intent(profile, FEATURE_EMPTY_DUSTBIN, true) {
            Some(intent) => intent,
            None => return,
        },
        ReplCommand::NoGo(on) => match switch_intent(profile, FEATURE_NO_GO_LINES, on) {
            Some(intent) => intent,
            None => return,
        },
        ReplCommand::Switch { subtype, on } => match switch_intent(profile, &subtype, on) {
            Some(intent) => intent,
            None => return,
        },
        ReplCommand::Help | ReplCommand::Robots | ReplCommand::Use(_) | ReplCommand::Quit => return,
    };
    dispatch(robot, intent).await;
}

/// Intent behind a profile switch, reporting to the user when there is none.
fn switch_intent(profile: &AccessoryProfile, subtype: &str, on: bool) -> Option<ActionIntent> {
    let Some(switch) = profile.switch(subtype) else {
        println!("{} '{}'", "No such switch (disabled?):".yellow(), subtype);
        return None;
    };
    let intent = switch.intent(on);
    if intent.is_none() {
        println!("  {} is momentary; turning it off does nothing.", switch.name.bold());
    }
    intent
}

async fn dispatch(robot: &RobotHandle, intent: ActionIntent) {
    let kind = intent.kind;
    match robot.dispatcher.apply(intent).await {
        Ok(outcome) => {
            println!("{} {}", "✓".green().bold(), kind.to_string().bold());
            print_outcome(&outcome);
            if let Some(delay) = outcome.revert_after {
                spawn_revert(format!("{} {}", robot.profile.name, kind), delay);
            }
        }
        Err(e) if e.is_local() => println!("{} {}", "✗".yellow().bold(), e.to_string().yellow()),
        Err(e) => println!("{} {}", "✗".red().bold(), e.to_string().red()),
    }
}

/// The host owns the momentary-switch timer.
fn spawn_revert(label: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        println!("\n  {} {} switch back to off", "↺".dimmed(), label.dimmed());
    });
}

fn cmd_help() {
    println!();
    println!("{}", "Kobold Commands".bold().underline());
    println!("  {}  – list robots / select robot n", "/robots  /use <n>".bold().cyan());
    println!("  {}  – cached state / fetch fresh state", "/status  /refresh".bold().cyan());
    println!("  {}  – basic control", "/start  /pause  /resume  /dock".bold().cyan());
    println!("  {}  – spot or zone cleaning", "/spot  /zone <id>  /zones".bold().cyan());
    println!("  {}  – find me sound / empty the dustbin", "/locate  /empty".bold().cyan());
    println!("  {}  – eco setting", "/eco on|off  /mode <0|1>".bold().cyan());
    println!("  {}  – no-go lines / schedule", "/nogo on|off  /schedule on|off".bold().cyan());
    println!("  {}  – accessory switches", "/switches  /switch <subtype> on|off".bold().cyan());
    println!("  {}  – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_robots(session: &Session) {
    println!("{}", "Robots".bold().underline());
    for (i, robot) in session.robots.iter().enumerate() {
        let marker = if i == session.current { "▶" } else { " " };
        let identity = robot.dispatcher.identity();
        println!(
            "  {} {}  {}  {} ({})",
            marker.green(),
            i,
            identity.name.bold(),
            identity.serial.dimmed(),
            robot.dispatcher.dialect()
        );
    }
}

async fn print_status(robot: &RobotHandle) {
    let snapshot = robot.dispatcher.snapshot().await;
    print_snapshot(&snapshot, robot.dispatcher.is_stale());
    let caps = robot.dispatcher.capabilities().await;
    println!(
        "  Allowed     : start={} pause={} resume={} dock={}",
        caps.can_start, caps.can_pause, caps.can_resume, caps.can_go_to_base
    );
    if robot.profile.native.cleaning_mode {
        println!("  Mode value  : {}", robot.profile.cleaning_mode(&snapshot));
    }
}

fn print_outcome(outcome: &DispatchOutcome) {
    print_snapshot(&outcome.snapshot, outcome.stale);
}

fn print_snapshot(snapshot: &RobotSnapshot, stale: bool) {
    println!("  State       : {}", snapshot.state.to_string().yellow());
    println!(
        "  Battery     : {}%{}{}",
        snapshot.battery_percent,
        if snapshot.is_docked { ", docked" } else { "" },
        if snapshot.is_charging { ", charging" } else { "" }
    );
    println!(
        "  Settings    : eco={} nogo={} schedule={}",
        snapshot.eco_mode, snapshot.no_go_lines_enabled, snapshot.schedule_enabled
    );
    if let Some(at) = snapshot.refreshed_at {
        println!("  Refreshed   : {}", at.format("%H:%M:%S").to_string().dimmed());
    }
    if stale {
        println!("  {}", "last refresh failed; state may be out of date".yellow());
    }
}

fn print_zones(snapshot: &RobotSnapshot) {
    if snapshot.zones.is_empty() {
        println!("  {}", "No zones known; whole-home cleaning only.".dimmed());
        return;
    }
    for zone in &snapshot.zones {
        println!("  {}  {}", zone.id.bold(), zone.name);
    }
}

async fn print_switches(robot: &RobotHandle) {
    let snapshot = robot.dispatcher.snapshot().await;
    for switch in &robot.profile.switches {
        let state = if switch.is_on(&snapshot) { "on".green() } else { "off".dimmed() };
        println!("  {:<14} {:<28} {}", switch.subtype, switch.name, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse("/start"), Ok(ReplCommand::Start));
        assert_eq!(parse("  /dock  "), Ok(ReplCommand::Dock));
        assert_eq!(parse("/exit"), Ok(ReplCommand::Quit));
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(parse("/use 2"), Ok(ReplCommand::Use(2)));
        assert_eq!(parse("/zone z1"), Ok(ReplCommand::Zone("z1".into())));
        assert_eq!(parse("/eco on"), Ok(ReplCommand::Eco(true)));
        assert_eq!(parse("/schedule off"), Ok(ReplCommand::Schedule(false)));
        assert_eq!(parse("/mode 1"), Ok(ReplCommand::Mode(1)));
        assert_eq!(
            parse("/switch zone_z1 on"),
            Ok(ReplCommand::Switch {
                subtype: "zone_z1".into(),
                on: true
            })
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse("/use two").is_err());
        assert!(parse("/zone").is_err());
        assert!(parse("/nogo maybe").is_err());
        assert!(parse("/switch findme").is_err());
        assert!(parse("/mode 300").is_err());
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = parse("/dance").unwrap_err();
        assert!(err.contains("/dance"));
    }
}
