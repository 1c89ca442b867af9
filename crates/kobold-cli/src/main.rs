//! `kobold-cli` – Kobold Command Line Interface
//!
//! This binary (`koboldctl`) stands in for a home-automation bridge.  It:
//!
//! 1. Checks for `~/.kobold/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Discovers robots through the dialect selector and builds one command
//!    dispatcher and one accessory profile per robot.
//! 3. Drops the user into an **interactive REPL** with slash-commands.

mod accessory;
mod config;
mod repl;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use kobold_middleware::{BackendSelector, RobotBackend, Transport};
use kobold_runtime::CommandDispatcher;
use kobold_runtime::telemetry::init_tracing;
use tracing::{error, info};

use crate::accessory::{AccessoryProfile, CleaningModeMap, NativeSupport};
use crate::config::Config;
use crate::repl::{RobotHandle, Session};

fn main() -> ExitCode {
    // Before the runtime exists: the span exporter is synchronous.
    let guard = init_tracing("koboldctl");
    print_banner(guard.is_exporting());

    // The wizard reads stdin synchronously, so it runs before the runtime.
    let cfg = resolve_config();
    info!(config = ?cfg, "configuration resolved");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg))
}

fn resolve_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

async fn run(cfg: Config) -> ExitCode {
    if cfg.token.is_empty() {
        println!(
            "{} Set {} in {} or export {}.",
            "No vendor token configured.".red(),
            "token".bold(),
            config::config_path().display(),
            "KOBOLD_TOKEN".bold()
        );
        return ExitCode::FAILURE;
    }

    // ── Discovery ─────────────────────────────────────────────────────────
    let transport = Transport::new(cfg.request_timeout());
    let selector = BackendSelector::for_dialects(&cfg.dialects, &transport, &cfg.token, &cfg.hosts());

    let dialects = selector
        .dialects()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ");
    info!(%dialects, timeout = ?transport.timeout(), "discovering robots");

    print!("\n  Discovering robots ({}) … ", dialects.dimmed());
    std::io::Write::flush(&mut std::io::stdout()).ok();
    let selection = match selector.discover().await {
        Ok(selection) => selection,
        Err(e) => {
            println!("{}", "failed".red());
            println!("  {}", e.to_string().dimmed());
            return ExitCode::FAILURE;
        }
    };
    if selection.robots.is_empty() {
        println!("{}", "no VR7 robots on this account".yellow());
        return ExitCode::SUCCESS;
    }
    println!(
        "{} ({} robot(s) via {})",
        "ok".green(),
        selection.robots.len(),
        selection.backend.dialect()
    );

    // ── Accessories ───────────────────────────────────────────────────────
    let backend = Arc::new(selection.backend);
    let native = NativeSupport::from_config(&cfg);
    let mode_map = CleaningModeMap::new(cfg.eco_mode_value);

    let mut robots = Vec::with_capacity(selection.robots.len());
    for robot in selection.robots {
        let dispatcher = Arc::new(CommandDispatcher::new(backend.clone(), robot));
        let zones = dispatcher.load_zones().await;
        let profile = AccessoryProfile::build(dispatcher.identity(), &zones, native, mode_map, |feature| {
            cfg.is_disabled(feature)
        });
        print_profile(&profile);
        robots.push(RobotHandle { dispatcher, profile });
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(Session::new(robots)).await;
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Kobold First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Kobold.\n");

    let mut cfg = Config::default();
    config::apply_env_overrides(&mut cfg);

    if cfg.token.is_empty() {
        cfg.token = prompt_line("  Vendor account token: ", "");
    }

    let disabled = prompt_line(
        "  Features to hide (nogolines, spot, findme, emptydustbin) []: ",
        "",
    );
    cfg.disabled = disabled
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(exporting: bool) {
    println!();
    println!("{}", r#"   __ __     __        __   __"#.bold().cyan());
    println!("{}", r#"  / //_/__  / /  ___  / /__/ /"#.bold().cyan());
    println!("{}", r#" / ,< / _ \/ _ \/ _ \/ / _  / "#.bold().cyan());
    println!("{}", r#"/_/|_|\___/_.__/\___/_/\_,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Kobold".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Cleaning-robot control console");
    if exporting {
        println!("  {}", "Exporting traces over OTLP".dimmed());
    }
    println!();
}

fn print_profile(profile: &AccessoryProfile) {
    println!();
    println!(
        "  {} {} {} ({})",
        "▶".green(),
        accessory::MANUFACTURER,
        profile.name.bold(),
        format!("{} / {}", profile.model, profile.serial).dimmed()
    );
    if profile.native.cleaning_mode {
        println!("    native cleaning mode");
    }
    for switch in &profile.switches {
        let momentary = if switch.is_momentary() { " (momentary)" } else { "" };
        println!("    • {}{}", switch.name, momentary.dimmed());
    }
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{msg}");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
