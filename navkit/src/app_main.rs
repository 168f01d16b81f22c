// SPDX-License-Identifier: GPL-3.0-only

//! Command line entry point
//!
//! Wires the session to its real collaborators, forwards host events to
//! stdout and host commands from stdin.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, error, info, warn};
use navkit_shared::{Coordinate, HostEvent, RouteOutcome, RouteRequest};
use strum_macros::EnumString;
use tokio::sync::{broadcast, watch};

use crate::audio::AudioPlayer;
use crate::cli;
use crate::config::NavigationConfig;
use crate::error::NavError;
use crate::location::DefaultProviderFactory;
use crate::permission::StaticPermission;
use crate::render::HeadlessSurface;
use crate::route::DirectionsClient;
use crate::session::{Collaborators, NavigationSession, SessionHandle, SessionSettings, UiSnapshot};
use crate::voice::VoiceClient;

/// Commands accepted on stdin while navigating
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum HostCommand {
    Overview,
    Recenter,
    Mute,
    Cancel,
    #[strum(serialize = "quit", serialize = "exit")]
    Quit,
}

/// Main entry point for the `navkit` binary
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a collaborator cannot
/// be created, or a one-shot route request fails.
pub async fn run() -> Result<()> {
    let matches = cli::build().get_matches();
    let (command, sub) = matches
        .subcommand()
        .context("No subcommand given, see --help")?;

    init_logging(sub.get_flag("verbose"));

    let config_path = sub.get_one::<PathBuf>("config").cloned();
    let config = match &config_path {
        Some(path) => NavigationConfig::load_from(path),
        None => NavigationConfig::load(),
    };

    match command {
        "navigate" => handle_navigate_command(sub, config, config_path.as_deref()).await,
        "route" => handle_route_command(sub, config).await,
        "config" => handle_config_command(sub, &config, config_path.as_deref()),
        other => Err(anyhow::anyhow!("Unknown subcommand: {other}")),
    }
}

fn init_logging(verbose: bool) {
    // Initialize logging - respect RUST_LOG env var, fallback to verbose flag
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    } else {
        let log_level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .init();
    }
}

fn save_config(config: &NavigationConfig, path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => {
            config.save_to(path)?;
            Ok(path.to_path_buf())
        }
        None => config.save(),
    }
}

fn endpoints(matches: &ArgMatches) -> Result<(Coordinate, Coordinate)> {
    let origin = matches
        .get_one::<Coordinate>("origin")
        .copied()
        .context("--origin is required")?;
    let destination = matches
        .get_one::<Coordinate>("destination")
        .copied()
        .context("--destination is required")?;
    Ok((origin, destination))
}

/// Handle the navigate subcommand - run a session until quit or Ctrl+C
async fn handle_navigate_command(
    matches: &ArgMatches,
    mut config: NavigationConfig,
    config_path: Option<&Path>,
) -> Result<()> {
    let (origin, destination) = endpoints(matches)?;
    if config.apply_cli_overrides(&cli::overrides(matches)) {
        debug!("Command line overrides applied");
    }
    config.validate().context("Invalid configuration")?;
    if matches.get_flag("save") {
        let path = save_config(&config, config_path)?;
        info!("Saved configuration to {}", path.display());
    }

    let routing = DirectionsClient::new(&config.routing)?;
    let access_token = config.routing.resolved_access_token().unwrap_or_default();
    let speech = VoiceClient::new(
        &config.voice,
        access_token,
        config.session.language.clone(),
    )?;

    let collaborators = Collaborators {
        routing: Arc::new(routing),
        speech: Arc::new(speech),
        player: Arc::new(AudioPlayer::new(config.session.mute)),
        surface: Arc::new(HeadlessSurface::new()),
        permission: Arc::new(StaticPermission(config.location.permission_granted)),
        providers: Arc::new(DefaultProviderFactory::from_config(&config)),
    };
    let (session, inbox) = NavigationSession::new(SessionSettings::from(&config), collaborators);
    let handle = session.session_handle();

    info!("Starting navigation");
    info!("Origin: {origin}");
    info!("Destination: {destination}");
    info!("Profile: {}", config.session.profile);
    info!(
        "Guidance: {}",
        if config.session.simulate { "simulated" } else { "gpsd" }
    );

    let printer = tokio::spawn(print_host_events(session.subscribe()));
    tokio::spawn(log_ui_changes(session.ui_snapshot()));
    spawn_stdin_reader(handle.clone());

    // Set up Ctrl+C handler
    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Received Ctrl+C, tearing down...");
        ctrl_c_handle.teardown();
    });

    handle.set_origin(Some(origin));
    handle.set_destination(Some(destination));
    handle.activate();

    session.run(inbox).await;
    if let Err(e) = printer.await {
        warn!("Host event printer failed: {e}");
    }

    info!("Navigation finished");
    Ok(())
}

async fn print_host_events(mut events: broadcast::Receiver<HostEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to serialize {}: {e}", event.event_name()),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Host event output lagging, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn log_ui_changes(mut ui: watch::Receiver<UiSnapshot>) {
    while ui.changed().await.is_ok() {
        let snapshot = *ui.borrow_and_update();
        debug!(
            "UI: state={} buttons={} maneuver_card={} banner={} recenter={} muted={}",
            snapshot.state,
            snapshot.visibility.show_buttons,
            snapshot.visibility.show_maneuver_card,
            snapshot.visibility.show_progress_banner,
            snapshot.show_recenter,
            snapshot.muted
        );
    }
}

/// Read host commands on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader(handle: SessionHandle) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let delivered = match line.parse::<HostCommand>() {
                Ok(command) => dispatch_command(&handle, command),
                Err(_) => {
                    warn!("Unknown command '{line}' (overview, recenter, mute, cancel, quit)");
                    true
                }
            };
            if !delivered {
                break;
            }
        }
        debug!("Stopped reading host commands");
    });
}

fn dispatch_command(handle: &SessionHandle, command: HostCommand) -> bool {
    debug!("Host command: {command:?}");
    match command {
        HostCommand::Overview => handle.show_overview(),
        HostCommand::Recenter => handle.recenter(),
        HostCommand::Mute => handle.toggle_mute(),
        HostCommand::Cancel => handle.cancel_navigation(),
        HostCommand::Quit => handle.teardown(),
    }
}

/// Handle the route subcommand - one request, JSON summary on stdout
async fn handle_route_command(matches: &ArgMatches, mut config: NavigationConfig) -> Result<()> {
    let (origin, destination) = endpoints(matches)?;
    config.apply_cli_overrides(&cli::overrides(matches));
    config.validate().context("Invalid configuration")?;

    let client = DirectionsClient::new(&config.routing)?;
    let request = RouteRequest {
        origin,
        destination,
        profile: config.session.profile,
        language: config.session.language.clone(),
        alternatives: config.routing.alternatives,
    };
    info!("Requesting {} route {origin} -> {destination}", request.profile);

    match client.fetch(&request).await {
        RouteOutcome::Ready(routes) => {
            let summary: Vec<_> = routes
                .iter()
                .map(|route| {
                    serde_json::json!({
                        "id": route.id,
                        "distance": route.distance,
                        "duration": route.duration,
                        "legs": route.legs,
                        "maneuvers": route
                            .maneuvers
                            .iter()
                            .map(|maneuver| serde_json::json!({
                                "index": maneuver.index,
                                "distance_from_start": maneuver.distance_from_start,
                                "instruction": maneuver.instruction,
                                "voice_cues": maneuver.voice_cues.len(),
                            }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        RouteOutcome::Failure(reasons) => Err(NavError::RouteRequestFailed { reasons }.into()),
        RouteOutcome::Canceled => Err(NavError::RouteRequestCanceled.into()),
    }
}

/// Handle the config subcommand - print the effective configuration
fn handle_config_command(
    matches: &ArgMatches,
    config: &NavigationConfig,
    config_path: Option<&Path>,
) -> Result<()> {
    print!("{}", config.to_toml()?);
    if matches.get_flag("save") {
        let path = save_config(config, config_path)?;
        info!("Saved configuration to {}", path.display());
    }
    Ok(())
}
