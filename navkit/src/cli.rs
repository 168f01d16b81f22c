// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Command, ValueHint, arg, command, value_parser};
use navkit_shared::{Coordinate, RoutingProfile};

use crate::camera::Orientation;
use crate::config::CliOverrides;

fn endpoint_args(command: Command) -> Command {
    command
        .arg(
            arg!(-o --origin <origin> "Start of the route as LON,LAT")
                .required(true)
                .allow_hyphen_values(true)
                .value_parser(value_parser!(Coordinate)),
        )
        .arg(
            arg!(-d --destination <destination> "End of the route as LON,LAT")
                .required(true)
                .allow_hyphen_values(true)
                .value_parser(value_parser!(Coordinate)),
        )
        .arg(
            arg!(--profile <profile> "Routing profile")
                .required(false)
                .action(ArgAction::Set)
                .value_parser(value_parser!(RoutingProfile)),
        )
        .arg(arg!(--language <language> "Language for instructions and voice").required(false))
}

#[must_use]
pub fn build() -> Command {
    command!()
        .about("🧭 navkit - Turn-by-turn navigation session controller")
        .long_about(
            "Runs a turn-by-turn navigation session: requests a route, follows live or simulated \
             positions, frames the camera, and speaks voice guidance. Host events are printed to \
             stdout as JSON lines.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            endpoint_args(
                Command::new("navigate")
                    .about("🚗 Start a navigation session")
                    .long_about(
                        "Request a route and guide along it. Type overview, recenter, mute, \
                         cancel or quit on stdin to control the session.",
                    ),
            )
            .arg(
                arg!(--simulate "Replay the route instead of using gpsd")
                    .action(ArgAction::SetTrue),
            )
            .arg(arg!(--mute "Start with voice guidance muted").action(ArgAction::SetTrue))
            .arg(
                arg!(--feedback "Ask for end-of-route feedback on arrival")
                    .action(ArgAction::SetTrue),
            )
            .arg(arg!(--landscape "Use landscape camera padding").action(ArgAction::SetTrue))
            .arg(
                arg!(--"no-location-permission" "Behave as if location access was denied")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--gpsd <address> "gpsd address for live positions")
                    .required(false)
                    .value_hint(ValueHint::Hostname),
            )
            .arg(
                arg!(--"replay-speed" <multiplier> "Speed multiplier for --simulate")
                    .required(false)
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                arg!(--save "Persist the given options to the config file")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(endpoint_args(
            Command::new("route")
                .about("🗺️ Request a route and print a summary")
                .long_about(
                    "One-shot route request against the configured directions service. \
                     Prints the routes as JSON.",
                ),
        ))
        .subcommand(
            Command::new("config")
                .about("⚙️ Print the effective configuration")
                .arg(
                    arg!(--save "Write the effective configuration to disk")
                        .action(ArgAction::SetTrue),
                ),
        )
        .arg(
            arg!(-c --config <path> "Configuration file to use instead of the default")
                .required(false)
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            arg!(-v --verbose "Enable verbose logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

fn explicit<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    if matches.value_source(id) == Some(ValueSource::CommandLine) {
        matches.get_one::<T>(id).cloned()
    } else {
        None
    }
}

fn flag(matches: &ArgMatches, id: &str) -> Option<bool> {
    matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .filter(|set| *set)
}

/// Options given explicitly on the command line of a subcommand.
#[must_use]
pub fn overrides(matches: &ArgMatches) -> CliOverrides {
    let has = |id: &str| matches.try_contains_id(id).unwrap_or(false);
    CliOverrides {
        simulate: flag(matches, "simulate"),
        mute: flag(matches, "mute"),
        end_of_route_feedback: flag(matches, "feedback"),
        orientation: flag(matches, "landscape").map(|_| Orientation::Landscape),
        profile: explicit(matches, "profile"),
        language: explicit(matches, "language"),
        gpsd_addr: if has("gpsd") {
            explicit(matches, "gpsd")
        } else {
            None
        },
        replay_speed: if has("replay-speed") {
            explicit(matches, "replay-speed")
        } else {
            None
        },
        permission_granted: flag(matches, "no-location-permission").map(|_| false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_parses_endpoints_and_flags() {
        let matches = build()
            .try_get_matches_from([
                "navkit",
                "navigate",
                "--origin",
                "2.4508048,48.5691981",
                "--destination",
                "2.300946,48.606716",
                "--simulate",
                "--landscape",
                "--profile",
                "walking",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "navigate");
        assert_eq!(
            sub.get_one::<Coordinate>("origin"),
            Some(&Coordinate::new(2.450_804_8, 48.569_198_1))
        );

        let overrides = overrides(sub);
        assert_eq!(overrides.simulate, Some(true));
        assert_eq!(overrides.mute, None);
        assert_eq!(overrides.orientation, Some(Orientation::Landscape));
        assert_eq!(overrides.profile, Some(RoutingProfile::Walking));
        assert_eq!(overrides.language, None);
        assert_eq!(overrides.permission_granted, None);
    }

    #[test]
    fn test_negative_coordinates_are_values() {
        let matches = build()
            .try_get_matches_from([
                "navkit",
                "route",
                "-o",
                "-73.98,40.75",
                "-d",
                "-73.96,40.78",
            ])
            .unwrap();
        let sub = matches.subcommand_matches("route").unwrap();
        assert_eq!(
            sub.get_one::<Coordinate>("origin"),
            Some(&Coordinate::new(-73.98, 40.75))
        );
        // route has no session flags
        assert_eq!(overrides(sub), CliOverrides::default());
    }

    #[test]
    fn test_invalid_coordinate_is_rejected() {
        assert!(
            build()
                .try_get_matches_from(["navkit", "route", "-o", "200,48", "-d", "2,48"])
                .is_err()
        );
    }

    #[test]
    fn test_denied_permission_flag() {
        let matches = build()
            .try_get_matches_from([
                "navkit",
                "navigate",
                "-o",
                "2.0,48.0",
                "-d",
                "2.1,48.1",
                "--no-location-permission",
            ])
            .unwrap();
        let sub = matches.subcommand_matches("navigate").unwrap();
        assert_eq!(overrides(sub).permission_granted, Some(false));
    }
}
