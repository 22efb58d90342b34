//! Application definition.

extern crate simplelog;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use petgen::{FilePaths, OutputMode, Runner};

use crate::util;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("petgen")
        .version(VERSION)
        .author(AUTHORS)
        .about("Generate synthetic measurements for a problem definition.\n\
                Reads petab.yaml and writes measurements.tsv next to it.")
        .arg(Arg::with_name("dir")
            .long("dir")
            .short("d")
            .takes_value(true)
            .value_name("path")
            .help("Base directory containing the problem file \
                   (defaults to the directory of the executable)"))
        .arg(Arg::with_name("mode")
            .long("mode")
            .short("m")
            .takes_value(true)
            .possible_values(&["noisy", "noise-free", "both"])
            .default_value("noisy")
            .help("Select which measurement tables to write"))
        .arg(Arg::with_name("seed")
            .long("seed")
            .short("s")
            .takes_value(true)
            .value_name("u64")
            .help("Seed the noise generator, overrides the problem file seed"))
        .arg(Arg::with_name("verbosity")
            .long("verbosity")
            .short("v")
            .takes_value(true)
            .default_value("info")
            .value_name("verb")
            .help("Set the verbosity of the log output"))
}

pub fn app_matches<'a>() -> ArgMatches<'a> {
    app().get_matches()
}

pub fn start(matches: ArgMatches) -> Result<()> {
    setup_log_verbosity(&matches);

    let dir = match matches.value_of("dir") {
        Some(d) => util::absolute_path(PathBuf::from(d))?,
        None => util::executable_dir()?,
    };
    let mut runner = Runner::new(FilePaths::from_dir(&dir));
    if let Some(mode) = matches.value_of("mode") {
        runner.mode = mode.parse::<OutputMode>()?;
    }
    if let Some(seed) = matches.value_of("seed") {
        runner.seed = Some(
            seed.parse::<u64>()
                .with_context(|| format!("invalid seed: {}", seed))?,
        );
    }
    info!(
        "problem: {}, output mode: {}",
        runner.paths.problem.to_string_lossy(),
        runner.mode
    );

    runner.run().with_context(|| {
        format!(
            "failed generating measurements for {}",
            runner.paths.problem.to_string_lossy()
        )
    })?;
    Ok(())
}

fn setup_log_verbosity(matches: &ArgMatches) {
    use self::simplelog::{LevelFilter, TermLogger};
    let level_filter = match matches.value_of("verbosity") {
        Some(s) => match s {
            "0" | "none" => LevelFilter::Off,
            "1" | "err" | "error" | "min" => LevelFilter::Error,
            "2" | "warn" | "warning" => LevelFilter::Warn,
            "3" | "info" | "default" => LevelFilter::Info,
            "4" | "debug" => LevelFilter::Debug,
            "5" | "trace" | "max" | "all" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        },
        _ => LevelFilter::Info,
    };
    let mut config_builder = simplelog::ConfigBuilder::new();
    let logger_conf = config_builder
        .set_time_level(LevelFilter::Error)
        .set_target_level(LevelFilter::Debug)
        .set_location_level(LevelFilter::Error)
        .set_time_format_str("%H:%M:%S%.6f")
        .build();
    // a logger might already be set, nothing to do then
    let _ = TermLogger::init(level_filter, logger_conf, simplelog::TerminalMode::Mixed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let matches = app().get_matches_from(vec!["petgen"]);
        assert_eq!(matches.value_of("mode"), Some("noisy"));
        assert_eq!(matches.value_of("verbosity"), Some("info"));
        assert!(matches.value_of("dir").is_none());
        assert!(matches.value_of("seed").is_none());
    }

    #[test]
    fn flags() {
        let matches = app().get_matches_from(vec![
            "petgen", "-d", "problems/conversion", "-m", "both", "-s", "7", "-v", "debug",
        ]);
        assert_eq!(matches.value_of("dir"), Some("problems/conversion"));
        assert_eq!(matches.value_of("mode"), Some("both"));
        assert_eq!(matches.value_of("seed"), Some("7"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(app()
            .get_matches_from_safe(vec!["petgen", "--mode", "loud"])
            .is_err());
    }

    #[test]
    fn invalid_seed_fails() {
        let matches = app().get_matches_from(vec!["petgen", "-d", ".", "-s", "x", "-v", "none"]);
        assert!(start(matches).is_err());
    }
}
