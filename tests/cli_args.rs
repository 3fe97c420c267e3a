use std::path::Path;
use std::str::FromStr;

use clap::Parser;

use remotewatch::cli::{CliArgs, LogLevel};
use remotewatch::config::default_config_path;
use remotewatch::logging::parse_level_str;
use remotewatch::types::ObservationScope;

#[test]
fn defaults_to_local_config_file() {
    let args = CliArgs::try_parse_from(["remotewatch"]).unwrap();
    assert_eq!(args.config, default_config_path());
    assert_eq!(args.config, Path::new("Remotewatch.toml"));
    assert!(args.log_level.is_none());
    assert!(!args.dry_run);
}

#[test]
fn accepts_config_level_and_dry_run() {
    let args = CliArgs::try_parse_from([
        "remotewatch",
        "--config",
        "demos/Remotewatch.toml",
        "--log-level",
        "debug",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(args.config, Path::new("demos/Remotewatch.toml"));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.dry_run);
}

#[test]
fn rejects_unknown_log_level() {
    assert!(CliArgs::try_parse_from(["remotewatch", "--log-level", "loud"]).is_err());
}

#[test]
fn env_level_names() {
    assert_eq!(parse_level_str("WARNING"), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str(" trace "), Some(tracing::Level::TRACE));
    assert_eq!(parse_level_str("verbose"), None);
}

#[test]
fn scope_parses_and_displays() {
    assert_eq!(ObservationScope::default(), ObservationScope::Children);
    assert_eq!(
        ObservationScope::from_str("Descendants").unwrap(),
        ObservationScope::Descendants
    );
    assert!(ObservationScope::from_str("recursive").is_err());
    assert_eq!(ObservationScope::Children.to_string(), "children");
}
