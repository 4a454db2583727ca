//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_replay() {
    let cli = parse(&["lastore", "replay", "session.json"]);
    assert!(cli.config.is_none());
    match cli.command {
        CliCommand::Replay { script, no_delay } => {
            assert_eq!(script, Path::new("session.json"));
            assert!(!no_delay);
        }
        _ => panic!("expected Replay"),
    }
}

#[test]
fn cli_parse_replay_no_delay_with_config() {
    let cli = parse(&[
        "lastore",
        "replay",
        "s.json",
        "--no-delay",
        "--config",
        "/etc/lastore.toml",
    ]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/lastore.toml")));
    match cli.command {
        CliCommand::Replay { no_delay, .. } => assert!(no_delay),
        _ => panic!("expected Replay with --no-delay"),
    }
}

#[test]
fn cli_parse_config_and_lanes() {
    assert!(matches!(parse(&["lastore", "config"]).command, CliCommand::Config));
    assert!(matches!(parse(&["lastore", "lanes"]).command, CliCommand::Lanes));
}

#[test]
fn cli_rejects_missing_script() {
    assert!(Cli::try_parse_from(["lastore", "replay"]).is_err());
}
