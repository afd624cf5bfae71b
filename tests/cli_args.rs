//! Integration tests for CLI argument handling
//!
//! Runs the binary with arguments that exit before the server starts.

use std::process::Command;

const ENV_VARS: &[&str] = &[
    "LCP_CACHE_DIR",
    "LCP_BIND",
    "LCP_ACCESS_TOKEN",
    "LCP_FETCH_TIMEOUT_SECS",
    "LCP_GITHUB_TOKEN",
    "LCP_APPLE_MUSIC_APP_TOKEN",
    "LCP_APPLE_MUSIC_USER_TOKEN",
    "LCP_APPLE_MUSIC_PLAYLISTS",
    "LCP_STEAM_KEY",
    "LCP_STEAM_ID",
    "LCP_STRAVA_CLIENT_ID",
    "LCP_STRAVA_CLIENT_SECRET",
    "LCP_STRAVA_REFRESH_TOKEN",
];

/// Helper to run the CLI with given args and a clean environment
fn run_cli(args: &[&str]) -> std::process::Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_lcp"));
    for var in ENV_VARS {
        command.env_remove(var);
    }
    command.args(args).output().expect("Failed to execute lcp")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lcp"), "Help should mention lcp");
    assert!(stdout.contains("--bind"), "Help should mention --bind");
    assert!(stdout.contains("LCP_GITHUB_TOKEN"), "Help should list env fallbacks");
}

#[test]
fn test_version_flag_exits_successfully() {
    let output = run_cli(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_bind_prints_error_and_exits() {
    let output = run_cli(&["--bind", "nowhere"]);
    assert!(!output.status.success(), "Expected invalid bind to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid bind address"),
        "Should print error about the bind address: {}",
        stderr
    );
}

#[test]
fn test_partial_provider_prints_error_and_exits() {
    let output = run_cli(&["--bind", "127.0.0.1:0", "--steam-key", "abc"]);
    assert!(!output.status.success(), "Expected partial steam config to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("steam"), "Should name the provider: {}", stderr);
}

#[test]
fn test_unknown_flag_is_rejected() {
    let output = run_cli(&["--plan"]);
    assert!(!output.status.success());
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use lcp::cli::{Cli, Config, ConfigError};

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["lcp", "--bind", "0.0.0.0:8000", "--fetch-timeout-secs", "60"]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.fetch_timeout.as_secs(), 60);
    }

    #[test]
    fn test_cli_strava_requires_all_parts() {
        let cli = Cli::parse_from(["lcp", "--bind", "127.0.0.1:0", "--strava-client-id", "1"]);
        let err = Config::from_cli(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteProvider { provider: "strava", .. }));
    }
}
