//! CLI argument definitions for emsight-daemon.
//!
//! Uses `clap` v4 derive macros. Every override here takes precedence
//! over both the config file and `EMSIGHT_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

use emsight_core::config::{EmsightConfig, SourceMode};

/// ONTAP EMS streaming intelligence daemon.
///
/// Tails (or replays) an EMS log file, normalizes each line, and reports
/// failure cascades and anomalous time windows as structured log records.
#[derive(Parser, Debug, Default)]
#[command(name = "emsight-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the emsight.toml configuration file.
    ///
    /// A missing file is not an error: built-in defaults are used instead.
    #[arg(short, long, default_value = "emsight.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the source mode (follow, replay).
    #[arg(short, long)]
    pub mode: Option<SourceMode>,

    /// Override the EMS log file to read.
    #[arg(short, long)]
    pub source: Option<String>,

    /// Validate configuration and exit without starting the pipeline.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply the flags that were given on top of `config`.
    pub fn apply_overrides(&self, config: &mut EmsightConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(mode) = self.mode {
            config.ingestion.mode = mode;
        }
        if let Some(source) = &self.source {
            config.ingestion.source_file.clone_from(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let cli = DaemonCli::try_parse_from(["emsight-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("emsight.toml"));
        assert!(cli.mode.is_none());
        assert!(cli.source.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn parses_overrides() {
        let cli = DaemonCli::try_parse_from([
            "emsight-daemon",
            "--config",
            "/tmp/e.toml",
            "--mode",
            "replay",
            "--source",
            "logs/a.log",
            "--log-format",
            "pretty",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/e.toml"));
        assert_eq!(cli.mode, Some(SourceMode::Replay));
        assert_eq!(cli.source.as_deref(), Some("logs/a.log"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let cli = DaemonCli {
            mode: Some(SourceMode::Replay),
            log_level: Some("debug".to_owned()),
            ..DaemonCli::default()
        };
        let mut config = EmsightConfig::default();
        let source_before = config.ingestion.source_file.clone();

        cli.apply_overrides(&mut config);

        assert_eq!(config.ingestion.mode, SourceMode::Replay);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingestion.source_file, source_before);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(DaemonCli::try_parse_from(["emsight-daemon", "--mode", "rewind"]).is_err());
    }
}
