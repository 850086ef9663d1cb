//! Core configuration types.
//! - Config holds transfer defaults and logging settings.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::conflict::ConflictStrategy;
use crate::transfer::TransferOptions;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// Per-decision detail
    Info,
    /// Every probe
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Defaults applied to every transfer plus logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// What to do when a destination file exists (default: fail).
    pub conflict: ConflictStrategy,
    /// Plan only; never touch the filesystem.
    pub dry_run: bool,
    /// Copy access/modification times onto copied files.
    pub preserve_timestamps: bool,
    /// Keep going after a per-file failure inside a folder transfer.
    pub continue_on_error: bool,
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Transfer options carrying this config's defaults.
    pub fn transfer_options(&self, move_source: bool) -> TransferOptions {
        TransferOptions {
            move_source,
            conflict: self.conflict.clone(),
            dry_run: self.dry_run,
            preserve_timestamps: self.preserve_timestamps,
            continue_on_error: self.continue_on_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_aliases() {
        assert_eq!(LogLevel::parse(" Verbose "), Some(LogLevel::Info));
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Quiet.to_string(), "quiet");
    }

    #[test]
    fn transfer_options_follow_config() {
        let cfg = Config {
            conflict: ConflictStrategy::Skip,
            dry_run: true,
            ..Config::default()
        };
        let opts = cfg.transfer_options(true);
        assert!(opts.move_source && opts.dry_run);
        assert_eq!(opts.conflict, ConflictStrategy::Skip);
        assert!(!opts.preserve_timestamps);
    }
}
