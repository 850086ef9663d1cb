//! XML configuration support.
//!
//! Uses quick-xml + serde to parse a simple <config> XML file:
//! <config>
//!   <conflict_strategy>rename-number</conflict_strategy>
//!   <error_if_exists>false</error_if_exists>
//!   <number_separator>-</number_separator>
//!   <number_prefix></number_prefix>
//!   <number_limit>32</number_limit>
//!   <dry_run>false</dry_run>
//!   <preserve_timestamps>true</preserve_timestamps>
//!   <continue_on_error>false</continue_on_error>
//!   <log_level>normal</log_level>
//!   <log_file>/path/to/fs_entry.log</log_file>
//! </config>
//!
//! Unknown elements are rejected so typos surface instead of silently falling back.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::paths::{default_config_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use crate::conflict::{ConflictStrategy, NumberedRename};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config", deny_unknown_fields, default)]
struct XmlConfig {
    conflict_strategy: Option<String>,
    #[serde(deserialize_with = "de_trimmed_opt")]
    error_if_exists: Option<bool>,
    number_separator: Option<String>,
    number_prefix: Option<String>,
    #[serde(deserialize_with = "de_trimmed_opt")]
    number_limit: Option<u32>,
    #[serde(deserialize_with = "de_trimmed_opt")]
    dry_run: Option<bool>,
    #[serde(deserialize_with = "de_trimmed_opt")]
    preserve_timestamps: Option<bool>,
    #[serde(deserialize_with = "de_trimmed_opt")]
    continue_on_error: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

// Tolerate surrounding whitespace in scalar elements; empty means "not set".
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    let error_if_exists = parsed.error_if_exists.unwrap_or(false);
    if let Some(name) = parsed.conflict_strategy.as_deref() {
        cfg.conflict = ConflictStrategy::from_str(name).map_err(|e| anyhow!(e))?;
    }
    match &mut cfg.conflict {
        ConflictStrategy::RenameWithSuffix {
            error_if_exists: flag,
        } => *flag = error_if_exists,
        ConflictStrategy::RenameWithNumber(numbered) => {
            let defaults = NumberedRename::default();
            *numbered = NumberedRename {
                separator: parsed.number_separator.unwrap_or(defaults.separator),
                prefix: parsed.number_prefix.unwrap_or(defaults.prefix),
                limit: parsed.number_limit.unwrap_or(defaults.limit),
                error_if_exists,
            };
        }
        _ => {}
    }

    cfg.dry_run = parsed.dry_run.unwrap_or(false);
    cfg.preserve_timestamps = parsed.preserve_timestamps.unwrap_or(false);
    cfg.continue_on_error = parsed.continue_on_error.unwrap_or(false);

    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    cfg.log_file = parsed
        .log_file
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    cfg.validate()?;
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    let cfg = xml_to_config(parsed).with_context(|| format!("invalid config '{}'", path.display()))?;
    debug!(path = %path.display(), strategy = %cfg.conflict, "loaded config");
    Ok(cfg)
}

/// Load the config from `$FS_ENTRY_CONFIG` or the platform default location.
/// Returns `Ok(None)` when no file exists there.
pub fn load_config(cwd: &Path) -> Result<Option<Config>> {
    let path = default_config_path(cwd).context("resolve config path")?;
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(None);
    }
    load_config_from_xml_path(&path).map(Some)
}

/// Write a commented template config to `path`. Never replaces an existing file
/// and refuses to write below a symlinked directory.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config directory '{}'", parent.display()))?;
    }

    let content = "<!--\n  fs_entry configuration (XML)\n\n    conflict_strategy   -> error | skip | overwrite | rename-suffix | rename-number\n    error_if_exists     -> rename strategies: fail instead of replacing/skipping\n    number_separator    -> rename-number: text between name and number\n    number_prefix       -> rename-number: text before the number\n    number_limit        -> rename-number: highest number probed\n    log_level           -> quiet | normal | info | debug\n-->\n<config>\n  <conflict_strategy>error</conflict_strategy>\n  <error_if_exists>false</error_if_exists>\n  <number_separator>-</number_separator>\n  <number_limit>32</number_limit>\n  <dry_run>false</dry_run>\n  <preserve_timestamps>false</preserve_timestamps>\n  <continue_on_error>false</continue_on_error>\n  <log_level>normal</log_level>\n</config>\n";

    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .with_context(|| format!("create config '{}'", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("write config '{}'", path.display()))?;

    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_round_trips_to_defaults() {
        let td = tempdir().unwrap();
        let p = td.path().join("nested/config.xml");
        create_template_config(&p).unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert_eq!(cfg, Config::default());
        // Never clobbers.
        assert!(create_template_config(&p).is_err());
    }

    #[test]
    fn numbered_strategy_parameters() {
        let td = tempdir().unwrap();
        let p = td.path().join("c.xml");
        fs::write(
            &p,
            "<config>\n  <conflict_strategy>rename-number</conflict_strategy>\n  <number_separator>_</number_separator>\n  <number_prefix>v</number_prefix>\n  <number_limit> 5 </number_limit>\n  <error_if_exists>true</error_if_exists>\n</config>",
        )
        .unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert_eq!(
            cfg.conflict,
            ConflictStrategy::RenameWithNumber(NumberedRename {
                separator: "_".into(),
                prefix: "v".into(),
                limit: 5,
                error_if_exists: true,
            })
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("c.xml");
        fs::write(&p, "<config><download_base>/x</download_base></config>").unwrap();
        assert!(load_config_from_xml_path(&p).is_err());
    }
}
