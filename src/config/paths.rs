//! Default path helpers and symlink checks.

use anyhow::{Result, anyhow};
use dirs::config_dir;
use std::env;
use std::path::{Path, PathBuf};

use crate::entry::PathEntry;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FS_ENTRY_CONFIG";

/// Config path: `$FS_ENTRY_CONFIG` when set (relative values are taken against
/// `cwd`), else `<config dir>/fs_entry/config.xml`.
pub fn default_config_path(cwd: &Path) -> Result<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathEntry::new(PathBuf::from(p), cwd).path().to_path_buf());
    }
    if let Some(base) = config_dir() {
        return Ok(base.join("fs_entry").join("config.xml"));
    }
    env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".config").join("fs_entry").join("config.xml"))
        .ok_or_else(|| anyhow!("cannot determine a config directory (no config dir and no HOME)"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> crate::Result<bool> {
    let mut cur = path.parent();
    while let Some(anc) = cur {
        if anc.as_os_str().is_empty() {
            break;
        }
        let mut e = PathEntry::new(anc, anc);
        if e.resolve(false)? == crate::EntryKind::Symlink {
            return Ok(true);
        }
        cur = anc.parent();
    }
    Ok(false)
}
