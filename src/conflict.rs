//! Conflict resolution for destinations that already exist.
//!
//! Policy:
//! - RenameWithSuffix: the existing file is to be moved aside to `<name>~`.
//! - RenameWithNumber: the existing file is to be moved aside to the first free
//!   `<stem><sep><prefix><NN><.ext>`, probing `NN = 01..=limit` one at a time.
//! - Overwrite: replace the existing file.
//! - Skip: leave it alone and skip this one file.
//! - Error: fail.
//!
//! Numbered probing only looks at the current filesystem state. Two writers probing
//! the same directory can both pick the same free name; callers that need more
//! must serialize access themselves.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};

use crate::errors::{FsError, Op, Result};
use crate::fs_ops;

/// Marker appended by [`ConflictStrategy::RenameWithSuffix`].
pub const BACKUP_SUFFIX: &str = "~";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedRename {
    pub separator: String,
    pub prefix: String,
    /// Highest number probed. `0` probes nothing: every candidate counts as taken.
    pub limit: u32,
    /// Fail instead of skipping once every candidate is taken.
    pub error_if_exists: bool,
}

impl Default for NumberedRename {
    fn default() -> Self {
        Self {
            separator: "-".to_string(),
            prefix: String::new(),
            limit: 32,
            error_if_exists: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    RenameWithSuffix {
        /// Fail rather than replace an existing `<name>~`.
        error_if_exists: bool,
    },
    RenameWithNumber(NumberedRename),
    Overwrite,
    Skip,
    /// Used when no strategy is given: an existing destination is never clobbered
    /// implicitly.
    #[default]
    Error,
}

impl ConflictStrategy {
    pub fn error_if_exists(&self) -> bool {
        match self {
            ConflictStrategy::RenameWithSuffix { error_if_exists } => *error_if_exists,
            ConflictStrategy::RenameWithNumber(n) => n.error_if_exists,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConflictStrategy::RenameWithSuffix { .. } => "rename-suffix",
            ConflictStrategy::RenameWithNumber(_) => "rename-number",
            ConflictStrategy::Overwrite => "overwrite",
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Error => "error",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    /// Parse a strategy name; rename strategies get their default parameters.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rename-suffix" | "suffix" | "backup" => Ok(ConflictStrategy::RenameWithSuffix {
                error_if_exists: false,
            }),
            "rename-number" | "number" | "numbered" => {
                Ok(ConflictStrategy::RenameWithNumber(NumberedRename::default()))
            }
            "overwrite" | "replace" => Ok(ConflictStrategy::Overwrite),
            "skip" => Ok(ConflictStrategy::Skip),
            "error" | "fail" => Ok(ConflictStrategy::Error),
            other => Err(format!("invalid conflict strategy: '{other}'")),
        }
    }
}

/// Outcome of [`compute_destination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Relocate the existing file here, then use the original destination.
    Alternate(PathBuf),
    /// Replace the existing destination.
    Overwrite,
    /// Leave the destination alone and skip this file.
    Skip,
}

/// Decide what to do about an existing `candidate` according to `strategy`.
pub fn compute_destination(strategy: &ConflictStrategy, candidate: &Path) -> Result<Resolution> {
    let resolution = match strategy {
        ConflictStrategy::RenameWithSuffix { .. } => {
            let mut name = candidate.file_name().map(OsStr::to_os_string).ok_or_else(|| {
                FsError::InvalidDestination {
                    path: candidate.to_path_buf(),
                    op: Op::ResolveConflict,
                    reason: "destination has no file name",
                }
            })?;
            name.push(BACKUP_SUFFIX);
            Resolution::Alternate(candidate.with_file_name(name))
        }
        ConflictStrategy::RenameWithNumber(rule) => numbered(rule, candidate)?,
        ConflictStrategy::Overwrite => Resolution::Overwrite,
        ConflictStrategy::Skip => Resolution::Skip,
        ConflictStrategy::Error => {
            return Err(FsError::AlreadyExists {
                path: candidate.to_path_buf(),
                op: Op::ResolveConflict,
            });
        }
    };
    debug!(path = %candidate.display(), strategy = %strategy, ?resolution, "resolved conflict");
    Ok(resolution)
}

fn numbered(rule: &NumberedRename, candidate: &Path) -> Result<Resolution> {
    let name = candidate.file_name().ok_or_else(|| FsError::InvalidDestination {
        path: candidate.to_path_buf(),
        op: Op::ResolveConflict,
        reason: "destination has no file name",
    })?;
    let base = Path::new(name);
    let stem = base.file_stem().unwrap_or(name);
    let ext = base.extension();

    // Each probe depends on the previous one coming back taken, so this stays sequential.
    for n in 1..=rule.limit {
        let marker = format!("{}{}{:02}", rule.separator, rule.prefix, n);
        let next = candidate.with_file_name(build_name_with_marker(stem, ext, &marker));
        if !fs_ops::exists(&next)? {
            return Ok(Resolution::Alternate(next));
        }
        trace!(path = %next.display(), "numbered candidate taken");
    }

    if rule.error_if_exists {
        Err(FsError::AlreadyExists {
            path: candidate.to_path_buf(),
            op: Op::ResolveConflict,
        })
    } else {
        Ok(Resolution::Skip)
    }
}

// Conservative filename limits (bytes/characters, platform-specific and approximate).
#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Join `stem + marker + ["." + ext]`, shortening only the stem when the result
/// would exceed the platform file-name limit.
fn build_name_with_marker(stem: &OsStr, ext: Option<&OsStr>, marker: &str) -> OsString {
    let mut tail = OsString::from(marker);
    if let Some(e) = ext {
        tail.push(".");
        tail.push(e);
    }
    let budget = MAX_FILENAME_LEN.saturating_sub(name_len_units(&tail)).max(1);

    let mut name = if name_len_units(stem) <= budget {
        stem.to_os_string()
    } else {
        truncate_stem(stem, budget)
    };
    name.push(&tail);
    name
}

fn truncate_stem(stem: &OsStr, budget: usize) -> OsString {
    if let Some(s) = stem.to_str() {
        let mut end = 0;
        for (idx, ch) in s.char_indices() {
            if idx + ch.len_utf8() > budget {
                break;
            }
            end = idx + ch.len_utf8();
        }
        return OsString::from(if end == 0 { "f" } else { &s[..end] });
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        let bytes = stem.as_bytes();
        OsString::from_vec(bytes[..bytes.len().min(budget)].to_vec())
    }
    #[cfg(not(unix))]
    {
        let lossy = stem.to_string_lossy().into_owned();
        truncate_stem(OsStr::new(&lossy), budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_strategy_is_error() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::Error);
        let td = tempdir().unwrap();
        let err = compute_destination(&ConflictStrategy::default(), &td.path().join("x")).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists { op: Op::ResolveConflict, .. }));
    }

    #[test]
    fn suffix_appends_tilde_without_probing() {
        let p = Path::new("/nowhere/report.pdf");
        let r = compute_destination(
            &ConflictStrategy::RenameWithSuffix { error_if_exists: true },
            p,
        )
        .unwrap();
        assert_eq!(r, Resolution::Alternate(PathBuf::from("/nowhere/report.pdf~")));
    }

    #[test]
    fn numbered_uses_separator_prefix_and_extension() {
        let td = tempdir().unwrap();
        let dest = td.path().join("movie.mkv");
        fs::write(&dest, b"x").unwrap();
        fs::write(td.path().join("movie_v01.mkv"), b"x").unwrap();

        let rule = NumberedRename {
            separator: "_".into(),
            prefix: "v".into(),
            limit: 5,
            error_if_exists: false,
        };
        let r = compute_destination(&ConflictStrategy::RenameWithNumber(rule), &dest).unwrap();
        assert_eq!(r, Resolution::Alternate(td.path().join("movie_v02.mkv")));
    }

    #[test]
    fn numbers_past_99_widen() {
        let marker = format!("-{:02}", 100);
        assert_eq!(
            build_name_with_marker(OsStr::new("a"), Some(OsStr::new("txt")), &marker),
            OsString::from("a-100.txt")
        );
    }

    #[test]
    fn long_stems_are_trimmed_to_fit() {
        let stem = "x".repeat(400);
        let name = build_name_with_marker(OsStr::new(&stem), Some(OsStr::new("txt")), "-01");
        assert_eq!(name_len_units(&name), MAX_FILENAME_LEN);
        assert!(name.to_string_lossy().ends_with("-01.txt"));
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("Skip".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Skip);
        assert_eq!(
            "rename-number".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::RenameWithNumber(NumberedRename::default())
        );
        assert!("clobber".parse::<ConflictStrategy>().is_err());
    }
}
