//! Shallow folder comparison.
//!
//! Only files sitting directly inside the two folders are compared; sub-folders are
//! ignored. Files are paired by exact name and compared by size, then optionally by
//! content digest.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use tracing::debug;

use crate::entry::PathEntry;
use crate::errors::{FsError, Op, Result};
use crate::hash::{self, HashAlgorithm};
use crate::walker::{self, NameMatch, TraversalOptions};

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Only files whose name matches take part.
    pub filter: Option<NameMatch>,
    /// Compare content digests of same-sized files with this algorithm.
    pub checksum: Option<HashAlgorithm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDiff {
    /// Present in `a`, absent from `b`.
    pub missing: BTreeSet<OsString>,
    /// Present in `b`, absent from `a`.
    pub added: BTreeSet<OsString>,
    /// Present in both but different.
    pub changed: BTreeSet<OsString>,
}

impl FolderDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }
}

/// Compare the files directly inside folders `a` and `b`.
pub fn diff(a: &mut PathEntry, b: &mut PathEntry, opts: &DiffOptions) -> Result<FolderDiff> {
    let left = files_of(a, opts)?;
    let right = files_of(b, opts)?;

    let mut out = FolderDiff::default();
    for (name, l) in &left {
        let Some(r) = right.get(name) else {
            out.missing.insert(name.clone());
            continue;
        };
        let differs = if l.size() != r.size() {
            true
        } else if let Some(algo) = opts.checksum {
            hash::digest(l.path(), algo)? != hash::digest(r.path(), algo)?
        } else {
            false
        };
        if differs {
            out.changed.insert(name.clone());
        }
    }
    out.added = right
        .keys()
        .filter(|name| !left.contains_key(*name))
        .cloned()
        .collect();

    debug!(
        a = %a.path().display(),
        b = %b.path().display(),
        missing = out.missing.len(),
        added = out.added.len(),
        changed = out.changed.len(),
        "compared folders"
    );
    Ok(out)
}

fn files_of(entry: &mut PathEntry, opts: &DiffOptions) -> Result<BTreeMap<OsString, PathEntry>> {
    entry.resolve(false)?;
    if !entry.is_folder() {
        return Err(FsError::InvalidOperation {
            path: entry.path().to_path_buf(),
            op: Op::Diff,
            reason: "only folders can be compared",
        });
    }
    let traversal = TraversalOptions {
        matcher: opts.filter.clone(),
        ..TraversalOptions::default()
    };
    let children = walker::get_children(entry, &traversal)?;

    let mut files = BTreeMap::new();
    for f in &children.files {
        let mut f = f.clone();
        f.resolve(false)?;
        // Vanished between listing and probe: treat as absent.
        if f.is_file() {
            files.insert(f.name().to_os_string(), f);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn classifies_missing_added_changed() {
        let td = assert_fs::TempDir::new().unwrap();
        let a = td.child("a");
        let b = td.child("b");
        a.child("same.txt").write_str("same").unwrap();
        b.child("same.txt").write_str("same").unwrap();
        a.child("gone.txt").write_str("g").unwrap();
        b.child("new.txt").write_str("n").unwrap();
        a.child("grew.txt").write_str("1").unwrap();
        b.child("grew.txt").write_str("12").unwrap();
        // Sub-folders are ignored.
        a.child("sub/deep.txt").write_str("d").unwrap();

        let mut ea = PathEntry::new(a.path(), td.path());
        let mut eb = PathEntry::new(b.path(), td.path());
        let d = diff(&mut ea, &mut eb, &DiffOptions::default()).unwrap();

        assert_eq!(d.missing, BTreeSet::from([OsString::from("gone.txt")]));
        assert_eq!(d.added, BTreeSet::from([OsString::from("new.txt")]));
        assert_eq!(d.changed, BTreeSet::from([OsString::from("grew.txt")]));
    }

    #[test]
    fn checksum_catches_same_size_edits() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("a/f.bin").write_str("abcd").unwrap();
        td.child("b/f.bin").write_str("abce").unwrap();

        let mut ea = PathEntry::new(td.child("a").path(), td.path());
        let mut eb = PathEntry::new(td.child("b").path(), td.path());
        assert!(diff(&mut ea, &mut eb, &DiffOptions::default()).unwrap().is_empty());

        let opts = DiffOptions {
            checksum: Some(HashAlgorithm::Sha256),
            ..Default::default()
        };
        let d = diff(&mut ea, &mut eb, &opts).unwrap();
        assert_eq!(d.changed.len(), 1);
    }

    #[test]
    fn filter_limits_compared_names() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("a/keep.log").write_str("1").unwrap();
        td.child("a/other.txt").write_str("1").unwrap();
        td.child("b").create_dir_all().unwrap();

        let mut ea = PathEntry::new(td.child("a").path(), td.path());
        let mut eb = PathEntry::new(td.child("b").path(), td.path());
        let opts = DiffOptions {
            filter: Some(NameMatch::pattern(r"\.log$").unwrap()),
            ..Default::default()
        };
        let d = diff(&mut ea, &mut eb, &opts).unwrap();
        assert_eq!(d.missing, BTreeSet::from([OsString::from("keep.log")]));
    }

    #[test]
    fn non_folder_is_rejected() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("file").write_str("x").unwrap();
        let mut ea = PathEntry::new(td.child("file").path(), td.path());
        let mut eb = PathEntry::new(td.path(), td.path());
        let err = diff(&mut ea, &mut eb, &DiffOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::InvalidOperation { op: Op::Diff, .. }));
    }
}
