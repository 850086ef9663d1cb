//! Depth-limited, filtered directory traversal.
//!
//! [`get_children`] lists a folder, builds hinted entries for every row, keeps the
//! ones whose name matches, and descends into matched sub-folders while depth
//! remains. Each depth level fans out on the rayon pool and is joined, together
//! with its `on_match` hooks, before the next level is listed.
//!
//! Filter vs recursion: by default a folder whose own name fails the filter is
//! pruned together with its whole subtree. Set
//! [`TraversalOptions::descend_into_unmatched`] to look for matches below it anyway.

use rayon::prelude::*;
use regex::Regex;
use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::entry::{EntryKind, PathEntry};
use crate::errors::{FsError, Op, Result};
use crate::fs_ops::{self, Listing};

/// Name filter applied to every listed entry.
#[derive(Debug, Clone)]
pub enum NameMatch {
    /// Name must be exactly equal.
    Exact(OsString),
    /// Name (lossily decoded) must satisfy the regular expression.
    Pattern(Regex),
}

impl NameMatch {
    pub fn exact(name: impl Into<OsString>) -> Self {
        NameMatch::Exact(name.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(NameMatch::Pattern)
            .map_err(|source| FsError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn is_match(&self, name: &OsStr) -> bool {
        match self {
            NameMatch::Exact(want) => want == name,
            NameMatch::Pattern(re) => re.is_match(&name.to_string_lossy()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Alphabetical,
    /// Files only; folders keep alphabetical order.
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub by: SortBy,
    pub direction: SortDirection,
}

/// Side-effect hook invoked once per matched entry.
pub type MatchHook = Arc<dyn Fn(&PathEntry) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct TraversalOptions {
    pub matcher: Option<NameMatch>,
    /// Remaining depth. `Some(0)` lists this level only; `None` is unlimited.
    pub levels: Option<u32>,
    pub sort: Option<SortSpec>,
    pub on_match: Option<MatchHook>,
    pub descend_into_unmatched: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            matcher: None,
            levels: Some(0),
            sort: None,
            on_match: None,
            descend_into_unmatched: false,
        }
    }
}

impl fmt::Debug for TraversalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalOptions")
            .field("matcher", &self.matcher)
            .field("levels", &self.levels)
            .field("sort", &self.sort)
            .field("on_match", &self.on_match.as_ref().map(|_| "<hook>"))
            .field("descend_into_unmatched", &self.descend_into_unmatched)
            .finish()
    }
}

impl TraversalOptions {
    /// Unlimited depth, no filter, no sort.
    pub fn recursive() -> Self {
        Self {
            levels: None,
            ..Self::default()
        }
    }

    pub fn levels(mut self, levels: u32) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn matching(mut self, matcher: NameMatch) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn sorted(mut self, by: SortBy, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec { by, direction });
        self
    }

    pub fn on_match(mut self, hook: impl Fn(&PathEntry) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_match = Some(Arc::new(hook));
        self
    }

    pub fn descend_into_unmatched(mut self, yes: bool) -> Self {
        self.descend_into_unmatched = yes;
        self
    }

    fn matches(&self, name: &OsStr) -> bool {
        self.matcher.as_ref().is_none_or(|m| m.is_match(name))
    }
}

/// Matched entries of one traversal, partitioned by kind.
#[derive(Debug, Clone, Default)]
pub struct Children {
    pub files: Vec<PathEntry>,
    pub folders: Vec<PathEntry>,
    pub symlinks: Vec<PathEntry>,
    /// Sockets, FIFOs, devices, and rows whose kind could not be determined.
    pub other: Vec<PathEntry>,
}

impl Children {
    fn partition(entries: Vec<PathEntry>) -> Self {
        let mut out = Children::default();
        for e in entries {
            match e.kind() {
                EntryKind::File => out.files.push(e),
                EntryKind::Folder => out.folders.push(e),
                EntryKind::Symlink => out.symlinks.push(e),
                EntryKind::Other | EntryKind::Unknown | EntryKind::Missing => out.other.push(e),
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.folders.len() + self.symlinks.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.folders
            .iter()
            .chain(&self.files)
            .chain(&self.symlinks)
            .chain(&self.other)
    }
}

/// Enumerate the matching descendants of `entry` and store the partition on it.
///
/// `entry` must already be known to be a folder (probed or hinted); anything else
/// is an `InvalidOperation`. Any listing failure, at the root or below, aborts the
/// whole call with the first error seen. Each call replaces the previously stored
/// partition.
pub fn get_children<'a>(entry: &'a mut PathEntry, opts: &TraversalOptions) -> Result<&'a Children> {
    if !entry.is_folder() {
        return Err(FsError::InvalidOperation {
            path: entry.path().to_path_buf(),
            op: Op::Traverse,
            reason: "entry is not a resolved folder",
        });
    }

    let matched = collect(entry.path(), opts.levels, opts)?;
    let mut children = Children::partition(matched);
    if let Some(sort) = opts.sort {
        sort_children(&mut children, sort)?;
    }
    debug!(
        path = %entry.path().display(),
        files = children.files.len(),
        folders = children.folders.len(),
        symlinks = children.symlinks.len(),
        "traversed folder"
    );
    Ok(entry.store_children(children))
}

/// Breadth-first: each pass lists the whole frontier in parallel and runs the
/// hooks of everything it matched; the pass is joined before the next one starts.
/// Stack depth stays constant however deep the tree goes.
fn collect(root: &Path, levels: Option<u32>, opts: &TraversalOptions) -> Result<Vec<PathEntry>> {
    let mut matched = Vec::new();
    let mut frontier: Vec<(PathBuf, Option<u32>)> = vec![(root.to_path_buf(), levels)];

    while !frontier.is_empty() {
        let visited: Vec<Vec<Visit>> = frontier
            .par_iter()
            .map(|(dir, levels)| -> Result<Vec<Visit>> {
                fs_ops::list_dir(dir)?
                    .into_par_iter()
                    .map(|row| visit(dir, row, *levels, opts))
                    .collect::<Result<_>>()
            })
            .collect::<Result<_>>()?;

        frontier = Vec::new();
        for v in visited.into_iter().flatten() {
            if let Some(next) = v.descend {
                frontier.push(next);
            }
            if let Some(entry) = v.matched {
                matched.push(entry);
            }
        }
    }
    Ok(matched)
}

struct Visit {
    matched: Option<PathEntry>,
    descend: Option<(PathBuf, Option<u32>)>,
}

fn visit(dir: &Path, row: Listing, levels: Option<u32>, opts: &TraversalOptions) -> Result<Visit> {
    let entry = PathEntry::from_hint(dir, &row.name, row.hint);
    let matched = opts.matches(entry.name());
    let descend = (entry.is_folder()
        && levels != Some(0)
        && (matched || opts.descend_into_unmatched))
        .then(|| (entry.path().to_path_buf(), levels.map(|l| l - 1)));

    if matched {
        if let Some(hook) = &opts.on_match {
            hook(&entry)?;
        }
    }
    Ok(Visit {
        matched: matched.then_some(entry),
        descend,
    })
}

fn by_name(a: &PathEntry, b: &PathEntry) -> Ordering {
    a.name().cmp(b.name()).then_with(|| a.path().cmp(b.path()))
}

fn sort_children(children: &mut Children, sort: SortSpec) -> Result<()> {
    children.folders.sort_by(by_name);
    match sort.by {
        SortBy::Alphabetical => children.files.sort_by(by_name),
        SortBy::Size => {
            children
                .files
                .par_iter_mut()
                .try_for_each(|f| f.resolve(false).map(|_| ()))?;
            children
                .files
                .sort_by(|a, b| a.size().cmp(&b.size()).then_with(|| by_name(a, b)));
        }
    }
    if sort.direction == SortDirection::Descending {
        children.folders.reverse();
        children.files.reverse();
    }
    Ok(())
}
