//! Deferred-identity path entries.
//!
//! A [`PathEntry`] names one absolute path whose kind is not known until it is
//! probed. Kinds arrive either cheaply, as a hint from a parent directory listing,
//! or through an explicit [`PathEntry::resolve`]. Once probed, the cached kind and
//! metadata stay valid for that snapshot: nothing re-probes behind the caller's
//! back. Mutations that change what the path refers to reset the entry to
//! [`EntryKind::Unknown`].

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

use crate::errors::Result;
use crate::fs_ops;
use crate::walker::Children;

/// What a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    /// Not probed yet and no hint attached.
    #[default]
    Unknown,
    File,
    Folder,
    Symlink,
    /// Probed, and nothing exists at the path.
    Missing,
    /// Socket, FIFO, device node and the like.
    Other,
}

/// Metadata captured by the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct PathEntry {
    path: PathBuf,
    kind: EntryKind,
    hint: Option<EntryKind>,
    metadata: Option<EntryMetadata>,
    children: Option<Children>,
    // A listing hint never counts as a probe.
    probed: bool,
}

impl PathEntry {
    /// Entry for `path`; a relative `path` is taken relative to `cwd`.
    /// The result is lexically normalized (`.` and `..` folded) without touching disk.
    pub fn new(path: impl AsRef<Path>, cwd: &Path) -> Self {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        Self::unresolved(normalize(dunce::simplified(&joined)))
    }

    /// Entry for `parent/name`. `parent` is expected to be absolute already.
    pub fn child(parent: &Path, name: impl AsRef<OsStr>) -> Self {
        Self::unresolved(parent.join(name.as_ref()))
    }

    /// Entry for `parent/name` whose kind comes straight from a listing hint,
    /// skipping the stat probe. Metadata stays unresolved until [`resolve`](Self::resolve).
    pub fn from_hint(parent: &Path, name: impl AsRef<OsStr>, hint: EntryKind) -> Self {
        let mut entry = Self::child(parent, name);
        entry.kind = hint;
        entry.hint = Some(hint);
        entry
    }

    fn unresolved(path: PathBuf) -> Self {
        Self {
            path,
            kind: EntryKind::Unknown,
            hint: None,
            metadata: None,
            children: None,
            probed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, or the whole path for a filesystem root.
    pub fn name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn hint(&self) -> Option<EntryKind> {
        self.hint
    }

    pub fn metadata(&self) -> Option<&EntryMetadata> {
        self.metadata.as_ref()
    }

    /// Size from the cached metadata, if the entry was probed.
    pub fn size(&self) -> Option<u64> {
        self.metadata.map(|m| m.size)
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    pub fn is_missing(&self) -> bool {
        self.kind == EntryKind::Missing
    }

    /// True once a probe completed and its result is still cached.
    pub fn is_resolved(&self) -> bool {
        self.probed
    }

    /// Probe the path unless a previous probe is still cached (or `force` is set).
    ///
    /// Non-existence is a valid outcome: the entry becomes [`EntryKind::Missing`]
    /// and the call succeeds. Symlinks are classified, not followed.
    pub fn resolve(&mut self, force: bool) -> Result<EntryKind> {
        if !force && self.is_resolved() {
            return Ok(self.kind);
        }
        match fs_ops::stat_path(&self.path)? {
            Some(stat) => {
                self.kind = stat.kind;
                self.metadata = Some(EntryMetadata {
                    size: stat.size,
                    created: stat.created,
                    modified: stat.modified,
                });
            }
            None => {
                self.kind = EntryKind::Missing;
                self.metadata = None;
            }
        }
        self.probed = true;
        // A stale partition of a folder that changed kind would be misleading.
        if self.kind != EntryKind::Folder {
            self.children = None;
        }
        trace!(path = %self.path.display(), kind = ?self.kind, force, "resolved entry");
        Ok(self.kind)
    }

    /// Forget everything known about the path. The next resolve will probe.
    pub fn invalidate(&mut self) {
        self.kind = EntryKind::Unknown;
        self.hint = None;
        self.metadata = None;
        self.children = None;
        self.probed = false;
    }

    /// Point the entry at a sibling name. The entry now stands for a different
    /// identity and is invalidated.
    pub fn set_file_name(&mut self, name: impl AsRef<OsStr>) {
        self.path.set_file_name(name);
        self.invalidate();
    }

    /// Replace the extension. Invalidates the entry.
    pub fn set_extension(&mut self, ext: impl AsRef<OsStr>) {
        self.path.set_extension(ext);
        self.invalidate();
    }

    /// Partition stored by the last [`get_children`](crate::walker::get_children) call.
    pub fn children(&self) -> Option<&Children> {
        self.children.as_ref()
    }

    pub(crate) fn store_children(&mut self, children: Children) -> &Children {
        self.children.insert(children)
    }

    pub(crate) fn take_children(&mut self) -> Option<Children> {
        self.children.take()
    }
}

/// Fold `.` and `..` components without consulting the filesystem.
/// `..` at the root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                // Relative path climbing above its start; keep the `..`.
                _ => out.push(".."),
            },
            Component::Normal(seg) => out.push(seg),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn relative_paths_use_explicit_cwd() {
        let e = PathEntry::new("b/../c/./d.txt", Path::new("/work/a"));
        assert_eq!(e.path(), Path::new("/work/a/c/d.txt"));
        assert_eq!(e.kind(), EntryKind::Unknown);
        assert!(!e.is_resolved());

        let abs = PathEntry::new("/x/y/../z", Path::new("/ignored"));
        assert_eq!(abs.path(), Path::new("/x/z"));
    }

    #[cfg(unix)]
    #[test]
    fn parent_of_root_stays_root() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn resolve_caches_until_forced() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("f.txt");
        f.write_str("12345").unwrap();

        let mut e = PathEntry::new(f.path(), dir.path());
        assert_eq!(e.resolve(false).unwrap(), EntryKind::File);
        assert_eq!(e.size(), Some(5));

        // Changing the file on disk does not leak into the snapshot.
        f.write_str("1234567890").unwrap();
        e.resolve(false).unwrap();
        assert_eq!(e.size(), Some(5));

        e.resolve(true).unwrap();
        assert_eq!(e.size(), Some(10));
    }

    #[test]
    fn hinted_entry_has_kind_but_no_metadata() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("h.bin").write_binary(&[0u8; 7]).unwrap();

        let mut e = PathEntry::from_hint(dir.path(), "h.bin", EntryKind::File);
        assert_eq!(e.kind(), EntryKind::File);
        assert_eq!(e.hint(), Some(EntryKind::File));
        assert!(e.metadata().is_none());

        e.resolve(true).unwrap();
        assert_eq!(e.size(), Some(7));
    }

    #[test]
    fn missing_hint_still_probes() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("late.txt").write_str("abc").unwrap();

        let mut e = PathEntry::from_hint(dir.path(), "late.txt", EntryKind::Missing);
        assert!(e.is_missing());
        assert!(!e.is_resolved());
        assert_eq!(e.resolve(false).unwrap(), EntryKind::File);
        assert_eq!(e.size(), Some(3));
        assert!(e.is_resolved());
    }

    #[test]
    fn renaming_invalidates() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("a.txt").write_str("a").unwrap();
        let mut e = PathEntry::child(dir.path(), "a.txt");
        e.resolve(false).unwrap();
        assert!(e.is_file());

        e.set_extension("md");
        assert_eq!(e.kind(), EntryKind::Unknown);
        assert!(e.metadata().is_none());
        assert_eq!(e.resolve(false).unwrap(), EntryKind::Missing);

        e.set_file_name("a.txt");
        assert_eq!(e.resolve(false).unwrap(), EntryKind::File);
    }
}
