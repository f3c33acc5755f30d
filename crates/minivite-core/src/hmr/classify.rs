//! Map filesystem events to notification kinds.

use super::payload::UpdateKind;
use crate::config::CONFIG_FILE;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::EventKind;
use std::ffi::OsStr;
use std::path::Path;

/// Directory names never watched or reported.
pub const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "target", "dist"];

const STYLE_EXTENSIONS: &[&str] = &["css"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts", "jsx", "tsx", "json"];

/// Coarse shape of a filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Content written or file created.
    Changed,
    /// A directory appeared.
    DirCreated,
    /// File or directory removed.
    Removed,
    /// Rename pairs and backend-specific events with no clear meaning.
    Ambiguous,
}

/// What to tell the browser about one changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    Update(UpdateKind),
    FullReload,
}

/// Reduce a notify event kind to a [`ChangeKind`].
///
/// Access and metadata-only events return `None`.
#[must_use]
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(CreateKind::Folder) => Some(ChangeKind::DirCreated),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            Some(ChangeKind::Changed)
        }
        // Atomic saves land as a rename onto the target.
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Changed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Ambiguous),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Any | EventKind::Modify(ModifyKind::Other) | EventKind::Other => {
            Some(ChangeKind::Ambiguous)
        }
    }
}

/// Classify one changed path under `root`.
#[must_use]
pub fn classify(root: &Path, path: &Path, kind: ChangeKind) -> Classified {
    if kind != ChangeKind::Changed {
        return Classified::FullReload;
    }
    if is_root_entry(root, path) {
        return Classified::FullReload;
    }

    let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");
    if STYLE_EXTENSIONS.contains(&ext) {
        Classified::Update(UpdateKind::Style)
    } else if SCRIPT_EXTENSIONS.contains(&ext) {
        Classified::Update(UpdateKind::Script)
    } else {
        Classified::FullReload
    }
}

/// The config file and the page shell always force a reload.
fn is_root_entry(root: &Path, path: &Path) -> bool {
    path.parent() == Some(root)
        && path
            .file_name()
            .is_some_and(|name| name == CONFIG_FILE || name == "index.html")
}

/// Whether a directory name is skipped by the watcher.
#[must_use]
pub fn is_ignored_dir(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || IGNORED_DIRS.iter().any(|dir| name == *dir)
}

/// Whether any component of `path` below `root` is ignored, or the file is a dotfile.
#[must_use]
pub fn is_ignored_path(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return true;
    };
    rel.components().any(|c| is_ignored_dir(c.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Changed)
        );
        assert_eq!(
            change_kind(&EventKind::Create(CreateKind::Folder)),
            Some(ChangeKind::DirCreated)
        );
        assert_eq!(
            change_kind(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Removed)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Ambiguous)
        );
        assert_eq!(change_kind(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
    }

    #[test]
    fn test_classify_by_extension() {
        let root = Path::new("/app");
        assert_eq!(
            classify(root, Path::new("/app/src/style.css"), ChangeKind::Changed),
            Classified::Update(UpdateKind::Style)
        );
        assert_eq!(
            classify(root, Path::new("/app/src/main.ts"), ChangeKind::Changed),
            Classified::Update(UpdateKind::Script)
        );
        assert_eq!(
            classify(root, Path::new("/app/logo.png"), ChangeKind::Changed),
            Classified::FullReload
        );
        assert_eq!(
            classify(root, Path::new("/app/Makefile"), ChangeKind::Changed),
            Classified::FullReload
        );
    }

    #[test]
    fn test_root_entries_force_reload() {
        let root = Path::new("/app");
        assert_eq!(
            classify(root, Path::new("/app/minivite.config.json"), ChangeKind::Changed),
            Classified::FullReload
        );
        assert_eq!(
            classify(root, Path::new("/app/index.html"), ChangeKind::Changed),
            Classified::FullReload
        );
        // Only the root copy is special.
        assert_eq!(
            classify(root, Path::new("/app/data/minivite.config.json"), ChangeKind::Changed),
            Classified::Update(UpdateKind::Script)
        );
    }

    #[test]
    fn test_removals_and_renames_force_reload() {
        let root = Path::new("/app");
        let css = Path::new("/app/a.css");
        assert_eq!(classify(root, css, ChangeKind::Removed), Classified::FullReload);
        assert_eq!(classify(root, css, ChangeKind::Ambiguous), Classified::FullReload);
    }

    #[test]
    fn test_ignored_paths() {
        let root = Path::new("/app");
        assert!(is_ignored_path(root, Path::new("/app/node_modules/x/index.js")));
        assert!(is_ignored_path(root, Path::new("/app/.git/HEAD")));
        assert!(is_ignored_path(root, Path::new("/app/src/.main.js.swp")));
        assert!(is_ignored_path(root, Path::new("/elsewhere/a.js")));
        assert!(!is_ignored_path(root, Path::new("/app/src/main.js")));
    }
}
