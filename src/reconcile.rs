//! Content reconciliation between a source-language tree and a translation tree.
//!
//! The filtered rebase only replays translated commits, so pages added to the
//! source language since the last translation pass would be missing from the
//! translation tree. [`reconcile`] copies them over untranslated. [`mirror`]
//! is the stricter sibling used when translations flow back to the source
//! repository: the destination becomes an exact copy.

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use ignore::WalkBuilder;

use crate::error::{Result, SyncError};

/// Relative paths of every file under a root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    paths: BTreeSet<PathBuf>,
}

impl FileManifest {
    /// Walk `root` and record every file relative to it.
    ///
    /// Hidden files are included and ignore files are not consulted: the tree
    /// is tracked content, not a working project. `.git` directories are skipped.
    /// A root that does not exist yields an empty manifest.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut paths = BTreeSet::new();
        if !root.exists() {
            return Ok(Self { paths });
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| SyncError::Reconciliation {
                path: root.to_path_buf(),
                source: io::Error::other(e),
            })?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                paths.insert(relative.to_path_buf());
            }
        }

        Ok(Self { paths })
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Paths present here and absent from `other`, in sorted order.
    pub fn missing_from<'a>(&'a self, other: &'a FileManifest) -> impl Iterator<Item = &'a Path> {
        self.paths().filter(|p| !other.contains(p))
    }
}

/// What a [`mirror`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub copied: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Copy every file in `source_dir` that `translation_dir` lacks.
///
/// Existing translation files are never touched. Returns the copied paths,
/// relative to the two roots.
pub fn reconcile(source_dir: &Path, translation_dir: &Path) -> Result<Vec<PathBuf>> {
    let source = FileManifest::scan(source_dir)?;
    let translation = FileManifest::scan(translation_dir)?;

    let mut copied = Vec::new();
    for relative in source.missing_from(&translation) {
        let dest = translation_dir.join(relative);
        // Something appeared since the scan (a symlink, a racing writer): leave it be.
        if dest.exists() {
            continue;
        }
        copy_file(&source_dir.join(relative), &dest)?;
        copied.push(relative.to_path_buf());
    }

    if !copied.is_empty() {
        tracing::info!(
            count = copied.len(),
            dest = %translation_dir.display(),
            "copied untranslated files"
        );
    }

    Ok(copied)
}

/// Make `dest_dir` an exact copy of `source_dir`.
///
/// Every source file is written to the destination, destination files with no
/// source counterpart are deleted, and directories emptied by the deletion are
/// removed. Nothing outside `dest_dir` is touched.
pub fn mirror(source_dir: &Path, dest_dir: &Path) -> Result<MirrorSummary> {
    let source = FileManifest::scan(source_dir)?;
    let dest = FileManifest::scan(dest_dir)?;
    let mut summary = MirrorSummary::default();

    for relative in source.paths() {
        let from = source_dir.join(relative);
        let to = dest_dir.join(relative);
        if dest.contains(relative) && same_contents(&from, &to) {
            continue;
        }
        copy_file(&from, &to)?;
        summary.copied.push(relative.to_path_buf());
    }

    for relative in dest.missing_from(&source) {
        let path = dest_dir.join(relative);
        fs::remove_file(&path).map_err(|source| SyncError::Reconciliation {
            path: path.clone(),
            source,
        })?;
        summary.removed.push(relative.to_path_buf());
    }

    if !summary.removed.is_empty() {
        prune_empty_dirs(dest_dir)?;
    }

    tracing::info!(
        copied = summary.copied.len(),
        removed = summary.removed.len(),
        dest = %dest_dir.display(),
        "mirrored directory"
    );

    Ok(summary)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| SyncError::Reconciliation {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::copy(from, to).map_err(|source| SyncError::Reconciliation {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn same_contents(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Remove empty directories below `root`, deepest first. `root` itself stays.
fn prune_empty_dirs(root: &Path) -> Result<()> {
    let mut dirs: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_dir()) && e.path() != root)
        .map(ignore::DirEntry::into_path)
        .collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    for dir in dirs {
        let is_empty = fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            fs::remove_dir(&dir).map_err(|source| SyncError::Reconciliation {
                path: dir.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(root: &Path, relative: &str) -> String {
        fs::read_to_string(root.join(relative)).unwrap()
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("content/en");
        let translation = dir.path().join("content/fr");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&translation).unwrap();
        (dir, source, translation)
    }

    #[test]
    fn manifest_lists_files_recursively() {
        let (_dir, source, _) = setup();
        write(&source, "a.md", "A");
        write(&source, "guide/b.md", "B");
        write(&source, ".hidden/c.md", "C");
        write(&source, ".git/HEAD", "ref");

        let manifest = FileManifest::scan(&source).unwrap();
        let paths: Vec<_> = manifest.paths().collect();

        assert_eq!(
            paths,
            [
                Path::new(".hidden/c.md"),
                Path::new("a.md"),
                Path::new("guide/b.md")
            ]
        );
    }

    #[test]
    fn manifest_of_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let manifest = FileManifest::scan(&dir.path().join("nope")).unwrap();
        assert_eq!(manifest, FileManifest::default());
    }

    #[test]
    fn manifest_ignores_gitignore() {
        let (_dir, source, _) = setup();
        write(&source, ".gitignore", "*.md\n");
        write(&source, "a.md", "A");

        assert_eq!(FileManifest::scan(&source).unwrap().paths().count(), 2);
    }

    #[test]
    fn copies_missing_file_and_leaves_existing_untouched() {
        let (_dir, source, translation) = setup();
        write(&source, "a.md", "English A");
        write(&source, "b.md", "English B");
        write(&translation, "a.md", "Français A");

        let copied = reconcile(&source, &translation).unwrap();

        assert_eq!(copied, [PathBuf::from("b.md")]);
        assert_eq!(read(&translation, "a.md"), "Français A");
        assert_eq!(read(&translation, "b.md"), "English B");
    }

    #[test]
    fn creates_parent_directories() {
        let (dir, source, _) = setup();
        write(&source, "guide/deep/c.md", "C");
        let translation = dir.path().join("content/de");

        reconcile(&source, &translation).unwrap();

        assert_eq!(read(&translation, "guide/deep/c.md"), "C");
    }

    #[test]
    fn reconcile_is_idempotent() {
        let (_dir, source, translation) = setup();
        write(&source, "a.md", "A");
        write(&source, "guide/b.md", "B");

        let first = reconcile(&source, &translation).unwrap();
        let second = reconcile(&source, &translation).unwrap();

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[test]
    fn reconcile_never_deletes_translation_only_files() {
        let (_dir, source, translation) = setup();
        write(&source, "a.md", "A");
        write(&translation, "legacy.md", "old");

        reconcile(&source, &translation).unwrap();

        assert_eq!(read(&translation, "legacy.md"), "old");
    }

    #[test]
    fn mirror_overwrites_and_deletes_extraneous() {
        let (dir, source, _) = setup();
        write(&source, "a.md", "new A");
        write(&source, "b.md", "B");
        let dest = dir.path().join("site/content/fr");
        write(&dest, "a.md", "old A");
        write(&dest, "b.md", "B");
        write(&dest, "stale/old.md", "gone");
        write(dir.path(), "site/content/de/keep.md", "sibling");

        let summary = mirror(&source, &dest).unwrap();

        assert_eq!(summary.copied, [PathBuf::from("a.md")]);
        assert_eq!(summary.removed, [PathBuf::from("stale/old.md")]);
        assert_eq!(read(&dest, "a.md"), "new A");
        assert!(!dest.join("stale").exists());
        assert_eq!(read(dir.path(), "site/content/de/keep.md"), "sibling");
    }

    #[test]
    fn mirror_into_missing_dir_copies_everything() {
        let (dir, source, _) = setup();
        write(&source, "a.md", "A");
        write(&source, "x/y.md", "Y");
        let dest = dir.path().join("fresh");

        let summary = mirror(&source, &dest).unwrap();

        assert_eq!(summary.copied.len(), 2);
        assert!(summary.removed.is_empty());
        assert_eq!(FileManifest::scan(&dest).unwrap(), FileManifest::scan(&source).unwrap());
    }
}
