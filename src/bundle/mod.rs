pub mod copy;
pub mod index;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use index::SuffixIndex;

/// An application bundle rooted at `<name>.app`, with everything of interest
/// below its `Contents` directory.
#[derive(Debug, Clone)]
pub struct Bundle {
    root: PathBuf,
    contents: PathBuf,
}

impl Bundle {
    pub fn open(path: &Path) -> Result<Self> {
        let root = path
            .canonicalize()
            .with_context(|| format!("resolving bundle path {}", path.display()))?;
        let contents = root.join("Contents");
        if !contents.is_dir() {
            bail!("{} does not look like a .app bundle", root.display());
        }
        Ok(Self { root, contents })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contents(&self) -> &Path {
        &self.contents
    }

    /// Regular files below `Contents`, in a stable order. Symbolic links are
    /// skipped so that a file reachable through several links is visited once.
    pub fn files(&self) -> Vec<PathBuf> {
        collect_files(&self.contents, false)
    }

    /// Build a suffix index over every file below `Contents`, including
    /// symbolic links that resolve to files.
    pub fn index(&self) -> SuffixIndex {
        let mut index = SuffixIndex::new(&self.contents);
        for path in collect_files(&self.contents, true) {
            index.register(&path);
        }
        log::debug!(
            "indexed {} suffixes under {}",
            index.len(),
            self.contents.display()
        );
        index
    }

    /// Express `path` relative to the bundle root for reporting.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn collect_files(root: &Path, include_file_links: bool) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                || (include_file_links && e.path_is_symlink() && e.path().is_file())
        })
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn open_rejects_directories_without_contents() {
        let temp = TempDir::new().unwrap();
        let err = Bundle::open(temp.path()).unwrap_err();
        assert!(
            format!("{err:#}").contains("does not look like a .app bundle"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn open_rejects_missing_paths() {
        let temp = TempDir::new().unwrap();
        let err = Bundle::open(&temp.path().join("Missing.app")).unwrap_err();
        assert!(format!("{err:#}").contains("resolving bundle path"));
    }

    #[test]
    fn files_are_sorted_and_exclude_directories() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("App.app");
        fs::create_dir_all(app.join("Contents/MacOS")).unwrap();
        fs::create_dir_all(app.join("Contents/Frameworks")).unwrap();
        fs::write(app.join("Contents/MacOS/App"), b"app").unwrap();
        fs::write(app.join("Contents/Info.plist"), b"plist").unwrap();

        let bundle = Bundle::open(&app).unwrap();
        let files = bundle
            .files()
            .iter()
            .map(|p| bundle.relative(p))
            .collect::<Vec<_>>();

        assert_eq!(files, vec!["Contents/Info.plist", "Contents/MacOS/App"]);
    }

    #[cfg(unix)]
    #[test]
    fn index_includes_links_but_files_do_not() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("App.app");
        let versions = app.join("Contents/Frameworks/Q.framework/Versions/5");
        fs::create_dir_all(&versions).unwrap();
        fs::write(versions.join("Q"), b"q").unwrap();
        std::os::unix::fs::symlink("Versions/5/Q", app.join("Contents/Frameworks/Q.framework/Q"))
            .unwrap();

        let bundle = Bundle::open(&app).unwrap();
        assert_eq!(bundle.files().len(), 1);

        let index = bundle.index();
        assert_eq!(
            index.lookup("/build/lib/Q.framework/Q"),
            Some(bundle.contents().join("Frameworks/Q.framework/Q").as_path())
        );
    }
}
