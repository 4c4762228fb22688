use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Maps every trailing sub-path of the files inside a bundle to the file's
/// absolute location.
///
/// `Frameworks/A.framework/Versions/5/A` is registered under
/// `Frameworks/A.framework/Versions/5/A`, `A.framework/Versions/5/A`,
/// `Versions/5/A`, `5/A` and `A`. The first file registered under a key keeps
/// it; later registrations never overwrite.
#[derive(Debug, Clone)]
pub struct SuffixIndex {
    root: PathBuf,
    entries: HashMap<String, PathBuf>,
}

impl SuffixIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: HashMap::new(),
        }
    }

    /// Record every suffix of `path` relative to the index root, returning the
    /// number of keys that were not already present.
    pub fn register(&mut self, path: &Path) -> usize {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            log::debug!(
                "not indexing {}: outside of {}",
                path.display(),
                self.root.display()
            );
            return 0;
        };

        let parts = normal_parts(rel);
        let mut added = 0usize;
        for start in (0..parts.len()).rev() {
            let key = parts[start..].join("/");
            if !self.entries.contains_key(&key) {
                self.entries.insert(key, path.to_path_buf());
                added += 1;
            }
        }
        added
    }

    /// Find the file matching the longest trailing sub-path of `dependency`.
    pub fn lookup(&self, dependency: &str) -> Option<&Path> {
        let parts = normal_parts(Path::new(dependency));
        (0..parts.len()).find_map(|start| {
            self.entries
                .get(&parts[start..].join("/"))
                .map(PathBuf::as_path)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normal_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
