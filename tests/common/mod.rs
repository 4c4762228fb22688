#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use bundlefix::{BinaryTool, Bundle};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

const MAGIC: &str = "FAKE-MACHO\n";

/// Load-command metadata stored as JSON behind a magic line, so copying the
/// file copies its metadata too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeBinary {
    pub id: Option<String>,
    pub dependencies: Vec<String>,
    pub rpaths: Vec<String>,
}

impl FakeBinary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn dep(mut self, dep: impl AsRef<str>) -> Self {
        self.dependencies.push(dep.as_ref().to_string());
        self
    }

    pub fn rpath(mut self, rpath: &str) -> Self {
        self.rpaths.push(rpath.to_string());
        self
    }

    pub fn write(&self, path: &Path) {
        fs::create_dir_all(path.parent().expect("binary path has a parent"))
            .expect("failed to create parent directory");
        store(path, self).expect("failed to write fake binary");
    }

    pub fn read(path: &Path) -> Self {
        load(path).expect("failed to read fake binary")
    }
}

fn load(path: &Path) -> Result<FakeBinary> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let body = text
        .strip_prefix(MAGIC)
        .with_context(|| format!("{} is not a fake binary", path.display()))?;
    serde_json::from_str(body).with_context(|| format!("parsing {}", path.display()))
}

fn store(path: &Path, binary: &FakeBinary) -> Result<()> {
    let body = serde_json::to_string_pretty(binary)?;
    fs::write(path, format!("{MAGIC}{body}")).with_context(|| format!("writing {}", path.display()))
}

/// In-memory stand-in for the native Mach-O tooling.
#[derive(Debug, Default)]
pub struct FakeTool {
    fail_mutations: bool,
    ignore_changes: bool,
    mutations: Cell<usize>,
}

impl FakeTool {
    /// Every mutating call fails, like patching a read-only file.
    pub fn read_only() -> Self {
        Self {
            fail_mutations: true,
            ..Self::default()
        }
    }

    /// Dependency changes are accepted but never applied.
    pub fn ignoring_changes() -> Self {
        Self {
            ignore_changes: true,
            ..Self::default()
        }
    }

    pub fn mutations(&self) -> usize {
        self.mutations.get()
    }

    fn mutate(&self, path: &Path, apply: impl FnOnce(&mut FakeBinary)) -> Result<()> {
        if self.fail_mutations {
            bail!("{} is read-only", path.display());
        }
        let mut binary = load(path)?;
        apply(&mut binary);
        store(path, &binary)?;
        self.mutations.set(self.mutations.get() + 1);
        Ok(())
    }
}

impl BinaryTool for FakeTool {
    fn is_binary_file(&self, path: &Path) -> bool {
        fs::read(path)
            .map(|bytes| bytes.starts_with(MAGIC.as_bytes()))
            .unwrap_or(false)
    }

    fn self_identifier(&self, path: &Path) -> Result<Option<String>> {
        Ok(load(path)?.id)
    }

    fn dependencies(&self, path: &Path) -> Result<Vec<String>> {
        Ok(load(path)?.dependencies)
    }

    fn search_paths(&self, path: &Path) -> Result<Vec<String>> {
        Ok(load(path)?.rpaths)
    }

    fn delete_search_path(&self, path: &Path, entry: &str) -> Result<()> {
        self.mutate(path, |binary| binary.rpaths.retain(|rpath| rpath != entry))
    }

    fn set_self_identifier(&self, path: &Path, value: &str) -> Result<()> {
        self.mutate(path, |binary| binary.id = Some(value.to_string()))
    }

    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        let ignore = self.ignore_changes;
        self.mutate(path, |binary| {
            if ignore {
                return;
            }
            for dep in binary.dependencies.iter_mut().filter(|dep| dep.as_str() == old) {
                *dep = new.to_string();
            }
        })
    }
}

/// A temporary directory holding `App.app` plus an `outside` tree standing in
/// for the build machine.
pub struct Workspace {
    temp: TempDir,
    app: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create tempdir");
        let app = temp.path().join("App.app");
        fs::create_dir_all(app.join("Contents/MacOS")).expect("failed to create bundle");
        Self { temp, app }
    }

    pub fn app(&self) -> &Path {
        &self.app
    }

    pub fn bundle(&self) -> Bundle {
        Bundle::open(&self.app).expect("failed to open bundle")
    }

    /// Path inside the bundle's `Contents`.
    pub fn contents(&self, rel: &str) -> PathBuf {
        self.bundle().contents().join(rel)
    }

    /// Path on the simulated build machine, outside the bundle.
    pub fn outside(&self, rel: &str) -> PathBuf {
        self.temp.path().join("outside").join(rel)
    }

    pub fn write_plain(&self, path: &Path, content: &str) {
        fs::create_dir_all(path.parent().expect("path has a parent"))
            .expect("failed to create parent directory");
        fs::write(path, content).expect("failed to write file");
    }

    /// Contents of every file in the bundle, keyed by bundle-relative path.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        let root = self.bundle().root().to_path_buf();
        WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(&root)
                    .expect("walked path is under root")
                    .to_string_lossy()
                    .to_string();
                (rel, fs::read(e.path()).expect("failed to read file"))
            })
            .collect()
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
