use crate::bundle::{copy, SuffixIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

const FRAMEWORK_SUFFIX: &str = ".framework";

/// Donor framework bundles to copy in when a dependency's original location
/// no longer exists on disk, keyed by framework bundle name
/// (`QtHttpServer.framework`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFallbackConfig")]
pub struct FallbackConfig {
    frameworks: BTreeMap<String, PathBuf>,
}

#[derive(Deserialize)]
struct RawFallbackConfig {
    #[serde(default)]
    frameworks: BTreeMap<String, PathBuf>,
}

impl From<RawFallbackConfig> for FallbackConfig {
    fn from(raw: RawFallbackConfig) -> Self {
        let mut config = FallbackConfig::default();
        for (name, donor) in raw.frameworks {
            config.insert(&name, donor);
        }
        config
    }
}

impl FallbackConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading fallback config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing fallback config {}", path.display()))
    }

    /// Register a donor, overriding any earlier donor for the same framework.
    pub fn insert(&mut self, framework: &str, donor: impl Into<PathBuf>) {
        self.frameworks
            .insert(framework_name(framework), donor.into());
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = FallbackEntry>) {
        for entry in entries {
            self.insert(&entry.framework, entry.donor);
        }
    }

    pub fn donor(&self, framework: &str) -> Option<&Path> {
        self.frameworks
            .get(&framework_name(framework))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.frameworks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }
}

fn framework_name(name: &str) -> String {
    if name.ends_with(FRAMEWORK_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{FRAMEWORK_SUFFIX}")
    }
}

/// A single `NAME=PATH` donor given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    pub framework: String,
    pub donor: PathBuf,
}

impl FromStr for FallbackEntry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(FallbackEntry {
                framework: framework_name(name),
                donor: PathBuf::from(path),
            }),
            _ => Err(format!("expected NAME=PATH, got '{}'", s)),
        }
    }
}

impl fmt::Display for FallbackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.framework, self.donor.display())
    }
}

/// Split a dependency at its first `*.framework` component, returning the
/// framework name and the path inside the framework bundle.
pub fn split_framework(dependency: &str) -> Option<(String, PathBuf)> {
    let mut components = Path::new(dependency).components();
    while let Some(component) = components.next() {
        if let Component::Normal(part) = component {
            let part = part.to_string_lossy();
            if part.ends_with(FRAMEWORK_SUFFIX) {
                return Some((part.into_owned(), components.as_path().to_path_buf()));
            }
        }
    }
    None
}

/// Where a fallback dependency landed, and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackCopy {
    pub target: PathBuf,
    pub copied: bool,
}

/// Supplies copies of configured donor frameworks.
#[derive(Debug, Clone, Copy)]
pub struct FallbackProvider<'a> {
    config: &'a FallbackConfig,
}

impl<'a> FallbackProvider<'a> {
    pub fn new(config: &'a FallbackConfig) -> Self {
        Self { config }
    }

    /// Copy the donor framework that `dependency` lives in into `library_dir`
    /// (once) and return the path inside the copy matching the dependency.
    ///
    /// Files created by the copy are registered into `index`. Returns
    /// `Ok(None)` when no donor is configured or present, or when the copy
    /// lacks the requested file.
    pub fn provide(
        &self,
        dependency: &str,
        library_dir: &Path,
        index: &mut SuffixIndex,
    ) -> Result<Option<FallbackCopy>> {
        let Some((framework, inner)) = split_framework(dependency) else {
            return Ok(None);
        };
        let Some(donor) = self.config.donor(&framework) else {
            log::debug!("no fallback configured for {framework}");
            return Ok(None);
        };
        if !donor.exists() {
            log::warn!(
                "fallback donor for {} is missing: {}",
                framework,
                donor.display()
            );
            return Ok(None);
        }

        let dest = library_dir.join(&framework);
        let copied = !dest.exists();
        if copied {
            log::info!("copying fallback {} into {}", donor.display(), dest.display());
            for created in copy::copy_tree(donor, &dest)? {
                if created.is_file() {
                    index.register(&created);
                }
            }
        }

        let target = if inner.as_os_str().is_empty() {
            dest
        } else {
            dest.join(inner)
        };
        if target.exists() {
            Ok(Some(FallbackCopy { target, copied }))
        } else {
            log::warn!("fallback {} has no {}", framework, target.display());
            Ok(None)
        }
    }
}
