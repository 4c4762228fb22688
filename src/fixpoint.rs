use crate::bundle::Bundle;
use crate::classify::is_external;
use crate::fallback::{FallbackConfig, FallbackProvider};
use crate::macho::{or_no_data, BinaryTool};
use crate::resolve::LocalCopyResolver;
use crate::rewrite::BinaryRewriter;
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::{Component, PathBuf};

/// Rpath prefixes that only make sense on the machine that built the bundle.
pub const DEFAULT_STALE_RPATH_PREFIXES: &[&str] = &["/usr/local", "/opt/local"];

pub const DEFAULT_LIBRARY_DIR: &str = "Frameworks";

pub const DEFAULT_MAX_PASSES: usize = 64;

#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Directory under `Contents` receiving copied libraries.
    pub library_dir: PathBuf,
    pub fallbacks: FallbackConfig,
    pub stale_rpath_prefixes: Vec<String>,
    /// Upper bound on repair passes before giving up.
    pub max_passes: usize,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from(DEFAULT_LIBRARY_DIR),
            fallbacks: FallbackConfig::default(),
            stale_rpath_prefixes: DEFAULT_STALE_RPATH_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl FixOptions {
    /// Copied libraries must land inside `Contents`, where later passes
    /// index and rewrite them.
    pub fn validate(&self) -> Result<()> {
        let escapes = self
            .library_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || self.library_dir.as_os_str().is_empty() {
            bail!(
                "library directory {} must be a relative path inside Contents",
                self.library_dir.display()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    /// Passes run, including the final pass that changed nothing.
    pub passes: usize,
    /// Binary rewrites summed over all passes.
    pub rewritten_binaries: usize,
    /// Bundle-relative paths of libraries copied in.
    pub copied: Vec<String>,
    /// External references still present after convergence.
    pub unresolved: BTreeSet<String>,
}

/// Repeats rewriting passes over a bundle until a pass changes nothing.
pub struct Fixer<'a, T: BinaryTool + ?Sized> {
    tool: &'a T,
    options: &'a FixOptions,
}

impl<'a, T: BinaryTool + ?Sized> Fixer<'a, T> {
    pub fn new(tool: &'a T, options: &'a FixOptions) -> Self {
        Self { tool, options }
    }

    pub fn fix(&self, bundle: &Bundle) -> Result<FixOutcome> {
        self.options.validate()?;
        let mut resolver = LocalCopyResolver::new(
            bundle.index(),
            bundle.contents().join(&self.options.library_dir),
            FallbackProvider::new(&self.options.fallbacks),
        );
        let rewriter = BinaryRewriter::new(self.tool, &self.options.stale_rpath_prefixes);

        let mut outcome = FixOutcome::default();
        loop {
            if outcome.passes == self.options.max_passes {
                bail!(
                    "{} did not settle after {} passes",
                    bundle.root().display(),
                    outcome.passes
                );
            }
            outcome.passes += 1;

            let mut changed = 0usize;
            for binary in self.binaries(bundle) {
                if rewriter.process(&binary, &mut resolver)? {
                    changed += 1;
                }
            }
            log::debug!(
                "pass {} over {}: {} binaries changed",
                outcome.passes,
                bundle.root().display(),
                changed
            );

            outcome.rewritten_binaries += changed;
            if changed == 0 {
                break;
            }
        }

        outcome.copied = resolver
            .copied()
            .iter()
            .map(|path| bundle.relative(path))
            .collect();
        outcome.unresolved = self.unresolved(bundle);
        Ok(outcome)
    }

    /// Every external install id or dependency still declared by a binary.
    pub fn unresolved(&self, bundle: &Bundle) -> BTreeSet<String> {
        let mut remaining = BTreeSet::new();
        for binary in self.binaries(bundle) {
            let id = or_no_data(self.tool.self_identifier(&binary), "install id", &binary);
            if let Some(id) = id.as_deref().filter(|id| is_external(id)) {
                remaining.insert(id.to_string());
            }
            for dep in or_no_data(self.tool.dependencies(&binary), "dependencies", &binary) {
                if id.as_deref() != Some(dep.as_str()) && is_external(&dep) {
                    remaining.insert(dep);
                }
            }
        }
        remaining
    }

    fn binaries(&self, bundle: &Bundle) -> Vec<PathBuf> {
        bundle
            .files()
            .into_iter()
            .filter(|path| self.tool.is_binary_file(path))
            .collect()
    }
}

pub fn fix_bundle<T: BinaryTool + ?Sized>(
    tool: &T,
    bundle: &Bundle,
    options: &FixOptions,
) -> Result<FixOutcome> {
    Fixer::new(tool, options).fix(bundle)
}
