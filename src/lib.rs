pub mod bundle;
pub mod classify;
pub mod fallback;
pub mod fixpoint;
pub mod macho;
pub mod patch;
pub mod report;
pub mod resolve;
pub mod rewrite;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

pub use bundle::Bundle;
pub use fixpoint::{fix_bundle, FixOptions, FixOutcome};
pub use macho::{BinaryTool, NativeTool};

#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub bundle: String,
    pub passes: usize,
    pub rewritten_binaries: usize,
    pub copied: Vec<String>,
    pub unresolved: Vec<String>,
    /// Set when the path could not be processed as a bundle at all.
    pub error: Option<String>,
}

impl BundleReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.unresolved.is_empty()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub bundles: Vec<BundleReport>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.bundles.iter().all(BundleReport::is_clean)
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_clean())
    }
}

/// Repair one bundle.
///
/// A path that is not a bundle is recorded in the report rather than
/// returned as an error; any failure while rewriting is returned.
pub fn process_bundle<T: BinaryTool + ?Sized>(
    tool: &T,
    path: &Path,
    options: &FixOptions,
) -> Result<BundleReport> {
    let bundle = match Bundle::open(path) {
        Ok(bundle) => bundle,
        Err(err) => {
            log::warn!("skipping {}: {:#}", path.display(), err);
            return Ok(BundleReport {
                bundle: path.display().to_string(),
                passes: 0,
                rewritten_binaries: 0,
                copied: Vec::new(),
                unresolved: Vec::new(),
                error: Some(format!("{err:#}")),
            });
        }
    };

    let outcome = fix_bundle(tool, &bundle, options)?;
    Ok(BundleReport {
        bundle: bundle.root().display().to_string(),
        passes: outcome.passes,
        rewritten_binaries: outcome.rewritten_binaries,
        copied: outcome.copied,
        unresolved: outcome.unresolved.into_iter().collect(),
        error: None,
    })
}
