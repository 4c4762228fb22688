use crate::bundle::{copy, SuffixIndex};
use crate::fallback::FallbackProvider;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Finds or creates a bundle-local copy of each external dependency.
///
/// Owns the suffix index for one bundle; every file it copies in is
/// registered immediately so later lookups see it.
#[derive(Debug)]
pub struct LocalCopyResolver<'a> {
    index: SuffixIndex,
    library_dir: PathBuf,
    fallbacks: FallbackProvider<'a>,
    copied: Vec<PathBuf>,
}

impl<'a> LocalCopyResolver<'a> {
    pub fn new(index: SuffixIndex, library_dir: PathBuf, fallbacks: FallbackProvider<'a>) -> Self {
        Self {
            index,
            library_dir,
            fallbacks,
            copied: Vec::new(),
        }
    }

    /// Return a bundle-local path for `dependency`, copying it in if needed,
    /// or `None` if no copy can be found or made.
    pub fn resolve(&mut self, dependency: &str) -> Result<Option<PathBuf>> {
        if let Some(found) = self.index.lookup(dependency) {
            log::debug!("{} found in bundle at {}", dependency, found.display());
            return Ok(Some(found.to_path_buf()));
        }

        let source = Path::new(dependency);
        if source.is_file() {
            return self.copy_from_disk(source).map(Some);
        }

        let Some(provided) = self
            .fallbacks
            .provide(dependency, &self.library_dir, &mut self.index)?
        else {
            log::debug!("cannot resolve {dependency}");
            return Ok(None);
        };
        log::info!(
            "resolved {} from fallback {}",
            dependency,
            provided.target.display()
        );
        self.index.register(&provided.target);
        if provided.copied {
            self.copied.push(provided.target.clone());
        }
        Ok(Some(provided.target))
    }

    fn copy_from_disk(&mut self, source: &Path) -> Result<PathBuf> {
        let Some(name) = source.file_name() else {
            bail!("dependency {} has no file name", source.display());
        };
        let dest = self.library_dir.join(name);
        if !dest.exists() {
            log::info!("copying {} to {}", source.display(), dest.display());
            copy::copy_executable(source, &dest)?;
            self.index.register(&dest);
            self.copied.push(dest.clone());
        }
        Ok(dest)
    }

    /// Files and fallback targets copied in so far.
    pub fn copied(&self) -> &[PathBuf] {
        &self.copied
    }
}
