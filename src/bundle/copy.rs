use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy a single library into the bundle and mark it executable.
pub fn copy_executable(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::copy(source, dest)
        .with_context(|| format!("copying {} to {}", source.display(), dest.display()))?;
    make_executable(dest)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Recursively copy `source` to `dest`, recreating symbolic links as links.
///
/// Returns every non-directory entry created, in walk order.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", source.display()))?;
        let rel = entry.path().strip_prefix(source)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {}", target.display()))?;
            continue;
        }

        if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copying {} to {}", entry.path().display(), target.display())
            })?;
        }
        created.push(target);
    }
    Ok(created)
}

#[cfg(unix)]
fn copy_link(link: &Path, target: &Path) -> Result<()> {
    let points_to =
        fs::read_link(link).with_context(|| format!("reading link {}", link.display()))?;
    std::os::unix::fs::symlink(&points_to, target)
        .with_context(|| format!("creating link {}", target.display()))
}

#[cfg(not(unix))]
fn copy_link(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)
        .with_context(|| format!("copying {} to {}", link.display(), target.display()))?;
    Ok(())
}
