use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

const INSTALL_NAME_TOOL: &str = "install_name_tool";

pub fn delete_rpath(binary: &Path, rpath: &str) -> Result<()> {
    require_non_empty(&[rpath])?;
    install_name_tool(binary, &["-delete_rpath", rpath])
}

pub fn change_install_id(binary: &Path, new_id: &str) -> Result<()> {
    require_non_empty(&[new_id])?;
    install_name_tool(binary, &["-id", new_id])
}

pub fn change_install_name(binary: &Path, old_name: &str, new_name: &str) -> Result<()> {
    require_non_empty(&[old_name, new_name])?;
    install_name_tool(binary, &["-change", old_name, new_name])
}

fn require_non_empty(names: &[&str]) -> Result<()> {
    if names.iter().any(|name| name.is_empty()) {
        bail!("install names must be non-empty");
    }
    Ok(())
}

fn install_name_tool(binary: &Path, args: &[&str]) -> Result<()> {
    log::debug!("{} {} {}", INSTALL_NAME_TOOL, args.join(" "), binary.display());

    let output = Command::new(INSTALL_NAME_TOOL)
        .args(args)
        .arg(binary)
        .output()
        .with_context(|| format!("running {INSTALL_NAME_TOOL} on {}", binary.display()))?;

    if !output.status.success() {
        bail!(
            "{} {} failed for {}: {}",
            INSTALL_NAME_TOOL,
            args.join(" "),
            binary.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
