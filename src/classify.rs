use serde::Serialize;

/// Prefix shared by the loader's relocation tokens (`@loader_path`,
/// `@executable_path`, `@rpath`).
pub const RELOCATION_TOKEN: char = '@';

/// Locations owned by the operating system; never copied or rewritten.
pub const SYSTEM_PREFIXES: &[&str] = &["/System/", "/usr/lib/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DependencyKind {
    /// Resolved relative to the loading binary, the executable or an rpath.
    Internal,
    /// Provided by the operating system.
    System,
    /// Absolute path outside the bundle; must be resolved and rewritten.
    External,
    /// A bare or relative path the loader searches for itself.
    Relative,
}

impl DependencyKind {
    pub fn of(dependency: &str) -> Self {
        if dependency.starts_with(RELOCATION_TOKEN) {
            DependencyKind::Internal
        } else if SYSTEM_PREFIXES
            .iter()
            .any(|prefix| dependency.starts_with(prefix))
        {
            DependencyKind::System
        } else if dependency.starts_with('/') {
            DependencyKind::External
        } else {
            DependencyKind::Relative
        }
    }
}

pub fn is_external(dependency: &str) -> bool {
    DependencyKind::of(dependency) == DependencyKind::External
}
