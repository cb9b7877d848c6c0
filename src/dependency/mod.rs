// Dependency inference: import scanning, standard-library exclusion and
// import-name to package-name mapping

pub mod aliases;
pub mod scanner;
pub mod stdlib;

use std::collections::BTreeSet;
use std::path::PathBuf;

pub use aliases::PackageAliases;
pub use scanner::{is_local_module, scan_script, scan_source};
pub use stdlib::{StdlibModules, SUPPORT_LIBRARY_MODULE, SUPPORT_LIBRARY_PACKAGE};

/// Where the dependency set came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A manifest was found and installed wholesale; the script was not scanned
    Manifest(PathBuf),
    /// Top-level module names found by scanning the script
    Scanned(BTreeSet<String>),
}

impl Resolution {
    /// Modules still to be installed; `None` for manifest-driven runs
    pub fn pending_modules(&self) -> Option<&BTreeSet<String>> {
        match self {
            Resolution::Manifest(_) => None,
            Resolution::Scanned(modules) => Some(modules),
        }
    }
}

/// Outcome of an install pass, one bucket per decision
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub builtin: Vec<String>,
    pub ignored: Vec<String>,
    pub already_installed: Vec<String>,
    pub installed: Vec<String>,
}

impl InstallReport {
    /// Every package name handed to the installer, in order
    pub fn touched_packages(&self) -> impl Iterator<Item = &String> {
        self.already_installed.iter().chain(self.installed.iter())
    }
}
