//! CPI release installation

pub mod installer;

pub use installer::{
    CpiInstaller, CpiInstallerDeps, Installer, PackageCompiler, ReleaseReader, CPI_EXECUTABLE,
};
