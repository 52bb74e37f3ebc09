// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings controlling where a conversion reads and writes.

use std::path::{Path, PathBuf};

/// The pip requirement installed before compiling.
pub const DEFAULT_PACKAGE: &str = "pyinstaller";

/// Directory PyInstaller conventionally writes intermediate state to.
pub const BUILD_DIR_NAME: &str = "build";

/// Describes the filesystem locations and tools a conversion uses.
///
/// Nothing in the conversion pipeline reads the process's current
/// directory. Callers resolve it once and pass it in here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionConfig {
    working_dir: PathBuf,
    output_dir: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    python_exe: Option<PathBuf>,
    package: String,
    overwrite: bool,
}

impl ConversionConfig {
    /// Construct a new instance rooted at a working directory.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            output_dir: None,
            workspace_root: None,
            python_exe: None,
            package: DEFAULT_PACKAGE.to_string(),
            overwrite: false,
        }
    }

    /// Set the directory the executable is written to.
    #[must_use]
    pub fn with_output_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.output_dir = Some(self.resolve(path.as_ref()));
        self
    }

    /// Set the directory temporary workspaces are created in.
    #[must_use]
    pub fn with_workspace_root(mut self, path: impl AsRef<Path>) -> Self {
        self.workspace_root = Some(self.resolve(path.as_ref()));
        self
    }

    /// Use an explicit Python interpreter instead of searching `PATH`.
    #[must_use]
    pub fn with_python_exe(mut self, path: impl AsRef<Path>) -> Self {
        self.python_exe = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the pip requirement that provides PyInstaller.
    #[must_use]
    pub fn with_package(mut self, package: impl ToString) -> Self {
        self.package = package.to_string();
        self
    }

    /// Allow replacing an executable that already exists.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Directory build byproducts are cleaned from.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Directory the executable is written to.
    ///
    /// Defaults to the working directory.
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.working_dir)
    }

    /// Directory temporary workspaces are created in.
    ///
    /// Defaults to the system temporary directory.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn python_exe(&self) -> Option<&Path> {
        self.python_exe.as_deref()
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// The conventional PyInstaller build directory under the working directory.
    pub fn build_dir(&self) -> PathBuf {
        self.working_dir.join(BUILD_DIR_NAME)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}
