// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Per-run temporary directories. */

use {
    log::debug,
    std::{
        io,
        path::{Path, PathBuf},
    },
};

/// Prefix of temporary workspace directory names.
pub const WORKSPACE_PREFIX: &str = "py2exe_temp_";

/// A uniquely named directory holding one run's intermediate build state.
///
/// Names carry a random suffix so concurrent runs never share a workspace.
/// The directory is removed by [TempWorkspace::close] or, failing that,
/// when the value is dropped.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: tempfile::TempDir,
}

impl TempWorkspace {
    /// Create a new workspace directory under `root`.
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .rand_bytes(8)
            .tempdir_in(root)?;
        debug!("created workspace {}", dir.path().display());

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the workspace directory and everything in it.
    ///
    /// A directory that has already disappeared is not an error.
    pub fn close(self) -> Result<(), (PathBuf, io::Error)> {
        let path = self.dir.path().to_path_buf();

        match self.dir.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err((path, e)),
        }
    }
}
