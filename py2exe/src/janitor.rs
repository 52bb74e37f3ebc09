// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Removal of temporary build state.

Cleanup is best-effort. Every removal is attempted and failures are
collected as [CleanupWarning]s instead of being returned as errors.
*/

use {
    crate::{config::BUILD_DIR_NAME, error::CleanupWarning, workspace::TempWorkspace},
    log::{debug, warn},
    std::{io, path::Path},
};

/// File extension of PyInstaller build descriptors.
pub const SPEC_EXTENSION: &str = "spec";

fn remove_path(path: &Path, dir: bool) -> io::Result<()> {
    let res = if dir {
        remove_dir_all::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match res {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        res => res,
    }
}

/// Remove a run's temporary files.
///
/// This deletes the workspace, `<working_dir>/build`, and
/// `<working_dir>/<input_stem>.spec`, whichever of them exist.
pub fn cleanup(
    workspace: TempWorkspace,
    working_dir: &Path,
    input_stem: &str,
) -> Vec<CleanupWarning> {
    let mut warnings = vec![];

    debug!("removing workspace {}", workspace.path().display());
    if let Err((path, error)) = workspace.close() {
        warnings.push(CleanupWarning { path, error });
    }

    let build_dir = working_dir.join(BUILD_DIR_NAME);
    if build_dir.is_dir() {
        debug!("removing {}", build_dir.display());
        if let Err(error) = remove_path(&build_dir, true) {
            warnings.push(CleanupWarning {
                path: build_dir,
                error,
            });
        }
    }

    let spec_file = working_dir.join(format!("{}.{}", input_stem, SPEC_EXTENSION));
    if spec_file.exists() {
        debug!("removing {}", spec_file.display());
        if let Err(error) = remove_path(&spec_file, false) {
            warnings.push(CleanupWarning {
                path: spec_file,
                error,
            });
        }
    }

    for warning in &warnings {
        warn!("could not remove temporary files: {}", warning);
    }

    warnings
}
