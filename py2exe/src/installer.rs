// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Interaction with Python packaging tools (pip).
*/

use {
    crate::{environment::PythonInterpreter, error::ConversionError, process::run_streaming},
    duct::cmd,
    log::info,
};

/// Makes the packaging tool available to an interpreter.
pub trait DependencyInstaller {
    /// Ensure the dependency is installed.
    ///
    /// Must be safe to call when the dependency is already present.
    fn ensure_installed(&self, python: &PythonInterpreter) -> Result<(), ConversionError>;
}

/// Installs a requirement by running `pip install`.
#[derive(Clone, Debug)]
pub struct PipInstaller {
    package: String,
}

impl PipInstaller {
    pub fn new(package: impl ToString) -> Self {
        Self {
            package: package.to_string(),
        }
    }

    /// Arguments passed to the Python interpreter.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            "pip".to_string(),
            "--disable-pip-version-check".to_string(),
            "install".to_string(),
            self.package.clone(),
        ]
    }
}

impl DependencyInstaller for PipInstaller {
    fn ensure_installed(&self, python: &PythonInterpreter) -> Result<(), ConversionError> {
        info!("installing {}...", self.package);

        run_streaming(cmd(&python.exe, self.args()), "pip").map_err(|e| {
            ConversionError::Install {
                package: self.package.clone(),
                message: format!("{:#}", e),
            }
        })
    }
}
