// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolve details about the Python execution environment.

use {
    crate::error::ConversionError,
    duct::cmd,
    log::{debug, info},
    std::path::{Path, PathBuf},
};

/// Executable names searched for on `PATH` when no interpreter is configured.
pub const PYTHON_CANDIDATES: &[&str] = &["python", "python3"];

/// Version of this build of py2exe.
pub const PY2EXE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A Python interpreter that has been shown to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PythonInterpreter {
    /// Path to the interpreter executable.
    pub exe: PathBuf,

    /// Output of `python --version`, e.g. `Python 3.11.4`.
    pub version: String,
}

/// Checks that a usable Python interpreter is available.
pub trait EnvironmentProber {
    fn probe(&self) -> Result<PythonInterpreter, ConversionError>;
}

/// Probes for a Python interpreter by running it.
#[derive(Clone, Debug, Default)]
pub struct PythonProber {
    python_exe: Option<PathBuf>,
}

impl PythonProber {
    /// Construct an instance.
    ///
    /// If `python_exe` is `None`, [PYTHON_CANDIDATES] are searched for on `PATH`.
    pub fn new(python_exe: Option<&Path>) -> Self {
        Self {
            python_exe: python_exe.map(|p| p.to_path_buf()),
        }
    }

    fn find_python_exe(&self) -> Result<PathBuf, ConversionError> {
        if let Some(exe) = &self.python_exe {
            return which::which(exe).map_err(|e| {
                ConversionError::Environment(format!(
                    "Python interpreter {} is not usable: {}",
                    exe.display(),
                    e
                ))
            });
        }

        PYTHON_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                ConversionError::Environment(format!(
                    "Python is not installed (looked for {} on PATH); download it from python.org",
                    PYTHON_CANDIDATES.join(", ")
                ))
            })
    }
}

impl EnvironmentProber for PythonProber {
    fn probe(&self) -> Result<PythonInterpreter, ConversionError> {
        let exe = self.find_python_exe()?;
        debug!("probing Python interpreter at {}", exe.display());

        // Python 2 prints its version to stderr.
        let output = cmd(&exe, ["--version"])
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|e| {
                ConversionError::Environment(format!("unable to run {}: {}", exe.display(), e))
            })?;

        if !output.status.success() {
            return Err(ConversionError::Environment(format!(
                "{} --version exited with {}",
                exe.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("using {} ({})", exe.display(), version);

        Ok(PythonInterpreter { exe, version })
    }
}
