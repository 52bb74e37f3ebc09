// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {
    crate::orchestrator::Stage,
    std::path::PathBuf,
    thiserror::Error,
};

/// Fatal errors that abort a conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The Python interpreter could not be found or run.
    #[error("Python environment error: {0}")]
    Environment(String),

    /// The conversion request is not acceptable.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Installing the packaging tool failed.
    #[error("failed to install {package}: {message}")]
    Install { package: String, message: String },

    /// The packaging tool failed or did not produce the executable.
    #[error("compilation failed: {0}")]
    Compile(String),
}

impl ConversionError {
    /// The pipeline stage that was being entered when this error occurred.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Environment(_) => Stage::Probed,
            Self::Validation(_) => Stage::Validated,
            Self::Install { .. } => Stage::DependencyReady,
            Self::Compile(_) => Stage::Compiled,
        }
    }
}

/// A non-fatal problem encountered while removing temporary files.
#[derive(Debug)]
pub struct CleanupWarning {
    /// Path that could not be removed.
    pub path: PathBuf,

    /// Why removal failed.
    pub error: std::io::Error,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unable to remove {}: {}", self.path.display(), self.error)
    }
}
