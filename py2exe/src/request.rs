// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Describing what to convert.

A [ConversionRequest] pairs a Python script with the file name of the
executable to produce. Output names are normalized so they always carry
the executable extension.
*/

use {
    crate::error::ConversionError,
    log::warn,
    std::{
        ffi::OsString,
        path::{Path, PathBuf},
    },
};

/// File extension of Python source files.
pub const SOURCE_EXTENSION: &str = "py";

/// File extension of produced executables.
pub const EXE_EXTENSION: &str = "exe";

/// Whether a path names a Python source file.
pub fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == SOURCE_EXTENSION)
        .unwrap_or(false)
}

/// Ensure an executable file name ends in `.exe`.
///
/// Names already ending in `.exe` are returned unchanged. Any other
/// extension is kept and `.exe` is appended after it.
pub fn normalize_exe_name(name: &Path) -> PathBuf {
    if name.extension().map(|ext| ext == EXE_EXTENSION).unwrap_or(false) {
        name.to_path_buf()
    } else {
        let mut s = OsString::from(name.as_os_str());
        s.push(".");
        s.push(EXE_EXTENSION);
        PathBuf::from(s)
    }
}

/// A request to turn a Python script into an executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    input_path: PathBuf,
    exe_name: PathBuf,
}

impl ConversionRequest {
    /// Construct a new request.
    ///
    /// If `output` is `None`, the executable is named after the input
    /// script. Directory components of `output` are discarded since the
    /// executable is always written to the configured output directory.
    pub fn new(input_path: impl AsRef<Path>, output: Option<&Path>) -> Self {
        let input_path = input_path.as_ref().to_path_buf();

        let exe_name = match output.and_then(|p| p.file_name().map(|name| (p, name))) {
            Some((full, name)) => {
                if full.parent().map(|p| !p.as_os_str().is_empty()).unwrap_or(false) {
                    warn!(
                        "ignoring directory components of output path {}",
                        full.display()
                    );
                }
                normalize_exe_name(Path::new(name))
            }
            None => normalize_exe_name(Path::new(
                input_path.file_stem().unwrap_or(input_path.as_os_str()),
            )),
        };

        Self {
            input_path,
            exe_name,
        }
    }

    /// Path to the Python script being converted.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// File name of the executable, including the `.exe` extension.
    pub fn exe_name(&self) -> &Path {
        &self.exe_name
    }

    /// Name PyInstaller is told to use for the executable.
    ///
    /// This is the executable file name without its extension.
    pub fn target_name(&self) -> String {
        self.exe_name
            .file_stem()
            .unwrap_or(self.exe_name.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    /// The input script's file name without extension.
    ///
    /// PyInstaller names its generated `.spec` file after this.
    pub fn input_stem(&self) -> String {
        self.input_path
            .file_stem()
            .unwrap_or(self.input_path.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    /// Where the executable will be written inside `output_dir`.
    pub fn exe_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.exe_name)
    }

    /// Verify the input references an existing Python source file.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if !self.input_path.is_file() {
            return Err(ConversionError::Validation(format!(
                "file not found: {}",
                self.input_path.display()
            )));
        }

        if !has_source_extension(&self.input_path) {
            return Err(ConversionError::Validation(format!(
                "{} is not a .{} file",
                self.input_path.display(),
                SOURCE_EXTENSION
            )));
        }

        Ok(())
    }
}
