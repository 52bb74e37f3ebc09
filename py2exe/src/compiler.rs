// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Interface to PyInstaller. */

use {
    crate::{environment::PythonInterpreter, error::ConversionError, process::run_streaming},
    duct::cmd,
    log::{debug, info},
    std::{
        io,
        path::{Path, PathBuf},
    },
};

/// Represents a single invocation of the compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileInvocation {
    /// Python script to bundle.
    pub input_path: PathBuf,

    /// Base name of the executable, without extension.
    pub target_name: String,

    /// Directory PyInstaller writes the executable to.
    pub dist_path: PathBuf,

    /// Per-run directory receiving intermediate build state and the `.spec` file.
    pub work_path: PathBuf,
}

impl CompileInvocation {
    /// Arguments to PyInstaller.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--onefile".to_string(),
            "--noconsole".to_string(),
            "--distpath".to_string(),
            self.dist_path.display().to_string(),
            "--workpath".to_string(),
            self.work_path.display().to_string(),
            "--specpath".to_string(),
            self.work_path.display().to_string(),
            "--name".to_string(),
            self.target_name.clone(),
            self.input_path.display().to_string(),
        ]
    }

    /// Path of the executable PyInstaller writes.
    ///
    /// PyInstaller names it after the target with the host's executable
    /// suffix, which is empty outside Windows.
    pub fn artifact_path(&self) -> PathBuf {
        self.dist_path.join(format!(
            "{}{}",
            self.target_name,
            std::env::consts::EXE_SUFFIX
        ))
    }
}

/// Something that turns a Python script into an executable.
pub trait Compiler {
    /// Run the compiler to completion.
    ///
    /// Success only means the compiler reported success. Callers are
    /// expected to verify the executable exists.
    fn compile(
        &self,
        python: &PythonInterpreter,
        invocation: &CompileInvocation,
    ) -> Result<(), ConversionError>;
}

/// Runs PyInstaller as a module of the probed interpreter.
#[derive(Clone, Debug, Default)]
pub struct PyInstaller {}

impl PyInstaller {
    /// Arguments passed to the Python interpreter.
    pub fn python_args(invocation: &CompileInvocation) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "PyInstaller".to_string()];
        args.extend(invocation.args());
        args
    }
}

impl Compiler for PyInstaller {
    fn compile(
        &self,
        python: &PythonInterpreter,
        invocation: &CompileInvocation,
    ) -> Result<(), ConversionError> {
        info!("compiling {} to an executable...", invocation.input_path.display());
        debug!("invoking PyInstaller with args: {:?}", invocation.args());

        run_streaming(cmd(&python.exe, Self::python_args(invocation)), "PyInstaller")
            .map_err(|e| ConversionError::Compile(format!("{:#}", e)))
    }
}

/// Confirm the compiler produced the expected file.
pub fn verify_output(exe_path: &Path) -> Result<(), ConversionError> {
    if exe_path.is_file() {
        Ok(())
    } else {
        Err(ConversionError::Compile(format!(
            "PyInstaller reported success but {} was not generated",
            exe_path.display()
        )))
    }
}

/// Move a verified executable to its final location.
///
/// A file already at `exe_path` is only replaced once the new executable is
/// in place. When a rename isn't possible, e.g. across filesystems, the
/// executable is copied into a temporary file next to `exe_path` first.
pub fn install_output(artifact: &Path, exe_path: &Path) -> Result<(), ConversionError> {
    let install_err = |e: io::Error| {
        ConversionError::Compile(format!(
            "unable to move {} to {}: {}",
            artifact.display(),
            exe_path.display(),
            e
        ))
    };

    let dest_dir = match exe_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dest_dir).map_err(install_err)?;

    if let Err(e) = std::fs::rename(artifact, exe_path) {
        debug!("rename failed ({}); copying instead", e);

        let mut temp = tempfile::NamedTempFile::new_in(dest_dir).map_err(install_err)?;
        let mut source = std::fs::File::open(artifact).map_err(install_err)?;
        io::copy(&mut source, temp.as_file_mut()).map_err(install_err)?;
        let permissions = source.metadata().map_err(install_err)?.permissions();
        std::fs::set_permissions(temp.path(), permissions).map_err(install_err)?;
        temp.persist(exe_path).map_err(|e| install_err(e.error))?;
    }

    Ok(())
}
