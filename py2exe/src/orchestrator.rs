// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Sequencing of a conversion.

A conversion runs the following stages in order:

1. Probe for a Python interpreter.
2. Validate the request.
3. Install PyInstaller.
4. Run PyInstaller, building inside the temporary workspace.
5. Verify the executable exists and move it to its final location.
6. Remove temporary files.

Any failure moves the run to [Stage::Failed]. Cleanup runs exactly once
per run, whether the run succeeded or failed, and cannot change its result.

Nothing in the output directory changes until a verified executable exists,
so a failed run leaves a previously generated executable untouched.
*/

use {
    crate::{
        compiler::{install_output, verify_output, CompileInvocation, Compiler, PyInstaller},
        config::{ConversionConfig, BUILD_DIR_NAME},
        environment::{EnvironmentProber, PythonInterpreter, PythonProber},
        error::{CleanupWarning, ConversionError},
        installer::{DependencyInstaller, PipInstaller},
        janitor,
        request::ConversionRequest,
        workspace::TempWorkspace,
    },
    log::{debug, info, warn},
    std::path::PathBuf,
};

/// Progress of a single conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    Probed,
    Validated,
    DependencyReady,
    Compiled,
    Verified,
    CleanedUp,
    Failed,
}

impl Stage {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CleanedUp | Self::Failed)
    }
}

/// Path to the generated executable, or why it wasn't generated.
pub type ConversionResult = Result<PathBuf, ConversionError>;

/// Name of the directory inside the workspace that PyInstaller writes to.
pub const DIST_DIR_NAME: &str = "dist";

/// Everything a conversion produced.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub result: ConversionResult,

    /// Problems removing temporary files. These never affect `result`.
    pub cleanup_warnings: Vec<CleanupWarning>,

    /// Terminal stage the run ended in.
    pub stage: Stage,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives one conversion through its stages.
///
/// Each instance owns a single [TempWorkspace] and performs a single run:
/// [Orchestrator::convert] consumes the instance.
pub struct Orchestrator<'a> {
    config: ConversionConfig,
    installer: &'a dyn DependencyInstaller,
    compiler: &'a dyn Compiler,
    python: PythonInterpreter,
    workspace: TempWorkspace,
    stage: Stage,
}

impl<'a> Orchestrator<'a> {
    /// Construct a new instance.
    ///
    /// The environment is probed before anything touches the filesystem. The
    /// temporary workspace is only created once a Python interpreter was found.
    pub fn new(
        config: ConversionConfig,
        prober: &dyn EnvironmentProber,
        installer: &'a dyn DependencyInstaller,
        compiler: &'a dyn Compiler,
    ) -> Result<Self, ConversionError> {
        let python = prober.probe()?;

        let workspace_root = config.workspace_root();
        let workspace = TempWorkspace::create(&workspace_root).map_err(|e| {
            ConversionError::Environment(format!(
                "unable to create temporary workspace in {}: {}",
                workspace_root.display(),
                e
            ))
        })?;

        let mut orchestrator = Self {
            config,
            installer,
            compiler,
            python,
            workspace,
            stage: Stage::Init,
        };
        orchestrator.advance(Stage::Probed);

        Ok(orchestrator)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Interpreter found when the environment was probed.
    pub fn python(&self) -> &PythonInterpreter {
        &self.python
    }

    /// Path of the temporary workspace owned by this run.
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace.path().to_path_buf()
    }

    fn advance(&mut self, stage: Stage) {
        debug!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Convert a Python script to an executable.
    ///
    /// Temporary files are removed before returning, regardless of outcome.
    pub fn convert(mut self, request: &ConversionRequest) -> ConversionOutcome {
        let result = self.run(request);

        match &result {
            Ok(exe_path) => info!("success! generated {}", exe_path.display()),
            Err(e) => {
                self.advance(Stage::Failed);
                debug!("conversion failed: {}", e);
            }
        }

        let cleanup_warnings = janitor::cleanup(
            self.workspace,
            self.config.working_dir(),
            &request.input_stem(),
        );

        // `workspace` has been moved out, so `advance()` is unavailable.
        if result.is_ok() {
            debug!("{:?} -> {:?}", self.stage, Stage::CleanedUp);
            self.stage = Stage::CleanedUp;
        }

        ConversionOutcome {
            result,
            cleanup_warnings,
            stage: self.stage,
        }
    }

    fn run(&mut self, request: &ConversionRequest) -> ConversionResult {
        request.validate()?;

        let exe_path = request.exe_path(self.config.output_dir());
        let replace_existing = exe_path.exists();
        if replace_existing && !self.config.overwrite() {
            return Err(ConversionError::Validation(format!(
                "{} already exists; use --force to replace it",
                exe_path.display()
            )));
        }
        self.advance(Stage::Validated);

        self.installer.ensure_installed(&self.python)?;
        self.advance(Stage::DependencyReady);

        let invocation = CompileInvocation {
            input_path: request.input_path().to_path_buf(),
            target_name: request.target_name(),
            dist_path: self.workspace.path().join(DIST_DIR_NAME),
            work_path: self.workspace.path().join(BUILD_DIR_NAME),
        };
        self.compiler.compile(&self.python, &invocation)?;
        self.advance(Stage::Compiled);

        let artifact = invocation.artifact_path();
        verify_output(&artifact)?;
        if replace_existing {
            warn!("replacing {}", exe_path.display());
        }
        install_output(&artifact, &exe_path)?;
        verify_output(&exe_path)?;
        self.advance(Stage::Verified);

        Ok(exe_path)
    }
}

/// Run a conversion using the real Python tooling.
pub fn convert(config: ConversionConfig, request: &ConversionRequest) -> ConversionOutcome {
    let prober = PythonProber::new(config.python_exe());
    let installer = PipInstaller::new(config.package());
    let compiler = PyInstaller::default();

    match Orchestrator::new(config, &prober, &installer, &compiler) {
        Ok(orchestrator) => orchestrator.convert(request),
        Err(e) => ConversionOutcome {
            result: Err(e),
            cleanup_warnings: vec![],
            stage: Stage::Failed,
        },
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        anyhow::Result,
        std::{cell::Cell, path::Path},
    };

    struct MockProber {
        available: bool,
    }

    impl EnvironmentProber for MockProber {
        fn probe(&self) -> Result<PythonInterpreter, ConversionError> {
            if self.available {
                Ok(PythonInterpreter {
                    exe: PathBuf::from("/usr/bin/python3"),
                    version: "Python 3.11.4".to_string(),
                })
            } else {
                Err(ConversionError::Environment("python not found".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct MockInstaller {
        fail: bool,
        calls: Cell<usize>,
    }

    impl DependencyInstaller for MockInstaller {
        fn ensure_installed(&self, _python: &PythonInterpreter) -> Result<(), ConversionError> {
            self.calls.set(self.calls.get() + 1);

            if self.fail {
                Err(ConversionError::Install {
                    package: "pyinstaller".to_string(),
                    message: "pip exited with exit status: 1".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    /// Behaves like PyInstaller, writing build state into the workspace
    /// and the working directory.
    struct MockCompiler {
        working_dir: PathBuf,
        build_in_working_dir: bool,
        exit_ok: bool,
        produce_exe: bool,
        calls: Cell<usize>,
        last_invocation: Cell<Option<CompileInvocation>>,
    }

    impl MockCompiler {
        fn new(working_dir: &Path) -> Self {
            Self {
                working_dir: working_dir.to_path_buf(),
                build_in_working_dir: true,
                exit_ok: true,
                produce_exe: true,
                calls: Cell::new(0),
                last_invocation: Cell::new(None),
            }
        }
    }

    impl Compiler for MockCompiler {
        fn compile(
            &self,
            _python: &PythonInterpreter,
            invocation: &CompileInvocation,
        ) -> Result<(), ConversionError> {
            self.calls.set(self.calls.get() + 1);
            self.last_invocation.set(Some(invocation.clone()));

            let io_err = |e: std::io::Error| ConversionError::Compile(e.to_string());

            let build = invocation.work_path.join(&invocation.target_name);
            std::fs::create_dir_all(&build).map_err(io_err)?;
            std::fs::write(build.join("base_library.zip"), b"zip").map_err(io_err)?;
            if self.build_in_working_dir {
                std::fs::create_dir_all(self.working_dir.join("build")).map_err(io_err)?;
            }

            if self.produce_exe {
                std::fs::create_dir_all(&invocation.dist_path).map_err(io_err)?;
                std::fs::write(invocation.artifact_path(), b"MZ").map_err(io_err)?;
            }

            if self.exit_ok {
                Ok(())
            } else {
                Err(ConversionError::Compile(
                    "PyInstaller exited with exit status: 1".to_string(),
                ))
            }
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        working_dir: PathBuf,
        output_dir: PathBuf,
        workspace_root: PathBuf,
        script: PathBuf,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let root = tempfile::Builder::new().prefix("py2exe-test-").tempdir()?;
            let working_dir = root.path().join("work");
            let output_dir = root.path().join("dist");
            let workspace_root = root.path().join("scratch");
            std::fs::create_dir_all(&working_dir)?;
            std::fs::create_dir_all(&output_dir)?;
            std::fs::create_dir_all(&workspace_root)?;

            let script = working_dir.join("script.py");
            std::fs::write(&script, "print('hello')\n")?;

            Ok(Self {
                _root: root,
                working_dir,
                output_dir,
                workspace_root,
                script,
            })
        }

        fn config(&self) -> ConversionConfig {
            ConversionConfig::new(&self.working_dir)
                .with_output_dir(&self.output_dir)
                .with_workspace_root(&self.workspace_root)
        }

        fn workspace_entries(&self) -> Result<usize> {
            Ok(std::fs::read_dir(&self.workspace_root)?.count())
        }

        fn output_entries(&self) -> Result<Vec<PathBuf>> {
            let mut entries = std::fs::read_dir(&self.output_dir)?
                .map(|e| e.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()?;
            entries.sort();
            Ok(entries)
        }

        fn run(
            &self,
            config: ConversionConfig,
            installer: &MockInstaller,
            compiler: &MockCompiler,
            request: &ConversionRequest,
        ) -> ConversionOutcome {
            let prober = MockProber { available: true };

            match Orchestrator::new(config, &prober, installer, compiler) {
                Ok(orchestrator) => orchestrator.convert(request),
                Err(e) => panic!("unexpected probe failure: {}", e),
            }
        }
    }

    #[test]
    fn success() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);
        let request = ConversionRequest::new(&fixture.script, None);

        let outcome = fixture.run(fixture.config(), &installer, &compiler, &request);

        assert_eq!(outcome.stage, Stage::CleanedUp);
        let exe = outcome.result?;
        assert_eq!(exe, fixture.output_dir.join("script.exe"));
        assert_eq!(fixture.output_entries()?, vec![exe]);
        assert!(outcome.cleanup_warnings.is_empty());
        assert_eq!(installer.calls.get(), 1);
        assert_eq!(compiler.calls.get(), 1);
        assert_eq!(fixture.workspace_entries()?, 0);
        assert!(!fixture.working_dir.join("build").exists());

        let invocation = compiler
            .last_invocation
            .take()
            .ok_or_else(|| anyhow::anyhow!("compiler not invoked"))?;
        assert_eq!(invocation.target_name, "script");
        assert!(invocation.dist_path.starts_with(&fixture.workspace_root));
        assert!(invocation.work_path.starts_with(&fixture.workspace_root));
        assert_ne!(invocation.dist_path, invocation.work_path);

        Ok(())
    }

    #[test]
    fn explicit_output_name() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);
        let request = ConversionRequest::new(&fixture.script, Some(Path::new("out")));

        let outcome = fixture.run(fixture.config(), &installer, &compiler, &request);

        assert_eq!(outcome.result?, fixture.output_dir.join("out.exe"));

        Ok(())
    }

    #[test]
    fn missing_interpreter() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let res = Orchestrator::new(
            fixture.config(),
            &MockProber { available: false },
            &installer,
            &compiler,
        );

        match res {
            Err(ConversionError::Environment(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("probe should have failed"),
        }
        assert_eq!(fixture.workspace_entries()?, 0);
        assert_eq!(installer.calls.get(), 0);

        Ok(())
    }

    #[test]
    fn probe_creates_workspace() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let orchestrator = Orchestrator::new(
            fixture.config(),
            &MockProber { available: true },
            &installer,
            &compiler,
        )?;

        assert_eq!(orchestrator.stage(), Stage::Probed);
        assert_eq!(orchestrator.python().version, "Python 3.11.4");
        assert!(orchestrator.workspace_path().is_dir());
        assert_eq!(fixture.workspace_entries()?, 1);

        Ok(())
    }

    #[test]
    fn wrong_extension_never_installs() -> Result<()> {
        let fixture = Fixture::new()?;
        let script = fixture.working_dir.join("script.txt");
        std::fs::write(&script, "print('hello')\n")?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&script, None),
        );

        assert!(matches!(outcome.result, Err(ConversionError::Validation(_))));
        assert_eq!(installer.calls.get(), 0);
        assert_eq!(compiler.calls.get(), 0);
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[test]
    fn missing_input() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(fixture.working_dir.join("missing.py"), None),
        );

        match outcome.result {
            Err(e @ ConversionError::Validation(_)) => assert_eq!(e.stage(), Stage::Validated),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(installer.calls.get(), 0);
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[test]
    fn install_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller {
            fail: true,
            ..Default::default()
        };
        let compiler = MockCompiler::new(&fixture.working_dir);

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        assert!(matches!(outcome.result, Err(ConversionError::Install { .. })));
        assert_eq!(compiler.calls.get(), 0);
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[test]
    fn compile_failure_cleans_up() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            exit_ok: false,
            produce_exe: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        assert!(matches!(outcome.result, Err(ConversionError::Compile(_))));
        assert_eq!(outcome.stage, Stage::Failed);
        assert_eq!(fixture.workspace_entries()?, 0);
        assert!(!fixture.working_dir.join("build").exists());
        assert!(fixture.output_entries()?.is_empty());

        Ok(())
    }

    #[test]
    fn reported_success_without_output_fails() -> Result<()> {
        let fixture = Fixture::new()?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            produce_exe: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        match outcome.result {
            Err(e @ ConversionError::Compile(_)) => {
                assert!(e.to_string().contains("was not generated"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(compiler.calls.get(), 1);
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[test]
    fn existing_output_refused() -> Result<()> {
        let fixture = Fixture::new()?;
        let existing = fixture.output_dir.join("script.exe");
        std::fs::write(&existing, b"old")?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        assert!(matches!(outcome.result, Err(ConversionError::Validation(_))));
        assert_eq!(installer.calls.get(), 0);
        assert_eq!(std::fs::read(&existing)?, b"old");

        Ok(())
    }

    #[test]
    fn existing_output_replaced_with_overwrite() -> Result<()> {
        let fixture = Fixture::new()?;
        let existing = fixture.output_dir.join("script.exe");
        std::fs::write(&existing, b"old")?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler::new(&fixture.working_dir);

        let outcome = fixture.run(
            fixture.config().with_overwrite(true),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        assert_eq!(outcome.result?, existing);
        assert_eq!(std::fs::read(&existing)?, b"MZ");

        Ok(())
    }

    #[test]
    fn stale_output_does_not_satisfy_verification() -> Result<()> {
        let fixture = Fixture::new()?;
        let existing = fixture.output_dir.join("script.exe");
        std::fs::write(&existing, b"old")?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            produce_exe: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config().with_overwrite(true),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        match outcome.result {
            Err(e @ ConversionError::Compile(_)) => {
                assert!(e.to_string().contains("was not generated"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(std::fs::read(&existing)?, b"old");

        Ok(())
    }

    #[test]
    fn failed_overwrite_keeps_existing() -> Result<()> {
        let fixture = Fixture::new()?;
        let existing = fixture.output_dir.join("script.exe");
        std::fs::write(&existing, b"working build")?;
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            exit_ok: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config().with_overwrite(true),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );

        assert!(matches!(outcome.result, Err(ConversionError::Compile(_))));
        assert_eq!(std::fs::read(&existing)?, b"working build");
        assert_eq!(fixture.output_entries()?, vec![existing]);
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    /// Make the working directory read-only so the `.spec` file in it can't
    /// be removed.
    ///
    /// Returns false when running privileged, where permissions are ignored.
    #[cfg(unix)]
    fn lock_working_dir(fixture: &Fixture) -> Result<bool> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::write(fixture.working_dir.join("script.spec"), "# spec")?;
        std::fs::set_permissions(
            &fixture.working_dir,
            std::fs::Permissions::from_mode(0o555),
        )?;

        if std::fs::write(fixture.working_dir.join("write-check"), "").is_ok() {
            unlock_working_dir(fixture)?;
            return Ok(false);
        }

        Ok(true)
    }

    #[cfg(unix)]
    fn unlock_working_dir(fixture: &Fixture) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(
            &fixture.working_dir,
            std::fs::Permissions::from_mode(0o755),
        )?;

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn cleanup_failure_keeps_success() -> Result<()> {
        let fixture = Fixture::new()?;
        if !lock_working_dir(&fixture)? {
            return Ok(());
        }
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            build_in_working_dir: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );
        unlock_working_dir(&fixture)?;

        assert_eq!(outcome.cleanup_warnings.len(), 1);
        assert_eq!(
            outcome.cleanup_warnings[0].path,
            fixture.working_dir.join("script.spec")
        );
        assert_eq!(outcome.stage, Stage::CleanedUp);
        assert_eq!(outcome.result?, fixture.output_dir.join("script.exe"));
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn cleanup_failure_keeps_compile_error() -> Result<()> {
        let fixture = Fixture::new()?;
        if !lock_working_dir(&fixture)? {
            return Ok(());
        }
        let installer = MockInstaller::default();
        let compiler = MockCompiler {
            build_in_working_dir: false,
            exit_ok: false,
            produce_exe: false,
            ..MockCompiler::new(&fixture.working_dir)
        };

        let outcome = fixture.run(
            fixture.config(),
            &installer,
            &compiler,
            &ConversionRequest::new(&fixture.script, None),
        );
        unlock_working_dir(&fixture)?;

        assert_eq!(outcome.cleanup_warnings.len(), 1);
        assert_eq!(outcome.stage, Stage::Failed);
        match outcome.result {
            Err(e @ ConversionError::Compile(_)) => {
                assert!(e.to_string().contains("PyInstaller exited with"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fixture.workspace_entries()?, 0);

        Ok(())
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::CleanedUp.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Verified.is_terminal());
    }
}
