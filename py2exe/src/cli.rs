// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Command line interface. */

use {
    crate::{
        config::{ConversionConfig, DEFAULT_PACKAGE},
        environment::PY2EXE_VERSION,
        logging,
        orchestrator,
        request::{has_source_extension, ConversionRequest},
    },
    anyhow::{Context, Result},
    clap::{value_parser, Arg, ArgAction, ArgMatches, Command},
    log::warn,
    std::{ffi::OsString, path::PathBuf},
};

const ABOUT: &str = "\
Bundle a Python script into a standalone executable.

The SCRIPT argument is the path to a Python source file.

This command will install PyInstaller into the Python interpreter found on
PATH (or the one given with --python), then run PyInstaller to produce a
single-file executable without a console window.

The executable is written to the current directory (or --dist-path) and is
named after the script unless -o is given. The `.exe` extension is appended
when missing.

PyInstaller's intermediate files are written to a temporary directory which
is removed when the command finishes, whether it succeeded or not.
";

/// Spelling of the output flag accepted for compatibility.
const LEGACY_EXE_FLAG: &str = "-exe";

fn parse_script_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);

    if has_source_extension(&path) {
        Ok(path)
    } else {
        Err("must be a path to a .py file".to_string())
    }
}

/// Rewrite `-exe PATH` to `--exe PATH` so clap does not read it as short flags.
pub fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| {
            if arg == LEGACY_EXE_FLAG {
                OsString::from("--exe")
            } else {
                arg
            }
        })
        .collect()
}

pub fn command() -> Command {
    Command::new("py2exe")
        .version(PY2EXE_VERSION)
        .about("Bundle a Python script into a standalone executable")
        .long_about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase logging verbosity. Can be specified multiple times"),
        )
        .arg(
            Arg::new("script")
                .required(true)
                .value_name("SCRIPT")
                .value_parser(parse_script_path)
                .help("Python script to convert"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .alias("exe")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Name of the executable to produce"),
        )
        .arg(
            Arg::new("python")
                .long("python")
                .value_name("EXE")
                .value_parser(value_parser!(PathBuf))
                .help("Python interpreter to use instead of searching PATH"),
        )
        .arg(
            Arg::new("dist_path")
                .long("dist-path")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory to write the executable to"),
        )
        .arg(
            Arg::new("workspace_root")
                .long("workspace-root")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory in which the temporary build directory is created"),
        )
        .arg(
            Arg::new("package")
                .long("package")
                .value_name("REQUIREMENT")
                .default_value(DEFAULT_PACKAGE)
                .help("pip requirement providing PyInstaller"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Replace the executable if it already exists"),
        )
}

fn config_from_args(args: &ArgMatches) -> Result<ConversionConfig> {
    let cwd = std::env::current_dir().context("resolving current directory")?;

    let mut config = ConversionConfig::new(cwd).with_overwrite(args.get_flag("force"));

    if let Some(path) = args.get_one::<PathBuf>("dist_path") {
        config = config.with_output_dir(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("workspace_root") {
        config = config.with_workspace_root(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("python") {
        config = config.with_python_exe(path);
    }
    if let Some(package) = args.get_one::<String>("package") {
        config = config.with_package(package);
    }

    Ok(config)
}

/// Parse arguments, run a conversion, and resolve the process exit code.
pub fn run_cli() -> Result<i32> {
    let matches = match command().try_get_matches_from(normalize_args(std::env::args_os())) {
        Ok(matches) => matches,
        Err(e) => {
            e.print()?;
            return Ok(if e.use_stderr() { 1 } else { 0 });
        }
    };

    logging::init(matches.get_count("verbose"));

    let config = config_from_args(&matches)?;
    let script = matches
        .get_one::<PathBuf>("script")
        .context("SCRIPT argument is required")?;
    let request = ConversionRequest::new(
        script,
        matches.get_one::<PathBuf>("output").map(|p| p.as_path()),
    );

    let outcome = orchestrator::convert(config, &request);

    if !outcome.cleanup_warnings.is_empty() {
        warn!(
            "{} temporary path(s) could not be removed",
            outcome.cleanup_warnings.len()
        );
    }

    outcome.result?;

    Ok(0)
}
