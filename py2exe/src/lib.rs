// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Bundle Python scripts into standalone executables.

This crate drives [PyInstaller](https://pyinstaller.org/) to turn a single
Python script into a single-file executable. It locates a Python
interpreter, installs PyInstaller with pip, runs it with intermediate state
confined to a temporary directory, verifies the executable was produced, and
removes temporary files afterwards.

The external tools sit behind the [environment::EnvironmentProber],
[installer::DependencyInstaller] and [compiler::Compiler] traits so the
[orchestrator::Orchestrator] can be exercised without them.
*/

pub mod cli;
pub mod compiler;
pub mod config;
pub mod environment;
pub mod error;
pub mod installer;
pub mod janitor;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod request;
pub mod workspace;
