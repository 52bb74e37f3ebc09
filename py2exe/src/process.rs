// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Running external programs. */

use {
    anyhow::{anyhow, Context, Result},
    duct::Expression,
    log::info,
    std::io::{BufRead, BufReader},
};

/// Run a command, forwarding each line of its combined output to the log.
///
/// Output is not assumed to be UTF-8. Undecodable bytes are replaced when
/// logged and never abort the process.
///
/// Returns an error if the process could not be spawned or exits unsuccessfully.
pub fn run_streaming(expression: Expression, description: &str) -> Result<()> {
    let reader = expression
        .stderr_to_stdout()
        .unchecked()
        .reader()
        .with_context(|| format!("spawning {}", description))?;
    {
        let buffered = BufReader::new(&reader);
        for line in buffered.split(b'\n') {
            let line = line.with_context(|| format!("reading {} output", description))?;
            let line = String::from_utf8_lossy(&line);
            info!("{}", line.trim_end_matches('\r'));
        }
    }

    let output = reader
        .try_wait()?
        .ok_or_else(|| anyhow!("unable to wait on {}", description))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!("{} exited with {}", description, output.status))
    }
}
