//! External command execution with combined output capture.
//!
//! Provisioner and unit-shell calls both shell out to an orchestration
//! tool. Stdout and stderr are captured through a single pipe into one
//! string, and a non-zero exit status becomes a [`CommandError::Exit`] that still
//! carries that output so callers can log it.

use std::io::{self, Read};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Result of an external command: the combined output on success.
pub type CommandResult = Result<String, CommandError>;

/// Failure of an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with status {code:?}: {}", .output.trim())]
    Exit {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

impl CommandError {
    /// Output produced before the failure, empty if the command never ran.
    pub fn output(&self) -> &str {
        match self {
            CommandError::Exit { output, .. } => output,
            CommandError::Spawn { .. } | CommandError::Io { .. } => "",
        }
    }
}

/// Run `cmd` to completion, blocking the calling thread.
///
/// Stdout and stderr share one pipe, so the output keeps the order in
/// which the command wrote it.
pub fn run_combined(cmd: &mut Command) -> CommandResult {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("Running: {:?}", cmd);

    let io_err = |source| CommandError::Io {
        program: program.clone(),
        source,
    };

    let (mut reader, writer) = io::pipe().map_err(io_err)?;
    let writer_err = writer.try_clone().map_err(io_err)?;
    let spawned = cmd
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_err)
        .spawn();
    // `cmd` holds the write ends until they are replaced; the read below
    // only sees EOF once every write end is closed.
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    let mut child = spawned.map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    let mut raw = Vec::new();
    let read = reader.read_to_end(&mut raw);
    let status = child.wait().map_err(io_err)?;
    read.map_err(io_err)?;
    let combined = String::from_utf8_lossy(&raw).into_owned();

    if status.success() {
        Ok(combined)
    } else {
        Err(CommandError::Exit {
            program,
            code: status.code(),
            output: combined,
        })
    }
}
