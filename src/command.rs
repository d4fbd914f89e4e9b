use crate::env::Environment;
use std::io::{Cursor, Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Abstraction over a readable input stream handed to a pipeline stage.
///
/// A stream is either one of the interpreter's own process-level streams, which a
/// child process can inherit directly, or an in-memory buffer that has to be
/// bridged to the child through an OS pipe.
pub trait Stdin: Read + Send {
    /// Handle a child process can inherit, or `None` when the stream lives in memory.
    fn inherited(&self) -> Option<Stdio>;
}

/// Abstraction over a writable output stream handed to a pipeline stage.
///
/// See [`Stdin`] for the inherited/in-memory distinction.
pub trait Stdout: Write + Send {
    /// Handle a child process can inherit, or `None` when the stream lives in memory.
    fn inherited(&self) -> Option<Stdio>;
}

impl Stdin for Cursor<Vec<u8>> {
    fn inherited(&self) -> Option<Stdio> {
        None
    }
}

impl Stdout for Vec<u8> {
    fn inherited(&self) -> Option<Stdio> {
        None
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
/// Execution never fails past this point: problems are reported on `stderr` and
/// folded into the returned status.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Stdin,
        stdout: &mut dyn Stdout,
        stderr: &mut dyn Stdout,
        env: &mut Environment,
    ) -> ExitCode;
}
