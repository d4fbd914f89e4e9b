use crate::command::{Stdin, Stdout};
use std::io::{self, Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;

/// Memory-backed reader feeding the output of one pipeline stage into the next.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl Stdin for MemReader {
    fn inherited(&self) -> Option<Stdio> {
        None
    }
}

/// Memory-backed writer capturing the output of a pipeline stage.
#[derive(Default)]
pub struct MemWriter {
    buf: Vec<u8>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected bytes, consuming the writer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn inherited(&self) -> Option<Stdio> {
        None
    }
}

/// The interpreter's own standard input.
pub struct ProcessStdin(io::Stdin);

impl ProcessStdin {
    pub fn new() -> Self {
        Self(io::stdin())
    }
}

impl Default for ProcessStdin {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for ProcessStdin {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

impl Stdin for ProcessStdin {
    fn inherited(&self) -> Option<Stdio> {
        Some(Stdio::inherit())
    }
}

/// The interpreter's own standard output.
pub struct ProcessStdout(io::Stdout);

impl ProcessStdout {
    pub fn new() -> Self {
        Self(io::stdout())
    }
}

impl Default for ProcessStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for ProcessStdout {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.0.flush()
    }
}

impl Stdout for ProcessStdout {
    fn inherited(&self) -> Option<Stdio> {
        Some(Stdio::inherit())
    }
}

/// The interpreter's own standard error.
pub struct ProcessStderr(io::Stderr);

impl ProcessStderr {
    pub fn new() -> Self {
        Self(io::stderr())
    }
}

impl Default for ProcessStderr {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for ProcessStderr {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.0.flush()
    }
}

impl Stdout for ProcessStderr {
    fn inherited(&self) -> Option<Stdio> {
        Some(Stdio::inherit())
    }
}
