use crate::command::{ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use std::ffi::OsStr;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

/// Status returned when the child could not be spawned or waited for.
pub const SPAWN_FAILURE: ExitCode = -1;
/// Status returned when the program cannot be found.
pub const NOT_FOUND: ExitCode = 127;
/// Status returned when the program exists but cannot be executed.
pub const NOT_EXECUTABLE: ExitCode = 126;

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    /// Full argv, `args[0]` included.
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    fn spawn_error(&self, stderr: &mut dyn Stdout, err: &io::Error) -> ExitCode {
        let (message, code) = match err.kind() {
            ErrorKind::NotFound => ("command not found".to_string(), NOT_FOUND),
            ErrorKind::PermissionDenied => ("permission denied".to_string(), NOT_EXECUTABLE),
            _ => (err.to_string(), SPAWN_FAILURE),
        };
        log::warn!("failed to spawn {}: {}", self.name, err);
        let _ = writeln!(stderr, "pipesh: {}: {}", self.name, message);
        code
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Stdin,
        stdout: &mut dyn Stdout,
        stderr: &mut dyn Stdout,
        env: &mut Environment,
    ) -> ExitCode {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let Some(path) = find_command_path(OsStr::new(search_paths), &env.current_dir, &self.name)
        else {
            let _ = writeln!(stderr, "pipesh: {}: command not found", self.name);
            return NOT_FOUND;
        };
        log::debug!("running {} as {}", self.name, path.display());

        let mut cmd = Command::new(&path);
        if let Some((argv0, rest)) = self.args.split_first() {
            cmd.args(rest);
            set_argv0(&mut cmd, argv0);
        }
        cmd.env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .stdin(stdin.inherited().unwrap_or_else(Stdio::piped))
            .stdout(stdout.inherited().unwrap_or_else(Stdio::piped))
            .stderr(stderr.inherited().unwrap_or_else(Stdio::piped));

        // Anything buffered on our side must reach an inherited descriptor first.
        if let Err(e) = stdout.flush() {
            log::warn!("failed to flush stdout before running {}: {}", self.name, e);
        }
        if let Err(e) = stderr.flush() {
            log::warn!("failed to flush stderr before running {}: {}", self.name, e);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return self.spawn_error(stderr, &e),
        };

        let child_stdin = child.stdin.take();
        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let (feed_from, out_to, err_to) = (&mut *stdin, &mut *stdout, &mut *stderr);

        let waited = thread::scope(|s| {
            let feeder = child_stdin.map(|mut pipe| {
                s.spawn(move || match io::copy(feed_from, &mut pipe) {
                    Ok(n) => log::trace!("fed {n} bytes to child"),
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                    Err(e) => log::warn!("failed to feed child stdin: {e}"),
                })
            });
            let out_drain = child_stdout.map(|mut pipe| {
                s.spawn(move || match io::copy(&mut pipe, out_to) {
                    Ok(n) => log::trace!("drained {n} bytes of child stdout"),
                    Err(e) => log::warn!("failed to drain child stdout: {e}"),
                })
            });
            let err_drain = child_stderr.map(|mut pipe| {
                s.spawn(move || match io::copy(&mut pipe, err_to) {
                    Ok(n) => log::trace!("drained {n} bytes of child stderr"),
                    Err(e) => log::warn!("failed to drain child stderr: {e}"),
                })
            });

            let waited = child.wait();

            for handle in [feeder, out_drain, err_drain].into_iter().flatten() {
                if handle.join().is_err() {
                    log::warn!("stream copy task panicked");
                }
            }
            waited
        });

        match waited {
            Ok(status) => status.code().unwrap_or_else(|| terminated_by_signal(status)),
            Err(e) => {
                log::warn!("failed to wait for {}: {}", self.name, e);
                let _ = writeln!(stderr, "pipesh: {}: {}", self.name, e);
                SPAWN_FAILURE
            }
        }
    }
}

#[cfg(unix)]
fn set_argv0(cmd: &mut Command, argv0: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(argv0);
}

#[cfg(not(unix))]
fn set_argv0(_cmd: &mut Command, _argv0: &str) {}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    ExitStatusExt::signal(&exit_status).map_or(SPAWN_FAILURE, |signal| 128 + signal)
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    SPAWN_FAILURE
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Name containing a path separator (`/bin/sh`, `./foo`, `bin/sh`): resolved against
///   `cwd` (absolute paths stay as they are) and returned if it exists.
/// - Bare name: search each directory in `search_paths` (PATH) and return the first
///   executable file.
/// - Empty name: returns `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.chars().any(std::path::is_separator) {
        let path = cwd.join(name);
        return path.exists().then_some(path);
    }
    find_in_path(search_paths, OsStr::new(name))
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
