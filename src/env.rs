use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable interpreter state shared by every stage of every pipeline.
///
/// The environment contains:
/// - `vars`: variables used for `$NAME` substitution and handed to external programs.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: set once `exit` has run; never cleared afterwards.
/// - `exit_code`: the code the interpreter should terminate with.
/// - `last_status`: status of the most recently completed stage.
///
/// Only the initial values come from the host process; afterwards `vars` is the
/// sole source of variables.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
    /// Code requested by `exit`.
    pub exit_code: ExitCode,
    /// Status of the last executed stage.
    pub last_status: ExitCode,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_parts(vars, current_dir)
    }

    /// Build an environment from explicit variables and working directory.
    pub fn from_parts(vars: HashMap<String, String>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars,
            current_dir: current_dir.into(),
            should_exit: false,
            exit_code: 0,
            last_status: 0,
        }
    }

    /// Get the value of a variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Record an `exit` request. The first request wins.
    pub fn request_exit(&mut self, code: ExitCode) {
        if !self.should_exit {
            self.should_exit = true;
            self.exit_code = code;
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
