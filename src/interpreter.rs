use crate::command::{ExitCode, Stdin, Stdout};
use crate::dispatcher;
use crate::env::Environment;
use crate::io_adapters::{ProcessStderr, ProcessStdin, ProcessStdout};
use crate::lexer;
use crate::parser::{self, ParsedCommand};
use crate::pipeline;
use crate::registry::{CommandKind, CommandRegistry};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;

/// Status of a line that failed to tokenize.
pub const SYNTAX_ERROR: ExitCode = 2;
/// Status reported when the REPL is interrupted with Ctrl-C.
pub const INTERRUPTED: ExitCode = 130;

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns the [`Environment`] every command runs against and the
/// [`CommandRegistry`] used to classify command names.
///
/// Example
/// ```
/// use pipesh::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]);
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    registry: CommandRegistry,
}

impl Interpreter {
    /// Create an interpreter seeded from the current process state.
    pub fn new() -> Self {
        Self::with_environment(Environment::new())
    }

    /// Create an interpreter running against a prepared environment.
    pub fn with_environment(env: Environment) -> Self {
        Self {
            env,
            registry: CommandRegistry::default(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Bind `name` to `kind` for every line parsed from now on.
    pub fn register(&mut self, name: &str, kind: CommandKind) {
        self.registry.register(name, kind);
    }

    /// Tokenize, parse and execute one input line.
    ///
    /// A syntax error is reported on `stderr` and only aborts this line.
    pub fn run_line(
        &mut self,
        line: &str,
        stdin: &mut dyn Stdin,
        stdout: &mut dyn Stdout,
        stderr: &mut dyn Stdout,
    ) -> ExitCode {
        let tokens = match lexer::tokenize(line, &self.env) {
            Ok(tokens) => tokens,
            Err(e) => {
                let _ = writeln!(stderr, "pipesh: {}", e);
                self.env.last_status = SYNTAX_ERROR;
                return SYNTAX_ERROR;
            }
        };
        let pipeline = parser::parse(tokens, &self.registry);
        pipeline::execute(&pipeline, stdin, stdout, stderr, &mut self.env)
    }

    /// Run a single command invocation by name with arguments, on the process streams.
    pub fn run(&mut self, name: &str, args: &[&str]) -> ExitCode {
        let kind = self.registry.resolve(name);
        let mut argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        if kind == CommandKind::External {
            argv.insert(0, name.to_string());
        }
        let cmd = ParsedCommand {
            name: name.to_string(),
            args: argv,
            kind,
        };
        dispatcher::execute(
            &cmd,
            &mut ProcessStdin::new(),
            &mut ProcessStdout::new(),
            &mut ProcessStderr::new(),
            &mut self.env,
        )
    }

    /// Read-Eval-Print Loop over the terminal.
    ///
    /// Returns the code the process should exit with: the one given to `exit`, 0 at
    /// end of input, or [`INTERRUPTED`] on Ctrl-C.
    pub fn repl(&mut self, prompt: &str) -> rustyline::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.run_line(
                        &line,
                        &mut ProcessStdin::new(),
                        &mut ProcessStdout::new(),
                        &mut ProcessStderr::new(),
                    );
                    if self.env.should_exit {
                        return Ok(self.env.exit_code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    log::debug!("interrupted");
                    return Ok(INTERRUPTED);
                }
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Builtin;
    use std::collections::HashMap;
    use std::io::Cursor;

    fn interpreter() -> Interpreter {
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Interpreter::with_environment(Environment::from_parts(vars, "/"))
    }

    fn run(sh: &mut Interpreter, line: &str) -> (ExitCode, String, String) {
        let mut stdin = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = sh.run_line(line, &mut stdin, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn pipeline_end_to_end() {
        let mut sh = interpreter();
        assert_eq!(run(&mut sh, "echo hi | cat"), (0, "hi\n".to_string(), String::new()));
        assert_eq!(run(&mut sh, "echo 'one two three' | wc").1, "1 3 14\n");
    }

    #[test]
    fn grep_with_context_piped_to_wc() {
        let mut sh = interpreter();
        run(&mut sh, "$LINES=\"x\nmatch\ny\nz\"");
        let (_, out, _) = run(&mut sh, "echo \"$LINES\" | grep -A 1 match | wc");
        assert_eq!(out, "2 2 8\n");
    }

    #[test]
    fn builtin_edge_arguments_do_not_abort_the_line() {
        let mut sh = interpreter();
        let (code, out, _) = run(&mut sh, "echo match | grep -A 18446744073709551615 match");
        assert_eq!(code, 0);
        assert_eq!(out, "match\n");
        assert_eq!(run(&mut sh, "echo -x hello | cat").1, "-x hello\n");
    }

    #[test]
    fn assignment_then_substitution() {
        let mut sh = interpreter();
        assert_eq!(run(&mut sh, "$VAR=value").0, 0);
        assert_eq!(sh.env().get_var("VAR"), Some("value"));
        assert_eq!(run(&mut sh, "echo \"[$VAR]\" '[$VAR]'").1, "[value] [$VAR]\n");
    }

    #[test]
    fn command_name_built_from_variables() {
        let mut sh = interpreter();
        run(&mut sh, "$CMD=ec");
        run(&mut sh, "$HO=ho");
        assert_eq!(run(&mut sh, "$CMD$HO hello").1, "hello\n");
    }

    #[test]
    fn exit_skips_the_rest_and_keeps_first_code() {
        let mut sh = interpreter();
        let (code, out, _) = run(&mut sh, "exit 5 | echo never");
        assert_eq!(code, 5);
        assert!(out.is_empty());
        run(&mut sh, "exit 9");
        assert!(sh.env().should_exit);
        assert_eq!(sh.env().exit_code, 5);
    }

    #[test]
    fn syntax_error_only_aborts_the_line() {
        let mut sh = interpreter();
        let (code, out, err) = run(&mut sh, "echo 'oops | cat");
        assert_eq!(code, SYNTAX_ERROR);
        assert!(out.is_empty());
        assert_eq!(err, "pipesh: syntax error: unterminated single quote\n");
        assert_eq!(sh.env().last_status, SYNTAX_ERROR);
        assert!(!sh.env().should_exit);

        assert_eq!(run(&mut sh, "echo fine").1, "fine\n");
    }

    #[test]
    fn registered_alias_runs_builtin() {
        let mut sh = interpreter();
        sh.register("say", CommandKind::Builtin(Builtin::Echo));
        assert_eq!(run(&mut sh, "SAY hi | cat").1, "hi\n");
    }

    #[test]
    fn cd_changes_directory_for_later_commands() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
        let mut sh = interpreter();
        let path = dir.path().to_string_lossy().into_owned();
        assert_eq!(run(&mut sh, &format!("cd '{}'", path)).0, 0);
        assert_eq!(run(&mut sh, "cat notes.txt").1, "hello\n");
    }

    #[test]
    #[cfg(unix)]
    fn external_output_is_captured() {
        let mut sh = interpreter();
        run(&mut sh, "$WHO=world");
        let (code, out, _) = run(&mut sh, "sh -c 'echo hello $WHO' | wc");
        assert_eq!(code, 0);
        assert_eq!(out, "1 2 12\n");
    }

    #[test]
    #[cfg(unix)]
    fn unknown_program_reports_not_found() {
        let mut sh = interpreter();
        let (code, _, err) = run(&mut sh, "no_such_program_xyz arg");
        assert_eq!(code, 127);
        assert_eq!(err, "pipesh: no_such_program_xyz: command not found\n");
    }
}
