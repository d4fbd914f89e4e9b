use crate::command::{ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::registry::Builtin;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;

/// Status of a built-in whose arguments could not be parsed.
pub const USAGE_ERROR: ExitCode = 2;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are executed directly in-process without spawning a child process. Most
/// of them parse their arguments with the [`argh`] crate (`FromArgs`).
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is reported on `stderr` and turned into status 1.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: &mut dyn Stdin,
        mut stdout: &mut dyn Stdout,
        mut stderr: &mut dyn Stdout,
        env: &mut Environment,
    ) -> ExitCode {
        let result =
            <T as BuiltinCommand>::execute(*self, &mut stdin, &mut stdout, &mut stderr, env)
                .and_then(|code| {
                    stdout.flush()?;
                    Ok(code)
                });
        match result {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(stderr, "{}: {:#}", T::name(), e);
                1
            }
        }
    }
}

/// Stand-in for a built-in whose arguments were rejected (or that was asked for `--help`).
struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Stdin,
        stdout: &mut dyn Stdout,
        stderr: &mut dyn Stdout,
        _env: &mut Environment,
    ) -> ExitCode {
        let text = self.output.trim_end();
        if self.is_error {
            let _ = writeln!(stderr, "{}: {}", self.name, text);
            USAGE_ERROR
        } else {
            let _ = writeln!(stdout, "{}", text);
            0
        }
    }
}

fn parse_args<T: BuiltinCommand + FromArgs + 'static>(
    invoked_as: &str,
    args: &[&str],
) -> Box<dyn ExecutableCommand> {
    match T::from_args(&[invoked_as], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            name: T::name(),
            output,
            is_error: status.is_err(),
        }),
    }
}

impl Builtin {
    /// Parse `args` into the built-in's command object.
    ///
    /// `invoked_as` is the name the user typed, which may be an alias.
    pub(crate) fn instantiate(self, invoked_as: &str, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match self {
            Builtin::Cat => parse_args::<Cat>(invoked_as, args),
            Builtin::Cd => parse_args::<Cd>(invoked_as, args),
            Builtin::Echo => Box::new(Echo::from_words(args)),
            Builtin::Grep => parse_args::<Grep>(invoked_as, args),
            Builtin::Pwd => parse_args::<Pwd>(invoked_as, args),
            Builtin::Wc => parse_args::<Wc>(invoked_as, args),
        }
    }
}

/// Paths given to built-ins are relative to the interpreter's working directory.
fn resolve_path(env: &Environment, name: &str) -> PathBuf {
    env.current_dir.join(name)
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) if !t.is_empty() => t,
            _ => env
                .get_var("HOME")
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("no target and HOME not set"))?,
        };

        let new_dir = resolve_path(env, &target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("{}: not a directory", canonical.display());
        }

        env.current_dir = canonical;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces.
///
/// Only a leading `-n` is an option; every other word, dashes included, is printed
/// verbatim.
pub struct Echo {
    /// Do not output the trailing newline.
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl Echo {
    fn from_words(words: &[&str]) -> Self {
        let (no_newline, rest) = match words.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, words),
        };
        Self {
            no_newline,
            args: rest.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct Wc {
    #[argh(positional, greedy)]
    /// files to count. If none provided, reads from stdin.
    pub files: Vec<String>,
}

/// Line, word and byte totals of one input.
#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    lines: usize,
    words: usize,
    bytes: usize,
}

impl Counts {
    /// Every line read counts one byte for its newline, present or not.
    fn of(reader: &mut dyn Read) -> std::io::Result<Self> {
        let mut counts = Counts::default();
        for line in BufReader::new(reader).split(b'\n') {
            let line = line?;
            counts.lines += 1;
            counts.words += String::from_utf8_lossy(&line).split_whitespace().count();
            counts.bytes += line.len() + 1;
        }
        Ok(counts)
    }
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.files.is_empty() {
            let c = Counts::of(stdin).context("read error")?;
            writeln!(stdout, "{} {} {}", c.lines, c.words, c.bytes)?;
            return Ok(0);
        }
        let mut status = 0;
        for fname in &self.files {
            let counted = fs::File::open(resolve_path(env, fname))
                .and_then(|mut f| Counts::of(&mut f));
            match counted {
                Ok(c) => writeln!(stdout, "{} {} {} {}", c.lines, c.words, c.bytes, fname)?,
                Err(e) => {
                    writeln!(stderr, "wc: {}: {}", fname, e)?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print. If none provided, copies stdin.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.files.is_empty() {
            std::io::copy(stdin, stdout)?;
            return Ok(0);
        }
        let mut status = 0;
        for fname in &self.files {
            match fs::File::open(resolve_path(env, fname)) {
                Ok(mut f) => {
                    std::io::copy(&mut f, stdout)?;
                }
                Err(e) => {
                    writeln!(stderr, "cat: {}: {}", fname, e)?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn compile(&self) -> Result<Regex, regex::Error> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
    }

    /// Buffer every line of `reader`, then print the matches and their trailing context
    /// in input order.
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        re: &Regex,
    ) -> Result<()> {
        let lines = BufReader::new(reader)
            .split(b'\n')
            .collect::<std::io::Result<Vec<_>>>()
            .context("read error")?;

        let mut to_print = vec![false; lines.len()];
        for (i, line) in lines.iter().enumerate() {
            if re.is_match(&String::from_utf8_lossy(line)) {
                let end = i
                    .saturating_add(self.after_context)
                    .saturating_add(1)
                    .min(lines.len());
                to_print[i..end].fill(true);
            }
        }

        for (line, _) in lines.iter().zip(&to_print).filter(|(_, print)| **print) {
            stdout.write_all(line)?;
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.pattern.is_empty() {
            writeln!(stderr, "grep: empty pattern")?;
            return Ok(USAGE_ERROR);
        }
        let re = match self.compile() {
            Ok(re) => re,
            Err(e) => {
                writeln!(stderr, "grep: invalid pattern: {}", e)?;
                return Ok(USAGE_ERROR);
            }
        };

        if self.files.is_empty() {
            self.process_source(stdin, stdout, &re)?;
            return Ok(0);
        }

        let mut final_exit_code = 0;
        for file_name in &self.files {
            let result = fs::File::open(resolve_path(env, file_name))
                .map_err(anyhow::Error::from)
                .and_then(|mut f| self.process_source(&mut f, stdout, &re));
            if let Err(e) = result {
                writeln!(stderr, "grep: {}: {:#}", file_name, e)?;
                final_exit_code = 1;
            }
        }
        Ok(final_exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn test_env(dir: &std::path::Path) -> Environment {
        Environment::from_parts(HashMap::new(), dir)
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        fs::write(dir.path().join(name), content).expect("write test file");
        name.to_string()
    }

    /// Parse and run a built-in the way the dispatcher does.
    fn run_builtin(
        builtin: Builtin,
        args: &[&str],
        input: &str,
        env: &mut Environment,
    ) -> (ExitCode, String, String) {
        let mut stdin = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = builtin
            .instantiate(builtin.name(), args)
            .execute(&mut stdin, &mut out, &mut err, env);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let dir = TempDir::new().unwrap();
        let mut env = test_env(dir.path());

        let (code, out, _) = run_builtin(Builtin::Pwd, &[], "", &mut env);

        assert_eq!(code, 0);
        assert_eq!(out, format!("{}\n", dir.path().to_string_lossy()));
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let mut env = test_env(std::path::Path::new("/"));

        let (code, out, _) = run_builtin(Builtin::Echo, &["hello", "world"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "hello world\n");

        let (_, out, _) = run_builtin(Builtin::Echo, &["-n", "foo", "bar"], "", &mut env);
        assert_eq!(out, "foo bar");

        let (_, out, _) = run_builtin(Builtin::Echo, &[], "", &mut env);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_echo_prints_dashed_words_verbatim() {
        let mut env = test_env(std::path::Path::new("/"));

        let (code, out, err) = run_builtin(Builtin::Echo, &["-5"], "", &mut env);
        assert_eq!((code, out.as_str(), err.as_str()), (0, "-5\n", ""));

        let (code, out, _) = run_builtin(Builtin::Echo, &["-x", "hello"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "-x hello\n");

        let (code, out, _) = run_builtin(Builtin::Echo, &["--help"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "--help\n");

        let (_, out, _) = run_builtin(Builtin::Echo, &["a", "-n"], "", &mut env);
        assert_eq!(out, "a -n\n");

        let (_, out, _) = run_builtin(Builtin::Echo, &["-n", "-n"], "", &mut env);
        assert_eq!(out, "-n");
    }

    #[test]
    fn test_cd_to_relative_path_updates_context_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        let process_cwd = std::env::current_dir().unwrap();
        let mut env = test_env(&base);

        let (code, _, _) = run_builtin(Builtin::Cd, &["sub"], "", &mut env);

        assert_eq!(code, 0);
        assert_eq!(env.current_dir, base.join("sub"));
        assert_eq!(std::env::current_dir().unwrap(), process_cwd);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let dir = TempDir::new().unwrap();
        let home = fs::canonicalize(dir.path()).unwrap();
        let mut env = test_env(std::path::Path::new("/"));
        env.set_var("HOME", home.to_string_lossy());

        let (code, _, _) = run_builtin(Builtin::Cd, &[], "", &mut env);

        assert_eq!(code, 0);
        assert_eq!(env.current_dir, home);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let dir = TempDir::new().unwrap();
        let mut env = test_env(dir.path());

        let (code, _, err) = run_builtin(Builtin::Cd, &["does_not_exist"], "", &mut env);

        assert_eq!(code, 1);
        assert!(err.starts_with("cd: "));
        assert_eq!(env.current_dir, dir.path());
    }

    #[test]
    fn test_cat_reads_files_in_order() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", "hello\n");
        let b = write_file(&dir, "b.txt", "world\n");
        let mut env = test_env(dir.path());

        let (code, out, err) = run_builtin(Builtin::Cat, &[&a, &b], "", &mut env);

        assert_eq!(code, 0);
        assert_eq!(out, "hello\nworld\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_cat_reads_stdin_when_no_args() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, _) = run_builtin(Builtin::Cat, &[], "from stdin\nline2\n", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "from stdin\nline2\n");
    }

    #[test]
    fn test_cat_missing_file_reports_and_continues() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", "still printed\n");
        let mut env = test_env(dir.path());

        let (code, out, err) = run_builtin(Builtin::Cat, &["missing.txt", &a], "", &mut env);

        assert_eq!(code, 1);
        assert_eq!(out, "still printed\n");
        assert!(err.starts_with("cat: missing.txt: "));
    }

    #[test]
    fn test_wc_counts_file() {
        let dir = TempDir::new().unwrap();
        let f = write_file(&dir, "words.txt", "one two three\nfour five\n");
        let mut env = test_env(dir.path());

        let (code, out, _) = run_builtin(Builtin::Wc, &[&f], "", &mut env);

        assert_eq!(code, 0);
        assert_eq!(out, "2 5 24 words.txt\n");
    }

    #[test]
    fn test_wc_counts_missing_final_newline() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = run_builtin(Builtin::Wc, &[], "a b\nc", &mut env);
        assert_eq!(out, "2 3 6\n");
    }

    #[test]
    fn test_wc_counts_stdin_when_no_args() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, _) = run_builtin(Builtin::Wc, &[], "a b c\n", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "1 3 6\n");
    }

    #[test]
    fn test_wc_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut env = test_env(dir.path());
        let (code, out, err) = run_builtin(Builtin::Wc, &["nope.txt"], "", &mut env);
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert!(err.starts_with("wc: nope.txt: "));
    }

    fn grep(args: &[&str], input: &str, env: &mut Environment) -> (ExitCode, String, String) {
        run_builtin(Builtin::Grep, args, input, env)
    }

    #[test]
    fn test_grep_stdin_basic() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, err) = grep(
            &["hello"],
            "hello world\nthis is a test\nhello again\n",
            &mut env,
        );
        assert_eq!(code, 0);
        assert!(err.is_empty());
        assert_eq!(out, "hello world\nhello again\n");
    }

    #[test]
    fn test_grep_multiple_files_in_argument_order() {
        let dir = TempDir::new().unwrap();
        let f1 = write_file(&dir, "one.txt", "alpha\nbeta\ngamma\n");
        let f2 = write_file(&dir, "two.txt", "delta\nbeta 2\nomega\n");
        let mut env = test_env(dir.path());

        let (code, out, err) = grep(&["beta", &f1, &f2], "", &mut env);

        assert_eq!(code, 0);
        assert!(err.is_empty());
        assert_eq!(out, "beta\nbeta 2\n");
    }

    #[test]
    fn test_grep_word_regexp() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = grep(&["-w", "test"], "test\ntesting\natest\n test \n", &mut env);
        assert_eq!(out, "test\n test \n");
    }

    #[test]
    fn test_grep_ignore_case() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = grep(&["-i", "hello"], "Hello\nHELLO\nworld\nhElLo\n", &mut env);
        assert_eq!(out, "Hello\nHELLO\nhElLo\n");
    }

    #[test]
    fn test_grep_combined_options() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = grep(
            &["-i", "-w", "test"],
            "Test line\ntest\nTESTING\nanother test\n",
            &mut env,
        );
        assert_eq!(out, "Test line\ntest\nanother test\n");
    }

    #[test]
    fn test_grep_trailing_context() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, _) = grep(&["-A", "1", "match"], "x\nmatch\ny\nz\n", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "match\ny\n");
    }

    #[test]
    fn test_grep_context_overlap() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = grep(
            &["-A", "2", "match"],
            "line1\nmatch1\nline2\nline3\nmatch2\nline4\n",
            &mut env,
        );
        assert_eq!(out, "match1\nline2\nline3\nmatch2\nline4\n");
    }

    #[test]
    fn test_grep_context_stops_at_end_of_input() {
        let mut env = test_env(std::path::Path::new("/"));
        let (_, out, _) = grep(&["-A", "5", "last"], "first\nlast", &mut env);
        assert_eq!(out, "last\n");
    }

    #[test]
    fn test_grep_huge_context_does_not_overflow() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, err) = grep(
            &["-A", "18446744073709551615", "match"],
            "x\nmatch\ny\n",
            &mut env,
        );
        assert_eq!(code, 0);
        assert!(err.is_empty());
        assert_eq!(out, "match\ny\n");
    }

    #[test]
    fn test_grep_missing_file_keeps_going() {
        let dir = TempDir::new().unwrap();
        let f = write_file(&dir, "present.txt", "needle\n");
        let mut env = test_env(dir.path());

        let (code, out, err) = grep(&["needle", "absent.txt", &f], "", &mut env);

        assert_eq!(code, 1);
        assert_eq!(out, "needle\n");
        assert!(err.contains("absent.txt"));
        assert!(err.contains("No such file or directory"));
    }

    #[test]
    fn test_grep_usage_errors() {
        let mut env = test_env(std::path::Path::new("/"));

        let (code, out, err) = grep(&[], "line\n", &mut env);
        assert_eq!(code, USAGE_ERROR);
        assert!(out.is_empty());
        assert!(err.starts_with("grep: "));

        let (code, out, _) = grep(&[""], "line\n", &mut env);
        assert_eq!(code, USAGE_ERROR);
        assert!(out.is_empty());

        let (code, out, _) = grep(&["(unclosed"], "line\n", &mut env);
        assert_eq!(code, USAGE_ERROR);
        assert!(out.is_empty());

        let (code, _, _) = grep(&["-z", "line"], "line\n", &mut env);
        assert_eq!(code, USAGE_ERROR);

        let (code, _, _) = grep(&["-A", "many", "line"], "line\n", &mut env);
        assert_eq!(code, USAGE_ERROR);
    }

    #[test]
    fn test_help_goes_to_stdout() {
        let mut env = test_env(std::path::Path::new("/"));
        let (code, out, err) = run_builtin(Builtin::Wc, &["--help"], "", &mut env);
        assert_eq!(code, 0);
        assert!(out.contains("count lines, words and bytes"));
        assert!(err.is_empty());
    }
}
