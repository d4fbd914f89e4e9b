use crate::command::{ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::external::ExternalCommand;
use crate::parser::ParsedCommand;
use crate::registry::CommandKind;

/// Run one pipeline stage and record its status in `env.last_status`.
///
/// Never fails: problems are reported on `stderr` and folded into the returned status.
pub fn execute(
    cmd: &ParsedCommand,
    stdin: &mut dyn Stdin,
    stdout: &mut dyn Stdout,
    stderr: &mut dyn Stdout,
    env: &mut Environment,
) -> ExitCode {
    log::debug!("dispatch {:?} {:?} as {:?}", cmd.name, cmd.args, cmd.kind);
    let status = match cmd.kind {
        CommandKind::Assignment => {
            let value = cmd.args.first().cloned().unwrap_or_default();
            env.set_var(cmd.name.clone(), value);
            0
        }
        CommandKind::Exit => {
            let code = cmd
                .args
                .first()
                .and_then(|arg| arg.parse::<ExitCode>().ok())
                .unwrap_or(0);
            env.request_exit(code);
            code
        }
        CommandKind::Builtin(builtin) => {
            let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
            builtin
                .instantiate(&cmd.name, &args)
                .execute(stdin, stdout, stderr, env)
        }
        CommandKind::External => {
            let external = Box::new(ExternalCommand::new(cmd.name.clone(), cmd.args.clone()));
            external.execute(stdin, stdout, stderr, env)
        }
    };
    log::debug!("{} finished with status {}", cmd.name, status);
    env.last_status = status;
    status
}
