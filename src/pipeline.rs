use crate::command::{ExitCode, Stdin, Stdout};
use crate::dispatcher;
use crate::env::Environment;
use crate::io_adapters::{MemReader, MemWriter};
use crate::parser::Pipeline;

/// Run every stage of `pipeline` in order.
///
/// The first stage reads `stdin` and the last writes `stdout`; in between, each stage's
/// output is collected in memory and becomes the next stage's input. All stages share
/// `stderr`. Stages are skipped once `env.should_exit` is set.
///
/// Returns `env.last_status` after the last stage that ran.
pub fn execute(
    pipeline: &Pipeline,
    stdin: &mut dyn Stdin,
    stdout: &mut dyn Stdout,
    stderr: &mut dyn Stdout,
    env: &mut Environment,
) -> ExitCode {
    let mut previous_output: Option<Vec<u8>> = None;

    for (i, cmd) in pipeline.iter().enumerate() {
        if env.should_exit {
            log::debug!("exit requested, skipping {} remaining stage(s)", pipeline.len() - i);
            break;
        }
        let is_last = i + 1 == pipeline.len();

        let mut piped_in = previous_output.take().map(MemReader::new);
        let input: &mut dyn Stdin = match piped_in.as_mut() {
            Some(reader) => reader,
            None => &mut *stdin,
        };

        if is_last {
            dispatcher::execute(cmd, input, stdout, stderr, env);
        } else {
            let mut captured = MemWriter::new();
            dispatcher::execute(cmd, input, &mut captured, stderr, env);
            previous_output = Some(captured.into_inner());
        }
    }

    env.last_status
}
