use argh::FromArgs;
use pipesh::Interpreter;
use pipesh::io_adapters::{ProcessStderr, ProcessStdin, ProcessStdout};

#[derive(FromArgs)]
/// A minimal shell with pipelines, variables and a handful of built-ins.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single line and exit with its status
    command: Option<String>,

    #[argh(option, short = 'p', default = "String::from(\"$ \")")]
    /// prompt shown by the interactive loop
    prompt: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();

    let mut sh = Interpreter::new();
    let code = match args.command {
        Some(line) => {
            let status = sh.run_line(
                &line,
                &mut ProcessStdin::new(),
                &mut ProcessStdout::new(),
                &mut ProcessStderr::new(),
            );
            if sh.env().should_exit {
                sh.env().exit_code
            } else {
                status
            }
        }
        None => sh.repl(&args.prompt)?,
    };
    std::process::exit(code);
}
