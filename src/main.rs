use argh::FromArgs;
use minishell::Interpreter;
use minishell::console::{EditorConsole, StdConsole};
use minishell::repl::{DEFAULT_PROMPT, Repl};
use std::io::IsTerminal;

#[derive(FromArgs)]
/// A small interactive shell with builtins and PATH lookup.
struct Args {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt printed before each line.
    prompt: String,

    #[argh(switch)]
    /// read plain lines from stdin even when it is a terminal.
    plain: bool,

    #[argh(switch)]
    /// print each command and its exit status to stderr before and after running it.
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    let interpreter = Interpreter::default();

    let code = if args.plain || !std::io::stdin().is_terminal() {
        Repl::new(StdConsole::new(), interpreter)
            .with_prompt(args.prompt)
            .with_trace(args.trace)
            .run()
    } else {
        let console = EditorConsole::new()
            .map_err(|e| anyhow::anyhow!("can't start the line editor: {}", e))?;
        Repl::new(console, interpreter)
            .with_prompt(args.prompt)
            .with_trace(args.trace)
            .run()
    };

    std::process::exit(code)
}
