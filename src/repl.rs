//! The read-eval-print loop as an explicit state machine.
//!
//! ```text
//!   AwaitingInput --line parsed--> Dispatching --done--> AwaitingInput
//!        |    ^                         |
//!        |    +--parse error / ^C       +--exit requested--> Terminated
//!        +--input closed or failed-------------------------> Terminated
//! ```
//!
//! Only a failing input stream is fatal. Parse errors, unknown commands and failing
//! commands are reported on the console's stderr and the loop goes on.

use crate::command::{CommandLine, ExitCode};
use crate::console::{Console, InputError};
use crate::interpreter::Interpreter;
use crate::lexer::split_command_line;
use std::fmt;
use std::io::Write;

pub const DEFAULT_PROMPT: &str = "$ ";

/// Exit status used when reading input fails, end of input included.
pub const INPUT_FAILURE: ExitCode = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplState {
    AwaitingInput,
    Dispatching(CommandLine),
    Terminated(ExitCode),
}

pub struct Repl<C: Console> {
    console: C,
    interpreter: Interpreter,
    prompt: String,
    trace: bool,
}

impl<C: Console> Repl<C> {
    pub fn new(console: C, interpreter: Interpreter) -> Self {
        Self {
            console,
            interpreter,
            prompt: DEFAULT_PROMPT.to_string(),
            trace: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Echo every dispatched command and its exit status to stderr, like `set -x`.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Runs until a terminal state is reached and returns its exit code.
    pub fn run(&mut self) -> ExitCode {
        let mut state = ReplState::AwaitingInput;
        loop {
            state = self.step(state);
            if let ReplState::Terminated(code) = state {
                return code;
            }
        }
    }

    /// Performs exactly one transition.
    pub fn step(&mut self, state: ReplState) -> ReplState {
        match state {
            ReplState::AwaitingInput => self.await_input(),
            ReplState::Dispatching(line) => self.dispatch(line),
            ReplState::Terminated(code) => ReplState::Terminated(code),
        }
    }

    fn await_input(&mut self) -> ReplState {
        match self.console.read_line(&self.prompt) {
            Ok(line) => match split_command_line(&line) {
                Ok(parsed) if parsed.is_empty() => ReplState::AwaitingInput,
                Ok(parsed) => ReplState::Dispatching(parsed),
                Err(e) => {
                    self.report(format_args!("minishell: {}", e));
                    ReplState::AwaitingInput
                }
            },
            Err(InputError::Interrupted) => ReplState::AwaitingInput,
            Err(e) => {
                self.report(format_args!("error reading input: {}", e));
                ReplState::Terminated(INPUT_FAILURE)
            }
        }
    }

    fn dispatch(&mut self, line: CommandLine) -> ReplState {
        if self.trace {
            let mut words = vec![line.name.as_str()];
            words.extend(line.args.iter().map(String::as_str));
            self.report(format_args!("+ {}", words.join(" ")));
        }

        let result =
            self.interpreter
                .execute(&line, self.console.stdout(), self.console.stderr());
        match result {
            Ok(code) => {
                if self.trace {
                    self.report(format_args!("+ exit status {}", code));
                }
            }
            Err(e) => self.report(format_args!("{}: {:#}", line.name, e)),
        }

        match self.interpreter.exit_request() {
            Some(code) => ReplState::Terminated(code),
            None => ReplState::AwaitingInput,
        }
    }

    fn report(&self, message: fmt::Arguments<'_>) {
        let mut stderr = self.console.stderr();
        // nowhere left to report a broken stderr
        let _ = writeln!(stderr, "{}", message).and_then(|()| stderr.flush());
    }
}
