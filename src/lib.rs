//! A small interactive shell.
//!
//! A line of input is split into a command name and arguments by the [`lexer`], which
//! understands single quotes, double quotes and backslash escapes. The [`Interpreter`]
//! then runs the command: builtins (`cd`, `echo`, `exit`, `pwd`, `type`) always win,
//! anything else is searched for on `PATH` and spawned as a child process.
//!
//! [`Repl`] ties both together as an explicit state machine over a [`console::Console`],
//! so the whole loop can be driven from a script in tests with
//! [`io_adapters::ScriptedConsole`].

mod builtin;
pub mod command;
pub mod console;
pub mod env;
mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod repl;

pub use command::{CommandLine, ExitCode};
pub use interpreter::{Interpreter, resolve};
pub use lexer::{LexingError, split_command_line};
pub use repl::{Repl, ReplState};
