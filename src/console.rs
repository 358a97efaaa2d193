//! Where input lines come from and where command output goes.

use crate::command::Stdout;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

/// Why a line could not be read.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("end of file")]
    Eof,
    /// The user pressed Ctrl-C at the prompt; the line is discarded.
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Editor(ReadlineError),
}

impl From<ReadlineError> for InputError {
    fn from(err: ReadlineError) -> Self {
        match err {
            ReadlineError::Eof => InputError::Eof,
            ReadlineError::Interrupted => InputError::Interrupted,
            ReadlineError::Io(e) => InputError::Io(e),
            other => InputError::Editor(other),
        }
    }
}

/// The terminal a [`crate::Repl`] talks to.
pub trait Console {
    /// Show `prompt` and block until one line is available.
    ///
    /// The returned line may or may not include its line terminator.
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError>;

    /// A fresh handle to the stream command output goes to.
    fn stdout(&self) -> Box<dyn Stdout>;

    /// A fresh handle to the stream diagnostics go to.
    fn stderr(&self) -> Box<dyn Stdout>;
}

/// Interactive console backed by `rustyline`.
///
/// No history is recorded; the editor is only used to read lines.
pub struct EditorConsole {
    editor: DefaultEditor,
}

impl EditorConsole {
    pub fn new() -> Result<Self, InputError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Console for EditorConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        Ok(self.editor.readline(prompt)?)
    }

    fn stdout(&self) -> Box<dyn Stdout> {
        Box::new(io::stdout())
    }

    fn stderr(&self) -> Box<dyn Stdout> {
        Box::new(io::stderr())
    }
}

/// Line-buffered console on the process' standard streams, used when stdin is not a terminal.
#[derive(Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line)? {
            0 => Err(InputError::Eof),
            _ => Ok(line),
        }
    }

    fn stdout(&self) -> Box<dyn Stdout> {
        Box::new(io::stdout())
    }

    fn stderr(&self) -> Box<dyn Stdout> {
        Box::new(io::stderr())
    }
}
