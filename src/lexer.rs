//! Lexical analysis of a single input line.
//!
//! A line is split into a command name and its arguments. The command name is everything
//! up to the first whitespace character and is taken literally. The rest of the line goes
//! through a small finite state machine that understands single quotes, double quotes and
//! backslash escapes:
//!
//! - inside `'...'` every character is literal;
//! - inside `"..."` a backslash only escapes `"`, `\` and `$`;
//! - outside quotes a backslash makes the next character literal;
//! - unquoted whitespace separates arguments, and adjacent quoted and unquoted
//!   segments join into one argument.

use crate::command::CommandLine;

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unexpected EOF while looking for matching `{0}'")]
    UnterminatedQuote(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    pending_escape: bool,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            pending_escape: false,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input and returns the arguments.
    ///
    /// Fails with [`LexingError::UnterminatedQuote`] when the input ends inside a quote.
    fn make_tokens(mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch, &mut out),
                LexingState::SingleQuote => self.handle_single_quote(ch),
                LexingState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::SingleQuote => return Err(LexingError::UnterminatedQuote('\'')),
            LexingState::DoubleQuote => return Err(LexingError::UnterminatedQuote('"')),
            LexingState::Unquoted => {}
        }

        // A trailing backslash has nothing to escape.
        if self.pending_escape {
            self.buffer.push('\\');
        }
        self.finish_word(&mut out);

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        if self.pending_escape {
            self.buffer.push(ch);
            self.pending_escape = false;
            return;
        }
        match ch {
            '\\' => self.pending_escape = true,
            '\'' => self.state = LexingState::SingleQuote,
            '"' => self.state = LexingState::DoubleQuote,
            c if c.is_whitespace() => self.finish_word(out),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        if self.pending_escape {
            if !matches!(ch, '"' | '\\' | '$') {
                self.buffer.push('\\');
            }
            self.buffer.push(ch);
            self.pending_escape = false;
            return;
        }
        match ch {
            '\\' => self.pending_escape = true,
            '"' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Removes one trailing line terminator; `\r\n` counts as a single terminator.
fn strip_line_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits `line` into a [`CommandLine`]. The command name is the raw text up to the first
/// whitespace character; the remainder is tokenized by the quoting state machine.
/// A line that is empty or starts with whitespace yields an empty command.
///
/// # Errors
/// Returns [`LexingError::UnterminatedQuote`] if an argument opens a quote that is never closed.
pub fn split_command_line(line: &str) -> Result<CommandLine, LexingError> {
    let line = strip_line_terminator(line);

    let (name, rest) = match line.find(char::is_whitespace) {
        Some(idx) => line.split_at(idx),
        None => (line, ""),
    };

    let args = LexingFSM::new(rest).make_tokens()?;
    Ok(CommandLine::new(name, args))
}
