use crate::command::Stdout;
use crate::console::{Console, InputError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed writer for capturing output from builtins.
///
/// External commands given a `MemWriter` write to the null device instead.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::sharing(Rc::new(RefCell::new(Vec::new())))
    }

    /// A writer appending to an existing buffer.
    pub fn sharing(buf: Rc<RefCell<Vec<u8>>>) -> Self {
        Self { buf }
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Default for MemWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// A console fed from a fixed list of lines, capturing everything written to it.
///
/// Prompts are recorded in the stdout buffer, so a transcript reads like a terminal session.
/// Once the script runs out, reads fail with [`InputError::Eof`].
pub struct ScriptedConsole {
    lines: VecDeque<String>,
    out: Rc<RefCell<Vec<u8>>>,
    err: Rc<RefCell<Vec<u8>>>,
}

impl ScriptedConsole {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            out: Rc::default(),
            err: Rc::default(),
        }
    }

    /// Everything written to stdout so far, prompts included.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.out.borrow()).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.err.borrow()).into_owned()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        self.out.borrow_mut().extend_from_slice(prompt.as_bytes());
        self.lines.pop_front().ok_or(InputError::Eof)
    }

    fn stdout(&self) -> Box<dyn Stdout> {
        Box::new(MemWriter::sharing(self.out.clone()))
    }

    fn stderr(&self) -> Box<dyn Stdout> {
        Box::new(MemWriter::sharing(self.err.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_writer_shares_buffer() {
        let (mut writer, handle) = MemWriter::with_handle();
        writer.write_all(b"abc").unwrap();
        let mut second = MemWriter::sharing(handle.clone());
        second.write_all(b"def").unwrap();
        assert_eq!(handle.borrow().as_slice(), b"abcdef");
    }

    #[test]
    fn test_scripted_console_replays_lines() {
        let mut console = ScriptedConsole::new(["first", "second"]);
        assert_eq!(console.read_line("> ").unwrap(), "first");
        assert_eq!(console.read_line("> ").unwrap(), "second");
        assert!(matches!(console.read_line("> "), Err(InputError::Eof)));
        assert_eq!(console.stdout_text(), "> > > ");

        console.stderr().write_all(b"oops").unwrap();
        assert_eq!(console.stderr_text(), "oops");
    }
}
