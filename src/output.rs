//! Shared line sink for `print` and for results echoed by a feeder.

use crate::Error;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Cloneable handle to a writer. All clones write to the same sink.
#[derive(Clone)]
pub struct Output(Rc<RefCell<dyn Write>>);

impl Output {
    pub fn stdout() -> Self {
        Output(Rc::new(RefCell::new(io::stdout())))
    }

    pub fn new<W: Write + 'static>(writer: W) -> Self {
        Output(Rc::new(RefCell::new(writer)))
    }

    /// In-memory sink; the returned buffer reads back whatever was written
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        (Output::new(buffer.clone()), buffer)
    }

    pub fn write_line(&self, line: &str) -> Result<(), Error> {
        let mut writer = self.0.borrow_mut();
        writeln!(writer, "{line}")
            .and_then(|()| writer.flush())
            .map_err(|e| Error::Io {
                path: "<output>".to_owned(),
                message: e.to_string(),
            })
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Output")
    }
}

/// Buffer behind [`Output::capture`]
#[derive(Clone, Default, Debug)]
pub struct CapturedOutput(Rc<RefCell<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Captured text split into lines
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
