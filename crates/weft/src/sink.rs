//! Output destinations.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::error::RenderError;

/// Receives rendered text in template order.
pub trait Sink {
    fn write(&mut self, text: &str) -> Result<(), RenderError>;

    fn flush(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// An in-memory sink whose handles share one buffer.
///
/// Keep a clone to read what was written, including partial output of a
/// render that failed or timed out.
///
/// ```rust
/// use weft::{Buffer, Sink};
///
/// let buffer = Buffer::new();
/// let mut writer = buffer.clone();
/// writer.write("abc").unwrap();
/// assert_eq!(buffer.contents(), "abc");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Buffer(Rc<RefCell<String>>);

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.0.borrow().clone()
    }

    /// Returns the buffered text and leaves the buffer empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl Sink for Buffer {
    fn write(&mut self, text: &str) -> Result<(), RenderError> {
        self.0.borrow_mut().push_str(text);
        Ok(())
    }
}

/// Streams rendered text into any [`std::io::Write`].
#[derive(Debug)]
pub struct IoSink<W: Write>(pub W);

impl<W: Write> Sink for IoSink<W> {
    fn write(&mut self, text: &str) -> Result<(), RenderError> {
        self.0.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.0.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_take() {
        let mut buffer = Buffer::new();
        buffer.write("a").unwrap();
        buffer.write("b").unwrap();
        assert_eq!(buffer.take(), "ab");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_io_sink() {
        let mut sink = IoSink(Vec::new());
        sink.write("héllo").unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.0, "héllo".as_bytes());
    }
}
