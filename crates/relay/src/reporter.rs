//! Rejection reporting
//!
//! Every rejected message produces exactly one line on the operator console.

use std::io::{self, Stdout, Write};

use tracing::{error, warn};

use contracts::Rejection;

/// Sink for rejection diagnostics
pub trait ErrorReporter: Send {
    /// Report one rejected message
    fn report(&mut self, rejection: &Rejection);
}

/// Writes one line per rejection (`Message is empty!`) to a writer
///
/// Defaults to stdout. Write failures are logged and swallowed so a broken
/// console never stops the relay.
pub struct ConsoleReporter<W: Write = Stdout> {
    writer: W,
    reported: u64,
}

impl ConsoleReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for ConsoleReporter<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            reported: 0,
        }
    }

    /// Number of rejections reported so far
    pub fn reported(&self) -> u64 {
        self.reported
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ErrorReporter for ConsoleReporter<W> {
    fn report(&mut self, rejection: &Rejection) {
        self.reported += 1;
        warn!(reason = rejection.as_label(), "{rejection}");

        let result = writeln!(self.writer, "{rejection}").and_then(|()| self.writer.flush());
        if let Err(e) = result {
            error!(error = %e, "Failed to write rejection diagnostic");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_writes_exact_line() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&Rejection::EmptyMessage);

        assert_eq!(reporter.reported(), 1);
        assert_eq!(reporter.into_inner(), b"Message is empty!\n");
    }

    #[test]
    fn test_one_line_per_rejection() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&Rejection::EmptyMessage);
        reporter.report(&Rejection::EmptyMessage);

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l == "Message is empty!"));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut reporter = ConsoleReporter::new(BrokenWriter);
        reporter.report(&Rejection::EmptyMessage);
        assert_eq!(reporter.reported(), 1);
    }
}
