use std::io::{self, Write};

/// Receiver for the diagnostics produced while acquiring a listener.
///
/// Implementations must not terminate the process; whether a failed
/// acquisition is fatal is up to the caller.
pub trait Report {
    /// `context` failed with `err`.
    fn warn(&self, context: &str, err: &io::Error);

    /// A problem without an OS error attached.
    fn warnx(&self, message: &str);

    /// A line of verbose output, such as `bind 3 0.0.0.0:11300`.
    fn verbose(&self, line: &str);
}

impl<R: Report + ?Sized> Report for &R {
    fn warn(&self, context: &str, err: &io::Error) {
        (**self).warn(context, err)
    }

    fn warnx(&self, message: &str) {
        (**self).warnx(message)
    }

    fn verbose(&self, line: &str) {
        (**self).verbose(line)
    }
}

/// Warnings go to the `log` facade, verbose lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReport;

impl Report for LogReport {
    fn warn(&self, context: &str, err: &io::Error) {
        log::warn!("{}: {}", context, err);
    }

    fn warnx(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn verbose(&self, line: &str) {
        log::debug!("{}", line);
        // A closed stdout is not worth failing an acquisition over.
        let _ = writeln!(io::stdout().lock(), "{}", line);
    }
}
