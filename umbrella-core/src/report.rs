use std::io::{self, Write};

/// Operator-facing status output, passed explicitly to whoever needs it.
pub trait Reporter: Send + Sync {
    fn status(&self, line: &str);
}

/// Writes status lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn status(&self, line: &str) {
        let mut out = io::stdout().lock();
        // a closed stdout must not turn a successful run into a failure
        let _ = writeln!(out, "{line}");
    }
}
