use std::io::{self, Write as _};

/// Destination for the `Print` statement's output.
///
/// Implement this to capture or redirect the program's standard output instead of
/// writing to the process's real stdout. The default [`StdPrint`] writes straight
/// through; [`CollectPrint`] is the one tests reach for.
pub trait PrintSink {
    /// Writes a single stringified `Print` argument, with no separator or terminator.
    fn write_str(&mut self, text: &str);

    /// Writes the trailing newline, unless the statement's no-newline flag suppressed it.
    fn write_newline(&mut self) {
        self.write_str("\n");
    }
}

/// Writes straight to the process's stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintSink for StdPrint {
    fn write_str(&mut self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
    }
}

/// Collects everything written to it into an owned `String`.
///
/// Used by tests asserting on a program's output, and by embedders that want the
/// output as a value rather than a side effect.
#[derive(Debug, Default)]
pub struct CollectPrint(String);

impl CollectPrint {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintSink for CollectPrint {
    fn write_str(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

/// Discards everything written to it.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintSink for NoPrint {
    fn write_str(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_print_joins_writes() {
        let mut sink = CollectPrint::new();
        sink.write_str("5");
        sink.write_newline();
        assert_eq!(sink.output(), "5\n");
    }
}
