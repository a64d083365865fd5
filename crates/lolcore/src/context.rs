use crate::{error::Fault, interpolate::UnicodeNames, io::PrintSink};

/// Default recursion ceiling for nested function calls.
///
/// Chosen generously above any realistic LOLCODE program's call depth while
/// still catching runaway recursion (an infinite `HOW IZ I` calling itself)
/// before the host process's own stack is at risk.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4_000;

/// Where the `Input` statement reads a line from.
///
/// Mirrors [`PrintSink`]'s role for `Print`: the real implementation reads
/// stdin, tests substitute a fixed script.
pub trait InputSource {
    /// Reads bytes up to (and discarding) the first `\n`, `\r`, or EOF.
    ///
    /// Returns `None` only at EOF with nothing read. A `\r\n` pair collapses
    /// to a single terminator, matching the source behavior the spec asks to
    /// preserve verbatim (§9 open questions).
    fn read_line(&mut self) -> Option<String>;
}

/// Reads from the process's real stdin, byte at a time, stopping at the first
/// line terminator (and swallowing a following `\n` after a bare `\r`).
#[derive(Debug, Default)]
pub struct StdinInput;

impl InputSource for StdinInput {
    fn read_line(&mut self) -> Option<String> {
        use std::io::Read as _;
        let stdin = std::io::stdin();
        let mut lock = stdin.lock();
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match lock.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => match byte[0] {
                    b'\n' => break,
                    b'\r' => {
                        // Collapse a `\r\n` pair into one terminator by peeking past the `\n`.
                        let mut peek = [0u8; 1];
                        if lock.read(&mut peek).unwrap_or(0) == 1 && peek[0] != b'\n' {
                            out.push(peek[0]);
                        }
                        break;
                    }
                    b => out.push(b),
                },
                Err(_) => break,
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&out).into_owned())
        }
    }
}

/// A fixed script of lines for tests, consumed front-to-back.
#[derive(Debug, Default)]
pub struct ScriptedInput(pub std::collections::VecDeque<String>);

impl InputSource for ScriptedInput {
    fn read_line(&mut self) -> Option<String> {
        self.0.pop_front()
    }
}

/// Threaded through every evaluation call: the host collaborators the core
/// needs (output sink, input source, Unicode name table) plus the recursion
/// depth counter that guards nested function calls (§4.4 function call).
pub struct EvalCtx<'a> {
    pub print: &'a mut dyn PrintSink,
    pub input: &'a mut dyn InputSource,
    pub unicode_names: &'a dyn UnicodeNames,
    depth: usize,
    max_depth: usize,
}

impl<'a> EvalCtx<'a> {
    #[must_use]
    pub fn new(print: &'a mut dyn PrintSink, input: &'a mut dyn InputSource, unicode_names: &'a dyn UnicodeNames) -> Self {
        Self {
            print,
            input,
            unicode_names,
            depth: 0,
            max_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Called when entering a function call's frame. Pairs with [`Self::leave_call`].
    pub(crate) fn enter_call(&mut self) -> Result<(), Fault> {
        if self.depth >= self.max_depth {
            return Err(Fault::recursion_limit(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.depth -= 1;
    }
}
