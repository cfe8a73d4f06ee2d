//! Ordered log of what happened during a demo or scenario run.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Lines collected from callbacks and the driver. Clones share one log, so
/// callbacks stored in the coordinator can append to it.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write every line, newline-terminated.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_lines() {
        let transcript = Transcript::new();
        let writer = transcript.clone();
        writer.push("one");
        transcript.push(String::from("two"));

        let mut out = Vec::new();
        transcript.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "one\ntwo\n");
    }
}
