//! Terminal geometry discovery for the attached output sink.

use console::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: u16,
    pub rows: u16,
}

/// Size discovery for whatever the run output is written to.
pub trait Terminal: Send + Sync {
    /// False when output is redirected to a file or pipe.
    fn is_terminal(&self) -> bool;

    /// Current geometry, if the terminal reports one.
    fn size(&self) -> Option<TerminalSize>;
}

/// The process's standard output.
pub struct StdoutTerminal {
    term: Term,
}

impl StdoutTerminal {
    pub fn new() -> Self {
        Self { term: Term::stdout() }
    }
}

impl Default for StdoutTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for StdoutTerminal {
    fn is_terminal(&self) -> bool {
        self.term.is_term()
    }

    fn size(&self) -> Option<TerminalSize> {
        self.term
            .size_checked()
            .filter(|(rows, columns)| *rows > 0 && *columns > 0)
            .map(|(rows, columns)| TerminalSize { columns, rows })
    }
}
