use std::fmt;

use super::store::Store;

/// A stack frame recorded in an error
#[derive(Debug, Clone)]
pub struct EvalFrame {
    pub line: u32,
    pub filename: String,
    /// `Ns::name` or `name`, empty for top-level code
    pub function: String,
}

impl fmt::Display for EvalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function.is_empty() {
            write!(f, "<top level> {}:{}", &self.filename, self.line)
        } else {
            write!(f, "function {} {}:{}", &self.function, &self.filename, self.line)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Script recursion went past the configured call depth
    StackExhaustion,
    /// An invariant of the evaluator itself was violated
    Internal,
}

/// Error that aborts the current top-level call. Everything else a script
/// can do wrong is recovered with a warning.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub(crate) kind: EvalErrorKind,
    pub(crate) message: String,
    pub(crate) frames: Vec<EvalFrame>,
}

impl EvalError {
    /// Builds the error with a snapshot of the current call stack.
    pub(crate) fn new(kind: EvalErrorKind, message: String, store: &Store) -> EvalError {
        let frames = store.frames.iter().map(|frame| {
            let function = match &frame.function {
                Some(active) => match &active.namespace {
                    Some(namespace) => format!("{}::{}", namespace, &active.name),
                    None => active.name.as_str().to_string(),
                },
                None => String::new(),
            };

            EvalFrame {
                line: frame.line,
                filename: frame.code.filename().to_string(),
                function,
            }
        }).collect();

        EvalError { kind, message, frames }
    }

    pub fn kind(&self) -> EvalErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Innermost frame last
    pub fn frames(&self) -> &[EvalFrame] {
        &self.frames
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", &self.message)?;
        if self.frames.is_empty() {
            return Ok(());
        }

        // Only the innermost frames, recursion produces thousands
        writeln!(f, " +-  Stack trace:")?;
        for frame in self.frames.iter().rev().take(16) {
            writeln!(f, " | {}", frame)?;
        }
        if self.frames.len() > 16 {
            writeln!(f, " | ... {} more", self.frames.len() - 16)?;
        }

        Ok(())
    }
}

impl std::error::Error for EvalError {}
