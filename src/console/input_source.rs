use std::fmt;
use std::fmt::Write;
use std::sync::{RwLock, RwLockReadGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputPosition {
    pub line: u32,
    pub offset: u32,
}

impl InputPosition {
    pub(crate) fn with_offset(&self, offset: u32) -> Self {
        InputPosition { line: self.line, offset: self.offset + offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSpan {
    pub begin: InputPosition,
    pub end: InputPosition,
}

impl InputSpan {
    #[inline]
    pub fn from_positions(begin: InputPosition, end: InputPosition) -> Self {
        Self { begin, end }
    }
}

/// Wrapper around a script's text with an optional filename. Ensures that the
/// text is only scanned once.
pub struct InputSource {
    pub(crate) filename: String,
    pub(crate) input: Vec<u8>,
    // Iteration
    line: u32,
    offset: usize,
    // State tracking
    pub(crate) had_error: Option<ParseError>,
    // The offset_lookup is built on-demand upon attempting to report an error.
    // Only one caller will actually create the lookup, afterwards only read
    // locks will be held.
    offset_lookup: RwLock<Vec<u32>>,
}

impl InputSource {
    pub fn new(filename: String, input: Vec<u8>) -> Self {
        Self {
            filename,
            input,
            line: 1,
            offset: 0,
            had_error: None,
            offset_lookup: RwLock::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn new_test(input: &str) -> Self {
        Self::new(String::from("test"), Vec::from(input.as_bytes()))
    }

    #[inline]
    pub fn pos(&self) -> InputPosition {
        InputPosition { line: self.line, offset: self.offset as u32 }
    }

    pub fn next(&self) -> Option<u8> {
        self.input.get(self.offset).copied()
    }

    pub fn lookahead(&self, offset: usize) -> Option<u8> {
        self.input.get(self.offset + offset).copied()
    }

    #[inline]
    pub fn section_at_pos(&self, start: InputPosition, end: InputPosition) -> &[u8] {
        &self.input[start.offset as usize..end.offset as usize]
    }

    #[inline]
    pub fn section_at_span(&self, span: InputSpan) -> &[u8] {
        &self.input[span.begin.offset as usize..span.end.offset as usize]
    }

    // Consumes the next character. A lone \r is accepted but flagged, since
    // line numbers in diagnostics depend on well-formed newlines.
    pub fn consume(&mut self) {
        match self.next() {
            Some(b'\r') => {
                if Some(b'\n') != self.lookahead(1) {
                    self.set_error("encountered carriage-return without a following newline");
                }
                self.offset += 1;
            },
            Some(b'\n') => {
                self.line += 1;
                self.offset += 1;
            },
            Some(_) => {
                self.offset += 1;
            },
            None => {},
        }

        debug_assert!(self.offset < u32::max_value() as usize);
    }

    fn set_error(&mut self, msg: &str) {
        if self.had_error.is_none() {
            self.had_error = Some(ParseError::new_error_str_at_pos(self, self.pos(), msg));
        }
    }

    fn get_lookup(&self) -> RwLockReadGuard<Vec<u32>> {
        // Once constructed the lookup always contains at least two elements.
        {
            let lookup = self.offset_lookup.read().unwrap_or_else(|e| e.into_inner());
            if !lookup.is_empty() {
                return lookup;
            }
        }

        {
            let mut lookup = self.offset_lookup.write().unwrap_or_else(|e| e.into_inner());
            if lookup.is_empty() {
                // Line number (!) to offset lookup, so index 0 is unused.
                lookup.push(0);
                lookup.push(0);
                for (char_idx, c) in self.input.iter().enumerate() {
                    if *c == b'\n' {
                        lookup.push(char_idx as u32 + 1);
                    }
                }
                // Sentinel for the end of the last line
                lookup.push(self.input.len() as u32 + 1);
            }
        }

        self.offset_lookup.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Retrieves offset at which line starts (right after newline)
    fn lookup_line_start_offset(&self, line_number: u32) -> u32 {
        let lookup = self.get_lookup();
        let idx = (line_number as usize).min(lookup.len() - 2);
        lookup[idx]
    }

    /// Retrieves offset at which line ends (excluding the newline and a
    /// potential carriage return)
    fn lookup_line_end_offset(&self, line_number: u32) -> u32 {
        let lookup = self.get_lookup();
        let idx = (line_number as usize + 1).min(lookup.len() - 1);
        let mut offset = lookup[idx].saturating_sub(1) as usize;
        offset = offset.min(self.input.len());
        if offset > 0 && offset <= self.input.len() && self.input.get(offset - 1) == Some(&b'\r') {
            offset -= 1;
        }
        offset as u32
    }
}

#[derive(Debug, Clone)]
pub struct ParseErrorStatement {
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) filename: String,
    pub(crate) context: String,
    pub(crate) message: String,
}

impl ParseErrorStatement {
    fn from_source_at_pos(source: &InputSource, position: InputPosition, message: String) -> Self {
        let line_start = source.lookup_line_start_offset(position.line);
        let line_end = source.lookup_line_end_offset(position.line).max(line_start);
        let context = String::from_utf8_lossy(&source.input[line_start as usize..line_end as usize]).to_string();
        let column = position.offset.saturating_sub(line_start) + 1;

        Self {
            line: position.line,
            column,
            filename: source.filename.clone(),
            context,
            message,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseErrorStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ERROR: ")?;
        f.write_str(&self.message)?;
        f.write_char('\n')?;

        // Write originating file/line/column
        f.write_str(" +- ")?;
        if !self.filename.is_empty() {
            write!(f, "in {} ", self.filename)?;
        }
        writeln!(f, "at {}:{}", self.line, self.column)?;

        // Write the offending line with a marker underneath, tabs are
        // expanded to four spaces
        writeln!(f, " | ")?;
        let mut context = String::with_capacity(self.context.len() + 4);
        let mut annotation = String::with_capacity(self.column as usize + 8);
        annotation.push_str(" | ");
        for (char_idx, c) in self.context.chars().enumerate() {
            let is_before_marker = (char_idx as u32) + 1 < self.column;
            if c == '\t' {
                context.push_str("    ");
                if is_before_marker { annotation.push_str("    "); }
            } else {
                context.push(c);
                if is_before_marker { annotation.push(' '); }
            }
        }
        annotation.push('~');
        writeln!(f, " | {}", context)?;
        f.write_str(&annotation)
    }
}

/// A compilation failure. Carries one error statement and optionally some
/// additional information statements.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub(crate) statements: Vec<ParseErrorStatement>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return Ok(());
        }

        self.statements[0].fmt(f)?;
        for statement in self.statements.iter().skip(1) {
            writeln!(f)?;
            statement.fmt(f)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new_error_at_pos(source: &InputSource, position: InputPosition, message: String) -> Self {
        Self { statements: vec![ParseErrorStatement::from_source_at_pos(
            source, position, message
        )] }
    }

    pub fn new_error_str_at_pos(source: &InputSource, position: InputPosition, message: &str) -> Self {
        Self::new_error_at_pos(source, position, message.to_string())
    }

    pub fn new_error_str_at_span(source: &InputSource, span: InputSpan, message: &str) -> Self {
        Self::new_error_at_pos(source, span.begin, message.to_string())
    }

    /// Line of the primary error statement.
    pub fn line(&self) -> u32 {
        self.statements.first().map(|s| s.line).unwrap_or(0)
    }

    /// Message of the primary error statement.
    pub fn message(&self) -> &str {
        self.statements.first().map(|s| s.message.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_track_lines() {
        let mut source = InputSource::new_test("ab\ncd\r\nef");
        while source.next().is_some() {
            source.consume();
        }
        assert_eq!(source.pos().line, 3);
        assert!(source.had_error.is_none());
    }

    #[test]
    fn test_error_reports_line_and_context() {
        let source = InputSource::new_test("%a = 1;\n%b = ;\n%c = 3;");
        let error = ParseError::new_error_str_at_pos(
            &source, InputPosition { line: 2, offset: 13 }, "expected an expression"
        );
        assert_eq!(error.line(), 2);
        assert_eq!(error.message(), "expected an expression");
        let statement = &error.statements[0];
        assert_eq!(statement.context, "%b = ;");
        assert_eq!(statement.column, 6);
        let rendered = error.to_string();
        assert!(rendered.contains("at 2:6"));
        assert!(rendered.contains("%b = ;"));
    }
}
