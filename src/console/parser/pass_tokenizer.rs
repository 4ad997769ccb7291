use crate::console::input_source::{InputSource, InputPosition, ParseError};

use super::tokens::*;

/// Tokenizer is a reusable parser to tokenize multiple source files using the
/// same allocated buffers. Besides producing tokens it checks that curly
/// braces are balanced, which gives much better error positions than the
/// parser would for a missing `}`.
pub(crate) struct PassTokenizer {
    // Stack of input positions of opening curly braces, used to detect
    // unmatched opening braces, unmatched closing braces are detected
    // immediately.
    curly_stack: Vec<InputPosition>,
}

impl PassTokenizer {
    pub(crate) fn new() -> Self {
        Self{ curly_stack: Vec::with_capacity(32) }
    }

    pub(crate) fn tokenize(&mut self, source: &mut InputSource, target: &mut TokenBuffer) -> Result<(), ParseError> {
        // Assert source and buffer are at start
        debug_assert_eq!(source.pos().offset, 0);
        debug_assert!(target.tokens.is_empty());
        self.curly_stack.clear();

        // Main tokenization loop
        while let Some(c) = source.next() {
            if c == b'"' {
                self.consume_string_literal(source, target, b'"', TokenKind::String)?;
            } else if c == b'\'' {
                self.consume_string_literal(source, target, b'\'', TokenKind::Tagged)?;
            } else if is_identifier_start(c) {
                self.consume_identifier(source, target)?;
            } else if is_number_start(c, source.lookahead(1)) {
                self.consume_number(source, target)?;
            } else if c == b'%' && source.lookahead(1).map_or(false, is_identifier_start) {
                self.consume_variable(source, target, TokenKind::LocalVar)?;
            } else if c == b'$' && source.lookahead(1).map_or(false, is_identifier_start) {
                self.consume_variable(source, target, TokenKind::GlobalVar)?;
            } else if self.is_line_comment_start(c, source) {
                self.consume_line_comment(source, target)?;
            } else if self.is_block_comment_start(c, source) {
                self.consume_block_comment(source, target)?;
            } else if is_whitespace(c) {
                source.consume();
            } else {
                let was_punctuation = self.maybe_parse_punctuation(c, source, target)?;
                if let Some((token, token_pos)) = was_punctuation {
                    if token == TokenKind::OpenCurly {
                        self.curly_stack.push(token_pos);
                    } else if token == TokenKind::CloseCurly {
                        if self.curly_stack.pop().is_none() {
                            return Err(ParseError::new_error_str_at_pos(
                                source, token_pos, "unmatched closing curly brace '}'"
                            ));
                        }
                    }
                } else {
                    return Err(ParseError::new_error_str_at_pos(
                        source, source.pos(), "unexpected character"
                    ));
                }
            }
        }

        // End of file, check if our state is correct
        if let Some(error) = source.had_error.take() {
            return Err(error);
        }

        if let Some(last_unmatched_open) = self.curly_stack.pop() {
            return Err(ParseError::new_error_str_at_pos(
                source, last_unmatched_open, "unmatched opening curly brace '{'"
            ));
        }

        Ok(())
    }

    fn is_line_comment_start(&self, first_char: u8, source: &InputSource) -> bool {
        first_char == b'/' && Some(b'/') == source.lookahead(1)
    }

    fn is_block_comment_start(&self, first_char: u8, source: &InputSource) -> bool {
        first_char == b'/' && Some(b'*') == source.lookahead(1)
    }

    /// Longest match against the punctuation table. Nothing is consumed when
    /// no entry matches.
    fn maybe_parse_punctuation(
        &mut self, first_char: u8, source: &mut InputSource, target: &mut TokenBuffer
    ) -> Result<Option<(TokenKind, InputPosition)>, ParseError> {
        debug_assert!(first_char != b'\'', "'\'' needs special handling");
        debug_assert!(first_char != b'"', "'\"' needs special handling");

        let pos = source.pos();
        let matched = PUNCTUATION.iter().find(|(spelling, _)| {
            spelling.iter().enumerate().all(|(offset, c)| source.lookahead(offset) == Some(*c))
        });
        let (spelling, token_kind) = match matched {
            Some(entry) => *entry,
            None => return Ok(None),
        };

        for _ in 0..spelling.len() {
            source.consume();
        }
        target.tokens.push(Token::new(token_kind, pos));
        Ok(Some((token_kind, pos)))
    }

    /// Consumes both `"..."` and `'...'` literals. Escapes are only skipped
    /// here, they are resolved when the parser builds the literal.
    fn consume_string_literal(
        &mut self, source: &mut InputSource, target: &mut TokenBuffer, quote: u8, kind: TokenKind
    ) -> Result<(), ParseError> {
        let begin_pos = source.pos();

        // Consume the leading quote
        debug_assert_eq!(source.next(), Some(quote));
        source.consume();

        let mut is_closed = false;
        while let Some(c) = source.next() {
            if c == b'\n' {
                break;
            }

            source.consume();
            if c == b'\\' {
                // Skip whatever is escaped, including the quote
                if source.next().map_or(false, |c| c != b'\n') {
                    source.consume();
                }
            } else if c == quote {
                is_closed = true;
                break;
            }
        }

        if !is_closed {
            return Err(ParseError::new_error_str_at_pos(source, begin_pos, "encountered unterminated string literal"));
        }

        let end_pos = source.pos();
        target.tokens.push(Token::new(kind, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));

        Ok(())
    }

    fn consume_line_comment(&mut self, source: &mut InputSource, target: &mut TokenBuffer) -> Result<(), ParseError> {
        let begin_pos = source.pos();

        // Consume the leading "//"
        source.consume();
        source.consume();

        while let Some(c) = source.next() {
            if c == b'\n' || c == b'\r' {
                // End of line, the newline is left to the whitespace handling
                break;
            }
            source.consume();
        }

        let end_pos = source.pos();
        debug_assert_eq!(begin_pos.line, end_pos.line);
        target.tokens.push(Token::new(TokenKind::LineComment, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));

        Ok(())
    }

    fn consume_block_comment(&mut self, source: &mut InputSource, target: &mut TokenBuffer) -> Result<(), ParseError> {
        let begin_pos = source.pos();

        // Consume the leading "/*"
        source.consume();
        source.consume();

        // Explicitly do not put prev_char at "*", because then "/*/" would
        // represent a valid and closed block comment
        let mut prev_char = b' ';
        let mut is_closed = false;
        while let Some(c) = source.next() {
            source.consume();
            if prev_char == b'*' && c == b'/' {
                // End of block comment
                is_closed = true;
                break;
            }
            prev_char = c;
        }

        if !is_closed {
            return Err(ParseError::new_error_str_at_pos(
                source, begin_pos, "encountered unterminated block comment")
            );
        }

        let end_pos = source.pos();
        target.tokens.push(Token::new(TokenKind::BlockComment, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));

        Ok(())
    }

    fn consume_identifier(&mut self, source: &mut InputSource, target: &mut TokenBuffer) -> Result<(), ParseError> {
        let begin_pos = source.pos();
        source.consume();

        // Keep reading until no more identifier
        while let Some(c) = source.next() {
            if !is_identifier_remaining(c) {
                break;
            }
            source.consume();
        }

        // `switch$` is the only keyword carrying a sigil
        if source.section_at_pos(begin_pos, source.pos()) == b"switch" && source.next() == Some(b'$') {
            source.consume();
        }

        let end_pos = source.pos();
        target.tokens.push(Token::new(TokenKind::Ident, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));
        Ok(())
    }

    /// Consumes `%name` or `$name`. Globals may be namespaced with `::`
    /// segments, as in `$pref::Audio::volume`.
    fn consume_variable(&mut self, source: &mut InputSource, target: &mut TokenBuffer, kind: TokenKind) -> Result<(), ParseError> {
        let begin_pos = source.pos();
        source.consume(); // sigil
        source.consume(); // identifier start, checked by the caller

        loop {
            match source.next() {
                Some(c) if is_identifier_remaining(c) => source.consume(),
                Some(b':') if kind == TokenKind::GlobalVar
                    && source.lookahead(1) == Some(b':')
                    && source.lookahead(2).map_or(false, is_identifier_start) => {
                    source.consume();
                    source.consume();
                },
                _ => break,
            }
        }

        let end_pos = source.pos();
        target.tokens.push(Token::new(kind, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));
        Ok(())
    }

    fn consume_number(&mut self, source: &mut InputSource, target: &mut TokenBuffer) -> Result<(), ParseError> {
        let begin_pos = source.pos();

        if source.next() == Some(b'0') && (source.lookahead(1) == Some(b'x') || source.lookahead(1) == Some(b'X')) {
            source.consume();
            source.consume();
            if !source.next().map_or(false, |c| c.is_ascii_hexdigit()) {
                return Err(ParseError::new_error_str_at_pos(source, begin_pos, "incorrectly formatted hexadecimal number"));
            }
            while source.next().map_or(false, |c| c.is_ascii_hexdigit()) {
                source.consume();
            }
        } else {
            while source.next().map_or(false, |c| c.is_ascii_digit()) {
                source.consume();
            }
            if source.next() == Some(b'.') && source.lookahead(1).map_or(false, |c| c.is_ascii_digit()) {
                source.consume();
                while source.next().map_or(false, |c| c.is_ascii_digit()) {
                    source.consume();
                }
            }
            if source.next() == Some(b'e') || source.next() == Some(b'E') {
                let exponent_digit_at = match source.lookahead(1) {
                    Some(b'+') | Some(b'-') => 2,
                    _ => 1,
                };
                if source.lookahead(exponent_digit_at).map_or(false, |c| c.is_ascii_digit()) {
                    for _ in 0..exponent_digit_at {
                        source.consume();
                    }
                    while source.next().map_or(false, |c| c.is_ascii_digit()) {
                        source.consume();
                    }
                }
            }
        }

        if source.next().map_or(false, is_identifier_start) {
            return Err(ParseError::new_error_str_at_pos(source, source.pos(), "unexpected character after number"));
        }

        let end_pos = source.pos();
        target.tokens.push(Token::new(TokenKind::Number, begin_pos));
        target.tokens.push(Token::new(TokenKind::SpanEnd, end_pos));
        Ok(())
    }
}

fn is_whitespace(c: u8) -> bool {
    c.is_ascii_whitespace()
}

fn is_identifier_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_identifier_remaining(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_number_start(c: u8, next: Option<u8>) -> bool {
    c.is_ascii_digit() || (c == b'.' && next.map_or(false, |n| n.is_ascii_digit()))
}
