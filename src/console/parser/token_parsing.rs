use crate::console::ast::Literal;
use crate::console::input_source::{InputSource, InputSpan, ParseError};
use super::tokens::*;

// Keywords - declarations
pub(crate) const KW_FUNCTION:  &'static [u8] = b"function";
pub(crate) const KW_PACKAGE:   &'static [u8] = b"package";
pub(crate) const KW_NEW:       &'static [u8] = b"new";
pub(crate) const KW_DATABLOCK: &'static [u8] = b"datablock";
pub(crate) const KW_PARENT:    &'static [u8] = b"Parent";

// Keywords - literals
pub(crate) const KW_LIT_TRUE:  &'static [u8] = b"true";
pub(crate) const KW_LIT_FALSE: &'static [u8] = b"false";

// Keywords - statements
pub(crate) const KW_STMT_IF:       &'static [u8] = b"if";
pub(crate) const KW_STMT_ELSE:     &'static [u8] = b"else";
pub(crate) const KW_STMT_WHILE:    &'static [u8] = b"while";
pub(crate) const KW_STMT_DO:       &'static [u8] = b"do";
pub(crate) const KW_STMT_FOR:      &'static [u8] = b"for";
pub(crate) const KW_STMT_BREAK:    &'static [u8] = b"break";
pub(crate) const KW_STMT_CONTINUE: &'static [u8] = b"continue";
pub(crate) const KW_STMT_RETURN:   &'static [u8] = b"return";
pub(crate) const KW_STMT_SWITCH:   &'static [u8] = b"switch";
pub(crate) const KW_STMT_SWITCH_STR: &'static [u8] = b"switch$";
pub(crate) const KW_STMT_CASE:     &'static [u8] = b"case";
pub(crate) const KW_STMT_OR:       &'static [u8] = b"or";
pub(crate) const KW_STMT_DEFAULT:  &'static [u8] = b"default";

// Keywords - operators
pub(crate) const KW_OP_SPC: &'static [u8] = b"SPC";
pub(crate) const KW_OP_TAB: &'static [u8] = b"TAB";
pub(crate) const KW_OP_NL:  &'static [u8] = b"NL";

// Reserved function name, parsed into a dedicated expression
pub(crate) const KW_FUNC_DETAG: &'static [u8] = b"detag";

/// Consumes a specific expected token. Be careful to only call this with tokens
/// that do not have a variable length.
pub(crate) fn consume_token(source: &InputSource, iter: &mut TokenIter, expected: TokenKind) -> Result<InputSpan, ParseError> {
    if Some(expected) != iter.next() {
        return Err(ParseError::new_error_at_pos(
            source, iter.last_valid_pos(),
            format!("expected '{}'", expected.token_chars())
        ));
    }
    let span = iter.next_span();
    iter.consume();
    Ok(span)
}

/// Consumes the next token if it is of the expected kind, returns whether it
/// was consumed.
pub(crate) fn maybe_consume_token(iter: &mut TokenIter, expected: TokenKind) -> bool {
    if Some(expected) == iter.next() {
        iter.consume();
        return true;
    }

    false
}

/// Consumes a comma-separated list of items if the opening delimiting token is
/// encountered. If not, then the iterator will remain at its current position.
/// Note that the potential cases may be:
/// - No opening delimiter encountered, then we return `false`.
/// - Both opening and closing delimiter encountered, but no items.
/// - Opening and closing delimiter encountered, and items were processed.
/// - Found an opening delimiter, but processing an item failed.
pub(crate) fn maybe_consume_comma_separated<T, F>(
    open_delim: TokenKind, close_delim: TokenKind, source: &InputSource, iter: &mut TokenIter,
    mut consumer_fn: F, target: &mut Vec<T>, item_name_and_article: &'static str
) -> Result<bool, ParseError>
    where F: FnMut(&InputSource, &mut TokenIter) -> Result<T, ParseError>
{
    let mut next = iter.next();
    if Some(open_delim) != next {
        return Ok(false);
    }

    // Opening delimiter encountered, so must parse the comma-separated list.
    iter.consume();
    target.clear();
    let mut had_comma = true;
    loop {
        next = iter.next();
        if Some(close_delim) == next {
            iter.consume();
            break;
        } else if !had_comma {
            return Err(ParseError::new_error_at_pos(
                source, iter.last_valid_pos(),
                format!("expected a '{}', or {}", close_delim.token_chars(), item_name_and_article)
            ));
        }

        let new_item = consumer_fn(source, iter)?;
        target.push(new_item);

        next = iter.next();
        had_comma = next == Some(TokenKind::Comma);
        if had_comma {
            iter.consume();
        }
    }

    Ok(true)
}

/// Consumes a comma-separated list and expected the opening and closing
/// characters to be present. The returned array may still be empty
pub(crate) fn consume_comma_separated<T, F>(
    open_delim: TokenKind, close_delim: TokenKind, source: &InputSource, iter: &mut TokenIter,
    consumer_fn: F, target: &mut Vec<T>, item_name_and_article: &'static str,
    list_name_and_article: &'static str
) -> Result<(), ParseError>
    where F: FnMut(&InputSource, &mut TokenIter) -> Result<T, ParseError>
{
    let first_pos = iter.last_valid_pos();
    match maybe_consume_comma_separated(open_delim, close_delim, source, iter, consumer_fn, target, item_name_and_article) {
        Ok(true) => Ok(()),
        Ok(false) => {
            Err(ParseError::new_error_at_pos(
                source, first_pos,
                format!("expected {}", list_name_and_article)
            ))
        },
        Err(err) => Err(err)
    }
}

pub(crate) fn has_ident(source: &InputSource, iter: &mut TokenIter, expected: &[u8]) -> bool {
    peek_ident(source, iter).map_or(false, |section| section == expected)
}

pub(crate) fn peek_ident<'a>(source: &'a InputSource, iter: &mut TokenIter) -> Option<&'a [u8]> {
    if Some(TokenKind::Ident) == iter.next() {
        let (start, end) = iter.next_positions();
        return Some(source.section_at_pos(start, end))
    }

    None
}

/// Consumes any identifier and returns it together with its span. Does not
/// check if the identifier is a reserved keyword.
pub(crate) fn consume_any_ident<'a>(
    source: &'a InputSource, iter: &mut TokenIter
) -> Result<(&'a [u8], InputSpan), ParseError> {
    if Some(TokenKind::Ident) != iter.next() {
        return Err(ParseError::new_error_str_at_pos(source, iter.last_valid_pos(), "expected an identifier"));
    }
    let (ident_start, ident_end) = iter.next_positions();
    iter.consume();
    Ok((source.section_at_pos(ident_start, ident_end), InputSpan::from_positions(ident_start, ident_end)))
}

/// Consumes a specific identifier. May or may not be a reserved keyword.
pub(crate) fn consume_exact_ident(source: &InputSource, iter: &mut TokenIter, expected: &[u8]) -> Result<InputSpan, ParseError> {
    let pos = iter.last_valid_pos();
    let (ident, span) = consume_any_ident(source, iter)?;
    if ident != expected {
        debug_assert!(expected.is_ascii());
        return Err(ParseError::new_error_at_pos(
            source, pos,
            format!("expected the text '{}'", &String::from_utf8_lossy(expected))
        ));
    }
    Ok(span)
}

/// Consumes an identifier that is not a reserved keyword and returns it
/// together with its span.
pub(crate) fn consume_ident<'a>(
    source: &'a InputSource, iter: &mut TokenIter
) -> Result<(&'a str, InputSpan), ParseError> {
    let (ident, span) = consume_any_ident(source, iter)?;
    if is_reserved_keyword(ident) {
        return Err(ParseError::new_error_str_at_span(source, span, "encountered reserved keyword"));
    }

    Ok((as_str(ident), span))
}

/// Consumes `%name` or `$name`, returns the name without its sigil.
pub(crate) fn consume_variable_name<'a>(
    source: &'a InputSource, iter: &mut TokenIter
) -> Result<(&'a str, bool, InputSpan), ParseError> {
    let is_global = match iter.next() {
        Some(TokenKind::LocalVar) => false,
        Some(TokenKind::GlobalVar) => true,
        _ => return Err(ParseError::new_error_str_at_pos(source, iter.last_valid_pos(), "expected a variable")),
    };
    let span = iter.next_span();
    iter.consume();

    let text = source.section_at_span(span);
    Ok((as_str(&text[1..]), is_global, span))
}

/// Consumes a number literal. Integers that do not fit an `i64` become
/// floating point numbers.
pub(crate) fn consume_number_literal(source: &InputSource, iter: &mut TokenIter) -> Result<(Literal, InputSpan), ParseError> {
    if Some(TokenKind::Number) != iter.next() {
        return Err(ParseError::new_error_str_at_pos(source, iter.last_valid_pos(), "expected a number"));
    }
    let span = iter.next_span();
    iter.consume();

    let text = as_str(source.section_at_span(span));
    let literal = if text.starts_with("0x") || text.starts_with("0X") {
        match i64::from_str_radix(&text[2..], 16) {
            Ok(value) => Literal::Integer(value),
            Err(_) => return Err(ParseError::new_error_str_at_span(
                source, span, "hexadecimal number does not fit in 64 bits"
            )),
        }
    } else if text.bytes().all(|c| c.is_ascii_digit()) {
        match text.parse::<i64>() {
            Ok(value) => Literal::Integer(value),
            Err(_) => Literal::Float(text.parse::<f64>().unwrap_or(0.0)),
        }
    } else {
        match text.parse::<f64>() {
            Ok(value) => Literal::Float(value),
            Err(_) => return Err(ParseError::new_error_str_at_span(
                source, span, "incorrectly formatted number"
            )),
        }
    };

    Ok((literal, span))
}

/// Consumes a `"..."` or `'...'` literal, returns the unescaped text and
/// whether the literal was a tagged one.
pub(crate) fn consume_string_literal(
    source: &InputSource, iter: &mut TokenIter, buffer: &mut String
) -> Result<(bool, InputSpan), ParseError> {
    let is_tagged = match iter.next() {
        Some(TokenKind::String) => false,
        Some(TokenKind::Tagged) => true,
        _ => return Err(ParseError::new_error_str_at_pos(source, iter.last_valid_pos(), "expected a string literal")),
    };
    let span = iter.next_span();
    iter.consume();

    let text = source.section_at_span(span);
    let text = String::from_utf8_lossy(&text[1..text.len() - 1]);
    unescape_into(&text, buffer);
    Ok((is_tagged, span))
}

/// Resolves backslash escapes. Unknown escapes keep the escaped character.
pub(crate) fn unescape_into(text: &str, buffer: &mut String) {
    buffer.clear();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            buffer.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => buffer.push('\n'),
            Some('t') => buffer.push('\t'),
            Some('r') => buffer.push('\r'),
            Some('x') => {
                let mut value = 0u32;
                let mut num_digits = 0;
                while num_digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(digit) => {
                            value = value * 16 + digit;
                            num_digits += 1;
                            chars.next();
                        },
                        None => break,
                    }
                }
                if num_digits == 0 {
                    buffer.push('x');
                } else if let Some(c) = std::char::from_u32(value) {
                    buffer.push(c);
                }
            },
            Some(other) => buffer.push(other),
            None => buffer.push('\\'),
        }
    }
}

fn as_str(text: &[u8]) -> &str {
    // Identifiers, variables and numbers are ASCII by construction of the
    // tokenizer.
    std::str::from_utf8(text).unwrap_or("")
}

fn is_reserved_statement_keyword(text: &[u8]) -> bool {
    match text {
        KW_STMT_IF | KW_STMT_ELSE | KW_STMT_WHILE | KW_STMT_DO | KW_STMT_FOR |
        KW_STMT_BREAK | KW_STMT_CONTINUE | KW_STMT_RETURN | KW_STMT_SWITCH |
        KW_STMT_SWITCH_STR | KW_STMT_CASE | KW_STMT_DEFAULT => true,
        _ => false,
    }
}

fn is_reserved_declaration_keyword(text: &[u8]) -> bool {
    match text {
        KW_FUNCTION | KW_PACKAGE | KW_NEW | KW_DATABLOCK => true,
        _ => false,
    }
}

fn is_reserved_expression_keyword(text: &[u8]) -> bool {
    match text {
        KW_LIT_TRUE | KW_LIT_FALSE | KW_OP_SPC | KW_OP_TAB | KW_OP_NL => true,
        _ => false,
    }
}

pub(crate) fn is_reserved_keyword(text: &[u8]) -> bool {
    is_reserved_statement_keyword(text) ||
        is_reserved_declaration_keyword(text) ||
        is_reserved_expression_keyword(text)
}
