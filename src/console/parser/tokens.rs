use crate::console::input_source::{InputPosition, InputSpan};

/// Represents a particular kind of token. Some tokens represent
/// variable-character tokens. Such a token is always followed by a
/// `TokenKind::SpanEnd` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum TokenKind {
    // Variable-character tokens, followed by a SpanEnd token
    Ident,          // regular identifier
    LocalVar,       // `%name`, range includes `%`
    GlobalVar,      // `$name` or `$a::b`, range includes `$`
    Number,         // integer, hexadecimal or floating point literal
    String,         // string literal, range includes `"`
    Tagged,         // tagged string literal, range includes `'`
    LineComment,    // line comment, range includes leading `//`, but not newline
    BlockComment,   // block comment, range includes leading `/*` and trailing `*/`
    // Punctuation (single character)
    Exclamation,    // !
    Question,       // ?
    OpenAngle,      // <
    OpenCurly,      // {
    OpenParen,      // (
    OpenSquare,     // [
    CloseAngle,     // >
    CloseCurly,     // }
    CloseParen,     // )
    CloseSquare,    // ]
    Colon,          // :
    Comma,          // ,
    Dot,            // .
    SemiColon,      // ;
    // Operator-like (single character)
    At,             // @
    Plus,           // +
    Minus,          // -
    Star,           // *
    Slash,          // /
    Percent,        // %
    Caret,          // ^
    And,            // &
    Or,             // |
    Tilde,          // ~
    Equal,          // =
    // Punctuation (two characters)
    ColonColon,     // ::
    // Operator-like (two characters)
    PlusPlus,       // ++
    PlusEquals,     // +=
    MinusMinus,     // --
    MinusEquals,    // -=
    StarEquals,     // *=
    SlashEquals,    // /=
    PercentEquals,  // %=
    CaretEquals,    // ^=
    AndAnd,         // &&
    AndEquals,      // &=
    OrOr,           // ||
    OrEquals,       // |=
    EqualEqual,     // ==
    NotEqual,       // !=
    LessEquals,     // <=
    GreaterEquals,  // >=
    ShiftLeft,      // <<
    ShiftRight,     // >>
    DollarEquals,   // $=
    // Operator-like (three characters)
    ShiftLeftEquals,// <<=
    ShiftRightEquals, // >>=
    NotDollarEquals,// !$=
    // Special marker token to indicate end of variable-character tokens
    SpanEnd,
}

impl TokenKind {
    /// Returns true if the next expected token is the special `TokenKind::SpanEnd` token. This is
    /// the case for tokens of variable length (e.g. an identifier).
    pub(crate) fn has_span_end(&self) -> bool {
        *self <= TokenKind::BlockComment
    }

    /// Returns the number of characters associated with the token. May only be called on tokens
    /// that do not have a variable length.
    pub(crate) fn num_characters(&self) -> u32 {
        debug_assert!(!self.has_span_end() && *self != TokenKind::SpanEnd);
        if *self <= TokenKind::Equal {
            1
        } else if *self <= TokenKind::DollarEquals {
            2
        } else {
            3
        }
    }

    pub(crate) fn is_comment(&self) -> bool {
        *self == TokenKind::LineComment || *self == TokenKind::BlockComment
    }

    /// Returns the characters that are represented by the token, may only be called on tokens that
    /// do not have a variable length.
    pub fn token_chars(&self) -> &'static str {
        debug_assert!(!self.has_span_end() && *self != TokenKind::SpanEnd);
        PUNCTUATION.iter()
            .find(|(_, kind)| kind == self)
            .and_then(|(spelling, _)| std::str::from_utf8(*spelling).ok())
            .unwrap_or("")
    }
}

/// Every punctuation token. Longer spellings come before their prefixes.
pub(crate) const PUNCTUATION: &[(&[u8], TokenKind)] = &[
    (b"<<=", TokenKind::ShiftLeftEquals),
    (b">>=", TokenKind::ShiftRightEquals),
    (b"!$=", TokenKind::NotDollarEquals),
    (b"::", TokenKind::ColonColon),
    (b"++", TokenKind::PlusPlus),
    (b"+=", TokenKind::PlusEquals),
    (b"--", TokenKind::MinusMinus),
    (b"-=", TokenKind::MinusEquals),
    (b"*=", TokenKind::StarEquals),
    (b"/=", TokenKind::SlashEquals),
    (b"%=", TokenKind::PercentEquals),
    (b"^=", TokenKind::CaretEquals),
    (b"&&", TokenKind::AndAnd),
    (b"&=", TokenKind::AndEquals),
    (b"||", TokenKind::OrOr),
    (b"|=", TokenKind::OrEquals),
    (b"==", TokenKind::EqualEqual),
    (b"!=", TokenKind::NotEqual),
    (b"<=", TokenKind::LessEquals),
    (b">=", TokenKind::GreaterEquals),
    (b"<<", TokenKind::ShiftLeft),
    (b">>", TokenKind::ShiftRight),
    (b"$=", TokenKind::DollarEquals),
    (b"!", TokenKind::Exclamation),
    (b"?", TokenKind::Question),
    (b"<", TokenKind::OpenAngle),
    (b"{", TokenKind::OpenCurly),
    (b"(", TokenKind::OpenParen),
    (b"[", TokenKind::OpenSquare),
    (b">", TokenKind::CloseAngle),
    (b"}", TokenKind::CloseCurly),
    (b")", TokenKind::CloseParen),
    (b"]", TokenKind::CloseSquare),
    (b":", TokenKind::Colon),
    (b",", TokenKind::Comma),
    (b".", TokenKind::Dot),
    (b";", TokenKind::SemiColon),
    (b"@", TokenKind::At),
    (b"+", TokenKind::Plus),
    (b"-", TokenKind::Minus),
    (b"*", TokenKind::Star),
    (b"/", TokenKind::Slash),
    (b"%", TokenKind::Percent),
    (b"^", TokenKind::Caret),
    (b"&", TokenKind::And),
    (b"|", TokenKind::Or),
    (b"~", TokenKind::Tilde),
    (b"=", TokenKind::Equal),
];

/// Represents a single token at a particular position.
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: InputPosition,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, pos: InputPosition) -> Self {
        Self{ kind, pos }
    }
}

pub(crate) struct TokenBuffer {
    pub tokens: Vec<Token>,
}

impl TokenBuffer {
    pub(crate) fn new() -> Self {
        Self{ tokens: Vec::new() }
    }

    pub(crate) fn iter(&self) -> TokenIter {
        TokenIter::new(self, 0, self.tokens.len())
    }
}

/// Iterator over the tokens of a source file.
pub(crate) struct TokenIter<'a> {
    tokens: &'a Vec<Token>,
    cur: usize,
    end: usize,
}

impl<'a> TokenIter<'a> {
    fn new(buffer: &'a TokenBuffer, start: usize, end: usize) -> Self {
        Self{ tokens: &buffer.tokens, cur: start, end }
    }

    /// Returns the next token (but skips over comments), or `None` if at the
    /// end of the buffer
    pub(crate) fn next(&mut self) -> Option<TokenKind> {
        while self.cur < self.end {
            let kind = self.tokens[self.cur].kind;
            if !kind.is_comment() {
                return Some(kind);
            }
            self.cur += 2;
        }

        None
    }

    /// Returns the token following the one returned by `next`, skipping
    /// comments as well.
    pub(crate) fn peek_second(&mut self) -> Option<TokenKind> {
        self.next()?;
        let mut idx = self.cur + if self.tokens[self.cur].kind.has_span_end() { 2 } else { 1 };
        while idx < self.end {
            let kind = self.tokens[idx].kind;
            if !kind.is_comment() {
                return Some(kind);
            }
            idx += 2;
        }

        None
    }

    /// Returns the start position belonging to the token returned by `next`. If
    /// there is not a next token, then we return the end position of the
    /// previous token.
    pub(crate) fn last_valid_pos(&self) -> InputPosition {
        if self.cur < self.end {
            // Return token position
            return self.tokens[self.cur].pos
        }

        if self.cur == 0 {
            return InputPosition{ line: 1, offset: 0 };
        }

        // Return previous token end
        let token = &self.tokens[self.cur - 1];
        if token.kind == TokenKind::SpanEnd {
            token.pos
        } else {
            token.pos.with_offset(token.kind.num_characters())
        }
    }

    /// Returns the token range belonging to the token returned by `next`. This
    /// assumes that we're not at the end of the range we're iterating over.
    pub(crate) fn next_positions(&mut self) -> (InputPosition, InputPosition) {
        self.next();
        debug_assert!(self.cur < self.end);
        let token = &self.tokens[self.cur];
        if token.kind.has_span_end() {
            let span_end = &self.tokens[self.cur + 1];
            debug_assert_eq!(span_end.kind, TokenKind::SpanEnd);
            (token.pos, span_end.pos)
        } else {
            let offset = token.kind.num_characters();
            (token.pos, token.pos.with_offset(offset))
        }
    }

    /// See `next_positions`
    pub(crate) fn next_span(&mut self) -> InputSpan {
        let (begin, end) = self.next_positions();
        InputSpan::from_positions(begin, end)
    }

    /// Advances the iterator to the next (meaningful) token.
    pub(crate) fn consume(&mut self) {
        if let Some(kind) = self.next() {
            if kind.has_span_end() {
                self.cur += 2;
            } else {
                self.cur += 1;
            }
        }
    }
}
