use crate::error::EvalError;

/// A lexical token, carrying the offset of its first character.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// Numeric literal, kept in textual form (literal constants are
    /// deduplicated by spelling, not by value).
    Number { text: String, pos: usize },
    Ident { text: String, pos: usize },
    /// One of `+ - * / ^ <`.
    Operator { ch: u8, pos: usize },
    LParen { pos: usize },
    RParen { pos: usize },
    Comma { pos: usize },
}

impl Token {
    pub(crate) fn pos(&self) -> usize {
        match self {
            Token::Number { pos, .. }
            | Token::Ident { pos, .. }
            | Token::Operator { pos, .. }
            | Token::LParen { pos }
            | Token::RParen { pos }
            | Token::Comma { pos } => *pos,
        }
    }
}

pub(crate) struct Lexer<'a> {
    src: &'a [u8],
    i: usize,
}

fn is_operator(c: u8) -> bool {
    matches!(c, b'+' | b'-' | b'*' | b'/' | b'^' | b'<')
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(s: &'a str) -> Self {
        Self {
            src: s.as_bytes(),
            i: 0,
        }
    }

    /// The total input length; used as the offset of end-of-input errors.
    pub(crate) fn len(&self) -> usize {
        self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.src.get(self.i + off).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    /// Tokenizes the whole input.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(out),
            };
            let pos = self.i;
            match c {
                b'(' => {
                    self.i += 1;
                    out.push(Token::LParen { pos });
                }
                b')' => {
                    self.i += 1;
                    out.push(Token::RParen { pos });
                }
                b',' => {
                    self.i += 1;
                    out.push(Token::Comma { pos });
                }
                c if is_operator(c) => {
                    self.i += 1;
                    out.push(Token::Operator { ch: c, pos });
                }
                c if c.is_ascii_digit() || c == b'.' => {
                    out.push(self.lex_number()?);
                }
                c if is_ident_start(c) => {
                    out.push(self.lex_ident());
                }
                _ => return Err(EvalError::UnexpectedChar { position: pos }),
            }
        }
    }

    /// Decimal literal with an optional fraction and an optional `e`/`E`
    /// exponent (with optional sign). A lone `.` or a dangling exponent
    /// marker is rejected.
    fn lex_number(&mut self) -> Result<Token, EvalError> {
        let start = self.i;
        let mut digits = 0usize;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.i += 1;
            digits += 1;
        }
        if self.peek() == Some(b'.') {
            self.i += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.i += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            // a lone '.'
            return Err(EvalError::UnexpectedChar { position: start });
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            // only an exponent if digits follow; otherwise the 'e' starts an
            // identifier (e.g. the constant e in "2 e" is still a parse
            // error, but it is the parser's to report)
            let mut off = 1;
            if matches!(self.peek_at(1), Some(b'+') | Some(b'-')) {
                off = 2;
            }
            if self.peek_at(off).is_some_and(|c| c.is_ascii_digit()) {
                self.i += off;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.i += 1;
                }
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.i])
            .map_err(|_| EvalError::UnexpectedChar { position: start })?
            .to_string();
        Ok(Token::Number { text, pos: start })
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.i;
        while self.peek().is_some_and(is_ident_char) {
            self.i += 1;
        }
        let text = String::from_utf8_lossy(&self.src[start..self.i]).into_owned();
        Token::Ident { text, pos: start }
    }
}
