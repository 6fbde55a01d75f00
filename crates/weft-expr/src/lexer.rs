//! Expression lexer with explicit checkpoints.

use crate::error::{Result, SyntaxError};
use crate::token::{ContextRef, Negate, Operator, Reserved, Token};

/// A token with the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

/// Saved lexer position, restored when a speculative parse does not match.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint(usize);

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.pos)
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.0;
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Reads the next lexeme, or `None` at the end of input.
    ///
    /// `operand_expected` lets a leading `-`/`+` bind to a number literal
    /// instead of being read as a binary operator.
    pub fn next(&mut self, operand_expected: bool) -> Result<Option<Lexeme>> {
        self.skip_whitespace();
        let offset = self.pos;
        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        let token = match first {
            '(' => {
                self.pos += 1;
                Token::ParenOpen
            }
            ')' => {
                self.pos += 1;
                Token::ParenClose
            }
            ',' => {
                self.pos += 1;
                Token::Separator
            }
            '-' | '+' if operand_expected && starts_with_digit(&rest[1..]) => self.number()?,
            _ => {
                if let Some(op) = Operator::ALL
                    .iter()
                    .copied()
                    .find(|op| rest.starts_with(op.symbol()))
                {
                    self.pos += op.symbol().len();
                    Token::Operator(op)
                } else if first == '!' {
                    let run = rest.chars().take_while(|c| *c == '!').count();
                    self.pos += run;
                    Token::Negate(Negate::from_run(run))
                } else if first.is_ascii_digit() {
                    self.number()?
                } else if first == '"' || first == '\'' {
                    self.string(first)?
                } else if let Some(path) = self.path() {
                    match Reserved::from_word(&path) {
                        Some(reserved) => Token::Reserved(reserved),
                        None => Token::ContextRef(ContextRef::path(path)),
                    }
                } else {
                    return Err(SyntaxError::new(
                        format!("unexpected character '{}'", first),
                        offset,
                    ));
                }
            }
        };

        Ok(Some(Lexeme { token, offset }))
    }

    /// Consumes a `.prop.path` suffix directly following a call.
    pub fn property_suffix(&mut self) -> Option<String> {
        let rest = self.remaining();
        let tail = rest.strip_prefix('.')?;
        if !tail.starts_with(is_ident_start) {
            return None;
        }
        let len = dotted_ident_len(tail);
        self.pos += 1 + len;
        Some(tail[..len].to_string())
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut end = start;
        if matches!(bytes.get(end), Some(b'-' | b'+')) {
            end += 1;
        }
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
            end += 1;
            while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                end += 1;
            }
        }
        let text = &self.input[start..end];
        let value = text
            .parse::<f64>()
            .map_err(|_| SyntaxError::new(format!("invalid number '{}'", text), start))?;
        self.pos = end;
        Ok(Token::Number(value))
    }

    fn string(&mut self, quote: char) -> Result<Token> {
        let start = self.pos;
        let mut out = String::new();
        let mut chars = self.input[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c if c == quote => {
                    self.pos = start + 1 + i + c.len_utf8();
                    return Ok(Token::String(out));
                }
                c => out.push(c),
            }
        }
        Err(SyntaxError::new("unterminated string literal", start))
    }

    /// Reads `(~|\.+)?ident(.ident)*`, returning `None` without consuming on mismatch.
    fn path(&mut self) -> Option<String> {
        let rest = self.remaining();
        let prefix = if rest.starts_with('~') {
            1
        } else {
            rest.chars().take_while(|c| *c == '.').count()
        };
        let body = &rest[prefix..];
        if !body.starts_with(is_ident_start) {
            return None;
        }
        let len = prefix + dotted_ident_len(body);
        self.pos += len;
        Some(rest[..len].to_string())
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of `ident(.ident)*` at the start of `s`, which must begin with an identifier.
fn dotted_ident_len(s: &str) -> usize {
    let mut len = 0;
    loop {
        len += s[len..].chars().take_while(|c| is_ident_char(*c)).count();
        let after = &s[len..];
        match after.strip_prefix('.') {
            Some(next) if next.starts_with(is_ident_start) => len += 1,
            _ => return len,
        }
    }
}
