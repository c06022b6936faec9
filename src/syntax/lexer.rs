//! Hand-rolled scanner. Brace-delimited, not indentation-sensitive: newlines
//! carry no meaning and are treated as ordinary whitespace.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Str(String),
    Ident(String),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    /// `%{` — opens a map literal; distinguished from `%` (mod) + `{` (block)
    /// at the lexer level so the parser never has to guess.
    MapOpen,

    Dot,
    Comma,
    Colon,
    Semicolon,

    Eq,
    EqEq,
    NotEq,
    /// `=>` — lambda-literal arrow (`params => body`).
    FatArrow,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    PlusPlus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    Bang,
    Caret,
    Dollar,
    At,

    Eof,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::Syntax("unterminated string literal".to_string())),
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(c) => out.push(c as char),
                    None => return Err(Error::Syntax("unterminated string escape".to_string())),
                },
                Some(c) => out.push(c as char),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let c = match self.bump() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };
        Ok(match c {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'.' => Token::Dot,
            b',' => Token::Comma,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            b'^' => Token::Caret,
            b'$' => Token::Dollar,
            b'@' => Token::At,
            b'%' => {
                if self.peek() == Some(b'{') {
                    self.pos += 1;
                    Token::MapOpen
                } else {
                    Token::Percent
                }
            }
            b'+' => {
                if self.peek() == Some(b'+') {
                    self.pos += 1;
                    Token::PlusPlus
                } else {
                    Token::Plus
                }
            }
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::EqEq
                } else if self.peek() == Some(b'>') {
                    self.pos += 1;
                    Token::FatArrow
                } else {
                    Token::Eq
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.pos += 1;
                    Token::AndAnd
                } else {
                    return Err(Error::Syntax("expected `&&`".to_string()));
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.pos += 1;
                    Token::OrOr
                } else {
                    return Err(Error::Syntax("expected `||`".to_string()));
                }
            }
            b'"' => Token::Str(self.read_string()?),
            b'0'..=b'9' => {
                let start = self.pos - 1;
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
                let n: i64 = text
                    .parse()
                    .map_err(|_| Error::Syntax(format!("integer literal `{text}` out of range")))?;
                Token::Int(n)
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let start = self.pos - 1;
                while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
                Token::Ident(text.to_string())
            }
            other => return Err(Error::Syntax(format!("unexpected character `{}`", other as char))),
        })
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            out.push(tok);
            if done {
                return Ok(out);
            }
        }
    }
}
