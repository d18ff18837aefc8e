use std::fmt;
use std::str::FromStr;

use crate::error::{LexError, Position};
use crate::token_type::{Keyword, TokenType::{self, *}};
use crate::value::Value;

/// Splits a selector into tokens. Stops at the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Scanner::new(source).scan()
}

/// The `Scanner` loops through the selector source, identifying tokens and returning them as
/// Vec<Token>.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>, // iterator over chars of source
    tokens: Vec<Token>,
    start: Position, // position of first char of lexeme
    current: Option<(usize, char)>, // current char (byte index, char)
    next: Option<(usize, char)>, // next char (byte index, char)
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {

    pub fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices();
        let current = chars.next();
        let next = chars.clone().next();

        Scanner {
            source,
            chars,
            tokens: Vec::new(),
            start: Position { offset: 0, line: 1, column: 1 },
            current,
            next,
            line: 1,
            column: 1,
        }
    }

    pub fn scan(mut self) -> Result<Vec<Token>, LexError> {
        while !self.at_end() {
            self.start = self.position();
            self.scan_token()?;
        }
        self.start = self.position();
        self.add_token(EOF, None);
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = match self.advance() {
            Some(ch) => ch,
            None => return Ok(()),
        };

        match c {
            '(' => self.add_token(LeftParen, None),
            ')' => self.add_token(RightParen, None),
            ',' => self.add_token(Comma, None),
            '+' => self.add_token(Plus, None),
            '-' => self.add_token(Minus, None), // unary minus belongs to the parser
            '*' => self.add_token(Star, None),
            '/' => self.add_token(Slash, None),
            '=' => self.add_token(Equal, None),
            '>' => self.match_and_add_token('=', GreaterEqual, Greater),
            '<' => {
                if self.match_char('>') {
                    self.add_token(NotEqual, None)
                } else {
                    self.match_and_add_token('=', LessEqual, Less)
                }
            }
            '\'' => return self.string(),
            ' ' | '\r' | '\t' => {} // ignore whitespace
            '\n' => { self.line += 1; self.column = 1; }
            _ if c.is_ascii_digit() => return self.number(),
            '.' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => return self.number(),
            _ if Self::is_identifier_start(c) => self.identifier(),
            _ => return Err(self.error_at(self.start, format!("Unexpected character '{}'", c))),
        };
        Ok(())
    }

    fn identifier(&mut self) {
        while matches!(self.peek(), Some(c) if Self::is_identifier_part(c)) {
            self.advance();
        }

        match Keyword::from_str(self.lexeme()) {
            Ok(keyword) => self.add_token(keyword.into(), None),
            Err(_) => self.add_token(Identifier, None),
        }
    }

    /// Digits are a Long; a '.' or an exponent makes the literal a Double.
    fn number(&mut self) -> Result<(), LexError> {
        let mut is_double = self.lexeme().starts_with('.');
        self.digits();

        // Fractional part, also allows "5." with no digits after the point
        if !is_double && self.peek() == Some('.') {
            self.advance();
            is_double = true;
        }
        if is_double {
            self.digits();
        }

        // Exponent
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.error_at(self.position(), "Expected digits in exponent".to_string()));
            }
            self.digits();
            is_double = true;
        }

        // "12abc" is neither a number nor an identifier
        if matches!(self.peek(), Some(c) if Self::is_identifier_part(c) || c == '.') {
            return Err(self.error_at(self.position(), "Malformed numeric literal".to_string()));
        }

        let lexeme = self.lexeme();
        let value = if is_double {
            // literals such as 1e999 overflow to infinity
            lexeme.parse::<f64>().ok().filter(|x| x.is_finite()).map(Value::Double)
        } else {
            lexeme.parse::<i64>().map(Value::Long).ok()
        };
        match value {
            Some(value) => {
                let variant = if is_double { Double } else { Long };
                self.add_token(variant, Some(value));
                Ok(())
            }
            None => Err(self.error_at(self.start, format!("Numeric literal '{}' is out of range", lexeme))),
        }
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Single-quoted string; a doubled quote stands for one quote character.
    fn string(&mut self) -> Result<(), LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => {
                    if self.match_char('\'') {
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some('\n') => {
                    self.line += 1;
                    self.column = 1;
                    value.push('\n');
                }
                Some(c) => value.push(c),
                None => return Err(self.error_at(self.start, "Unterminated string".to_string())),
            }
        }
        self.add_token(Str, Some(Value::Str(value)));
        Ok(())
    }

    fn is_identifier_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_' || c == '$'
    }

    fn is_identifier_part(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '$'
    }

    fn match_and_add_token(&mut self, expected: char, type1: TokenType, type2: TokenType) {
        let token = if self.match_char(expected) { type1 } else { type2 };
        self.add_token(token, None)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true
        }
        false
    }

    fn at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Return current char and advance to next.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.current = self.next;
        self.chars.next();
        self.next = self.chars.clone().next();
        if c.is_some() {
            self.column += 1;
        }
        c
    }

    /// Return current char without advancing.
    fn peek(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.current.map_or(self.source.len(), |(idx, _)| idx)
    }

    fn position(&self) -> Position {
        Position { offset: self.offset(), line: self.line, column: self.column }
    }

    /// The slice source[self.start..self.current].
    fn lexeme(&self) -> &'a str {
        &self.source[self.start.offset..self.offset()]
    }

    fn add_token(&mut self, token_type: TokenType, literal: Option<Value>) {
        let token = Token {
            variant: token_type,
            lexeme: self.lexeme().to_string(),
            literal,
            position: self.start,
        };
        self.tokens.push(token);
    }

    fn error_at(&self, position: Position, message: String) -> LexError {
        LexError { message, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub variant: TokenType,
    pub lexeme: String,
    pub literal: Option<Value>,
    pub position: Position,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} {}", self.variant, self.lexeme)?;
        if let Some(literal) = &self.literal {
            write!(f, " {}", literal)?;
        }
        Ok(())
    }
}
