//! Lexer
//!
//! Never fails: problems are collected as [`SyntaxError`]s and scanning
//! continues, so the parser always gets a token stream ending in `Eof`.

use std::iter::Peekable;
use std::str::Chars;

use unicode_ident::{is_xid_continue, is_xid_start};

use super::SyntaxError;
use crate::util::diagnostic::ErrorCode;
use crate::util::span::{Position, Span};

/// Token kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// String literal with quotes removed and escapes kept verbatim
    Str(String),
    Int(String),
    Double(String),
    /// `=>`
    Arrow,
    Punct(char),
    Eof,
}

impl TokenKind {
    /// Text used in "unexpected token" messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) | TokenKind::Int(s) | TokenKind::Double(s) => s.clone(),
            TokenKind::Str(s) => format!("\"{}\"", s),
            TokenKind::Arrow => "=>".to_string(),
            TokenKind::Punct(c) => c.to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }

    pub fn is_ident(
        &self,
        text: &str,
    ) -> bool {
        matches!(self, TokenKind::Ident(s) if s == text)
    }

    pub fn is_punct(
        &self,
        c: char,
    ) -> bool {
        *self == TokenKind::Punct(c)
    }
}

/// Token with its span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

const PUNCTUATION: &str = "{}()[];,.=<>+-*/%!&|?:@^~#";

fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || is_xid_start(c)
}

fn is_identifier_char(c: char) -> bool {
    c == '$' || is_xid_continue(c)
}

/// Tokenize `source`
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token() {
        tokens.push(token);
    }
    let end = lexer.position();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::point(end),
    });
    (tokens, lexer.errors)
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: usize,
    column: usize,
    start: Position,
    errors: Vec<SyntaxError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            start: Position::START,
            errors: Vec::new(),
        }
    }

    fn position(&self) -> Position {
        Position::at(self.line, self.column, self.offset)
    }

    fn span(&self) -> Span {
        Span::new(self.start, self.position())
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    fn make_token(
        &self,
        kind: TokenKind,
    ) -> Token {
        Token {
            kind,
            span: self.span(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Block comments nest, as in Dart
    fn skip_block_comment(&mut self) {
        self.start = self.position();
        self.advance();
        self.advance();
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Some('/') if self.peek() == Some('*') => {
                    self.advance();
                    depth += 1;
                }
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    depth -= 1;
                }
                Some(_) => {}
                None => {
                    let span = Span::point(self.start);
                    self.errors
                        .push(SyntaxError::new(ErrorCode::UNTERMINATED_COMMENT, span));
                    return;
                }
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        self.start = self.position();
        let c = self.advance()?;

        let token = match c {
            c if is_identifier_start(c) => self.scan_identifier(c),
            c if c.is_ascii_digit() => self.scan_number(c),
            '"' | '\'' => self.scan_string(c),
            '=' if self.peek() == Some('>') => {
                self.advance();
                self.make_token(TokenKind::Arrow)
            }
            c if PUNCTUATION.contains(c) => self.make_token(TokenKind::Punct(c)),
            other => {
                self.errors.push(
                    SyntaxError::new(ErrorCode::UNEXPECTED_CHARACTER, self.span())
                        .with("char", other),
                );
                return self.next_token();
            }
        };
        Some(token)
    }

    fn scan_identifier(
        &mut self,
        first: char,
    ) -> Token {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !is_identifier_char(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        self.make_token(TokenKind::Ident(text))
    }

    fn scan_number(
        &mut self,
        first: char,
    ) -> Token {
        let mut text = String::from(first);
        let mut is_double = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.'
                && !is_double
                && self.peek_next().is_some_and(|n| n.is_ascii_digit())
            {
                is_double = true;
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if is_double {
            self.make_token(TokenKind::Double(text))
        } else {
            self.make_token(TokenKind::Int(text))
        }
    }

    /// Single-line string; an unescaped newline or end of input terminates
    /// it with an error.
    fn scan_string(
        &mut self,
        quote: char,
    ) -> Token {
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    return self.make_token(TokenKind::Str(text));
                }
                Some('\\') => {
                    text.push('\\');
                    self.advance();
                    if let Some(escaped) = self.peek().filter(|c| *c != '\n') {
                        text.push(escaped);
                        self.advance();
                    }
                }
                Some('\n') | None => {
                    self.errors
                        .push(SyntaxError::new(ErrorCode::UNTERMINATED_STRING, self.span()));
                    return self.make_token(TokenKind::Str(text));
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("int x = 42;"),
            vec![
                TokenKind::Ident("int".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Punct('='),
                TokenKind::Int("42".into()),
                TokenKind::Punct(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literals_and_arrow() {
        assert_eq!(
            kinds("f() => 'a' + \"b\" + 1.5;"),
            vec![
                TokenKind::Ident("f".into()),
                TokenKind::Punct('('),
                TokenKind::Punct(')'),
                TokenKind::Arrow,
                TokenKind::Str("a".into()),
                TokenKind::Punct('+'),
                TokenKind::Str("b".into()),
                TokenKind::Punct('+'),
                TokenKind::Double("1.5".into()),
                TokenKind::Punct(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_is_not_a_double() {
        assert_eq!(
            kinds("1.foo"),
            vec![
                TokenKind::Int("1".into()),
                TokenKind::Punct('.'),
                TokenKind::Ident("foo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\n/* block /* nested */ */ x"),
            vec![TokenKind::Ident("x".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(
            kinds("var größe;"),
            vec![
                TokenKind::Ident("var".into()),
                TokenKind::Ident("größe".into()),
                TokenKind::Punct(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let (tokens, _) = tokenize("a\n  bc");
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
        assert_eq!(tokens[1].span.len(), 2);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = tokenize("var s = 'abc\nx;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UNTERMINATED_STRING);
        assert!(tokens.iter().any(|t| t.kind.is_ident("x")));
    }

    #[test]
    fn test_unterminated_comment() {
        let (tokens, errors) = tokenize("x /* never closed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UNTERMINATED_COMMENT);
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_unexpected_character() {
        let (tokens, errors) = tokenize("a ` b");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UNEXPECTED_CHARACTER);
        assert_eq!(tokens.len(), 3);
    }
}
