use std::rc::Rc;

use crate::diagnostic::Diagnostic;
use crate::position::{Position, Source, Span};
use crate::token::{Keyword, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    IllegalChar { ch: char, span: Span },
    ExpectedChar { expected: String, span: Span },
}

impl LexError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LexError::IllegalChar { ch, span } => {
                Diagnostic::new("Illegal Character", format!("'{}'", ch), span.clone())
            }
            LexError::ExpectedChar { expected, span } => {
                Diagnostic::new("Expected Character", expected.clone(), span.clone())
            }
        }
    }
}

/// Hand-written scanner. Produces the full token stream for a source
/// buffer, always terminated by an `Eof` token.
pub struct Lexer {
    chars: Vec<char>,
    pos: Position,
}

impl Lexer {
    pub fn new(source: &Rc<Source>) -> Self {
        Self {
            chars: source.text.chars().collect(),
            pos: Position::start(source),
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos.index as usize).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.pos = self.pos.advance(ch);
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.current() {
            match ch {
                ' ' | '\t' | '\r' => self.advance(),
                '#' => self.skip_comment(),
                '\n' | ';' => tokens.push(self.single(TokenKind::Newline)),
                '0'..='9' => tokens.push(self.lex_number()),
                '"' => tokens.push(self.lex_string()?),
                c if c.is_ascii_alphabetic() || c == '_' => tokens.push(self.lex_ident()),
                '+' => tokens.push(self.single(TokenKind::Plus)),
                '-' => tokens.push(self.lookahead('>', TokenKind::Arrow, TokenKind::Minus)),
                '*' => tokens.push(self.single(TokenKind::Star)),
                '/' => tokens.push(self.single(TokenKind::Slash)),
                '^' => tokens.push(self.single(TokenKind::Caret)),
                '(' => tokens.push(self.single(TokenKind::LParen)),
                ')' => tokens.push(self.single(TokenKind::RParen)),
                '[' => tokens.push(self.single(TokenKind::LSquare)),
                ']' => tokens.push(self.single(TokenKind::RSquare)),
                ',' => tokens.push(self.single(TokenKind::Comma)),
                '=' => tokens.push(self.lookahead('=', TokenKind::EqEq, TokenKind::Eq)),
                '<' => tokens.push(self.lookahead('=', TokenKind::LessEq, TokenKind::Less)),
                '>' => tokens.push(self.lookahead('=', TokenKind::GreaterEq, TokenKind::Greater)),
                '!' => tokens.push(self.lex_not_equals()?),
                other => {
                    let start = self.pos.clone();
                    self.advance();
                    return Err(LexError::IllegalChar {
                        ch: other,
                        span: Span::new(start, self.pos.clone()),
                    });
                }
            }
        }

        tokens.push(Token::new(TokenKind::Eof, Span::at(self.pos.clone())));
        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.pos.clone();
        self.advance();
        Token::new(kind, Span::new(start, self.pos.clone()))
    }

    /// Consume one character, then `expected` if it follows. Emits
    /// `two_kind` on a match and `one_kind` otherwise.
    fn lookahead(&mut self, expected: char, two_kind: TokenKind, one_kind: TokenKind) -> Token {
        let start = self.pos.clone();
        self.advance();
        if self.current() == Some(expected) {
            self.advance();
            Token::new(two_kind, Span::new(start, self.pos.clone()))
        } else {
            Token::new(one_kind, Span::new(start, self.pos.clone()))
        }
    }

    fn lex_not_equals(&mut self) -> Result<Token, LexError> {
        let start = self.pos.clone();
        self.advance();
        if self.current() == Some('=') {
            self.advance();
            Ok(Token::new(TokenKind::NotEq, Span::new(start, self.pos.clone())))
        } else {
            Err(LexError::ExpectedChar {
                expected: "'=' (after '!')".to_string(),
                span: Span::new(start, self.pos.clone()),
            })
        }
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos.clone();
        let mut lexeme = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current() {
            match ch {
                '0'..='9' => lexeme.push(ch),
                '.' if !has_dot => {
                    has_dot = true;
                    lexeme.push(ch);
                }
                _ => break,
            }
            self.advance();
        }

        let value: f64 = lexeme.parse().unwrap_or_default();
        let kind = if has_dot {
            TokenKind::Float(value)
        } else {
            TokenKind::Int(value)
        };
        Token::new(kind, Span::new(start, self.pos.clone()))
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let start = self.pos.clone();
        self.advance();

        let mut text = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::new(
                        TokenKind::Str(text),
                        Span::new(start, self.pos.clone()),
                    ));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(escaped) => text.push(escaped),
                        None => break,
                    }
                    self.advance();
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
                None => break,
            }
        }

        Err(LexError::ExpectedChar {
            expected: "'\"' (to terminate string)".to_string(),
            span: Span::new(start, self.pos.clone()),
        })
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos.clone();
        let mut lexeme = String::new();

        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                lexeme.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match Keyword::from_ident(&lexeme) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(lexeme),
        };
        Token::new(kind, Span::new(start, self.pos.clone()))
    }

    /// `#` runs to the end of the line. The newline itself is left in the
    /// stream so a comment-only line still separates statements.
    fn skip_comment(&mut self) {
        self.advance();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }
}
