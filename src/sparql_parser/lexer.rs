//! Hand-rolled SPARQL tokenizer.
//!
//! Deliberately small: it recognizes exactly the token shapes the grammar in
//! `sparql_parser::grammar` consumes (keywords are matched case-insensitively
//! as plain identifiers and disambiguated by the parser; comments are
//! stripped in a pre-pass rather than modeled as their own lexer state).

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Variable(String),
    PrefixedName(String, String), // prefix, local
    Iri(String),
    StringLiteral(String),
    Number(String),
    /// `^^<iri>` or `^^prefix:local` following a string literal.
    Caret,
    LangTag(String),
    Punct(char), // one of { } ( ) . ; , ? *
    Op(String), // = != < <= > >= && || + - /
    A,          // the 'a' shorthand for rdf:type
    Eof,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ws_and_comments();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push((Token::Eof, start));
                break;
            };

            let tok = match c {
                '{' | '}' | '(' | ')' | '.' | ';' | ',' | '*' => {
                    self.bump();
                    Token::Punct(c)
                }
                '?' | '$' => {
                    self.bump();
                    let name = self.read_ident_chars();
                    if name.is_empty() {
                        return Err(ParseError::MalformedTerm("empty variable name".into()));
                    }
                    Token::Variable(name)
                }
                '<' => {
                    if self.peek_at(1) == Some('=') {
                        self.bump();
                        self.bump();
                        Token::Op("<=".into())
                    } else {
                        self.bump();
                        let iri = self.read_until('>')?;
                        Token::Iri(iri)
                    }
                }
                '>' => {
                    if self.peek_at(1) == Some('=') {
                        self.bump();
                        self.bump();
                        Token::Op(">=".into())
                    } else {
                        self.bump();
                        Token::Op(">".into())
                    }
                }
                '=' => {
                    self.bump();
                    Token::Op("=".into())
                }
                '!' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        Token::Op("!=".into())
                    } else {
                        Token::Op("!".into())
                    }
                }
                '&' if self.peek_at(1) == Some('&') => {
                    self.bump();
                    self.bump();
                    Token::Op("&&".into())
                }
                '|' if self.peek_at(1) == Some('|') => {
                    self.bump();
                    self.bump();
                    Token::Op("||".into())
                }
                '+' | '-' | '/' => {
                    self.bump();
                    Token::Op(c.to_string())
                }
                '^' if self.peek_at(1) == Some('^') => {
                    self.bump();
                    self.bump();
                    Token::Caret
                }
                '"' | '\'' => {
                    let quote = c;
                    self.bump();
                    let s = self.read_string(quote)?;
                    Token::StringLiteral(s)
                }
                '@' => {
                    self.bump();
                    let tag = self.read_ident_chars();
                    Token::LangTag(tag)
                }
                c if c.is_ascii_digit() => {
                    let num = self.read_number();
                    Token::Number(num)
                }
                c if c.is_alphabetic() || c == '_' => self.read_ident_or_prefixed(),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        found: other.to_string(),
                        pos: start,
                        expected: "a valid token".into(),
                    })
                }
            };
            tokens.push((tok, start));
        }
        Ok(tokens)
    }

    fn read_ident_chars(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_number(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_until(&mut self, terminator: char) -> Result<String, ParseError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(c) if c == terminator => return Ok(s),
                Some(c) => s.push(c),
                None => {
                    return Err(ParseError::MalformedTerm(format!(
                        "unterminated IRI starting near '{s}'"
                    )))
                }
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(ParseError::MalformedTerm("unterminated escape".into())),
                },
                Some(c) => s.push(c),
                None => return Err(ParseError::MalformedTerm("unterminated string literal".into())),
            }
        }
    }

    fn read_ident_or_prefixed(&mut self) -> Token {
        let ident = self.read_ident_chars();
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            self.bump();
            let local = self.read_ident_chars();
            Token::PrefixedName(ident, local)
        } else if ident == "a" {
            Token::A
        } else {
            Token::Ident(ident)
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }
}
