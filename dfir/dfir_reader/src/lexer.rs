//! Lexical analysis of the textual IR.

use std::str::CharIndices;

use crate::error::Location;

#[cfg(test)]
mod tests;

/// A Token returned from the `Lexer`.
///
/// Some variants may contains references to the original source text, so the `Token` has the same
/// lifetime as the source.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token<'a> {
    Comment(&'a str),
    LPar,                // '('
    RPar,                // ')'
    LBrace,              // '{'
    RBrace,              // '}'
    LBracket,            // '['
    RBracket,            // ']'
    Comma,               // ','
    Colon,               // ':'
    Equal,               // '='
    Question,            // '?'
    Arrow,               // '->'
    Float(&'a str),      // 1.0, -2.5e-3
    Integer(&'a str),    // 5, -1
    Name(&'a str),       // %main
    Identifier(&'a str), // variables, operators, keywords and types
}

/// A `Token` with an associated location.
#[derive(Debug, PartialEq, Eq)]
pub struct LocatedToken<'a> {
    pub token: Token<'a>,
    pub location: Location,
}

/// Wrap up a `Token` with the given location.
fn token(token: Token, loc: Location) -> Result<LocatedToken, LocatedError> {
    Ok(LocatedToken { token, location: loc })
}

/// An error from the lexical analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    InvalidChar,
}

/// A `LexError` with an associated Location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedError {
    pub error: LexError,
    pub location: Location,
}

/// Wrap up a `LexError` with the given location.
fn error<'a>(error: LexError, loc: Location) -> Result<LocatedToken<'a>, LocatedError> {
    Err(LocatedError { error, location: loc })
}

/// Lexical analysis.
///
/// A `Lexer` reads text from a `&str` and provides a sequence of tokens.
/// It also keeps track of a line number for error reporting.
pub struct Lexer<'a> {
    // Complete source being processed.
    source: &'a str,

    // Iterator into `source`.
    chars: CharIndices<'a>,

    // Next character to be processed, or `None` at the end.
    lookahead: Option<char>,

    // Index into `source` of lookahead character.
    pos: usize,

    // Current line number.
    line_number: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(s: &'a str) -> Self {
        let mut lex =
            Self { source: s, chars: s.char_indices(), lookahead: None, pos: 0, line_number: 1 };
        // Advance to the first char.
        lex.next_ch();
        lex
    }

    // Advance to the next character.
    // Return the next lookahead character, or None when the end is encountered.
    fn next_ch(&mut self) -> Option<char> {
        if self.lookahead == Some('\n') {
            self.line_number += 1;
        }
        match self.chars.next() {
            Some((idx, ch)) => {
                self.pos = idx;
                self.lookahead = Some(ch);
            }
            None => {
                self.pos = self.source.len();
                self.lookahead = None;
            }
        }
        self.lookahead
    }

    // Get the location corresponding to `lookahead`.
    fn loc(&self) -> Location {
        Location { line_number: self.line_number }
    }

    // Starting from `lookahead`, are we looking at `prefix`?
    fn looking_at(&self, prefix: &str) -> bool {
        self.source[self.pos..].starts_with(prefix)
    }

    // Scan a single-char token.
    fn scan_char(&mut self, tok: Token<'a>) -> Result<LocatedToken<'a>, LocatedError> {
        let loc = self.loc();
        self.next_ch();
        token(tok, loc)
    }

    // Scan a multi-char token.
    fn scan_chars(
        &mut self,
        count: usize,
        tok: Token<'a>,
    ) -> Result<LocatedToken<'a>, LocatedError> {
        let loc = self.loc();
        for _ in 0..count {
            self.next_ch();
        }
        token(tok, loc)
    }

    // Scan a comment extending to the end of the current line.
    fn scan_comment(&mut self) -> Result<LocatedToken<'a>, LocatedError> {
        let loc = self.loc();
        let begin = self.pos;
        loop {
            match self.next_ch() {
                None | Some('\n') => break,
                _ => {}
            }
        }
        token(Token::Comment(&self.source[begin..self.pos]), loc)
    }

    // Scan a number token which can represent either an integer or floating point number.
    //
    // Accept the following forms:
    //
    // - `10`, `-10`: Integer
    // - `0.5`, `-2.0`, `1e-3`: Float
    //
    // The text is not validated here, that happens when the parser decodes it.
    fn scan_number(&mut self) -> Result<LocatedToken<'a>, LocatedError> {
        let begin = self.pos;
        let loc = self.loc();
        let mut is_float = false;

        if self.lookahead == Some('-') && !matches!(self.next_ch(), Some('0'..='9' | '.')) {
            return error(LexError::InvalidChar, loc);
        }

        // Look for the end of this number. Detect the radix point and exponent.
        let mut prev = self.lookahead;
        loop {
            match prev {
                Some('.' | 'e' | 'E') => is_float = true,
                Some('-') if matches!(self.source[begin..self.pos].chars().last(), Some('e' | 'E')) => {}
                Some('_' | '0'..='9' | 'a'..='z' | 'A'..='Z') => {}
                _ => break,
            }
            prev = self.next_ch();
        }
        let text = &self.source[begin..self.pos];
        if is_float {
            token(Token::Float(text), loc)
        } else {
            token(Token::Integer(text), loc)
        }
    }

    // Scan a 'word', which is an identifier-like sequence of characters beginning with '_' or an
    // alphabetic char, followed by zero or more alphanumeric or '_' characters.
    fn scan_word(&mut self) -> Result<LocatedToken<'a>, LocatedError> {
        let begin = self.pos;
        let loc = self.loc();
        while let Some('_' | '0'..='9' | 'a'..='z' | 'A'..='Z') = self.next_ch() {}
        token(Token::Identifier(&self.source[begin..self.pos]), loc)
    }

    fn scan_name(&mut self) -> Result<LocatedToken<'a>, LocatedError> {
        let loc = self.loc();
        let begin = self.pos + 1;
        while matches!(self.next_ch(), Some('_' | '0'..='9' | 'a'..='z' | 'A'..='Z')) {}
        token(Token::Name(&self.source[begin..self.pos]), loc)
    }

    /// Get the next token or a lexical error.
    ///
    /// Return None when the end of the source is encountered.
    pub fn next(&mut self) -> Option<Result<LocatedToken<'a>, LocatedError>> {
        loop {
            let loc = self.loc();
            return match self.lookahead {
                None => None,
                Some(';') => Some(self.scan_comment()),
                Some('(') => Some(self.scan_char(Token::LPar)),
                Some(')') => Some(self.scan_char(Token::RPar)),
                Some('{') => Some(self.scan_char(Token::LBrace)),
                Some('}') => Some(self.scan_char(Token::RBrace)),
                Some('[') => Some(self.scan_char(Token::LBracket)),
                Some(']') => Some(self.scan_char(Token::RBracket)),
                Some(',') => Some(self.scan_char(Token::Comma)),
                Some(':') => Some(self.scan_char(Token::Colon)),
                Some('=') => Some(self.scan_char(Token::Equal)),
                Some('?') => Some(self.scan_char(Token::Question)),
                Some('0'..='9') => Some(self.scan_number()),
                Some('-') => {
                    if self.looking_at("->") {
                        Some(self.scan_chars(2, Token::Arrow))
                    } else {
                        Some(self.scan_number())
                    }
                }
                Some('_' | 'a'..='z' | 'A'..='Z') => Some(self.scan_word()),
                Some('%') => Some(self.scan_name()),
                // all ascii whitespace
                Some(' ' | '\x09'..='\x0d') => {
                    self.next_ch();
                    continue;
                }
                _ => {
                    // Skip invalid char, return error.
                    self.next_ch();
                    Some(error(LexError::InvalidChar, loc))
                }
            };
        }
    }
}
