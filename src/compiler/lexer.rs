// C-minus Lexer
// Tokenizes source text into classified tokens for the parser and the code generator

use crate::compiler::error::CompilerError;
use std::fmt;

pub const KEYWORDS: [&str; 8] = [
    "if", "else", "void", "int", "repeat", "break", "until", "return",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Num,
    Id,
    Keyword,
    Symbol,
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Num => "NUM",
            TokenKind::Id => "ID",
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Symbol => "SYMBOL",
            TokenKind::End => "END",
        };
        write!(f, "{}", name)
    }
}

/// Lookahead token handed to every semantic action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub lexeme: String,
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, kind: TokenKind, line: usize) -> Self {
        Token {
            lexeme: lexeme.into(),
            kind,
            line,
        }
    }

    pub fn end(line: usize) -> Self {
        Token::new("$", TokenKind::End, line)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.lexeme == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == keyword
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.kind, self.lexeme)
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            line: 1,
            current_char,
        }
    }

    /// Tokenize the whole input. A single lexical error comes back as
    /// `LexicalError`, several as `LexicalErrors` in source order.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let (tokens, mut errors) = self.scan();
        match errors.len() {
            0 => Ok(tokens),
            1 => Err(errors.remove(0)),
            _ => Err(CompilerError::LexicalErrors(errors)),
        }
    }

    /// Panic mode: an invalid lexeme is reported and skipped, and scanning
    /// resumes right after it
    pub fn scan(&mut self) -> (Vec<Token>, Vec<CompilerError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            match self.next_token() {
                Ok(token) => {
                    let done = token.kind == TokenKind::End;
                    tokens.push(token);
                    if done {
                        break;
                    }
                }
                Err(err) => {
                    log::debug!("LEXER: {}", err);
                    errors.push(err);
                }
            }
        }

        log::debug!(
            "LEXER: produced {} tokens, {} lexical errors",
            tokens.len(),
            errors.len()
        );
        (tokens, errors)
    }

    fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.skip_trivia()?;

        let line = self.line;
        let ch = match self.current_char {
            None => return Ok(Token::end(line)),
            Some(ch) => ch,
        };

        let token = match ch {
            ';' | ':' | ',' | '[' | ']' | '(' | ')' | '{' | '}' | '+' | '-' | '<' => {
                self.advance();
                Token::new(ch.to_string(), TokenKind::Symbol, line)
            }
            '=' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new("==", TokenKind::Symbol, line)
                } else {
                    Token::new("=", TokenKind::Symbol, line)
                }
            }
            '*' => {
                self.advance();
                if self.current_char == Some('/') {
                    self.advance();
                    return Err(CompilerError::LexicalError(
                        "Unmatched comment '*/'".to_string(),
                        line,
                    ));
                }
                Token::new("*", TokenKind::Symbol, line)
            }
            ch if ch.is_ascii_digit() => {
                let number = self.read_while(|c| c.is_ascii_digit());
                if let Some(c) = self.current_char {
                    if c.is_ascii_alphabetic() {
                        let tail = self.read_while(|c| c.is_ascii_alphanumeric());
                        return Err(CompilerError::LexicalError(
                            format!("Invalid number '{}{}'", number, tail),
                            line,
                        ));
                    }
                }
                Token::new(number, TokenKind::Num, line)
            }
            ch if ch.is_ascii_alphabetic() => {
                let word = self.read_while(|c| c.is_ascii_alphanumeric());
                let kind = if KEYWORDS.contains(&word.as_str()) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Id
                };
                Token::new(word, kind, line)
            }
            ch => {
                self.advance();
                return Err(CompilerError::LexicalError(
                    format!("Invalid input '{}'", ch),
                    line,
                ));
            }
        };

        Ok(token)
    }

    fn skip_trivia(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.current_char {
                Some(c) if c.is_whitespace() => self.advance(),
                Some('/') => match self.peek() {
                    Some('*') => self.skip_block_comment()?,
                    Some('/') => self.skip_line_comment(),
                    _ => {
                        let line = self.line;
                        self.advance();
                        return Err(CompilerError::LexicalError(
                            "Invalid input '/'".to_string(),
                            line,
                        ));
                    }
                },
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), CompilerError> {
        let start_line = self.line;
        // consume "/*"
        self.advance();
        self.advance();
        loop {
            match self.current_char {
                None => {
                    return Err(CompilerError::LexicalError(
                        "Unclosed comment".to_string(),
                        start_line,
                    ))
                }
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.current_char {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.advance();
        }
        out
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char {
            self.line += 1;
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
