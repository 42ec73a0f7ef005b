// Compiler Error Handling
//
// Two channels: `CompilerError` aborts compilation, `SemanticError` is recorded
// and compilation continues so several diagnostics come out of one pass.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    // Lexical errors
    LexicalError(String, usize), // message, line
    LexicalErrors(Vec<CompilerError>),

    // Parse errors
    SyntaxError(String, usize), // message, line

    // Dispatcher / grammar contract violations
    UnknownAction(String),
    Internal(String),

    // Configuration errors
    ConfigError(String),

    // IO errors
    IOError(String),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::LexicalError(msg, line) => {
                write!(f, "Lexical error at line {}: {}", line, msg)
            }
            CompilerError::LexicalErrors(errors) => {
                let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", lines.join("\n"))
            }
            CompilerError::SyntaxError(msg, line) => {
                write!(f, "Syntax error at line {}: {}", line, msg)
            }
            CompilerError::UnknownAction(name) => {
                write!(f, "Unknown semantic action '{}'", name)
            }
            CompilerError::Internal(msg) => {
                write!(f, "Internal compiler error: {}", msg)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CompilerError::IOError(msg) => {
                write!(f, "IO error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IOError(err.to_string())
    }
}

impl CompilerError {
    pub fn internal(msg: impl Into<String>) -> Self {
        CompilerError::Internal(msg.into())
    }
}

/// A user-facing diagnostic recorded during code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub line: usize,
    pub message: String,
}

impl SemanticError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        SemanticError {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}: Semantic Error! {}", self.line, self.message)
    }
}
