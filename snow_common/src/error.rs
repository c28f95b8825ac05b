//! Error handling utilities for the Snow compiler and VM

use thiserror::Error;

/// The main error type threaded through the compiler pipeline and VM.
#[derive(Error, Debug, Clone)]
pub enum SnowError {
    #[error("lex error: {message}")]
    LexError { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("semantic error: {message}")]
    SemanticError { message: String },

    #[error("build error: {message}")]
    BuildError { message: String },

    #[error("codegen error: {message}")]
    CodegenError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("config error: {message}")]
    ConfigError { message: String },

    #[error("runtime error: {message}")]
    RuntimeError { message: String },

    #[error("syscall error: {message}")]
    SyscallError { message: String },
}

pub type SnowResult<T> = Result<T, SnowError>;

impl SnowError {
    pub fn lex_error(message: impl Into<String>) -> Self {
        Self::LexError { message: message.into() }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    pub fn semantic_error(message: impl Into<String>) -> Self {
        Self::SemanticError { message: message.into() }
    }

    pub fn build_error(message: impl Into<String>) -> Self {
        Self::BuildError { message: message.into() }
    }

    pub fn codegen_error(message: impl Into<String>) -> Self {
        Self::CodegenError { message: message.into() }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::RuntimeError { message: message.into() }
    }

    pub fn syscall_error(message: impl Into<String>) -> Self {
        Self::SyscallError { message: message.into() }
    }
}

impl From<std::io::Error> for SnowError {
    fn from(e: std::io::Error) -> Self {
        SnowError::io_error(e.to_string())
    }
}
