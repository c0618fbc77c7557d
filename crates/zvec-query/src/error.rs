use zvec_error::{ErrorCodes, ZvecError};

/// Which stage of query processing raised an error (§7 "Parse").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Parse,
    Lower,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::Lower => "lower",
        })
    }
}

/// A single structured parse/lex/lowering failure, rendered per §7 as
/// `"<phase> error [<msg>]"`. `line`/`col` are 1-based and carried for
/// callers that want to surface a caret, even though the canonical
/// `Display` string does not include them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{phase} error [{message}]")]
pub struct QueryError {
    pub phase: Phase,
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl QueryError {
    pub fn lex(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            phase: Phase::Lex,
            message: message.into(),
            line,
            col,
        }
    }

    pub fn parse(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            phase: Phase::Parse,
            message: message.into(),
            line,
            col,
        }
    }

    pub fn lower(message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Lower,
            message: message.into(),
            line: 0,
            col: 0,
        }
    }
}

impl ZvecError for QueryError {
    fn code(&self) -> ErrorCodes {
        match self.phase {
            Phase::Lex | Phase::Parse => ErrorCodes::InvalidArgument,
            Phase::Lower => ErrorCodes::Internal,
        }
    }
}
