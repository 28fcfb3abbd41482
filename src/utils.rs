use std::io;
use thiserror::Error;

/// Errors raised while loading or constructing a grammar
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Malformed grammar: {0}")]
    MalformedGrammar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GrammarError>;

/// Failure of a single derivation. The grammar itself is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("dead end: no production for non-terminal {nonterminal}")]
    DeadEnd { nonterminal: String },

    #[error("derivation did not terminate within {max_steps} steps")]
    DepthExceeded { max_steps: usize },

    #[error("choice source returned index {index} for {candidates} candidates")]
    InvalidChoice { index: usize, candidates: usize },
}

/// Trait extension for Option<T> to convert to GrammarError
pub trait OptionExt<T> {
    fn ok_or_malformed<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| GrammarError::MalformedGrammar(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GrammarError::Parse {
            line: 3,
            message: "unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error on line 3: unexpected token");

        let err = GenerationError::DepthExceeded { max_steps: 7 };
        assert_eq!(
            err.to_string(),
            "derivation did not terminate within 7 steps"
        );
    }

    #[test]
    fn test_ok_or_malformed() {
        let missing: Option<u8> = None;
        let err = missing.ok_or_malformed(|| "nothing here".to_string());
        assert!(matches!(err, Err(GrammarError::MalformedGrammar(m)) if m == "nothing here"));
        assert_eq!(Some(1).ok_or_malformed(String::new).unwrap(), 1);
    }
}
