//! Compile error taxonomy.
//!
//! Template failures are per-file recoverable; style and script failures
//! abort the whole build and clear the matching bundle health flag.

use thiserror::Error;

/// A failed compiler adapter invocation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("template `{file}` failed: {detail}")]
    Template { file: String, detail: String },

    #[error("style compilation failed: {detail}")]
    Style { detail: String },

    #[error("script compilation failed: {detail}")]
    Script { detail: String },
}

impl CompileError {
    /// Stage label used in log lines.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Style { .. } => "style",
            Self::Script { .. } => "script",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        let err = CompileError::Template {
            file: "index.pug".into(),
            detail: "unexpected token".into(),
        };
        assert_eq!(err.stage(), "template");
        assert!(err.to_string().contains("index.pug"));

        assert_eq!(
            CompileError::Style {
                detail: String::new()
            }
            .stage(),
            "style"
        );
        assert_eq!(
            CompileError::Script {
                detail: String::new()
            }
            .stage(),
            "script"
        );
    }
}
