//! Failure-message classification for the retry loop.
//!
//! Maps a raw execution failure message onto a small taxonomy that decides
//! what the orchestrator does next: regenerate code, repair the plan, or
//! retry blindly. A keyword heuristic rather than semantic analysis;
//! misclassified messages fall to `Unknown` and stay inside the retry budget.

use serde::{Deserialize, Serialize};

/// Failure taxonomy driving the orchestrator's adaptation choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed code; cheap to retry by regenerating from the same plan
    Syntax,
    /// Code ran but produced the wrong thing; requires re-planning
    Logical,
    /// Timeout or memory-limit signal from the sandbox
    Resource,
    /// Anything else; retried blindly within the budget
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Logical => write!(f, "logical"),
            Self::Resource => write!(f, "resource"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Fixed vocabulary, checked in order; first match wins.
///
/// Resource signals come first so that a sandbox timeout report that also
/// quotes the failing code never lands in the syntax bucket.
const VOCABULARY: &[(&str, ErrorKind)] = &[
    ("timed out", ErrorKind::Resource),
    ("timeout", ErrorKind::Resource),
    ("memoryerror", ErrorKind::Resource),
    ("out of memory", ErrorKind::Resource),
    ("memory limit", ErrorKind::Resource),
    ("recursionerror", ErrorKind::Resource),
    ("syntax error", ErrorKind::Syntax),
    ("syntaxerror", ErrorKind::Syntax),
    ("indentationerror", ErrorKind::Syntax),
    ("invalid syntax", ErrorKind::Syntax),
    ("logical error", ErrorKind::Logical),
    ("logic error", ErrorKind::Logical),
    ("assertionerror", ErrorKind::Logical),
    ("wrong result", ErrorKind::Logical),
];

/// Deterministic keyword classifier over failure messages.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a failure message. Case-insensitive substring match against
    /// the fixed vocabulary; unmatched messages are `Unknown`.
    pub fn classify(&self, message: &str) -> ErrorKind {
        let lowered = message.to_lowercase();
        for (needle, kind) in VOCABULARY {
            if lowered.contains(needle) {
                return *kind;
            }
        }
        ErrorKind::Unknown
    }
}
