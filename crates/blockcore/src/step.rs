use crate::{ConnectionType, HandlerError};
use serde::{Deserialize, Serialize};

/// A handler's verdict for one visited block.
///
/// `is_error` selects the `Error` edge; it is a branch signal, not a failure
/// of the run. `branch_key`, when present, overrides the Success/Error
/// choice and is matched against connection labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub is_error: bool,
    pub description: String,
    pub branch_key: Option<String>,
}

impl StepResult {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            is_error: false,
            description: description.into(),
            branch_key: None,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            is_error: true,
            description: description.into(),
            branch_key: None,
        }
    }

    pub fn branch(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            is_error: false,
            description: description.into(),
            branch_key: Some(key.into()),
        }
    }

    /// Fold a handler failure into an error result, prefixed with context.
    pub fn from_error(context: &str, error: &HandlerError) -> Self {
        Self::error(format!("{}: {}", context, error))
    }

    /// The branch the engine should follow.
    pub fn desired_branch(&self) -> Branch<'_> {
        match &self.branch_key {
            Some(key) => Branch::Label(key),
            None if self.is_error => Branch::Type(ConnectionType::Error),
            None => Branch::Type(ConnectionType::Success),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch<'a> {
    Type(ConnectionType),
    Label(&'a str),
}

impl std::fmt::Display for Branch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Type(t) => f.write_str(t.as_str()),
            Branch::Label(l) => write!(f, "'{}'", l),
        }
    }
}
