//! Query context classification: request shape -> context kind.

use crate::error::ClassificationError;
use crate::request::{MutationKind, OperationKind, RequestShape};
use serde::{Deserialize, Serialize};

/// Query-generation strategy: List/Single/Count, flat or via navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextKind {
    Select,
    SelectSingle,
    SelectCount,
    Join,
    JoinSingle,
    JoinCount,
}

impl ContextKind {
    pub fn operation(self) -> OperationKind {
        match self {
            ContextKind::Select | ContextKind::Join => OperationKind::List,
            ContextKind::SelectSingle | ContextKind::JoinSingle => OperationKind::Single,
            ContextKind::SelectCount | ContextKind::JoinCount => OperationKind::Count,
        }
    }

    pub fn is_navigation(self) -> bool {
        matches!(
            self,
            ContextKind::Join | ContextKind::JoinSingle | ContextKind::JoinCount
        )
    }

    /// Only collection contexts receive a server-side paging hint
    pub fn supports_paging(self) -> bool {
        matches!(self, ContextKind::Select | ContextKind::Join)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Select => "SELECT",
            ContextKind::SelectSingle => "SELECT_SINGLE",
            ContextKind::SelectCount => "SELECT_COUNT",
            ContextKind::Join => "JOIN",
            ContextKind::JoinSingle => "JOIN_SINGLE",
            ContextKind::JoinCount => "JOIN_COUNT",
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request. Write operations never produce a context kind.
pub fn classify(
    navigation_present: bool,
    operation: OperationKind,
    mutation: MutationKind,
) -> Result<ContextKind, ClassificationError> {
    match mutation {
        MutationKind::None => {}
        MutationKind::Delete => {
            return Err(ClassificationError::UnsupportedMutation("Delete".to_string()))
        }
        MutationKind::Update => {
            return Err(ClassificationError::UnsupportedMutation("Update".to_string()))
        }
    }

    Ok(match (navigation_present, operation) {
        (false, OperationKind::List) => ContextKind::Select,
        (false, OperationKind::Single) => ContextKind::SelectSingle,
        (false, OperationKind::Count) => ContextKind::SelectCount,
        (true, OperationKind::List) => ContextKind::Join,
        (true, OperationKind::Single) => ContextKind::JoinSingle,
        (true, OperationKind::Count) => ContextKind::JoinCount,
    })
}

/// Classify a full request shape
pub fn classify_request(shape: &RequestShape) -> Result<ContextKind, ClassificationError> {
    classify(shape.has_navigation(), shape.operation, shape.mutation)
}
