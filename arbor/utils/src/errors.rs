//! Errors generated by the arbor middle-end.
//!
//! Internal consistency violations (malformed nodes, mixed iteration vectors,
//! inconsistent accesses) are reported through this type by the checked
//! `try_*` entry points; the asserting entry points turn them into panics.
use thiserror::Error as ThisError;

/// Convinience wrapper to represent success or meaningful arbor error.
pub type ArborResult<T> = std::result::Result<T, Error>;

/// An error raised while building, navigating or analysing the IR.
///
/// The kind is boxed to keep `ArborResult` small on the hot paths.
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

/// Standard error type for arbor errors.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A node was requested with a child list violating its kind's contract.
    #[error("malformed `{kind}' node: {msg}")]
    MalformedNode { kind: String, msg: String },
    /// Navigation left the addressed tree.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Leaves of one constraint tree use different iteration vectors.
    #[error("iteration vector mismatch: {0}")]
    IterVecMismatch(String),
    /// An expression could not be interpreted as an affine function.
    #[error("expression is not affine: {0}")]
    NotAffine(String),
    /// Two accesses to the same variable disagree on how it is accessed.
    #[error("inconsistent access kinds for `{var}': {first} vs {second}")]
    AccessKindMismatch {
        var: String,
        first: String,
        second: String,
    },
    /// The requested operation is deliberately not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A catch-all error.
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn malformed_node<K: ToString, S: ToString>(kind: K, msg: S) -> Self {
        Self::from_kind(ErrorKind::MalformedNode {
            kind: kind.to_string(),
            msg: msg.to_string(),
        })
    }

    pub fn invalid_address<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::InvalidAddress(msg.to_string()))
    }

    pub fn iter_vec_mismatch<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::IterVecMismatch(msg.to_string()))
    }

    pub fn not_affine<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::NotAffine(msg.to_string()))
    }

    pub fn access_kind_mismatch<V, A, B>(var: V, first: A, second: B) -> Self
    where
        V: ToString,
        A: ToString,
        B: ToString,
    {
        Self::from_kind(ErrorKind::AccessKindMismatch {
            var: var.to_string(),
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    pub fn unsupported<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Unsupported(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Misc(msg.to_string()))
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::fmt::Error> for Error {
    fn from(_: std::fmt::Error) -> Self {
        Error::misc("failed to format output")
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::misc(format!("IO error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn display_includes_post_message() {
        let err = Error::invalid_address("child 4 of node with 2 children")
            .with_post_msg(Some("while navigating 0-1".to_string()));
        assert_eq!(
            err.to_string(),
            "invalid address: child 4 of node with 2 children\nwhile navigating 0-1"
        );
        assert!(matches!(err.kind(), ErrorKind::InvalidAddress(_)));
    }
}
