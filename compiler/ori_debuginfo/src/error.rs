//! Error types for debug info emission.
//!
//! Only contract violations surface as errors. Translation gaps (an
//! unrepresentable type, an unnumbered argument, a stale cache entry) are
//! absorbed by the emitter and logged; see `DebugInfoError::Unrepresentable`
//! for the one recoverable variant that callers of the type translator see.

use crate::metadata::NodeId;
use crate::source::ScopeId;

/// Contract violation reported by a [`MetadataBuilder`](crate::MetadataBuilder).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// A node was requested after the graph was sealed.
    #[error("metadata graph is sealed; cannot create {what}")]
    Sealed { what: &'static str },
    /// A handle that the builder never issued.
    #[error("metadata node {node:?} does not exist")]
    UnknownNode { node: NodeId },
    /// `finalize_composite` on something that is not a composite.
    #[error("metadata node {node:?} is not a forward-declared composite")]
    NotForwardDecl { node: NodeId },
    /// A forward declaration resolved a second time.
    #[error("composite '{name}' was already finalized")]
    AlreadyFinalized { name: String },
    /// Sealing with a forward declaration still open.
    #[error("forward declaration '{name}' was never resolved")]
    UnresolvedForwardDecl { name: String },
}

/// Malformed mangled namespace path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManglingError {
    #[error("empty mangled path")]
    Empty,
    #[error("expected a length prefix at offset {offset} in '{mangled}'")]
    MissingLength { mangled: String, offset: usize },
    #[error("component at offset {offset} in '{mangled}' runs past the end")]
    Truncated { mangled: String, offset: usize },
}

/// Error type for debug info emission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DebugInfoError {
    /// Debug info is disabled by configuration.
    #[error("debug info is disabled")]
    Disabled,
    /// A source type has no debug-type mapping. Recoverable: callers substitute
    /// a placeholder or skip the record.
    #[error("type '{mangled}' has no debug representation: {reason}")]
    Unrepresentable { mangled: String, reason: &'static str },
    /// A function entry point was handed a scope with no enclosing function.
    #[error("scope {scope:?} is not inside a function")]
    NotAFunctionScope { scope: ScopeId },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Mangling(#[from] ManglingError),
}

impl DebugInfoError {
    /// Whether the emitter may recover by degrading output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unrepresentable { .. } | Self::Mangling(_))
    }
}

/// Create a `DebugInfoError::Unrepresentable` error (cold path).
#[cold]
#[inline(never)]
pub(crate) fn unrepresentable(mangled: &str, reason: &'static str) -> DebugInfoError {
    DebugInfoError::Unrepresentable {
        mangled: mangled.to_string(),
        reason,
    }
}
