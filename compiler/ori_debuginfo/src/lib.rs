//! Debug information emission for Ori.
//!
//! Translates lexical scopes, source locations, and types into a
//! deduplicated metadata graph that a debugger uses to map generated code
//! back to source. Everything is written through the [`MetadataBuilder`]
//! seam; [`MetadataGraph`] is the in-memory builder.
//!
//! # Components
//!
//! - **Identity caches** (`cache.rs`): weak, liveness-checked maps from
//!   scopes, files, types, namespaces, and linkage names to nodes
//! - **Location tracker** (`location.rs`): the current `(scope, location)`
//!   slot, its save/restore stack, and the [`ArtificialLocation`] guard
//! - **Type translator** (`translate.rs`): [`TypeDescriptor`] to type node,
//!   with forward declarations for recursive types
//! - **Namespace resolver** (`namespace.rs`): mangled paths to nested
//!   namespace nodes
//! - **Emitter** (`emit.rs`): function, variable, global, type-metadata, and
//!   import records
//!
//! All of them are methods on [`DebugInfo`], the per-compile-unit session.
//!
//! # Example
//!
//! ```ignore
//! use ori_debuginfo::{DebugInfo, DebugInfoConfig, MetadataGraph, ScopeTree, SourceLoc, TypePool};
//!
//! let types = TypePool::new();
//! let mut scopes = ScopeTree::new();
//! let start = SourceLoc::new("main.ori", 1, 1);
//! let main = scopes.add_function("main", Some("_ori_main"), Some(start), None);
//!
//! let mut di = DebugInfo::new(
//!     MetadataGraph::new(),
//!     DebugInfoConfig::development(),
//!     Path::new("main.ori"),
//!     Path::new("/src"),
//!     &types,
//!     &scopes,
//! )?;
//! di.set_current(main, Some(&SourceLoc::new("main.ori", 2, 5)))?;
//! let graph = di.finalize()?;
//! ```
//!
//! # Debugging
//!
//! - `RUST_LOG=ori_debuginfo=debug` - node creation and cache misses
//! - `RUST_LOG=ori_debuginfo=trace` - also skipped (redundant) locations

#![allow(
    // Record constructors thread scope, file, line, and layout through
    clippy::too_many_arguments,
    // Panics are location-stack contract violations
    clippy::missing_panics_doc,
    // Most Result returns are builder contract violations
    clippy::missing_errors_doc,
)]

pub mod cache;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod ir;
pub mod location;
pub mod metadata;
pub mod namespace;
pub mod source;
pub mod translate;
pub mod types;

mod session;

#[cfg(test)]
mod test_helpers;

pub use cache::{CacheStats, IdentityCaches, SyntheticType, WeakCache};
pub use config::{DebugFormat, DebugInfoConfig, DebugLevel};
pub use emit::{ArtificialKind, IndirectionKind, VariableInfo};
pub use error::{DebugInfoError, ManglingError, MetadataError};
pub use graph::{Composite, IntrinsicCall, MetadataGraph, Node};
pub use ir::{FunctionId, IrFunction, ValueId};
pub use location::{ArtificialLocation, FrameScope, LocationFrame};
pub use metadata::{
    CallingConvention, CompositeKind, DIFlags, DebugLoc, ExprOp, IntrinsicKind, MetadataBuilder,
    NodeId, TypeEncoding, VariableTag,
};
pub use namespace::{demangle_path, mangle_path};
pub use session::DebugInfo;
pub use source::{LineMap, ScopeId, ScopeKind, ScopeTree, SourceLoc, SourceMap};
pub use translate::PLACEHOLDER_TYPE_NAME;
pub use types::{EnumCase, Field, Nominal, TypeDescriptor, TypeId, TypePool};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
