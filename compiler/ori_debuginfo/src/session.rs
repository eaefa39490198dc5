//! `DebugInfo` struct definition, constructor, file resolution, and
//! finalization.
//!
//! The other halves of the session live next to the component they
//! implement: `location` (tracker), `translate` (types), `namespace`,
//! and `emit` (functions and variables).

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::cache::IdentityCaches;
use crate::config::DebugInfoConfig;
use crate::error::DebugInfoError;
use crate::ir::ArgCursor;
use crate::location::LocationState;
use crate::metadata::{CompileUnitRecord, MetadataBuilder, NodeId};
use crate::source::{ScopeId, ScopeTree, SourceLoc};
use crate::types::TypePool;

/// Debug info emission session for one compilation unit.
///
/// Owns the metadata builder until [`finalize`](Self::finalize) hands it
/// back. Every emission entry point takes `&mut self`: the session is the
/// single writer of the "current location" slot and of the caches.
pub struct DebugInfo<'a, B: MetadataBuilder> {
    pub(crate) builder: B,
    pub(crate) config: DebugInfoConfig,
    pub(crate) types: &'a TypePool,
    pub(crate) scopes: &'a ScopeTree,
    pub(crate) compile_unit: NodeId,
    pub(crate) main_file: NodeId,
    /// Directory relative paths are resolved against.
    pub(crate) directory: PathBuf,
    pub(crate) caches: IdentityCaches,
    pub(crate) location: LocationState,
    pub(crate) arg_cursor: Option<ArgCursor>,
    /// Function scopes whose subprogram was created from a body location,
    /// before `emit_function` supplied the signature.
    pub(crate) unsigned_subprograms: FxHashSet<ScopeId>,
}

impl<'a, B: MetadataBuilder> DebugInfo<'a, B> {
    /// Start a session: create the main file and the compile unit.
    ///
    /// # Arguments
    ///
    /// * `builder` - The metadata builder that will own every node
    /// * `config` - Debug info configuration
    /// * `main_file` - The main source file (absolute or relative to `directory`)
    /// * `directory` - The compilation directory
    /// * `types` - Type-descriptor provider
    /// * `scopes` - Lexical scope provider
    ///
    /// # Errors
    ///
    /// Returns `DebugInfoError::Disabled` when `config.level` is `None`.
    pub fn new(
        mut builder: B,
        config: DebugInfoConfig,
        main_file: &Path,
        directory: &Path,
        types: &'a TypePool,
        scopes: &'a ScopeTree,
    ) -> Result<Self, DebugInfoError> {
        if !config.level.is_enabled() {
            return Err(DebugInfoError::Disabled);
        }

        let mut caches = IdentityCaches::default();
        let main_path = absolute(directory, main_file);
        let main = caches
            .files
            .lookup_or_create(main_path.clone(), &mut builder, |b| {
                create_file_node(b, &main_path)
            })?;
        let compile_unit = builder.create_compile_unit(CompileUnitRecord {
            file: main,
            producer: &config.producer,
            optimized: config.optimized,
            dwarf_version: config.dwarf_version,
            format: config.format,
        })?;

        tracing::debug!(
            file = %main_path.display(),
            level = %config.level,
            format = %config.format,
            "debug info session started"
        );

        Ok(Self {
            builder,
            config,
            types,
            scopes,
            compile_unit,
            main_file: main,
            directory: directory.to_path_buf(),
            caches,
            location: LocationState::default(),
            arg_cursor: None,
            unsigned_subprograms: FxHashSet::default(),
        })
    }

    pub fn compile_unit(&self) -> NodeId {
        self.compile_unit
    }

    pub fn main_file(&self) -> NodeId {
        self.main_file
    }

    pub fn config(&self) -> &DebugInfoConfig {
        &self.config
    }

    pub fn caches(&self) -> &IdentityCaches {
        &self.caches
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Mutable access to the builder, for collaborators that post-process
    /// the graph mid-session (merging, replacing placeholders).
    pub fn builder_mut(&mut self) -> &mut B {
        &mut self.builder
    }

    /// Get or create the file node for `path`. Relative paths are taken
    /// relative to the compilation directory.
    pub fn file(&mut self, path: &Path) -> Result<NodeId, DebugInfoError> {
        let path = absolute(&self.directory, path);
        let node = self
            .caches
            .files
            .lookup_or_create(path.clone(), &mut self.builder, |b| {
                create_file_node(b, &path)
            })?;
        Ok(node)
    }

    /// File node and line for an optional location. Synthetic code lands in
    /// the main file at line 0.
    pub(crate) fn file_and_line(
        &mut self,
        loc: Option<&SourceLoc>,
    ) -> Result<(NodeId, u32), DebugInfoError> {
        match loc {
            Some(loc) => Ok((self.file(&loc.file)?, loc.line)),
            None => Ok((self.main_file, 0)),
        }
    }

    /// Seal the metadata graph and hand the builder back.
    ///
    /// Consuming the session makes every later lookup a compile error.
    pub fn finalize(mut self) -> Result<B, DebugInfoError> {
        if self.location_depth() != 0 {
            tracing::warn!(
                depth = self.location_depth(),
                "location stack not balanced at finalization"
            );
        }
        self.builder.seal()?;
        tracing::debug!(
            types = self.caches.types.len(),
            scopes = self.caches.scopes.len(),
            files = self.caches.files.len(),
            "debug info finalized"
        );
        Ok(self.builder)
    }
}

fn absolute(directory: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        directory.join(path)
    }
}

fn create_file_node<B: MetadataBuilder + ?Sized>(
    builder: &mut B,
    path: &Path,
) -> Result<NodeId, DebugInfoError> {
    let name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy());
    let dir = path
        .parent()
        .map_or_else(|| ".".into(), Path::to_string_lossy);
    tracing::debug!(file = %path.display(), "creating file node");
    Ok(builder.create_file(&name, &dir)?)
}
