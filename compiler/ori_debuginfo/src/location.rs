//! Current-location tracking.
//!
//! The session owns a single "current location" slot: the `(scope, line,
//! column)` stamped on every instruction the code generator emits next.
//!
//! ```text
//!   set_current(s, Some(l)) ──▶ HasLocation { s, l }   builder: (node(s), l.line, l.col)
//!   set_current(s, None)    ──▶ HasLocation { s, - }   builder: (node(s), 0, 0)  artificial
//!   clear_current()         ──▶ NoLocation              builder: none
//! ```
//!
//! Nested emission contexts save and restore the slot through
//! [`push_and_clear`](DebugInfo::push_and_clear) / [`pop_location`](DebugInfo::pop_location),
//! or through the [`ArtificialLocation`] guard, which restores on every exit
//! path.

use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use crate::error::DebugInfoError;
use crate::metadata::{DebugLoc, MetadataBuilder, NodeId};
use crate::session::DebugInfo;
use crate::source::{ScopeId, ScopeKind, SourceLoc};

/// The scope half of a location frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameScope {
    /// A lexical scope of the source program.
    Lexical(ScopeId),
    /// A synthesized function with no lexical scope of its own.
    Artificial(NodeId),
}

/// A saved `(location, scope)` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationFrame {
    pub loc: Option<SourceLoc>,
    pub scope: Option<FrameScope>,
}

impl LocationFrame {
    /// No scope and no location.
    pub fn is_empty(&self) -> bool {
        self.scope.is_none() && self.loc.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct LocationState {
    /// What was last issued to the builder.
    pub(crate) current: LocationFrame,
    /// Frames saved by `push_and_clear`.
    pub(crate) stack: SmallVec<[LocationFrame; 8]>,
}

impl<'a, B: MetadataBuilder> DebugInfo<'a, B> {
    // -- Scope Resolution --

    /// Get or create the metadata scope for a lexical scope.
    ///
    /// Walks outward until a cached scope (or the root) is found, then
    /// creates the missing scopes from the outside in, so each ancestor has
    /// its parent node when it is created.
    pub fn resolve_scope(&mut self, scope: ScopeId) -> Result<NodeId, DebugInfoError> {
        let mut missing: SmallVec<[ScopeId; 8]> = SmallVec::new();
        let mut parent_node = None;
        let mut cursor = Some(scope);
        while let Some(s) = cursor {
            if let Some(node) = self.caches.scopes.get(&s, &self.builder) {
                parent_node = Some(node);
                break;
            }
            missing.push(s);
            cursor = self.scopes.parent(s);
        }

        for &s in missing.iter().rev() {
            let node = self.create_scope_node(s, parent_node)?;
            self.caches.scopes.insert(s, node);
            parent_node = Some(node);
        }

        // `missing` is empty only when `scope` itself was cached.
        Ok(parent_node.unwrap_or(self.compile_unit))
    }

    fn create_scope_node(
        &mut self,
        scope: ScopeId,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DebugInfoError> {
        let scopes = self.scopes;
        let data = scopes.get(scope);
        match &data.kind {
            ScopeKind::Block => {
                let (file, line) = self.file_and_line(data.loc.as_ref())?;
                let column = data.loc.as_ref().map_or(0, |l| l.column);
                let parent = parent.unwrap_or(self.compile_unit);
                tracing::debug!(?scope, line, "creating lexical block");
                Ok(self
                    .builder
                    .create_lexical_block(parent, file, line, column)?)
            }
            ScopeKind::Function { .. } => {
                tracing::debug!(?scope, "materializing function scope before its record");
                let node = self.create_subprogram(scope, parent, None, None)?;
                self.unsigned_subprograms.insert(scope);
                Ok(node)
            }
        }
    }

    // -- Location Setting --

    /// Make `(scope, loc)` the current location.
    ///
    /// Without `loc` the builder gets an artificial location: the scope is
    /// kept so inlining metadata stays valid, the line is 0. Re-issuing the
    /// current pair is a no-op.
    pub fn set_current(
        &mut self,
        scope: ScopeId,
        loc: Option<&SourceLoc>,
    ) -> Result<(), DebugInfoError> {
        self.set_current_frame(FrameScope::Lexical(scope), loc)
    }

    pub(crate) fn set_current_frame(
        &mut self,
        scope: FrameScope,
        loc: Option<&SourceLoc>,
    ) -> Result<(), DebugInfoError> {
        let current = &self.location.current;
        if current.scope == Some(scope) && current.loc.as_ref() == loc {
            tracing::trace!(?scope, "location unchanged, skipping");
            return Ok(());
        }

        let node = self.frame_scope_node(scope)?;
        let debug_loc = match loc {
            Some(l) => DebugLoc {
                line: l.line,
                column: l.column,
                scope: node,
            },
            None => DebugLoc::artificial(node),
        };
        self.builder.set_current_location(Some(debug_loc));
        self.location.current = LocationFrame {
            loc: loc.cloned(),
            scope: Some(scope),
        };
        Ok(())
    }

    /// The metadata scope a frame scope stands for.
    pub(crate) fn frame_scope_node(&mut self, scope: FrameScope) -> Result<NodeId, DebugInfoError> {
        match scope {
            FrameScope::Lexical(s) => self.resolve_scope(s),
            FrameScope::Artificial(node) => Ok(node),
        }
    }

    /// Reset to no location at all.
    pub fn clear_current(&mut self) {
        self.location.current = LocationFrame::default();
        self.builder.set_current_location(None);
    }

    /// The current `(location, scope)` pair.
    pub fn current_location(&self) -> &LocationFrame {
        &self.location.current
    }

    /// The current lexical scope, if any. `None` inside synthesized
    /// functions.
    pub fn current_scope(&self) -> Option<ScopeId> {
        match self.location.current.scope {
            Some(FrameScope::Lexical(scope)) => Some(scope),
            Some(FrameScope::Artificial(_)) | None => None,
        }
    }

    /// Number of saved frames.
    pub fn location_depth(&self) -> usize {
        self.location.stack.len()
    }

    /// Save the current pair and clear it.
    pub fn push_and_clear(&mut self) {
        let saved = std::mem::take(&mut self.location.current);
        self.location.stack.push(saved);
        self.builder.set_current_location(None);
    }

    /// Restore the most recently saved pair and re-issue it to the builder.
    ///
    /// # Panics
    ///
    /// Panics if nothing was saved. Unbalanced pops mean the code generator
    /// has lost track of its own emission contexts.
    pub fn pop_location(&mut self) {
        let Some(frame) = self.location.stack.pop() else {
            panic!("pop_location called with an empty location stack");
        };
        self.location.current = LocationFrame::default();
        let restored = match frame.scope {
            Some(scope) => self.set_current_frame(scope, frame.loc.as_ref()),
            None => {
                self.clear_current();
                Ok(())
            }
        };
        if let Err(err) = restored {
            // Tracker and builder both end with no location.
            tracing::warn!(%err, "failed to re-issue restored location");
            self.clear_current();
        }
    }

    /// Bracket synthetic code: save the current pair and switch to an
    /// artificial location in the current scope until the guard drops.
    pub fn artificial_location(&mut self) -> ArtificialLocation<'_, 'a, B> {
        let scope = self.location.current.scope;
        self.push_and_clear();
        if let Some(scope) = scope {
            if let Err(err) = self.set_current_frame(scope, None) {
                tracing::warn!(%err, "failed to set artificial location");
            }
        }
        ArtificialLocation { di: self }
    }

    /// Run `f` inside an artificial-location bracket.
    pub fn with_artificial_location<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut guard = self.artificial_location();
        f(&mut *guard)
    }
}

/// Scope guard returned by [`DebugInfo::artificial_location`].
///
/// Dereferences to the session so emission continues through it. Dropping
/// the guard restores the saved location, including on early return and
/// unwinding.
pub struct ArtificialLocation<'di, 'a, B: MetadataBuilder> {
    di: &'di mut DebugInfo<'a, B>,
}

impl<'a, B: MetadataBuilder> Deref for ArtificialLocation<'_, 'a, B> {
    type Target = DebugInfo<'a, B>;

    fn deref(&self) -> &Self::Target {
        self.di
    }
}

impl<B: MetadataBuilder> DerefMut for ArtificialLocation<'_, '_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.di
    }
}

impl<B: MetadataBuilder> Drop for ArtificialLocation<'_, '_, B> {
    fn drop(&mut self) {
        self.di.pop_location();
    }
}

#[cfg(test)]
mod tests;
