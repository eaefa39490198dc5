//! Source locations and lexical scopes.
//!
//! These are the inputs the surrounding compiler stage hands to the emitter:
//! where things are ([`SourceLoc`], resolved through [`SourceMap`]) and how
//! scopes nest ([`ScopeTree`]). The emitter references scopes by [`ScopeId`]
//! and never owns them.

use std::path::Path;
use std::sync::Arc;

/// A point in source text. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
    pub file: Arc<Path>,
}

impl SourceLoc {
    pub fn new(file: impl AsRef<Path>, line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            file: Arc::from(file.as_ref()),
        }
    }
}

/// Byte offset to line/column conversion for one file.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Byte offset where each line starts; `line_starts[0]` is always 0.
    line_starts: Vec<u32>,
}

impl LineMap {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                source
                    .bytes()
                    .enumerate()
                    .filter(|&(_, b)| b == b'\n')
                    .map(|(i, _)| u32::try_from(i + 1).unwrap_or(u32::MAX)),
            )
            .collect();
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based `(line, column)`.
    #[must_use]
    pub fn offset_to_line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line = u32::try_from(line_idx + 1).unwrap_or(u32::MAX);
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// A file registered with a [`SourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(u32);

/// Source-location provider: maps `(file, byte offset)` to [`SourceLoc`].
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<(Arc<Path>, LineMap)>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, source: &str) -> FileId {
        let id = FileId(u32::try_from(self.files.len()).unwrap_or(u32::MAX));
        self.files
            .push((Arc::from(path.as_ref()), LineMap::new(source)));
        id
    }

    pub fn path(&self, file: FileId) -> Option<&Path> {
        self.files.get(file.0 as usize).map(|(path, _)| &**path)
    }

    /// Resolve a byte offset. Unknown files yield no location, which the
    /// emitter treats as synthetic code.
    pub fn location(&self, file: FileId, offset: u32) -> Option<SourceLoc> {
        let (path, lines) = self.files.get(file.0 as usize)?;
        let (line, column) = lines.offset_to_line_col(offset);
        Some(SourceLoc {
            line,
            column,
            file: Arc::clone(path),
        })
    }
}

/// A lexical scope owned by the surrounding compiler stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a lexical scope is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// The body of a function.
    Function {
        name: String,
        linkage_name: Option<String>,
        /// Mangled namespace path of the declaring context.
        context: Option<String>,
    },
    /// A nested block inside a function.
    Block,
}

/// One entry of a [`ScopeTree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// Where the scope opens; `None` for compiler-synthesized scopes.
    pub loc: Option<SourceLoc>,
}

/// Arena of lexical scopes with parent links.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn add(&mut self, data: ScopeData) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        self.scopes.push(data);
        id
    }

    /// Add a function scope. `parent` is set for closures nested in another
    /// function.
    pub fn add_function(
        &mut self,
        name: &str,
        linkage_name: Option<&str>,
        loc: Option<SourceLoc>,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        self.add(ScopeData {
            parent,
            kind: ScopeKind::Function {
                name: name.to_owned(),
                linkage_name: linkage_name.map(str::to_owned),
                context: None,
            },
            loc,
        })
    }

    pub fn add_block(&mut self, parent: ScopeId, loc: Option<SourceLoc>) -> ScopeId {
        self.add(ScopeData {
            parent: Some(parent),
            kind: ScopeKind::Block,
            loc,
        })
    }

    /// # Panics
    ///
    /// Panics if `scope` was not issued by this tree.
    pub fn get(&self, scope: ScopeId) -> &ScopeData {
        &self.scopes[scope.index()]
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.get(scope).parent
    }

    /// The innermost function scope containing `scope` (possibly itself).
    pub fn enclosing_function(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if matches!(self.get(s).kind, ScopeKind::Function { .. }) {
                return Some(s);
            }
            current = self.parent(s);
        }
        None
    }
}

#[cfg(test)]
mod tests;
