//! Namespace resolution.
//!
//! Qualified names arrive mangled as a sequence of length-prefixed
//! components: `std.io.File` is `3std2io4File`. Every prefix of a mangled
//! path is itself a valid mangled path, which is what the namespace cache is
//! keyed by: `3std2io4File` and `3std2io6Reader` share the `3std` and
//! `3std2io` nodes.

use std::fmt::Write as _;

use smallvec::SmallVec;

use crate::error::{DebugInfoError, ManglingError};
use crate::metadata::{MetadataBuilder, NodeId};
use crate::session::DebugInfo;

/// Mangle a qualified path.
pub fn mangle_path<S: AsRef<str>>(components: &[S]) -> String {
    let mut out = String::new();
    for component in components {
        let component = component.as_ref();
        // Writing to a `String` cannot fail.
        let _ = write!(out, "{}{component}", component.len());
    }
    out
}

/// Split a mangled path into `(component, end offset)` pairs.
fn split_mangled(mangled: &str) -> Result<SmallVec<[(&str, usize); 4]>, ManglingError> {
    if mangled.is_empty() {
        return Err(ManglingError::Empty);
    }

    let bytes = mangled.as_bytes();
    let mut parts = SmallVec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let digits = bytes[offset..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let len = mangled[offset..offset + digits]
            .parse::<usize>()
            .ok()
            .filter(|&len| len > 0)
            .ok_or_else(|| ManglingError::MissingLength {
                mangled: mangled.to_owned(),
                offset,
            })?;
        let start = offset + digits;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= mangled.len() && mangled.is_char_boundary(end))
            .ok_or_else(|| ManglingError::Truncated {
                mangled: mangled.to_owned(),
                offset: start,
            })?;
        parts.push((&mangled[start..end], end));
        offset = end;
    }
    Ok(parts)
}

/// Split a mangled path into its components.
pub fn demangle_path(mangled: &str) -> Result<Vec<&str>, ManglingError> {
    Ok(split_mangled(mangled)?
        .into_iter()
        .map(|(component, _)| component)
        .collect())
}

impl<B: MetadataBuilder> DebugInfo<'_, B> {
    /// Get or create the namespace node for a mangled path, creating each
    /// missing ancestor root first.
    pub fn resolve_namespace(&mut self, mangled: &str) -> Result<NodeId, DebugInfoError> {
        let parts = split_mangled(mangled)?;
        let mut parent = self.compile_unit;
        for (name, end) in parts {
            let prefix = &mangled[..end];
            if let Some(node) = self.caches.namespaces.get(prefix, &self.builder) {
                parent = node;
                continue;
            }
            tracing::debug!(namespace = name, prefix, "creating namespace");
            let node = self
                .builder
                .create_namespace(parent, name, self.main_file, 0)?;
            self.caches.namespaces.insert(prefix.to_owned(), node);
            parent = node;
        }
        Ok(parent)
    }
}

#[cfg(test)]
mod tests;
