//! In-memory metadata graph.
//!
//! `MetadataGraph` is a complete [`MetadataBuilder`]: an arena of [`Node`]s
//! with a uniquing table for leaf nodes and replace-all-uses support. It is
//! what the test suite runs against, and it is usable by any backend that
//! wants to lower the finished graph itself.
//!
//! # Uniquing
//!
//! Basic types, pointers, members, enumerators, subroutine types, files, and
//! artificial wrappers are uniqued: creating a structurally identical node
//! returns the existing handle. Composites, scopes, and records are distinct
//! per call.
//!
//! # Replacement
//!
//! [`MetadataBuilder::replace_all_uses`] retires a node in favor of another.
//! The retired handle stops being live, every reference to it is rewritten,
//! and the uniquing table is rebuilt. This is the event that makes caller
//! caches stale.

use rustc_hash::FxHashMap;

use crate::config::DebugFormat;
use crate::error::MetadataError;
use crate::ir::{FunctionId, ValueId};
use crate::metadata::{
    CallingConvention, CompileUnitRecord, CompositeDecl, CompositeKind, DIFlags, DebugLoc,
    ExprOp, FunctionRecord, GlobalVariableRecord, IntrinsicKind, MemberRecord, MetadataBuilder,
    NodeId, TypeEncoding, VariableRecord, VariableTag,
};

/// A composite type node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Composite {
    pub kind: CompositeKind,
    pub name: String,
    pub unique_id: String,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    pub size_bits: u64,
    pub align_bits: u32,
    pub flags: DIFlags,
    /// `None` while the composite is only forward-declared.
    pub elements: Option<Vec<NodeId>>,
}

/// A node in the metadata graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    CompileUnit {
        file: NodeId,
        producer: String,
        optimized: bool,
        dwarf_version: u32,
        format: DebugFormat,
    },
    File {
        name: String,
        directory: String,
    },
    BasicType {
        name: String,
        size_bits: u64,
        encoding: TypeEncoding,
    },
    PointerType {
        name: String,
        pointee: NodeId,
        size_bits: u64,
        align_bits: u32,
    },
    ArtificialType {
        base: NodeId,
    },
    Composite(Composite),
    Member {
        name: String,
        scope: NodeId,
        file: NodeId,
        line: u32,
        size_bits: u64,
        align_bits: u32,
        offset_bits: u64,
        flags: DIFlags,
        ty: NodeId,
        discriminant: Option<i64>,
    },
    Enumerator {
        name: String,
        value: i64,
    },
    SubroutineType {
        types: Vec<NodeId>,
        cc: CallingConvention,
    },
    Namespace {
        parent: NodeId,
        name: String,
        file: NodeId,
        line: u32,
    },
    LexicalBlock {
        parent: NodeId,
        file: NodeId,
        line: u32,
        column: u32,
    },
    Function {
        name: String,
        linkage_name: Option<String>,
        scope: NodeId,
        file: NodeId,
        line: u32,
        ty: NodeId,
        is_local: bool,
        is_definition: bool,
        flags: DIFlags,
        optimized: bool,
    },
    Variable {
        tag: VariableTag,
        name: String,
        scope: NodeId,
        file: NodeId,
        line: u32,
        arg_no: u32,
        ty: NodeId,
        flags: DIFlags,
    },
    GlobalVariable {
        name: String,
        linkage_name: String,
        scope: NodeId,
        file: NodeId,
        line: u32,
        ty: NodeId,
        is_local: bool,
    },
    ImportedModule {
        scope: NodeId,
        module: NodeId,
        file: NodeId,
        line: u32,
    },
}

impl Node {
    /// Whether structurally identical copies of this node are merged.
    fn is_uniqued(&self) -> bool {
        matches!(
            self,
            Self::File { .. }
                | Self::BasicType { .. }
                | Self::PointerType { .. }
                | Self::ArtificialType { .. }
                | Self::Member { .. }
                | Self::Enumerator { .. }
                | Self::SubroutineType { .. }
        )
    }

    /// Short kind name, used in `Sealed` errors.
    fn kind_name(&self) -> &'static str {
        match self {
            Self::CompileUnit { .. } => "compile unit",
            Self::File { .. } => "file",
            Self::BasicType { .. } => "basic type",
            Self::PointerType { .. } => "pointer type",
            Self::ArtificialType { .. } => "artificial type",
            Self::Composite(_) => "composite type",
            Self::Member { .. } => "member",
            Self::Enumerator { .. } => "enumerator",
            Self::SubroutineType { .. } => "subroutine type",
            Self::Namespace { .. } => "namespace",
            Self::LexicalBlock { .. } => "lexical block",
            Self::Function { .. } => "function",
            Self::Variable { .. } => "variable",
            Self::GlobalVariable { .. } => "global variable",
            Self::ImportedModule { .. } => "imported module",
        }
    }

    /// Visit every node handle this node references.
    fn refs_mut(&mut self, mut f: impl FnMut(&mut NodeId)) {
        match self {
            Self::File { .. } | Self::BasicType { .. } | Self::Enumerator { .. } => {}
            Self::CompileUnit { file, .. } => f(file),
            Self::PointerType { pointee, .. } => f(pointee),
            Self::ArtificialType { base } => f(base),
            Self::Composite(c) => {
                f(&mut c.scope);
                f(&mut c.file);
                if let Some(elements) = &mut c.elements {
                    elements.iter_mut().for_each(f);
                }
            }
            Self::Member {
                scope, file, ty, ..
            }
            | Self::Variable {
                scope, file, ty, ..
            }
            | Self::GlobalVariable {
                scope, file, ty, ..
            } => {
                f(scope);
                f(file);
                f(ty);
            }
            Self::SubroutineType { types, .. } => types.iter_mut().for_each(f),
            Self::Namespace { parent, file, .. } | Self::LexicalBlock { parent, file, .. } => {
                f(parent);
                f(file);
            }
            Self::Function {
                scope, file, ty, ..
            } => {
                f(scope);
                f(file);
                f(ty);
            }
            Self::ImportedModule {
                scope,
                module,
                file,
                ..
            } => {
                f(scope);
                f(module);
                f(file);
            }
        }
    }
}

/// A recorded `dbg.declare` / `dbg.value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntrinsicCall {
    pub kind: IntrinsicKind,
    pub storage: ValueId,
    pub variable: NodeId,
    pub expr: Vec<ExprOp>,
    pub loc: DebugLoc,
}

#[derive(Clone, Debug)]
struct Slot {
    node: Node,
    replaced_by: Option<NodeId>,
}

/// In-memory [`MetadataBuilder`].
#[derive(Debug, Default)]
pub struct MetadataGraph {
    slots: Vec<Slot>,
    unique: FxHashMap<Node, NodeId>,
    subprograms: FxHashMap<FunctionId, NodeId>,
    globals: FxHashMap<ValueId, NodeId>,
    intrinsics: Vec<IntrinsicCall>,
    current_location: Option<DebugLoc>,
    location_history: Vec<Option<DebugLoc>>,
    sealed: bool,
}

impl MetadataGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever created, live or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a node. Retired nodes are still readable.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).map(|slot| &slot.node)
    }

    /// Look up a composite node.
    pub fn composite(&self, id: NodeId) -> Option<&Composite> {
        match self.node(id)? {
            Node::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Follow replacements to the live node `id` now stands for.
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        while let Some(next) = self.slots.get(id.index()).and_then(|s| s.replaced_by) {
            id = next;
        }
        id
    }

    /// Count live nodes matching `pred`.
    pub fn count_live(&self, pred: impl Fn(&Node) -> bool) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.replaced_by.is_none() && pred(&slot.node))
            .count()
    }

    /// The subprogram attached to an IR function.
    pub fn subprogram(&self, function: FunctionId) -> Option<NodeId> {
        self.subprograms.get(&function).copied()
    }

    /// The global-variable record attached to a storage value.
    pub fn global(&self, storage: ValueId) -> Option<NodeId> {
        self.globals.get(&storage).copied()
    }

    /// Every `dbg.declare` / `dbg.value` emitted so far, in order.
    pub fn intrinsics(&self) -> &[IntrinsicCall] {
        &self.intrinsics
    }

    /// The location currently stamped on new instructions.
    pub fn current_location(&self) -> Option<DebugLoc> {
        self.current_location
    }

    /// Every location change requested of the builder, in order.
    pub fn location_history(&self) -> &[Option<DebugLoc>] {
        &self.location_history
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn rebuild_unique_table(&mut self) {
        self.unique.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.replaced_by.is_none() && slot.node.is_uniqued() {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "node count is bounded by u32 at insertion"
                )]
                let id = NodeId::new(index as u32);
                self.unique.entry(slot.node.clone()).or_insert(id);
            }
        }
    }

    fn check(&self, id: NodeId) -> Result<(), MetadataError> {
        if id.index() < self.slots.len() {
            Ok(())
        } else {
            Err(MetadataError::UnknownNode { node: id })
        }
    }

    fn push(&mut self, node: Node) -> Result<NodeId, MetadataError> {
        if self.sealed {
            return Err(MetadataError::Sealed {
                what: node.kind_name(),
            });
        }

        if node.is_uniqued() {
            if let Some(&existing) = self.unique.get(&node) {
                if self.is_live(existing) {
                    return Ok(existing);
                }
            }
        }

        let id = NodeId::new(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        if node.is_uniqued() {
            self.unique.insert(node.clone(), id);
        }
        self.slots.push(Slot {
            node,
            replaced_by: None,
        });
        Ok(id)
    }
}

impl MetadataBuilder for MetadataGraph {
    fn create_compile_unit(
        &mut self,
        record: CompileUnitRecord<'_>,
    ) -> Result<NodeId, MetadataError> {
        self.push(Node::CompileUnit {
            file: record.file,
            producer: record.producer.to_owned(),
            optimized: record.optimized,
            dwarf_version: record.dwarf_version,
            format: record.format,
        })
    }

    fn create_file(&mut self, name: &str, directory: &str) -> Result<NodeId, MetadataError> {
        self.push(Node::File {
            name: name.to_owned(),
            directory: directory.to_owned(),
        })
    }

    fn create_basic_type(
        &mut self,
        name: &str,
        size_bits: u64,
        encoding: TypeEncoding,
    ) -> Result<NodeId, MetadataError> {
        self.push(Node::BasicType {
            name: name.to_owned(),
            size_bits,
            encoding,
        })
    }

    fn create_pointer_type(
        &mut self,
        name: &str,
        pointee: NodeId,
        size_bits: u64,
        align_bits: u32,
    ) -> Result<NodeId, MetadataError> {
        self.check(pointee)?;
        self.push(Node::PointerType {
            name: name.to_owned(),
            pointee,
            size_bits,
            align_bits,
        })
    }

    fn create_artificial_type(&mut self, ty: NodeId) -> Result<NodeId, MetadataError> {
        self.check(ty)?;
        self.push(Node::ArtificialType { base: ty })
    }

    fn create_forward_decl(&mut self, decl: CompositeDecl<'_>) -> Result<NodeId, MetadataError> {
        self.push(Node::Composite(Composite {
            kind: decl.kind,
            name: decl.name.to_owned(),
            unique_id: decl.unique_id.to_owned(),
            scope: decl.scope,
            file: decl.file,
            line: decl.line,
            size_bits: decl.size_bits,
            align_bits: decl.align_bits,
            flags: DIFlags::FWD_DECL,
            elements: None,
        }))
    }

    fn create_member(&mut self, member: MemberRecord<'_>) -> Result<NodeId, MetadataError> {
        self.check(member.ty)?;
        self.push(Node::Member {
            name: member.name.to_owned(),
            scope: member.scope,
            file: member.file,
            line: member.line,
            size_bits: member.size_bits,
            align_bits: member.align_bits,
            offset_bits: member.offset_bits,
            flags: member.flags,
            ty: member.ty,
            discriminant: member.discriminant,
        })
    }

    fn create_enumerator(&mut self, name: &str, value: i64) -> Result<NodeId, MetadataError> {
        self.push(Node::Enumerator {
            name: name.to_owned(),
            value,
        })
    }

    fn finalize_composite(
        &mut self,
        composite: NodeId,
        elements: &[NodeId],
    ) -> Result<(), MetadataError> {
        if self.sealed {
            return Err(MetadataError::Sealed {
                what: "composite elements",
            });
        }
        self.check(composite)?;
        match &mut self.slots[composite.index()].node {
            Node::Composite(c) if c.elements.is_some() => Err(MetadataError::AlreadyFinalized {
                name: c.unique_id.clone(),
            }),
            Node::Composite(c) => {
                c.elements = Some(elements.to_vec());
                c.flags.remove(DIFlags::FWD_DECL);
                Ok(())
            }
            _ => Err(MetadataError::NotForwardDecl { node: composite }),
        }
    }

    fn create_subroutine_type(
        &mut self,
        types: &[NodeId],
        cc: CallingConvention,
    ) -> Result<NodeId, MetadataError> {
        self.push(Node::SubroutineType {
            types: types.to_vec(),
            cc,
        })
    }

    fn create_namespace(
        &mut self,
        parent: NodeId,
        name: &str,
        file: NodeId,
        line: u32,
    ) -> Result<NodeId, MetadataError> {
        self.check(parent)?;
        self.push(Node::Namespace {
            parent,
            name: name.to_owned(),
            file,
            line,
        })
    }

    fn create_lexical_block(
        &mut self,
        parent: NodeId,
        file: NodeId,
        line: u32,
        column: u32,
    ) -> Result<NodeId, MetadataError> {
        self.check(parent)?;
        self.push(Node::LexicalBlock {
            parent,
            file,
            line,
            column,
        })
    }

    fn create_function(&mut self, record: FunctionRecord<'_>) -> Result<NodeId, MetadataError> {
        self.check(record.scope)?;
        self.push(Node::Function {
            name: record.name.to_owned(),
            linkage_name: record.linkage_name.map(str::to_owned),
            scope: record.scope,
            file: record.file,
            line: record.line,
            ty: record.ty,
            is_local: record.is_local,
            is_definition: record.is_definition,
            flags: record.flags,
            optimized: record.optimized,
        })
    }

    fn attach_function(&mut self, function: FunctionId, subprogram: NodeId) {
        self.subprograms.insert(function, subprogram);
    }

    fn create_variable(&mut self, record: VariableRecord<'_>) -> Result<NodeId, MetadataError> {
        self.check(record.scope)?;
        self.push(Node::Variable {
            tag: record.tag,
            name: record.name.to_owned(),
            scope: record.scope,
            file: record.file,
            line: record.line,
            arg_no: record.arg_no,
            ty: record.ty,
            flags: record.flags,
        })
    }

    fn insert_variable_intrinsic(
        &mut self,
        intrinsic: IntrinsicKind,
        storage: ValueId,
        variable: NodeId,
        expr: &[ExprOp],
        loc: DebugLoc,
    ) -> Result<(), MetadataError> {
        if self.sealed {
            return Err(MetadataError::Sealed {
                what: "variable intrinsic",
            });
        }
        self.check(variable)?;
        self.intrinsics.push(IntrinsicCall {
            kind: intrinsic,
            storage,
            variable,
            expr: expr.to_vec(),
            loc,
        });
        Ok(())
    }

    fn create_global_variable(
        &mut self,
        storage: ValueId,
        record: GlobalVariableRecord<'_>,
    ) -> Result<NodeId, MetadataError> {
        let id = self.push(Node::GlobalVariable {
            name: record.name.to_owned(),
            linkage_name: record.linkage_name.to_owned(),
            scope: record.scope,
            file: record.file,
            line: record.line,
            ty: record.ty,
            is_local: record.is_local,
        })?;
        self.globals.insert(storage, id);
        Ok(id)
    }

    fn create_imported_module(
        &mut self,
        scope: NodeId,
        module: NodeId,
        file: NodeId,
        line: u32,
    ) -> Result<NodeId, MetadataError> {
        self.check(module)?;
        self.push(Node::ImportedModule {
            scope,
            module,
            file,
            line,
        })
    }

    fn set_current_location(&mut self, loc: Option<DebugLoc>) {
        self.current_location = loc;
        self.location_history.push(loc);
    }

    fn replace_all_uses(&mut self, old: NodeId, new: NodeId) -> Result<(), MetadataError> {
        self.check(old)?;
        self.check(new)?;
        if old == new {
            return Ok(());
        }

        tracing::debug!(?old, ?new, "replacing metadata node");
        self.slots[old.index()].replaced_by = Some(new);

        let rewrite = |id: &mut NodeId| {
            if *id == old {
                *id = new;
            }
        };
        for slot in &mut self.slots {
            slot.node.refs_mut(rewrite);
        }
        self.subprograms.values_mut().for_each(rewrite);
        self.globals.values_mut().for_each(rewrite);
        for call in &mut self.intrinsics {
            rewrite(&mut call.variable);
            rewrite(&mut call.loc.scope);
        }
        if let Some(loc) = &mut self.current_location {
            rewrite(&mut loc.scope);
        }

        self.rebuild_unique_table();
        Ok(())
    }

    fn is_live(&self, node: NodeId) -> bool {
        self.slots
            .get(node.index())
            .is_some_and(|slot| slot.replaced_by.is_none())
    }

    fn seal(&mut self) -> Result<(), MetadataError> {
        let open = self.slots.iter().find_map(|slot| match &slot.node {
            Node::Composite(c) if slot.replaced_by.is_none() && c.elements.is_none() => {
                Some(c.unique_id.clone())
            }
            _ => None,
        });
        if let Some(name) = open {
            return Err(MetadataError::UnresolvedForwardDecl { name });
        }
        self.sealed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
