//! The metadata-builder seam.
//!
//! Everything this crate emits goes through [`MetadataBuilder`]. The builder
//! owns every node; callers only ever hold [`NodeId`] handles, which may be
//! invalidated when the builder merges or replaces nodes (see
//! [`MetadataBuilder::is_live`]).
//!
//! The record structs here mirror the shape of LLVM's `DIBuilder` calls but
//! carry no encoding decisions: whether the graph ends up as DWARF or
//! `CodeView` is the builder's business.

use bitflags::bitflags;

use crate::config::DebugFormat;
use crate::error::MetadataError;
use crate::ir::{FunctionId, ValueId};

/// Handle to a node in the metadata graph.
///
/// Handles are non-owning. A handle returned by one call is not guaranteed to
/// stay live across later calls; check with [`MetadataBuilder::is_live`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Per-node debug flags.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DIFlags: u32 {
        /// Compiler-generated; debuggers hide or de-emphasize it.
        const ARTIFICIAL = 1 << 0;
        /// Composite declared before its members are known.
        const FWD_DECL = 1 << 1;
        /// Implicit `self`/context parameter.
        const OBJECT_POINTER = 1 << 2;
        /// Function type has a known parameter list.
        const PROTOTYPED = 1 << 3;
    }
}

/// Encoding of a basic (primitive) type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeEncoding {
    Signed,
    Unsigned,
    Float,
    Boolean,
    UnsignedChar,
    /// No encoding: `void`, unit, and opaque placeholders.
    Unspecified,
}

impl TypeEncoding {
    /// The DWARF `DW_ATE_*` code for this encoding.
    pub fn dwarf_code(self) -> u32 {
        match self {
            Self::Unspecified => 0x00,
            Self::Boolean => 0x02,
            Self::Float => 0x04,
            Self::Signed => 0x05,
            Self::Unsigned => 0x07,
            Self::UnsignedChar => 0x08,
        }
    }
}

/// Shape of a composite type node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Struct,
    /// Anonymous aggregate with positional members.
    Tuple,
    /// Payload-free enumeration; elements are enumerators.
    Enum,
    /// Enumeration with payload cases plus a discriminant member.
    TaggedUnion,
}

/// Calling convention recorded on subroutine types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Free function.
    #[default]
    Freestanding,
    /// Method; the trailing `self` parameter is an object pointer.
    Method,
    /// Protocol witness; also carries a trailing `self`.
    WitnessMethod,
    /// C ABI.
    C,
}

impl CallingConvention {
    /// Whether functions with this convention take an implicit `self` last.
    pub fn has_self_parameter(self) -> bool {
        matches!(self, Self::Method | Self::WitnessMethod)
    }
}

/// Kind of variable record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableTag {
    /// Local (`DW_TAG_auto_variable`).
    Auto,
    /// Formal parameter (`DW_TAG_arg_variable`).
    Arg,
}

/// How a variable record is bound to its storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    /// Storage is an address; emit `dbg.declare`.
    #[default]
    Declare,
    /// Storage is the value itself; emit `dbg.value`.
    Value,
}

/// Location-expression operation applied to a variable's storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExprOp {
    /// Load through one level of indirection.
    Deref,
}

/// A concrete emission location.
///
/// `line == 0` marks an artificial location: real generated code that belongs
/// to `scope` but to no particular source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebugLoc {
    pub line: u32,
    pub column: u32,
    pub scope: NodeId,
}

impl DebugLoc {
    /// An artificial (line 0) location in `scope`.
    pub fn artificial(scope: NodeId) -> Self {
        Self {
            line: 0,
            column: 0,
            scope,
        }
    }

    /// Whether this location carries no source line.
    pub fn is_artificial(&self) -> bool {
        self.line == 0
    }
}

/// Compile-unit parameters.
#[derive(Clone, Copy, Debug)]
pub struct CompileUnitRecord<'a> {
    pub file: NodeId,
    pub producer: &'a str,
    pub optimized: bool,
    pub dwarf_version: u32,
    pub format: DebugFormat,
}

/// A composite type declared ahead of its members.
#[derive(Clone, Copy, Debug)]
pub struct CompositeDecl<'a> {
    pub kind: CompositeKind,
    pub name: &'a str,
    /// Uniquing identifier; the mangled name of the source type.
    pub unique_id: &'a str,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    pub size_bits: u64,
    pub align_bits: u32,
}

/// A member of a composite type.
#[derive(Clone, Copy, Debug)]
pub struct MemberRecord<'a> {
    pub name: &'a str,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    pub size_bits: u64,
    pub align_bits: u32,
    pub offset_bits: u64,
    pub flags: DIFlags,
    pub ty: NodeId,
    /// Discriminant value selecting this member in a tagged union.
    pub discriminant: Option<i64>,
}

/// A function (subprogram) record.
#[derive(Clone, Copy, Debug)]
pub struct FunctionRecord<'a> {
    pub name: &'a str,
    pub linkage_name: Option<&'a str>,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    pub ty: NodeId,
    pub is_local: bool,
    pub is_definition: bool,
    pub flags: DIFlags,
    pub optimized: bool,
}

/// A local or parameter variable record.
#[derive(Clone, Copy, Debug)]
pub struct VariableRecord<'a> {
    pub tag: VariableTag,
    pub name: &'a str,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    /// 1-based argument position; 0 for locals and unnumbered arguments.
    pub arg_no: u32,
    pub ty: NodeId,
    pub flags: DIFlags,
}

/// A module-scope variable record.
#[derive(Clone, Copy, Debug)]
pub struct GlobalVariableRecord<'a> {
    pub name: &'a str,
    pub linkage_name: &'a str,
    pub scope: NodeId,
    pub file: NodeId,
    pub line: u32,
    pub ty: NodeId,
    pub is_local: bool,
}

/// Builder for the persistent metadata graph.
///
/// Creation calls fail only on contract violations (most commonly, creating
/// nodes after [`seal`](Self::seal)). Implementations are free to unique
/// structurally identical nodes and to replace nodes after the fact; callers
/// holding a [`NodeId`] must re-validate it with [`is_live`](Self::is_live).
pub trait MetadataBuilder {
    fn create_compile_unit(&mut self, record: CompileUnitRecord<'_>)
        -> Result<NodeId, MetadataError>;

    fn create_file(&mut self, name: &str, directory: &str) -> Result<NodeId, MetadataError>;

    fn create_basic_type(
        &mut self,
        name: &str,
        size_bits: u64,
        encoding: TypeEncoding,
    ) -> Result<NodeId, MetadataError>;

    fn create_pointer_type(
        &mut self,
        name: &str,
        pointee: NodeId,
        size_bits: u64,
        align_bits: u32,
    ) -> Result<NodeId, MetadataError>;

    /// Wrap `ty` in an artificial qualifier (used for implicit `self`).
    fn create_artificial_type(&mut self, ty: NodeId) -> Result<NodeId, MetadataError>;

    /// Declare a composite whose elements arrive later via
    /// [`finalize_composite`](Self::finalize_composite).
    fn create_forward_decl(&mut self, decl: CompositeDecl<'_>) -> Result<NodeId, MetadataError>;

    fn create_member(&mut self, member: MemberRecord<'_>) -> Result<NodeId, MetadataError>;

    fn create_enumerator(&mut self, name: &str, value: i64) -> Result<NodeId, MetadataError>;

    /// Resolve a forward declaration. Each composite is resolved exactly once.
    fn finalize_composite(
        &mut self,
        composite: NodeId,
        elements: &[NodeId],
    ) -> Result<(), MetadataError>;

    /// `types[0]` is the result type; the rest are parameters.
    fn create_subroutine_type(
        &mut self,
        types: &[NodeId],
        cc: CallingConvention,
    ) -> Result<NodeId, MetadataError>;

    fn create_namespace(
        &mut self,
        parent: NodeId,
        name: &str,
        file: NodeId,
        line: u32,
    ) -> Result<NodeId, MetadataError>;

    fn create_lexical_block(
        &mut self,
        parent: NodeId,
        file: NodeId,
        line: u32,
        column: u32,
    ) -> Result<NodeId, MetadataError>;

    fn create_function(&mut self, record: FunctionRecord<'_>) -> Result<NodeId, MetadataError>;

    /// Attach a subprogram to an IR function.
    fn attach_function(&mut self, function: FunctionId, subprogram: NodeId);

    fn create_variable(&mut self, record: VariableRecord<'_>) -> Result<NodeId, MetadataError>;

    /// Bind `variable` to `storage` at the current insertion point.
    fn insert_variable_intrinsic(
        &mut self,
        intrinsic: IntrinsicKind,
        storage: ValueId,
        variable: NodeId,
        expr: &[ExprOp],
        loc: DebugLoc,
    ) -> Result<(), MetadataError>;

    fn create_global_variable(
        &mut self,
        storage: ValueId,
        record: GlobalVariableRecord<'_>,
    ) -> Result<NodeId, MetadataError>;

    fn create_imported_module(
        &mut self,
        scope: NodeId,
        module: NodeId,
        file: NodeId,
        line: u32,
    ) -> Result<NodeId, MetadataError>;

    /// Set (or clear, with `None`) the location stamped on subsequently
    /// emitted instructions.
    fn set_current_location(&mut self, loc: Option<DebugLoc>);

    /// Retire `old` in favor of `new`, rewriting every reference to it.
    /// Afterwards `old` is no longer live.
    fn replace_all_uses(&mut self, old: NodeId, new: NodeId) -> Result<(), MetadataError>;

    /// Whether `node` still denotes a node the builder has not replaced.
    fn is_live(&self, node: NodeId) -> bool;

    /// Seal the graph. No node may be created afterwards.
    fn seal(&mut self) -> Result<(), MetadataError>;
}
