//! Type translation.
//!
//! Converts [`TypeDescriptor`]s into metadata type nodes, memoized by mangled
//! name. Aliases are desugared before lookup, so an alias and its target
//! share one node.
//!
//! # Recursion
//!
//! Composites (structs, tuples, enums) are forward-declared and cached
//! *before* their members are translated. A member that refers back to the
//! composite (through an `Indirect` pointer) hits the cache and gets the
//! forward declaration, which is then resolved exactly once when the member
//! list is complete.
//!
//! # Generics
//!
//! A `BoundGeneric` is keyed by its concrete mangled name. Members of the
//! base type that are bare archetypes are replaced by the bound arguments;
//! deeper occurrences are not substituted and come out as opaque archetypes.

use smallvec::SmallVec;

use crate::cache::SyntheticType;
use crate::error::{unrepresentable, DebugInfoError};
use crate::metadata::{
    CallingConvention, CompositeDecl, CompositeKind, DIFlags, MemberRecord, MetadataBuilder,
    NodeId, TypeEncoding,
};
use crate::session::DebugInfo;
use crate::source::SourceLoc;
use crate::types::{align_up, EnumCase, Field, Layout, Nominal, TypeDescriptor, TypeId};

/// Name of the opaque placeholder type.
pub const PLACEHOLDER_TYPE_NAME: &str = "<unknown>";

/// Identity and layout of a composite about to be declared.
struct CompositeHeader<'t> {
    kind: CompositeKind,
    name: String,
    unique_id: &'t str,
    context: Option<&'t str>,
    loc: Option<&'t SourceLoc>,
    size_bits: u64,
    align_bits: u32,
}

impl<'t> CompositeHeader<'t> {
    fn nominal(kind: CompositeKind, nominal: &'t Nominal, unique_id: &'t str) -> Self {
        Self {
            kind,
            name: nominal.name.clone(),
            unique_id,
            context: nominal.context.as_deref(),
            loc: nominal.loc.as_ref(),
            size_bits: nominal.size_bits,
            align_bits: nominal.align_bits,
        }
    }
}

impl<B: MetadataBuilder> DebugInfo<'_, B> {
    /// Translate a source type into a metadata type node.
    ///
    /// Two calls with the same (desugared) type return the same node while
    /// it stays live.
    ///
    /// # Errors
    ///
    /// `Unrepresentable` for unresolved types and cyclic aliases;
    /// `Metadata` if the builder rejects a node.
    pub fn translate(&mut self, ty: TypeId) -> Result<NodeId, DebugInfoError> {
        let types = self.types;
        let ty = types.desugar(ty);
        let key = types.mangled_name(ty);

        if let Some(node) = self.caches.types.get(key, &self.builder) {
            return Ok(node);
        }

        tracing::debug!(mangled = key, "translating type");
        match ensure_sufficient_stack(|| self.create_type(ty, key)) {
            Ok(node) => {
                self.caches.types.insert(key.to_owned(), node);
                Ok(node)
            }
            Err(err) => {
                self.caches.types.remove(key);
                Err(err)
            }
        }
    }

    /// Translate `ty`, substituting the opaque placeholder for a type with
    /// no debug representation.
    pub fn translate_or_placeholder(&mut self, ty: TypeId) -> Result<NodeId, DebugInfoError> {
        match self.translate(ty) {
            Err(err) if err.is_recoverable() => {
                tracing::warn!(
                    mangled = self.types.mangled_name(ty),
                    %err,
                    "substituting placeholder debug type"
                );
                self.placeholder_type()
            }
            result => result,
        }
    }

    /// The opaque `<unknown>` basic type.
    pub fn placeholder_type(&mut self) -> Result<NodeId, DebugInfoError> {
        self.caches.synthetic.lookup_or_create(
            SyntheticType::Placeholder,
            &mut self.builder,
            |b| {
                b.create_basic_type(PLACEHOLDER_TYPE_NAME, 0, TypeEncoding::Unspecified)
                    .map_err(DebugInfoError::from)
            },
        )
    }

    fn create_type(&mut self, ty: TypeId, key: &str) -> Result<NodeId, DebugInfoError> {
        let types = self.types;
        match types.get(ty) {
            TypeDescriptor::Primitive {
                name,
                size_bits,
                encoding,
                ..
            } => Ok(self.builder.create_basic_type(name, *size_bits, *encoding)?),
            TypeDescriptor::Struct { nominal, fields } => {
                let header = CompositeHeader::nominal(CompositeKind::Struct, nominal, key);
                self.create_struct(header, fields, &[])
            }
            TypeDescriptor::Enum { nominal, cases } => {
                self.create_enum(nominal, key, cases, &[])
            }
            TypeDescriptor::Tuple { elements } => {
                let (size_bits, align_bits) = types.size_align(ty);
                let header = CompositeHeader {
                    kind: CompositeKind::Tuple,
                    name: types.display_name(ty),
                    unique_id: key,
                    context: None,
                    loc: None,
                    size_bits,
                    align_bits,
                };
                self.create_tuple(header, elements)
            }
            TypeDescriptor::Indirect { pointee } => {
                let pointee = self.translate_or_placeholder(*pointee)?;
                self.create_pointer(ty, pointee)
            }
            TypeDescriptor::Function { params, result } => {
                let mut signature: SmallVec<[NodeId; 8]> = SmallVec::new();
                signature.push(self.translate_or_placeholder(*result)?);
                for &param in params {
                    signature.push(self.translate_or_placeholder(param)?);
                }
                let subroutine = self
                    .builder
                    .create_subroutine_type(&signature, CallingConvention::Freestanding)?;
                self.create_pointer(ty, subroutine)
            }
            TypeDescriptor::BoundGeneric {
                base,
                args,
                size_bits,
                align_bits,
                ..
            } => match types.get(types.desugar(*base)) {
                TypeDescriptor::Struct { nominal, fields } => {
                    let mut header =
                        CompositeHeader::nominal(CompositeKind::Struct, nominal, key);
                    header.name = types.display_name(ty);
                    header.size_bits = *size_bits;
                    header.align_bits = *align_bits;
                    self.create_struct(header, fields, args)
                }
                TypeDescriptor::Enum { nominal, cases } => {
                    let bound = Nominal {
                        name: types.display_name(ty),
                        size_bits: *size_bits,
                        align_bits: *align_bits,
                        ..nominal.clone()
                    };
                    self.create_enum(&bound, key, cases, args)
                }
                _ => Err(unrepresentable(key, "generic base is not a struct or enum")),
            },
            TypeDescriptor::Archetype { name, .. } => {
                let (size_bits, align_bits) = types.size_align(ty);
                let header = CompositeHeader {
                    kind: CompositeKind::Struct,
                    name: name.clone(),
                    unique_id: key,
                    context: None,
                    loc: None,
                    size_bits,
                    align_bits,
                };
                self.create_struct(header, &[], &[])
            }
            TypeDescriptor::Alias { .. } => Err(unrepresentable(key, "cyclic type alias")),
            TypeDescriptor::Unresolved { .. } => Err(unrepresentable(key, "type is unresolved")),
        }
    }

    fn create_pointer(&mut self, ty: TypeId, pointee: NodeId) -> Result<NodeId, DebugInfoError> {
        let types = self.types;
        let (size_bits, align_bits) = types.size_align(ty);
        let name = types.display_name(ty);
        Ok(self
            .builder
            .create_pointer_type(&name, pointee, size_bits, align_bits)?)
    }

    /// Forward-declare a composite and register it in the type cache so
    /// members can refer back to it.
    fn declare_composite(
        &mut self,
        header: &CompositeHeader<'_>,
    ) -> Result<(NodeId, NodeId, u32), DebugInfoError> {
        let scope = match header.context {
            Some(context) => self.context_scope(context),
            None => self.compile_unit,
        };
        let (file, line) = self.file_and_line(header.loc)?;
        let node = self.builder.create_forward_decl(CompositeDecl {
            kind: header.kind,
            name: &header.name,
            unique_id: header.unique_id,
            scope,
            file,
            line,
            size_bits: header.size_bits,
            align_bits: header.align_bits,
        })?;
        self.caches.types.insert(header.unique_id.to_owned(), node);
        Ok((node, file, line))
    }

    /// Resolve a forward declaration with the elements `build` produces.
    ///
    /// If `build` fails the declaration is closed empty, so the graph can
    /// still be sealed.
    fn complete_composite(
        &mut self,
        node: NodeId,
        build: impl FnOnce(&mut Self) -> Result<Vec<NodeId>, DebugInfoError>,
    ) -> Result<NodeId, DebugInfoError> {
        match build(self) {
            Ok(elements) => {
                self.builder.finalize_composite(node, &elements)?;
                Ok(node)
            }
            Err(err) => {
                if let Err(close) = self.builder.finalize_composite(node, &[]) {
                    tracing::debug!(?node, %close, "could not close failed composite");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn context_scope(&mut self, context: &str) -> NodeId {
        match self.resolve_namespace(context) {
            Ok(node) => node,
            Err(err) => {
                tracing::warn!(context, %err, "placing type at compile-unit scope");
                self.compile_unit
            }
        }
    }

    fn create_struct(
        &mut self,
        header: CompositeHeader<'_>,
        fields: &[Field],
        subst: &[TypeId],
    ) -> Result<NodeId, DebugInfoError> {
        let (node, file, line) = self.declare_composite(&header)?;
        self.complete_composite(node, |this| {
            let mut layout = Layout::default();
            let mut members = Vec::with_capacity(fields.len());
            for field in fields {
                let ty = this.substitute(field.ty, subst);
                let member =
                    this.create_packed_member(&field.name, ty, node, file, line, &mut layout)?;
                members.push(member);
            }
            Ok(members)
        })
    }

    fn create_tuple(
        &mut self,
        header: CompositeHeader<'_>,
        elements: &[TypeId],
    ) -> Result<NodeId, DebugInfoError> {
        let (node, file, line) = self.declare_composite(&header)?;
        self.complete_composite(node, |this| {
            let mut layout = Layout::default();
            let mut members = Vec::with_capacity(elements.len());
            for (index, &element) in elements.iter().enumerate() {
                let name = index.to_string();
                let member =
                    this.create_packed_member(&name, element, node, file, line, &mut layout)?;
                members.push(member);
            }
            Ok(members)
        })
    }

    /// Member at the next naturally aligned offset.
    fn create_packed_member(
        &mut self,
        name: &str,
        ty: TypeId,
        scope: NodeId,
        file: NodeId,
        line: u32,
        layout: &mut Layout,
    ) -> Result<NodeId, DebugInfoError> {
        let (size_bits, align_bits) = self.types.size_align(ty);
        let offset_bits = layout.place(size_bits, align_bits);
        let member_ty = self.translate_or_placeholder(ty)?;
        Ok(self.builder.create_member(MemberRecord {
            name,
            scope,
            file,
            line,
            size_bits,
            align_bits,
            offset_bits,
            flags: DIFlags::empty(),
            ty: member_ty,
            discriminant: None,
        })?)
    }

    /// Enumerations. Without payloads this is a plain enumeration of
    /// enumerators. With payloads it is a tagged union: payload-free cases
    /// stay enumerators, each payload case becomes a member whose type wraps
    /// the payload, and an artificial `discriminator` member follows the
    /// largest payload.
    fn create_enum(
        &mut self,
        nominal: &Nominal,
        key: &str,
        cases: &[EnumCase],
        subst: &[TypeId],
    ) -> Result<NodeId, DebugInfoError> {
        let has_payload = cases.iter().any(|case| case.payload.is_some());
        let kind = if has_payload {
            CompositeKind::TaggedUnion
        } else {
            CompositeKind::Enum
        };
        let header = CompositeHeader::nominal(kind, nominal, key);
        let (node, file, line) = self.declare_composite(&header)?;

        self.complete_composite(node, |this| {
            let mut elements = Vec::with_capacity(cases.len() + 1);
            let mut max_payload_bits: u64 = 0;
            for (index, case) in cases.iter().enumerate() {
                let value = i64::try_from(index).unwrap_or(i64::MAX);
                let Some(payload) = case.payload else {
                    elements.push(this.builder.create_enumerator(&case.name, value)?);
                    continue;
                };
                let payload = this.substitute(payload, subst);
                let (size_bits, align_bits) = this.types.size_align(payload);
                max_payload_bits = max_payload_bits.max(size_bits);
                let wrapper = this.create_case_payload(key, case, payload, file, line)?;
                elements.push(this.builder.create_member(MemberRecord {
                    name: &case.name,
                    scope: node,
                    file,
                    line,
                    size_bits,
                    align_bits,
                    offset_bits: 0,
                    flags: DIFlags::empty(),
                    ty: wrapper,
                    discriminant: Some(value),
                })?);
            }

            if has_payload {
                let discriminator =
                    this.create_discriminator(node, file, line, cases.len(), max_payload_bits)?;
                elements.push(discriminator);
            }
            Ok(elements)
        })
    }

    /// `{enum}.{Case}`: a one-member struct holding the case payload.
    fn create_case_payload(
        &mut self,
        enum_key: &str,
        case: &EnumCase,
        payload: TypeId,
        file: NodeId,
        line: u32,
    ) -> Result<NodeId, DebugInfoError> {
        let (size_bits, align_bits) = self.types.size_align(payload);
        let unique_id = format!("{enum_key}.{}", case.name);
        let node = self.builder.create_forward_decl(CompositeDecl {
            kind: CompositeKind::Struct,
            name: &case.name,
            unique_id: &unique_id,
            scope: self.compile_unit,
            file,
            line,
            size_bits,
            align_bits,
        })?;
        self.complete_composite(node, |this| {
            let mut layout = Layout::default();
            let member = this.create_packed_member("0", payload, node, file, line, &mut layout)?;
            Ok(vec![member])
        })
    }

    fn create_discriminator(
        &mut self,
        scope: NodeId,
        file: NodeId,
        line: u32,
        case_count: usize,
        max_payload_bits: u64,
    ) -> Result<NodeId, DebugInfoError> {
        let (name, bits) = discriminator_type(case_count);
        let ty = self
            .builder
            .create_basic_type(name, u64::from(bits), TypeEncoding::Unsigned)?;
        Ok(self.builder.create_member(MemberRecord {
            name: "discriminator",
            scope,
            file,
            line,
            size_bits: u64::from(bits),
            align_bits: bits,
            offset_bits: align_up(max_payload_bits, bits),
            flags: DIFlags::ARTIFICIAL,
            ty,
            discriminant: None,
        })?)
    }

    /// Replace a bare archetype by its bound argument.
    fn substitute(&self, ty: TypeId, subst: &[TypeId]) -> TypeId {
        let ty = self.types.desugar(ty);
        match self.types.get(ty) {
            TypeDescriptor::Archetype { index, .. } => usize::try_from(*index)
                .ok()
                .and_then(|i| subst.get(i).copied())
                .unwrap_or(ty),
            _ => ty,
        }
    }
}

/// Smallest unsigned type that can number `case_count` cases.
fn discriminator_type(case_count: usize) -> (&'static str, u32) {
    if case_count <= 1 << 8 {
        ("u8", 8)
    } else if case_count <= 1 << 16 {
        ("u16", 16)
    } else {
        ("u32", 32)
    }
}

/// Minimum stack space to keep available before recursing into members.
#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing.
#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Grow the stack if deeply nested types would overflow it.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
