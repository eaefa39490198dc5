//! Function and variable records.
//!
//! The emitter entry points the code generator calls once per function,
//! local, argument, global, type-metadata value, and import. Each one
//! resolves its scope through the tracker, its types through the translator,
//! and writes a record through the builder.
//!
//! With [`DebugLevel::LineTablesOnly`](crate::DebugLevel::LineTablesOnly)
//! only function records are written (with empty signatures); every
//! variable-level entry point returns `Ok(None)`.

use smallvec::SmallVec;

use crate::cache::SyntheticType;
use crate::error::DebugInfoError;
use crate::ir::{ArgCursor, FunctionId, IrFunction, ValueId};
use crate::location::FrameScope;
use crate::metadata::{
    CallingConvention, CompositeDecl, CompositeKind, DIFlags, DebugLoc, ExprOp, FunctionRecord,
    GlobalVariableRecord, IntrinsicKind, MetadataBuilder, NodeId, VariableRecord, VariableTag,
};
use crate::namespace::mangle_path;
use crate::session::DebugInfo;
use crate::source::{ScopeId, ScopeKind, SourceLoc};
use crate::types::{TypeDescriptor, TypeId};

/// Name of the opaque runtime type-metadata record type.
const TYPE_METADATA_TYPE: &str = "type_metadata";

/// How a variable's storage holds its value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndirectionKind {
    /// Storage holds the value.
    #[default]
    Direct,
    /// Storage holds a pointer to the value.
    Indirect,
}

/// Whether a variable was written by the user or synthesized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArtificialKind {
    #[default]
    RealValue,
    Artificial,
}

/// Everything needed to describe one local or argument variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableInfo<'n> {
    pub name: &'n str,
    pub ty: TypeId,
    pub tag: VariableTag,
    /// 1-based argument position; 0 for locals and unnumbered arguments.
    pub arg_no: u32,
    pub indirection: IndirectionKind,
    pub artificial: ArtificialKind,
    pub intrinsic: IntrinsicKind,
}

impl<'n> VariableInfo<'n> {
    /// A local variable bound with `declare`.
    pub fn local(name: &'n str, ty: TypeId) -> Self {
        Self {
            name,
            ty,
            tag: VariableTag::Auto,
            arg_no: 0,
            indirection: IndirectionKind::Direct,
            artificial: ArtificialKind::RealValue,
            intrinsic: IntrinsicKind::Declare,
        }
    }

    /// A formal parameter at 1-based position `arg_no`.
    pub fn argument(name: &'n str, ty: TypeId, arg_no: u32) -> Self {
        Self {
            tag: VariableTag::Arg,
            arg_no,
            ..Self::local(name, ty)
        }
    }

    #[must_use]
    pub fn with_indirection(mut self, indirection: IndirectionKind) -> Self {
        self.indirection = indirection;
        self
    }

    #[must_use]
    pub fn with_intrinsic(mut self, intrinsic: IntrinsicKind) -> Self {
        self.intrinsic = intrinsic;
        self
    }

    #[must_use]
    pub fn artificial(mut self) -> Self {
        self.artificial = ArtificialKind::Artificial;
        self
    }
}

impl<B: MetadataBuilder> DebugInfo<'_, B> {
    // -- Functions --

    /// Create the subprogram for the function enclosing `scope` and attach it
    /// to `function`.
    ///
    /// If the function's scope was already materialized by an earlier
    /// location in its body, that signature-less record is replaced by the
    /// full one and every reference to it is rewritten.
    ///
    /// # Errors
    ///
    /// `NotAFunctionScope` if `scope` is not inside a function.
    pub fn emit_function(
        &mut self,
        scope: ScopeId,
        function: FunctionId,
        cc: CallingConvention,
        signature: TypeId,
        decl_context: Option<&str>,
    ) -> Result<NodeId, DebugInfoError> {
        let scopes = self.scopes;
        let fn_scope = scopes
            .enclosing_function(scope)
            .ok_or(DebugInfoError::NotAFunctionScope { scope })?;

        let existing = self.caches.scopes.get(&fn_scope, &self.builder);
        let node = match existing {
            Some(node) if !self.unsigned_subprograms.contains(&fn_scope) => {
                tracing::debug!(?fn_scope, "function record already emitted");
                node
            }
            _ => {
                let parent = match scopes.parent(fn_scope) {
                    Some(outer) => Some(self.resolve_scope(outer)?),
                    None => None,
                };
                let node = self.create_subprogram(
                    fn_scope,
                    parent,
                    Some((signature, cc)),
                    decl_context,
                )?;
                if let Some(placeholder) = existing {
                    tracing::debug!(?fn_scope, "upgrading materialized function scope");
                    self.builder.replace_all_uses(placeholder, node)?;
                }
                self.unsigned_subprograms.remove(&fn_scope);
                self.caches.scopes.insert(fn_scope, node);
                node
            }
        };

        self.builder.attach_function(function, node);
        Ok(node)
    }

    /// Create a subprogram record for a function scope.
    ///
    /// `parent` is the enclosing scope node for nested functions; otherwise
    /// the declaring namespace or the compile unit.
    pub(crate) fn create_subprogram(
        &mut self,
        scope: ScopeId,
        parent: Option<NodeId>,
        signature: Option<(TypeId, CallingConvention)>,
        decl_context: Option<&str>,
    ) -> Result<NodeId, DebugInfoError> {
        let scopes = self.scopes;
        let data = scopes.get(scope);
        let ScopeKind::Function {
            name,
            linkage_name,
            context,
        } = &data.kind
        else {
            return Err(DebugInfoError::NotAFunctionScope { scope });
        };

        let parent = match (parent, decl_context.or(context.as_deref())) {
            (Some(parent), _) => parent,
            (None, Some(context)) => self.context_scope(context),
            (None, None) => self.compile_unit,
        };
        let (file, line) = self.file_and_line(data.loc.as_ref())?;
        let ty = self.subroutine_type(signature)?;
        let mut flags = DIFlags::PROTOTYPED;
        if data.loc.is_none() {
            flags |= DIFlags::ARTIFICIAL;
        }

        tracing::debug!(name = name.as_str(), ?scope, line, "creating subprogram");
        let node = self.builder.create_function(FunctionRecord {
            name,
            linkage_name: linkage_name.as_deref(),
            scope: parent,
            file,
            line,
            ty,
            is_local: linkage_name.is_none(),
            is_definition: true,
            flags,
            optimized: self.config.optimized,
        })?;
        if let Some(linkage) = linkage_name {
            self.caches.functions.insert(linkage.clone(), node);
        }
        Ok(node)
    }

    /// Subroutine type for a signature. Parameter types are resolved in full
    /// mode only; the trailing `self` of methods is marked artificial.
    fn subroutine_type(
        &mut self,
        signature: Option<(TypeId, CallingConvention)>,
    ) -> Result<NodeId, DebugInfoError> {
        let Some((signature, cc)) = signature else {
            return Ok(self
                .builder
                .create_subroutine_type(&[], CallingConvention::default())?);
        };
        if !self.config.level.emits_types() {
            return Ok(self.builder.create_subroutine_type(&[], cc)?);
        }

        let types = self.types;
        let TypeDescriptor::Function { params, result } = types.get(types.desugar(signature))
        else {
            tracing::warn!(
                signature = types.mangled_name(signature),
                "function signature is not a function type"
            );
            return Ok(self.builder.create_subroutine_type(&[], cc)?);
        };

        let mut elements: SmallVec<[NodeId; 8]> = SmallVec::new();
        elements.push(self.translate_or_placeholder(*result)?);
        for (index, &param) in params.iter().enumerate() {
            let mut ty = self.translate_or_placeholder(param)?;
            if cc.has_self_parameter() && index + 1 == params.len() {
                ty = self.builder.create_artificial_type(ty)?;
            }
            elements.push(ty);
        }
        Ok(self.builder.create_subroutine_type(&elements, cc)?)
    }

    /// Record for a compiler-synthesized function (thunk, witness, helper)
    /// with no source location and no lexical scope.
    ///
    /// Cached by linkage name. Leaves the current location artificial in the
    /// new function, so its body needs no further location setup.
    pub fn emit_artificial_function(
        &mut self,
        function: FunctionId,
        linkage_name: &str,
        signature: Option<TypeId>,
    ) -> Result<NodeId, DebugInfoError> {
        let node = if let Some(existing) = self.caches.functions.get(linkage_name, &self.builder) {
            existing
        } else {
            let ty = self.subroutine_type(signature.map(|s| (s, CallingConvention::default())))?;
            tracing::debug!(linkage_name, "creating artificial subprogram");
            let node = self.builder.create_function(FunctionRecord {
                name: linkage_name,
                linkage_name: Some(linkage_name),
                scope: self.compile_unit,
                file: self.main_file,
                line: 0,
                ty,
                is_local: true,
                is_definition: true,
                flags: DIFlags::ARTIFICIAL | DIFlags::PROTOTYPED,
                optimized: self.config.optimized,
            })?;
            self.caches.functions.insert(linkage_name.to_owned(), node);
            node
        };

        self.builder.attach_function(function, node);
        self.set_current_frame(FrameScope::Artificial(node), None)?;
        Ok(node)
    }

    // -- Variables --

    /// Emit a local or argument record at the current location.
    ///
    /// Returns `Ok(None)` when the record is skipped: line-tables-only mode,
    /// or no current scope to attach it to.
    pub fn emit_variable_declaration(
        &mut self,
        storage: ValueId,
        info: &VariableInfo<'_>,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        if !self.config.level.emits_types() {
            return Ok(None);
        }
        let Some(scope) = self.location.current.scope else {
            tracing::warn!(name = info.name, "no current scope, skipping variable");
            return Ok(None);
        };

        let loc = self.location.current.loc.clone();
        let scope_node = self.frame_scope_node(scope)?;
        let (file, line) = self.file_and_line(loc.as_ref())?;
        let ty = self.translate_or_placeholder(info.ty)?;

        let mut flags = DIFlags::empty();
        if info.artificial == ArtificialKind::Artificial {
            flags |= DIFlags::ARTIFICIAL;
        }
        let arg_no = match info.tag {
            VariableTag::Arg => info.arg_no,
            VariableTag::Auto => 0,
        };

        let variable = self.builder.create_variable(VariableRecord {
            tag: info.tag,
            name: info.name,
            scope: scope_node,
            file,
            line,
            arg_no,
            ty,
            flags,
        })?;

        let expr: &[ExprOp] = match info.indirection {
            IndirectionKind::Direct => &[],
            IndirectionKind::Indirect => &[ExprOp::Deref],
        };
        let debug_loc = match &loc {
            Some(l) => DebugLoc {
                line: l.line,
                column: l.column,
                scope: scope_node,
            },
            None => DebugLoc::artificial(scope_node),
        };
        self.builder
            .insert_variable_intrinsic(info.intrinsic, storage, variable, expr, debug_loc)?;

        tracing::debug!(name = info.name, ?scope, arg_no, "emitted variable");
        Ok(Some(variable))
    }

    /// A local variable living in stack storage.
    pub fn emit_stack_variable_declaration(
        &mut self,
        storage: ValueId,
        name: &str,
        ty: TypeId,
        indirection: IndirectionKind,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        let info = VariableInfo::local(name, ty).with_indirection(indirection);
        self.emit_variable_declaration(storage, &info)
    }

    /// A formal parameter with a known position.
    pub fn emit_arg_variable_declaration(
        &mut self,
        storage: ValueId,
        name: &str,
        ty: TypeId,
        arg_no: u32,
        indirection: IndirectionKind,
        intrinsic: IntrinsicKind,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        let info = VariableInfo::argument(name, ty, arg_no)
            .with_indirection(indirection)
            .with_intrinsic(intrinsic);
        self.emit_variable_declaration(storage, &info)
    }

    /// A formal parameter identified by its IR argument value.
    ///
    /// The position is looked up in `function`'s argument list. When
    /// `storage` is the argument itself the value is bound directly.
    pub fn emit_argument_variable(
        &mut self,
        function: &IrFunction,
        argument: ValueId,
        storage: ValueId,
        name: &str,
        ty: TypeId,
        indirection: IndirectionKind,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        let arg_no = self.argument_number(function, argument);
        let intrinsic = if storage == argument {
            IntrinsicKind::Value
        } else {
            IntrinsicKind::Declare
        };
        self.emit_arg_variable_declaration(storage, name, ty, arg_no, indirection, intrinsic)
    }

    /// 1-based position of `argument` in `function`'s argument list, or 0 if
    /// it is not one of them.
    ///
    /// Arguments are usually numbered in order, so the slot after the last
    /// match is tried first; anything else is one linear scan.
    pub fn argument_number(&mut self, function: &IrFunction, argument: ValueId) -> u32 {
        let arguments = function.arguments();
        let next = match self.arg_cursor {
            Some(cursor) if cursor.function == function.id() => cursor.position + 1,
            _ => 0,
        };
        let position = if arguments.get(next) == Some(&argument) {
            Some(next)
        } else {
            arguments.iter().position(|&a| a == argument)
        };

        let Some(position) = position else {
            tracing::warn!(
                function = function.id().raw(),
                argument = argument.raw(),
                "argument not found in function, leaving it unnumbered"
            );
            return 0;
        };
        self.arg_cursor = Some(ArgCursor {
            function: function.id(),
            position,
        });
        u32::try_from(position + 1).unwrap_or(0)
    }

    // -- Module-level records --

    /// A module-scope variable.
    pub fn emit_global_variable_declaration(
        &mut self,
        storage: ValueId,
        name: &str,
        linkage_name: &str,
        ty: TypeId,
        loc: Option<&SourceLoc>,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        if !self.config.level.emits_types() {
            return Ok(None);
        }
        let ty = self.translate_or_placeholder(ty)?;
        let (file, line) = self.file_and_line(loc)?;
        tracing::debug!(name, linkage_name, "emitting global variable");
        let node = self.builder.create_global_variable(
            storage,
            GlobalVariableRecord {
                name,
                linkage_name,
                scope: self.compile_unit,
                file,
                line,
                ty,
                is_local: false,
            },
        )?;
        Ok(Some(node))
    }

    /// An artificial `$type.{name}` variable bound to a runtime
    /// type-metadata value, in the function enclosing `scope`.
    pub fn emit_type_metadata(
        &mut self,
        scope: ScopeId,
        metadata: ValueId,
        name: &str,
    ) -> Result<Option<NodeId>, DebugInfoError> {
        if !self.config.level.emits_types() {
            return Ok(None);
        }
        let fn_scope = self
            .scopes
            .enclosing_function(scope)
            .ok_or(DebugInfoError::NotAFunctionScope { scope })?;
        let fn_node = self.resolve_scope(fn_scope)?;
        let ty = self.type_metadata_type()?;

        let var_name = format!("$type.{name}");
        let variable = self.builder.create_variable(VariableRecord {
            tag: VariableTag::Auto,
            name: &var_name,
            scope: fn_node,
            file: self.main_file,
            line: 0,
            arg_no: 0,
            ty,
            flags: DIFlags::ARTIFICIAL,
        })?;
        self.builder.insert_variable_intrinsic(
            IntrinsicKind::Value,
            metadata,
            variable,
            &[],
            DebugLoc::artificial(fn_node),
        )?;
        Ok(Some(variable))
    }

    /// Pointer to an opaque `type_metadata` struct.
    fn type_metadata_type(&mut self) -> Result<NodeId, DebugInfoError> {
        let key = SyntheticType::TypeMetadata;
        if let Some(node) = self.caches.synthetic.get(&key, &self.builder) {
            return Ok(node);
        }
        let pointer_bits = self.types.pointer_size_bits();
        let align_bits = u32::try_from(pointer_bits).unwrap_or(64);
        let opaque = self.builder.create_forward_decl(CompositeDecl {
            kind: CompositeKind::Struct,
            name: TYPE_METADATA_TYPE,
            unique_id: TYPE_METADATA_TYPE,
            scope: self.compile_unit,
            file: self.main_file,
            line: 0,
            size_bits: 0,
            align_bits: 0,
        })?;
        self.builder.finalize_composite(opaque, &[])?;
        let pointer = self.builder.create_pointer_type(
            "*type_metadata",
            opaque,
            pointer_bits,
            align_bits,
        )?;
        self.caches.synthetic.insert(key, pointer);
        Ok(pointer)
    }

    /// Record an import of the module at `path` into the current scope (or
    /// the compile unit when there is none).
    pub fn emit_import(
        &mut self,
        path: &[&str],
        loc: Option<&SourceLoc>,
    ) -> Result<NodeId, DebugInfoError> {
        let module = self.resolve_namespace(&mangle_path(path))?;
        let scope = match self.location.current.scope {
            Some(scope) => self.frame_scope_node(scope)?,
            None => self.compile_unit,
        };
        let (file, line) = self.file_and_line(loc)?;
        Ok(self
            .builder
            .create_imported_module(scope, module, file, line)?)
    }
}
