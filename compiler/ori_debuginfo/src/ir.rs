//! Handles into the code generator's IR.
//!
//! The emitter never looks inside IR values; it only needs stable identities
//! to attach records to and, for argument numbering, a function's declared
//! argument list.

/// An IR function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// An IR value: an argument, an alloca, a global, or any SSA value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// An IR function together with its declared arguments, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrFunction {
    id: FunctionId,
    arguments: Vec<ValueId>,
}

impl IrFunction {
    pub fn new(id: FunctionId, arguments: Vec<ValueId>) -> Self {
        Self { id, arguments }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn arguments(&self) -> &[ValueId] {
        &self.arguments
    }
}

/// Position of the last argument matched by argument numbering.
///
/// Arguments are usually emitted in declaration order, so the next lookup
/// for the same function tries `position + 1` before scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ArgCursor {
    pub(crate) function: FunctionId,
    pub(crate) position: usize,
}
