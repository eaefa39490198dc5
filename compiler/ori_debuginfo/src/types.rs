//! Type descriptors.
//!
//! The type-descriptor provider: a [`TypePool`] of [`TypeDescriptor`]s
//! addressed by [`TypeId`]. Descriptors are a closed set of shapes, each
//! carrying only what that shape needs. Member, case, and element lists refer
//! to other descriptors by `TypeId`, so recursive types are expressed by
//! [reserving](TypePool::reserve) an id before defining it.
//!
//! Type identity for debug purposes is the mangled name
//! ([`TypePool::mangled_name`]), never structure.

use crate::metadata::TypeEncoding;
use crate::namespace::mangle_path;
use crate::source::SourceLoc;

/// Index of a descriptor in a [`TypePool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Pre-interned primitives (indices 0-5) ===

    /// `int` (64-bit signed).
    pub const INT: Self = Self(0);
    /// `float` (64-bit).
    pub const FLOAT: Self = Self(1);
    /// `bool`.
    pub const BOOL: Self = Self(2);
    /// `char` (32-bit Unicode scalar).
    pub const CHAR: Self = Self(3);
    /// `byte` (8-bit unsigned).
    pub const BYTE: Self = Self(4);
    /// The unit type `()`.
    pub const UNIT: Self = Self(5);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named field of a struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

/// A case of an enumeration. `payload` is the associated value, if any;
/// multi-value payloads are a tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumCase {
    pub name: String,
    pub payload: Option<TypeId>,
}

/// A nominal aggregate (struct or enum): identity plus laid-out size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nominal {
    pub name: String,
    pub mangled: String,
    /// Mangled namespace path of the declaring context.
    pub context: Option<String>,
    pub loc: Option<SourceLoc>,
    pub size_bits: u64,
    pub align_bits: u32,
}

/// A source type as seen by the debug emitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive {
        name: String,
        size_bits: u64,
        align_bits: u32,
        encoding: TypeEncoding,
    },
    Struct {
        nominal: Nominal,
        fields: Vec<Field>,
    },
    Enum {
        nominal: Nominal,
        cases: Vec<EnumCase>,
    },
    Tuple {
        elements: Vec<TypeId>,
    },
    /// Heap-indirected (boxed) value: a pointer to `pointee`.
    Indirect {
        pointee: TypeId,
    },
    /// A function value.
    Function {
        params: Vec<TypeId>,
        result: TypeId,
    },
    /// A concrete instantiation of a generic struct or enum. `Archetype`
    /// members of `base` are replaced by `args`.
    BoundGeneric {
        mangled: String,
        base: TypeId,
        args: Vec<TypeId>,
        size_bits: u64,
        align_bits: u32,
    },
    /// A generic parameter, by position in its declaring generic.
    Archetype {
        name: String,
        mangled: String,
        index: u32,
    },
    /// A type alias; desugared before any lookup.
    Alias {
        name: String,
        target: TypeId,
    },
    /// A type with no layout (unresolved or erroneous).
    Unresolved {
        mangled: String,
    },
}

/// Arena of type descriptors.
#[derive(Debug)]
pub struct TypePool {
    types: Vec<TypeDescriptor>,
    /// Cached mangled names for structural shapes.
    mangled: Vec<Option<String>>,
    pointer_size_bits: u64,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// A pool for a 64-bit target with primitives pre-interned.
    pub fn new() -> Self {
        Self::with_pointer_size(64)
    }

    pub fn with_pointer_size(pointer_size_bits: u64) -> Self {
        let mut pool = Self {
            types: Vec::new(),
            mangled: Vec::new(),
            pointer_size_bits,
        };
        pool.primitive("int", 64, TypeEncoding::Signed);
        pool.primitive("float", 64, TypeEncoding::Float);
        pool.primitive("bool", 8, TypeEncoding::Boolean);
        pool.primitive("char", 32, TypeEncoding::UnsignedChar);
        pool.primitive("byte", 8, TypeEncoding::Unsigned);
        pool.primitive("()", 0, TypeEncoding::Unspecified);
        pool
    }

    pub fn pointer_size_bits(&self) -> u64 {
        self.pointer_size_bits
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Add a descriptor.
    pub fn add(&mut self, desc: TypeDescriptor) -> TypeId {
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(desc);
        self.mangled.push(None);
        let mangled = self.structural_mangling(id);
        self.mangled[id.index()] = mangled;
        id
    }

    /// Reserve an id to be [`define`](Self::define)d later, so that a type
    /// can mention itself.
    pub fn reserve(&mut self, mangled: &str) -> TypeId {
        self.add(TypeDescriptor::Unresolved {
            mangled: mangled.to_owned(),
        })
    }

    /// Define a reserved id.
    pub fn define(&mut self, id: TypeId, desc: TypeDescriptor) {
        self.types[id.index()] = desc;
        let mangled = self.structural_mangling(id);
        self.mangled[id.index()] = mangled;
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this pool.
    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    // -- Convenience constructors --

    pub fn primitive(&mut self, name: &str, size_bits: u64, encoding: TypeEncoding) -> TypeId {
        let align_bits = u32::try_from(size_bits.clamp(8, 64)).unwrap_or(64);
        self.add(TypeDescriptor::Primitive {
            name: name.to_owned(),
            size_bits,
            align_bits,
            encoding,
        })
    }

    pub fn tuple(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.add(TypeDescriptor::Tuple { elements })
    }

    pub fn indirect(&mut self, pointee: TypeId) -> TypeId {
        self.add(TypeDescriptor::Indirect { pointee })
    }

    pub fn function(&mut self, params: Vec<TypeId>, result: TypeId) -> TypeId {
        self.add(TypeDescriptor::Function { params, result })
    }

    pub fn alias(&mut self, name: &str, target: TypeId) -> TypeId {
        self.add(TypeDescriptor::Alias {
            name: name.to_owned(),
            target,
        })
    }

    // -- Queries --

    /// Strip aliases. A cyclic alias chain is cut off after one pass over
    /// the pool and comes back as an alias.
    pub fn desugar(&self, mut id: TypeId) -> TypeId {
        for _ in 0..self.types.len() {
            match self.get(id) {
                TypeDescriptor::Alias { target, .. } => id = *target,
                _ => return id,
            }
        }
        id
    }

    /// The identity of `id` for caching: nominal types use their declared
    /// mangled name, primitives and structural shapes a name derived from
    /// their parts. Aliases share their target's name.
    pub fn mangled_name(&self, id: TypeId) -> &str {
        let id = self.desugar(id);
        match self.get(id) {
            TypeDescriptor::Struct { nominal, .. } | TypeDescriptor::Enum { nominal, .. } => {
                nominal.mangled.as_str()
            }
            TypeDescriptor::BoundGeneric { mangled, .. }
            | TypeDescriptor::Archetype { mangled, .. }
            | TypeDescriptor::Unresolved { mangled } => mangled.as_str(),
            TypeDescriptor::Primitive { .. }
            | TypeDescriptor::Tuple { .. }
            | TypeDescriptor::Indirect { .. }
            | TypeDescriptor::Function { .. }
            | TypeDescriptor::Alias { .. } => {
                self.mangled[id.index()].as_deref().unwrap_or_default()
            }
        }
    }

    /// Human-readable name shown by debuggers.
    pub fn display_name(&self, id: TypeId) -> String {
        let id = self.desugar(id);
        match self.get(id) {
            TypeDescriptor::Primitive { name, .. } | TypeDescriptor::Archetype { name, .. } => {
                name.clone()
            }
            TypeDescriptor::Struct { nominal, .. } | TypeDescriptor::Enum { nominal, .. } => {
                nominal.name.clone()
            }
            TypeDescriptor::Tuple { elements } => {
                format!("({})", self.display_list(elements))
            }
            TypeDescriptor::Indirect { pointee } => format!("*{}", self.display_name(*pointee)),
            TypeDescriptor::Function { params, result } => format!(
                "({}) -> {}",
                self.display_list(params),
                self.display_name(*result)
            ),
            TypeDescriptor::BoundGeneric { base, args, .. } => {
                format!("{}<{}>", self.display_name(*base), self.display_list(args))
            }
            TypeDescriptor::Alias { name, .. } => name.clone(),
            TypeDescriptor::Unresolved { mangled } => mangled.clone(),
        }
    }

    fn display_list(&self, ids: &[TypeId]) -> String {
        ids.iter()
            .map(|&id| self.display_name(id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Size and alignment in bits.
    ///
    /// Nominal types report their declared layout; tuples are packed in
    /// declaration order with natural alignment; pointers, functions, and
    /// unsubstituted archetypes (which are boxed) are pointer-sized.
    pub fn size_align(&self, id: TypeId) -> (u64, u32) {
        let pointer = (
            self.pointer_size_bits,
            u32::try_from(self.pointer_size_bits).unwrap_or(64),
        );
        match self.get(self.desugar(id)) {
            TypeDescriptor::Primitive {
                size_bits,
                align_bits,
                ..
            }
            | TypeDescriptor::BoundGeneric {
                size_bits,
                align_bits,
                ..
            } => (*size_bits, *align_bits),
            TypeDescriptor::Struct { nominal, .. } | TypeDescriptor::Enum { nominal, .. } => {
                (nominal.size_bits, nominal.align_bits)
            }
            TypeDescriptor::Tuple { elements } => {
                let mut layout = Layout::default();
                for &element in elements {
                    let (size, align) = self.size_align(element);
                    layout.place(size, align);
                }
                layout.finish()
            }
            TypeDescriptor::Indirect { .. }
            | TypeDescriptor::Function { .. }
            | TypeDescriptor::Archetype { .. } => pointer,
            TypeDescriptor::Alias { .. } | TypeDescriptor::Unresolved { .. } => (0, 0),
        }
    }

    /// Mangled name for a primitive or structural shape, computed once at
    /// insertion.
    ///
    /// Every part is length-prefixed, so distinct shapes never share a name.
    /// Parts must already have names, which holds for everything but
    /// reserved ids; those are defined as nominal types and need none.
    fn structural_mangling(&self, id: TypeId) -> Option<String> {
        match self.get(id) {
            TypeDescriptor::Primitive {
                name,
                size_bits,
                encoding,
                ..
            } => Some(format!(
                "P{}{size_bits}_{}",
                mangle_path(&[name]),
                encoding.dwarf_code()
            )),
            TypeDescriptor::Tuple { elements } => {
                Some(format!("T{}_", self.mangle_parts(elements)))
            }
            TypeDescriptor::Indirect { pointee } => {
                Some(format!("Bo{}", mangle_path(&[self.mangled_name(*pointee)])))
            }
            TypeDescriptor::Function { params, result } => Some(format!(
                "F{}_{}",
                self.mangle_parts(params),
                mangle_path(&[self.mangled_name(*result)])
            )),
            _ => None,
        }
    }

    fn mangle_parts(&self, ids: &[TypeId]) -> String {
        let parts: Vec<&str> = ids.iter().map(|&id| self.mangled_name(id)).collect();
        mangle_path(&parts)
    }
}

/// Sequential layout cursor: packs fields in order at their natural
/// alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    offset_bits: u64,
    align_bits: u32,
}

impl Layout {
    /// Place a field, returning its offset in bits.
    pub fn place(&mut self, size_bits: u64, align_bits: u32) -> u64 {
        let offset = align_up(self.offset_bits, align_bits);
        self.offset_bits = offset + size_bits;
        self.align_bits = self.align_bits.max(align_bits);
        offset
    }

    /// Total size (rounded up to the alignment) and alignment.
    pub fn finish(self) -> (u64, u32) {
        (align_up(self.offset_bits, self.align_bits), self.align_bits)
    }
}

/// Round `value` up to a multiple of `align`. Zero alignment is a no-op.
pub fn align_up(value: u64, align: u32) -> u64 {
    let align = u64::from(align);
    if align == 0 {
        value
    } else {
        value.div_ceil(align) * align
    }
}
