use std::{collections::BTreeMap, collections::HashMap, fmt, rc::Rc};

/// A shared handle to an immutable type descriptor.
///
/// Descriptors are allocated once, when the declaration that introduces them
/// is processed, and every use site holds a handle to that same allocation.
#[derive(Clone)]
pub struct TypeRef(Rc<Type>);

impl TypeRef {
    pub fn new(ty: Type) -> TypeRef {
        TypeRef(Rc::new(ty))
    }

    /// Whether both handles point to the very same descriptor.
    pub fn same(&self, other: &TypeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for TypeRef {
    type Target = Type;

    fn deref(&self) -> &Type {
        &self.0
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || *self.0 == *other.0
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[derive(Debug)]
pub enum Type {
    Function(FunctionType),
    Struct(StructType),
    Integer { width: u32, signed: bool },
    Float { width: u32 },
    Bool,
    Reference(TypeRef),
    Pointer { level: u16, of: TypeRef },
}

#[derive(Debug)]
pub struct FunctionType {
    pub ident: Box<str>,
    /// `None` for functions returning `void`.
    pub ret: Option<TypeRef>,
    pub params: Vec<TypeRef>,
}

#[derive(Debug)]
pub struct StructType {
    pub ident: Box<str>,
    /// Maps each field name to its byte offset and type.
    pub fields: BTreeMap<Box<str>, (u64, TypeRef)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Function,
    Struct,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Reference,
    Pointer,
}

impl Type {
    pub fn int(width: u32) -> Type {
        Type::Integer {
            width,
            signed: true,
        }
    }

    pub fn uint(width: u32) -> Type {
        Type::Integer {
            width,
            signed: false,
        }
    }

    /// Builds the descriptor of a scalar kind. Returns `None` for kinds that
    /// need more than a discriminant to be described.
    pub fn scalar(kind: TypeKind) -> Option<Type> {
        let ty = match kind {
            TypeKind::I8 => Type::int(8),
            TypeKind::I16 => Type::int(16),
            TypeKind::I32 => Type::int(32),
            TypeKind::I64 => Type::int(64),
            TypeKind::I128 => Type::int(128),
            TypeKind::U8 => Type::uint(8),
            TypeKind::U16 => Type::uint(16),
            TypeKind::U32 => Type::uint(32),
            TypeKind::U64 => Type::uint(64),
            TypeKind::U128 => Type::uint(128),
            TypeKind::F32 => Type::Float { width: 32 },
            TypeKind::F64 => Type::Float { width: 64 },
            TypeKind::Bool => Type::Bool,
            TypeKind::Function | TypeKind::Struct | TypeKind::Reference | TypeKind::Pointer => {
                return None
            }
        };
        Some(ty)
    }

    pub fn kind(&self) -> TypeKind {
        match *self {
            Type::Function(_) => TypeKind::Function,
            Type::Struct(_) => TypeKind::Struct,
            Type::Integer { width, signed } => match (width, signed) {
                (8, true) => TypeKind::I8,
                (16, true) => TypeKind::I16,
                (32, true) => TypeKind::I32,
                (64, true) => TypeKind::I64,
                (8, false) => TypeKind::U8,
                (16, false) => TypeKind::U16,
                (32, false) => TypeKind::U32,
                (64, false) => TypeKind::U64,
                (_, true) => TypeKind::I128,
                (_, false) => TypeKind::U128,
            },
            Type::Float { width: 64 } => TypeKind::F64,
            Type::Float { .. } => TypeKind::F32,
            Type::Bool => TypeKind::Bool,
            Type::Reference(_) => TypeKind::Reference,
            Type::Pointer { .. } => TypeKind::Pointer,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Type::Float { .. })
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Integer { signed: false, .. })
    }

    /// Returns `None` ("unknown") for non-scalar types.
    pub fn bit_width(&self) -> Option<u32> {
        match *self {
            Type::Integer { width, .. } | Type::Float { width } => Some(width),
            Type::Bool => Some(1),
            _ => None,
        }
    }

    /// The storage size of a value of this type, in bytes. Function types
    /// have no storage.
    pub fn byte_size(&self) -> Option<u64> {
        match self {
            Type::Function(_) => None,
            Type::Bool => Some(1),
            Type::Integer { width, .. } | Type::Float { width } => Some(u64::from(*width / 8)),
            Type::Reference(_) | Type::Pointer { .. } => Some(8),
            Type::Struct(s) => s
                .fields
                .values()
                .map(|(offset, ty)| Some(offset + ty.byte_size()?))
                .try_fold(0, |max, end| Some(u64::max(max, end?))),
        }
    }

    /// Only named types (functions and structs) carry an identifier.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Type::Function(f) => Some(&f.ident),
            Type::Struct(s) => Some(&s.ident),
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Function(a), Type::Function(b)) => a.params == b.params && a.ret == b.ret,
            (Type::Struct(a), Type::Struct(b)) => a.fields == b.fields,
            (Type::Reference(a), Type::Reference(b)) => a == b,
            (Type::Pointer { of: a, .. }, Type::Pointer { of: b, .. }) => a == b,
            (Type::Function(_) | Type::Struct(_), _) | (_, Type::Function(_) | Type::Struct(_)) => {
                false
            }
            _ => self.kind() == other.kind(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Function(func) => f.write_str(&func.ident),
            Type::Struct(s) => f.write_str(&s.ident),
            Type::Integer { width, signed } => {
                write!(f, "{}{width}", if *signed { 'i' } else { 'u' })
            }
            Type::Float { width } => write!(f, "f{width}"),
            Type::Bool => f.write_str("bool"),
            Type::Reference(of) => write!(f, "&{of}"),
            Type::Pointer { level, of } => {
                write!(f, "{of}")?;
                (0..*level).try_for_each(|_| f.write_str("*"))
            }
        }
    }
}

/// The result of resolving a declared type name.
#[derive(Clone, Debug, PartialEq)]
pub enum Declared {
    Void,
    Type(TypeRef),
}

impl Declared {
    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            Declared::Void => None,
            Declared::Type(ty) => Some(ty),
        }
    }
}

pub struct TypeRegistry {
    map: HashMap<Box<str>, TypeRef>,
}

impl TypeRegistry {
    pub fn with_capacity(capacity: usize) -> TypeRegistry {
        TypeRegistry {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// A registry holding every built-in scalar type.
    pub fn with_builtins() -> TypeRegistry {
        let mut registry = TypeRegistry::with_capacity(builtins::SCALARS.len() + 8);
        for (&name, &kind) in builtins::SCALARS.entries() {
            if let Some(ty) = Type::scalar(kind) {
                registry.map.insert(name.into(), TypeRef::new(ty));
            }
        }
        registry
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.map.get(name)
    }

    /// Resolves a type name. Trailing `*`s denote pointers to the named type,
    /// and `void` resolves to [`Declared::Void`]. A pointer descriptor is
    /// created on first use and shared by every later resolution of the same
    /// name.
    pub fn resolve(&mut self, name: &str) -> Option<Declared> {
        if let Some(ty) = self.get(name) {
            return Some(Declared::Type(ty.clone()));
        }
        let base = name.trim_end_matches('*');
        let level = u16::try_from(name.len() - base.len()).ok()?;
        if base == builtins::VOID {
            return (level == 0).then_some(Declared::Void);
        }
        if level == 0 {
            return None;
        }
        let of = self.map.get(base)?.clone();
        let ty = TypeRef::new(Type::Pointer { level, of });
        self.map.insert(name.into(), ty.clone());
        Some(Declared::Type(ty))
    }

    /// Attempts to define the provided named type, returning its handle.
    ///
    /// Fails if a type with the same name is already defined.
    pub fn define(&mut self, name: &str, ty: Type) -> Result<TypeRef, ()> {
        if self.has(name) || name == builtins::VOID {
            return Err(());
        }
        let ty = TypeRef::new(ty);
        self.map.insert(name.into(), ty.clone());
        Ok(ty)
    }
}

pub mod builtins {
    use super::TypeKind;

    pub const VOID: &str = "void";

    pub static SCALARS: phf::Map<&'static str, TypeKind> = phf::phf_map! {
        "i8" => TypeKind::I8,
        "i16" => TypeKind::I16,
        "i32" => TypeKind::I32,
        "i64" => TypeKind::I64,
        "i128" => TypeKind::I128,
        "u8" => TypeKind::U8,
        "u16" => TypeKind::U16,
        "u32" => TypeKind::U32,
        "u64" => TypeKind::U64,
        "u128" => TypeKind::U128,
        "f32" => TypeKind::F32,
        "f64" => TypeKind::F64,
        "bool" => TypeKind::Bool,
    };

    /// Checks whether the word, ignoring pointer stars, names a built-in type.
    pub fn is_type_name(word: &str) -> bool {
        let base = word.trim_end_matches('*');
        base == VOID || SCALARS.contains_key(base)
    }
}
