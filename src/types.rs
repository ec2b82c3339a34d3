use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::meta::{ClassDesc, EnumDesc};
use crate::{Object, Registrable};

/// Structural classification of a type, consulted when no codec is cached for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Number,
    Decimal,
    String,
    ByteArray,
    DateTime,
    Array,
    Collection,
    Map,
    MapEntry,
    Enum,
    Object,
    /// A wrapper whose payload is another value.
    Proxy,
    /// Decided by the tag on the wire.
    Dynamic,
    /// Only encodable through a codec registered for it.
    Custom,
}

/// How a registrable type is described and instantiated.
#[derive(Clone, Copy)]
pub enum Shape {
    Object {
        describe: fn() -> ClassDesc,
        new_default: fn() -> Box<dyn Object>,
    },
    Enum {
        describe: fn() -> EnumDesc,
    },
}

/// The transferable declaration of a type, as produced by `#[derive(Transferable)]`.
#[derive(Clone, Copy)]
pub struct ClassBinding {
    pub declared_id: Option<u32>,
    pub shape: Shape,
}

impl ClassBinding {
    pub fn object(
        declared_id: Option<u32>,
        describe: fn() -> ClassDesc,
        new_default: fn() -> Box<dyn Object>,
    ) -> Self {
        Self {
            declared_id,
            shape: Shape::Object {
                describe,
                new_default,
            },
        }
    }

    pub fn enumeration(declared_id: Option<u32>, describe: fn() -> EnumDesc) -> Self {
        Self {
            declared_id,
            shape: Shape::Enum { describe },
        }
    }
}

/// Identity of a concrete or raw generic type.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    kind: Kind,
    binding: Option<fn() -> ClassBinding>,
}

impl TypeKey {
    pub fn new(id: TypeId, name: &'static str, kind: Kind) -> Self {
        Self {
            id,
            name,
            kind,
            binding: None,
        }
    }

    pub fn of<T: ?Sized + 'static>(kind: Kind) -> Self {
        Self::new(TypeId::of::<T>(), type_name::<T>(), kind)
    }

    pub fn object<T: Registrable>() -> Self {
        Self {
            binding: Some(T::binding as fn() -> ClassBinding),
            ..Self::of::<T>(Kind::Object)
        }
    }

    pub fn enumeration<T: Registrable>() -> Self {
        Self {
            binding: Some(T::binding as fn() -> ClassBinding),
            ..Self::of::<T>(Kind::Enum)
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn binding(&self) -> Option<ClassBinding> {
        self.binding.map(|binding| binding())
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A declared or runtime type: the universal type, a class, or a raw generic type
/// applied to arguments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Any,
    Class(TypeKey),
    Parameterized(TypeKey, Arc<[TypeRef]>),
}

impl TypeRef {
    pub fn parameterized(raw: TypeKey, args: impl Into<Arc<[TypeRef]>>) -> Self {
        TypeRef::Parameterized(raw, args.into())
    }

    /// The class or raw generic type, `None` for [`TypeRef::Any`].
    pub fn raw(&self) -> Option<TypeKey> {
        match self {
            TypeRef::Any => None,
            TypeRef::Class(key) | TypeRef::Parameterized(key, _) => Some(*key),
        }
    }

    pub fn kind(&self) -> Kind {
        self.raw().map_or(Kind::Dynamic, |key| key.kind())
    }

    /// The type argument at `index`, or [`TypeRef::Any`] when it is not known.
    pub fn arg(&self, index: usize) -> TypeRef {
        match self {
            TypeRef::Parameterized(_, args) => args.get(index).cloned().unwrap_or(TypeRef::Any),
            _ => TypeRef::Any,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeRef::Any)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Any => f.write_str("_"),
            TypeRef::Class(key) => f.write_str(key.name()),
            TypeRef::Parameterized(raw, args) => {
                write!(f, "{}<", raw.name())?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
