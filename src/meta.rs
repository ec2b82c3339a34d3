use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{TypeKey, TypeRef};
use crate::{Object, Result, Transfer, TransferError, Value};

/// Borrows one field of an object, given the object as `&dyn Any`.
pub type Getter = fn(&dyn Any) -> Option<&dyn Transfer>;

/// Stores a decoded value into one field of an object.
pub type Setter = fn(&mut dyn Any, Value) -> Result<()>;

/// How a declared field takes part in the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    Plain,
    /// `#[transfer(transient)]`
    Transient,
    /// `#[transfer(ignore)]`
    Ignored,
}

#[derive(Clone, Copy)]
pub struct FieldAccess {
    pub declared: fn() -> TypeRef,
    pub get: Getter,
    pub set: Setter,
}

/// A field as declared on the type, in declaration order.
#[derive(Clone, Copy)]
pub struct FieldDesc {
    pub name: &'static str,
    pub modifier: Modifier,
    pub access: Option<FieldAccess>,
}

impl FieldDesc {
    pub fn plain(name: &'static str, access: FieldAccess) -> Self {
        Self {
            name,
            modifier: Modifier::Plain,
            access: Some(access),
        }
    }

    pub fn transient(name: &'static str) -> Self {
        Self {
            name,
            modifier: Modifier::Transient,
            access: None,
        }
    }

    pub fn ignored(name: &'static str) -> Self {
        Self {
            name,
            modifier: Modifier::Ignored,
            access: None,
        }
    }
}

/// All declared fields of an object type.
pub struct ClassDesc {
    pub name: &'static str,
    pub fields: Vec<FieldDesc>,
}

/// The constants of a unit-only enum, ordered by ordinal.
pub struct EnumDesc {
    pub name: &'static str,
    pub variants: &'static [&'static str],
    pub from_ordinal: fn(u32) -> Option<Box<dyn Object>>,
}

/// A field that is written to the wire.
#[derive(Clone)]
pub struct FieldInfo {
    name: &'static str,
    declared: TypeRef,
    get: Getter,
    set: Setter,
}

impl FieldInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared(&self) -> &TypeRef {
        &self.declared
    }

    pub fn get<'a>(&self, owner: &'a dyn Any) -> Result<&'a dyn Transfer> {
        (self.get)(owner).ok_or_else(|| self.foreign_owner())
    }

    pub fn set(&self, owner: &mut dyn Any, value: Value) -> Result<()> {
        (self.set)(owner, value)
    }

    fn foreign_owner(&self) -> TransferError {
        TransferError::TypeMismatch {
            expected: self.name,
            found: "a value of another type".to_string(),
        }
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.declared)
    }
}

/// The ordered list of serializable fields of a registered object type.
///
/// Built once at registration. Transient and ignored fields are left out.
/// Also counts how often the generic codec served the class, which drives
/// the switch to the compiled codec.
pub struct ClassInfo {
    key: TypeKey,
    id: u32,
    name: &'static str,
    fields: Vec<FieldInfo>,
    new_default: fn() -> Box<dyn Object>,
    uses: AtomicU32,
}

impl ClassInfo {
    pub(crate) fn scan(
        key: TypeKey,
        id: u32,
        desc: ClassDesc,
        new_default: fn() -> Box<dyn Object>,
    ) -> Self {
        let fields = desc
            .fields
            .into_iter()
            .filter_map(|field| match (field.modifier, field.access) {
                (Modifier::Plain, Some(access)) => Some(FieldInfo {
                    name: field.name,
                    declared: (access.declared)(),
                    get: access.get,
                    set: access.set,
                }),
                _ => None,
            })
            .collect();
        Self {
            key,
            id,
            name: desc.name,
            fields,
            new_default,
            uses: AtomicU32::new(0),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// A fresh instance with every field at its default.
    pub fn instantiate(&self) -> Box<dyn Object> {
        (self.new_default)()
    }

    /// Adds `count` uses and returns the total before and after.
    pub(crate) fn record_uses(&self, count: u32) -> (u32, u32) {
        let before = self.uses.fetch_add(count, Ordering::Relaxed);
        (before, before.saturating_add(count))
    }

    pub(crate) fn reset_uses(&self) {
        self.uses.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("fields", &self.fields)
            .finish()
    }
}

/// The constants of a registered enum.
pub struct EnumInfo {
    key: TypeKey,
    id: u32,
    name: &'static str,
    variants: &'static [&'static str],
    from_ordinal: fn(u32) -> Option<Box<dyn Object>>,
}

impl EnumInfo {
    pub(crate) fn scan(key: TypeKey, id: u32, desc: EnumDesc) -> Self {
        Self {
            key,
            id,
            name: desc.name,
            variants: desc.variants,
            from_ordinal: desc.from_ordinal,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn variants(&self) -> &'static [&'static str] {
        self.variants
    }

    pub fn constant(&self, ordinal: u32) -> Result<Box<dyn Object>> {
        (self.from_ordinal)(ordinal).ok_or_else(|| {
            TransferError::InvalidData(format!(
                "ordinal {} out of range for {} with {} constants",
                ordinal,
                self.name,
                self.variants.len()
            ))
        })
    }
}

impl fmt::Debug for EnumInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumInfo")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("variants", &self.variants)
            .finish()
    }
}
