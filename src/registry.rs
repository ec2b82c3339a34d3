use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::codec::*;
use crate::compiled::CompiledObjectCodec;
use crate::core::{self, major, raw, TAG_NULL};
use crate::meta::{ClassInfo, EnumInfo};
use crate::types::{ClassBinding, Kind, Shape, TypeKey, TypeRef};
use crate::{
    ReadContext, Registrable, Result, Transfer, TransferConfig, TransferError, TransferIter, TransferType, Value,
    WriteContext,
};

type Codecs = (Arc<dyn Serializer>, Arc<dyn Deserializer>);

fn pair<C: Serializer + Deserializer + 'static>(codec: Arc<C>) -> Codecs {
    let serializer: Arc<dyn Serializer> = codec.clone();
    let deserializer: Arc<dyn Deserializer> = codec;
    (serializer, deserializer)
}

/// Codec for a structural kind, if the kind has one.
fn builtin_codecs(kind: Kind) -> Option<Codecs> {
    Some(match kind {
        Kind::Bool => pair(Arc::new(BoolCodec)),
        Kind::Number => pair(Arc::new(NumberCodec)),
        Kind::Decimal => pair(Arc::new(DecimalCodec)),
        Kind::String => pair(Arc::new(StringCodec)),
        Kind::ByteArray => pair(Arc::new(ByteArrayCodec)),
        Kind::DateTime => pair(Arc::new(DateTimeCodec)),
        Kind::Array => pair(Arc::new(ArrayCodec)),
        Kind::Collection => pair(Arc::new(CollectionCodec)),
        Kind::Map => pair(Arc::new(MapCodec)),
        Kind::MapEntry => pair(Arc::new(EntryCodec)),
        Kind::Enum | Kind::Object | Kind::Proxy | Kind::Dynamic | Kind::Custom => return None,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bind {
    Explicit,
    OnFirstUse,
}

/// Metadata built from a transferable declaration.
enum Described {
    Class(Arc<ClassInfo>),
    Enum(Arc<EnumInfo>),
}

impl Described {
    fn scan(key: TypeKey, id: u32, binding: ClassBinding) -> Self {
        match binding.shape {
            Shape::Object {
                describe,
                new_default,
            } => Described::Class(Arc::new(ClassInfo::scan(key, id, describe(), new_default))),
            Shape::Enum { describe } => Described::Enum(Arc::new(EnumInfo::scan(key, id, describe()))),
        }
    }
}

/// Registry changes made by one decode, held back until the decode succeeds.
#[derive(Default)]
pub(crate) struct Staged {
    deserializers: HashMap<TypeRef, Arc<dyn Deserializer>>,
    first_use: HashMap<TypeKey, Arc<dyn Deserializer>>,
    bindings: Vec<(TypeKey, u32, ClassBinding)>,
    classes: HashMap<u32, Arc<ClassInfo>>,
    enums: HashMap<u32, Arc<EnumInfo>>,
    pub(crate) uses: HashMap<TypeKey, u32>,
}

impl Staged {
    fn deserializer(&self, declared: &TypeRef, key: &TypeKey) -> Option<Arc<dyn Deserializer>> {
        self.deserializers
            .get(declared)
            .or_else(|| self.first_use.get(key))
            .cloned()
    }

    pub(crate) fn class_info_by_id(&self, id: u32) -> Option<Result<Arc<ClassInfo>>> {
        if let Some(info) = self.classes.get(&id) {
            return Some(Ok(info.clone()));
        }
        self.enums.get(&id).map(|info| {
            Err(TransferError::TypeMismatch {
                expected: "object class",
                found: format!("{} bound to id {}", info.name(), id),
            })
        })
    }

    pub(crate) fn enum_info_by_id(&self, id: u32) -> Option<Result<Arc<EnumInfo>>> {
        if let Some(info) = self.enums.get(&id) {
            return Some(Ok(info.clone()));
        }
        self.classes.get(&id).map(|info| {
            Err(TransferError::TypeMismatch {
                expected: "enum",
                found: format!("{} bound to id {}", info.name(), id),
            })
        })
    }

    fn is_empty(&self) -> bool {
        self.deserializers.is_empty() && self.bindings.is_empty() && self.uses.is_empty()
    }
}

/// One immutable snapshot of every registry table.
#[derive(Clone)]
struct Tables {
    dispatch: [Option<Arc<dyn Deserializer>>; 16],
    serializers: HashMap<TypeRef, Arc<dyn Serializer>>,
    deserializers: HashMap<TypeRef, Arc<dyn Deserializer>>,
    class_by_id: HashMap<u32, TypeKey>,
    id_by_class: HashMap<TypeKey, u32>,
    classes: HashMap<TypeKey, Arc<ClassInfo>>,
    enums: HashMap<TypeKey, Arc<EnumInfo>>,
    /// Types whose codecs were installed by `register_codec`.
    custom: HashSet<TypeKey>,
    /// Types currently served by a compiled codec.
    compiled: HashSet<TypeKey>,
}

impl Tables {
    fn builtin() -> Self {
        let mut tables = Tables {
            dispatch: std::array::from_fn(|_| None),
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
            class_by_id: HashMap::new(),
            id_by_class: HashMap::new(),
            classes: HashMap::new(),
            enums: HashMap::new(),
            custom: HashSet::new(),
            compiled: HashSet::new(),
        };

        tables.set_dispatch(core::TAG_NULL, Arc::new(NullCodec));
        tables.set_dispatch(core::TAG_OBJECT, Arc::new(ObjectCodec));
        tables.set_dispatch(core::TAG_ARRAY, Arc::new(ArrayCodec));
        tables.set_dispatch(core::TAG_COLLECTION, Arc::new(CollectionCodec));
        tables.set_dispatch(core::TAG_BYTE_ARRAY, Arc::new(ByteArrayCodec));
        tables.set_dispatch(core::TAG_MAP, Arc::new(MapCodec));
        tables.set_dispatch(core::TAG_NUMBER, Arc::new(NumberCodec));
        tables.set_dispatch(core::TAG_DECIMAL, Arc::new(DecimalCodec));
        tables.set_dispatch(core::TAG_STRING, Arc::new(StringCodec));
        tables.set_dispatch(core::TAG_BOOLEAN, Arc::new(BoolCodec));
        tables.set_dispatch(core::TAG_ENUM, Arc::new(EnumCodec));
        tables.set_dispatch(core::TAG_DATE_TIME, Arc::new(DateTimeCodec));
        tables.set_dispatch(core::TAG_MAP_ENTRY, Arc::new(EntryCodec));

        let number = pair(Arc::new(NumberCodec));
        for declared in [
            i8::declared_type(),
            i16::declared_type(),
            i32::declared_type(),
            i64::declared_type(),
            isize::declared_type(),
            u8::declared_type(),
            u16::declared_type(),
            u32::declared_type(),
            u64::declared_type(),
            usize::declared_type(),
            std::sync::atomic::AtomicI32::declared_type(),
            std::sync::atomic::AtomicI64::declared_type(),
            std::sync::atomic::AtomicU32::declared_type(),
            std::sync::atomic::AtomicU64::declared_type(),
        ] {
            tables.install(declared, &number);
        }
        let boolean = pair(Arc::new(BoolCodec));
        tables.install(bool::declared_type(), &boolean);
        tables.install(std::sync::atomic::AtomicBool::declared_type(), &boolean);
        let decimal = pair(Arc::new(DecimalCodec));
        tables.install(f32::declared_type(), &decimal);
        tables.install(f64::declared_type(), &decimal);
        let string = pair(Arc::new(StringCodec));
        tables.install(String::declared_type(), &string);
        tables.install(char::declared_type(), &string);
        let bytes = pair(Arc::new(ByteArrayCodec));
        tables.install(Bytes::declared_type(), &bytes);
        tables.install(Vec::<u8>::declared_type(), &bytes);
        tables.install(SystemTime::declared_type(), &pair(Arc::new(DateTimeCodec)));
        let big_number = pair(Arc::new(BigNumberCodec));
        for declared in crate::features::big_number_types() {
            tables.install(declared, &big_number);
        }

        tables.install(TypeRef::Class(raw::array()), &pair(Arc::new(ArrayCodec)));
        let collection = pair(Arc::new(CollectionCodec));
        for key in [raw::vec(), raw::vec_deque(), raw::hash_set(), raw::btree_set()] {
            tables.install(TypeRef::Class(key), &collection);
        }
        let map = pair(Arc::new(MapCodec));
        for key in [raw::hash_map(), raw::btree_map()] {
            tables.install(TypeRef::Class(key), &map);
        }
        tables.install(TypeRef::Class(raw::entry()), &pair(Arc::new(EntryCodec)));
        tables
    }

    fn set_dispatch(&mut self, tag: u8, deserializer: Arc<dyn Deserializer>) {
        self.dispatch[(major(tag) >> 4) as usize] = Some(deserializer);
    }

    fn dispatch(&self, tag: u8) -> Result<Arc<dyn Deserializer>> {
        self.dispatch[(major(tag) >> 4) as usize]
            .clone()
            .ok_or(TransferError::UnsupportedTag(tag))
    }

    fn install(&mut self, declared: TypeRef, codecs: &Codecs) {
        self.serializers.insert(declared.clone(), codecs.0.clone());
        self.deserializers.insert(declared, codecs.1.clone());
    }

    fn codecs_of(&self, declared: &TypeRef) -> Option<Codecs> {
        Some((
            self.serializers.get(declared)?.clone(),
            self.deserializers.get(declared)?.clone(),
        ))
    }

    /// Drops every binding of `key`.
    fn forget(&mut self, key: &TypeKey) {
        if let Some(id) = self.id_by_class.remove(key) {
            self.class_by_id.remove(&id);
        }
        self.classes.remove(key);
        self.enums.remove(key);
        self.compiled.remove(key);
        if !self.custom.contains(key) {
            let class = TypeRef::Class(*key);
            self.serializers.remove(&class);
            self.deserializers.remove(&class);
        }
    }

    /// Puts every compiled type back on its generic codec. Compiled codecs hold
    /// pre-resolved field codecs that a new binding may have made stale.
    fn decompile(&mut self) {
        for key in std::mem::take(&mut self.compiled) {
            if let Some(info) = self.classes.get(&key).cloned() {
                info.reset_uses();
                self.install(TypeRef::Class(key), &pair(Arc::new(TaggedObjectCodec::new(info))));
            }
        }
    }
}

/// Maps types to wire ids and codecs.
///
/// Reads go through a lock-free snapshot of the tables. Registrations and cache
/// fills are serialized on a mutex, re-checked under it, and published as a new
/// snapshot, so concurrent first use of a type binds it exactly once.
pub struct Registry {
    config: TransferConfig,
    tables: ArcSwap<Tables>,
    write_lock: Mutex<()>,
    epoch: AtomicU64,
    null: Arc<NullCodec>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.load();
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("epoch", &self.epoch())
            .field("classes", &tables.class_by_id)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(TransferConfig::default())
    }

    pub fn with_config(config: TransferConfig) -> Self {
        Self {
            config,
            tables: ArcSwap::new(Arc::new(Tables::builtin())),
            write_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
            null: Arc::new(NullCodec),
        }
    }

    /// The process-wide registry used by the free functions, built on first access.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Number of table mutations so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Drops every registration, custom codec and cache entry, keeping the built-ins.
    pub fn reset(&self) {
        let _guard = self.write_lock.lock();
        self.publish(Tables::builtin());
        debug!("registry reset to built-in codecs");
    }

    fn publish(&self, tables: Tables) {
        self.tables.store(Arc::new(tables));
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    // --- registration ---

    /// Binds `T` to `id`. The latest registration wins: an earlier type bound to
    /// the same id, or an earlier id of the same type, is dropped with a warning.
    pub fn register_type<T: Registrable>(&self, id: u32) {
        self.bind(T::key(), id, T::binding(), Bind::Explicit);
    }

    /// Installs a custom codec pair for `T`, replacing any codec resolved so far.
    pub fn register_codec<T: TransferType>(
        &self,
        serializer: Arc<dyn Serializer>,
        deserializer: Arc<dyn Deserializer>,
    ) {
        let declared = T::declared_type();
        let _guard = self.write_lock.lock();
        let mut tables = Tables::clone(&self.tables.load());
        tables.decompile();
        if tables.serializers.contains_key(&declared) {
            warn!(target_type = %declared, "replacing the codec bound to this type");
        }
        if let TypeRef::Class(key) = &declared {
            tables.custom.insert(*key);
        }
        tables.install(declared.clone(), &(serializer, deserializer));
        self.publish(tables);
        debug!(target_type = %declared, "custom codec registered");
    }

    /// Replaces the deserializer used for values of one major tag kind when the
    /// declared type is universal.
    pub fn register_tag_codec(&self, tag: u8, deserializer: Arc<dyn Deserializer>) {
        let _guard = self.write_lock.lock();
        let mut tables = Tables::clone(&self.tables.load());
        if tables.dispatch(tag).is_ok() {
            warn!(tag = core::major_name(tag), "replacing the tag dispatch codec");
        }
        tables.set_dispatch(tag, deserializer);
        self.publish(tables);
    }

    fn bind(&self, key: TypeKey, id: u32, binding: ClassBinding, mode: Bind) -> Codecs {
        let _guard = self.write_lock.lock();
        let current = self.tables.load_full();
        if mode == Bind::OnFirstUse && current.id_by_class.contains_key(&key) {
            if let Some(codecs) = current.codecs_of(&TypeRef::Class(key)) {
                return codecs;
            }
        }
        let mut tables = Tables::clone(&current);
        let codecs = self.bind_into(&mut tables, key, id, binding, mode);
        self.publish(tables);
        codecs
    }

    /// Applies one binding to a private copy of the tables. The caller holds the
    /// write lock and publishes.
    fn bind_into(&self, tables: &mut Tables, key: TypeKey, id: u32, binding: ClassBinding, mode: Bind) -> Codecs {
        let class = TypeRef::Class(key);
        if let Some(previous) = tables.class_by_id.get(&id).copied() {
            if previous != key {
                warn!(id, previous = previous.name(), class = key.name(), "class id rebound; the latest registration wins");
                tables.forget(&previous);
            }
        }
        match tables.id_by_class.get(&key).copied() {
            Some(previous) if previous != id => {
                warn!(previous, id, class = key.name(), "class registered again under a new id");
                tables.class_by_id.remove(&previous);
            }
            Some(_) => warn!(id, class = key.name(), "class registered again"),
            None => {}
        }
        if mode == Bind::Explicit {
            tables.decompile();
        }
        tables.class_by_id.insert(id, key);
        tables.id_by_class.insert(key, id);

        let codecs = match Described::scan(key, id, binding) {
            Described::Class(info) => {
                tables.enums.remove(&key);
                tables.classes.insert(key, info.clone());
                pair(Arc::new(TaggedObjectCodec::new(info)))
            }
            Described::Enum(info) => {
                tables.classes.remove(&key);
                tables.enums.insert(key, info);
                pair(Arc::new(EnumCodec))
            }
        };
        let codecs = if tables.custom.contains(&key) {
            tables.codecs_of(&class).unwrap_or(codecs)
        } else {
            tables.compiled.remove(&key);
            tables.install(class, &codecs);
            codecs
        };
        match mode {
            Bind::Explicit => debug!(id, class = key.name(), "class registered"),
            Bind::OnFirstUse => debug!(id, class = key.name(), "class registered on first use"),
        }
        codecs
    }

    /// The id and declaration `key` is bound with on first use.
    fn first_use_binding(&self, key: TypeKey) -> Result<(u32, ClassBinding)> {
        let binding = key.binding().ok_or_else(|| {
            TransferError::UnsupportedType(format!("{} has no transferable declaration", key.name()))
        })?;
        let Some(id) = binding.declared_id else {
            return Err(TransferError::UnsupportedType(format!(
                "{} is not registered and declares no #[transfer(id)]",
                key.name()
            )));
        };
        if !self.config.auto_register {
            return Err(TransferError::UnsupportedType(format!(
                "{} is not registered and auto-registration is disabled",
                key.name()
            )));
        }
        Ok((id, binding))
    }

    fn auto_register(&self, key: TypeKey) -> Result<Codecs> {
        let (id, binding) = self.first_use_binding(key)?;
        Ok(self.bind(key, id, binding, Bind::OnFirstUse))
    }

    /// Builds the first-use binding of `key` for the current decode only.
    fn stage_first_use(&self, key: TypeKey, staged: &mut Staged) -> Result<Arc<dyn Deserializer>> {
        let (id, binding) = self.first_use_binding(key)?;
        let deserializer: Arc<dyn Deserializer> = match Described::scan(key, id, binding) {
            Described::Class(info) => {
                staged.classes.insert(id, info.clone());
                Arc::new(TaggedObjectCodec::new(info))
            }
            Described::Enum(info) => {
                staged.enums.insert(id, info);
                Arc::new(EnumCodec)
            }
        };
        staged.first_use.insert(key, deserializer.clone());
        staged.bindings.push((key, id, binding));
        trace!(id, class = key.name(), "first use staged");
        Ok(deserializer)
    }

    /// Publishes the changes of a successful decode in one snapshot, then
    /// counts its object uses.
    pub(crate) fn commit(&self, staged: Staged) {
        if staged.is_empty() {
            return;
        }
        if !staged.bindings.is_empty() || !staged.deserializers.is_empty() {
            let _guard = self.write_lock.lock();
            let mut tables = Tables::clone(&self.tables.load());
            let mut changed = false;
            for (key, id, binding) in staged.bindings {
                if !tables.id_by_class.contains_key(&key) {
                    self.bind_into(&mut tables, key, id, binding, Bind::OnFirstUse);
                    changed = true;
                }
            }
            for (declared, deserializer) in staged.deserializers {
                if !tables.deserializers.contains_key(&declared) {
                    trace!(declared = %declared, "deserializer cached");
                    tables.deserializers.insert(declared, deserializer);
                    changed = true;
                }
            }
            if changed {
                self.publish(tables);
            }
        }
        for (key, count) in staged.uses {
            if let Some(info) = self.class_info(&key) {
                self.note_uses(&info, count);
            }
        }
    }

    /// Counts uses of a class on the generic codec and installs its compiled
    /// codec when the count reaches the configured threshold.
    pub(crate) fn note_uses(&self, info: &Arc<ClassInfo>, count: u32) {
        let Some(threshold) = self.config.compile_threshold else {
            return;
        };
        let (before, after) = info.record_uses(count);
        if before >= threshold || after < threshold {
            return;
        }
        if let Err(e) = self.install_compiled(info) {
            warn!(class = info.name(), error = %e, "compiled codec unavailable; staying on the generic path");
        }
    }

    fn remember_serializer(&self, runtime: &TypeRef, serializer: &Arc<dyn Serializer>) {
        let _guard = self.write_lock.lock();
        let current = self.tables.load();
        if current.serializers.contains_key(runtime) {
            return;
        }
        let mut tables = Tables::clone(&current);
        tables.serializers.insert(runtime.clone(), serializer.clone());
        self.publish(tables);
        trace!(runtime = %runtime, "serializer cached");
    }

    fn remember_deserializer(
        &self,
        declared: &TypeRef,
        deserializer: &Arc<dyn Deserializer>,
        staged: Option<&mut Staged>,
    ) {
        if let Some(staged) = staged {
            staged.deserializers.insert(declared.clone(), deserializer.clone());
            return;
        }
        let _guard = self.write_lock.lock();
        let current = self.tables.load();
        if current.deserializers.contains_key(declared) {
            return;
        }
        let mut tables = Tables::clone(&current);
        tables.deserializers.insert(declared.clone(), deserializer.clone());
        self.publish(tables);
        trace!(declared = %declared, "deserializer cached");
    }

    // --- resolution ---

    /// The serializer for values whose runtime type is `runtime`.
    pub fn resolve_serializer(&self, runtime: &TypeRef) -> Result<Arc<dyn Serializer>> {
        let raw_hit = {
            let tables = self.tables.load();
            if let Some(serializer) = tables.serializers.get(runtime) {
                return Ok(serializer.clone());
            }
            match runtime {
                TypeRef::Parameterized(raw, _) => tables.serializers.get(&TypeRef::Class(*raw)).cloned(),
                _ => None,
            }
        };
        if let Some(serializer) = raw_hit {
            self.remember_serializer(runtime, &serializer);
            return Ok(serializer);
        }

        let key = runtime.raw().ok_or_else(|| {
            TransferError::UnsupportedType("a value without a runtime type".to_string())
        })?;
        let serializer = match key.kind() {
            Kind::Object | Kind::Enum => return self.auto_register(key).map(|(serializer, _)| serializer),
            Kind::Proxy => Arc::new(ProxyCodec) as Arc<dyn Serializer>,
            kind => match builtin_codecs(kind) {
                Some((serializer, _)) => serializer,
                None => {
                    return Err(TransferError::UnsupportedType(format!("{} has no registered codec", runtime)))
                }
            },
        };
        self.remember_serializer(runtime, &serializer);
        Ok(serializer)
    }

    /// The deserializer for a value announced by `tag` where `declared` is expected.
    ///
    /// A NULL tag always yields the null codec. A universal declared type, or one
    /// whose concrete type is only known on the wire, dispatches on the tag.
    pub fn resolve_deserializer(&self, declared: &TypeRef, tag: u8) -> Result<Arc<dyn Deserializer>> {
        self.resolve_deserializer_staged(declared, tag, None)
    }

    /// Resolution for a decode in progress: with `staged`, registrations and
    /// cache fills are recorded there instead of published.
    pub(crate) fn resolve_deserializer_staged(
        &self,
        declared: &TypeRef,
        tag: u8,
        staged: Option<&mut Staged>,
    ) -> Result<Arc<dyn Deserializer>> {
        if major(tag) == TAG_NULL {
            return Ok(self.null.clone());
        }
        match self.typed_deserializer(declared, staged)? {
            Some(deserializer) => Ok(deserializer),
            None => self.tables.load().dispatch(tag),
        }
    }

    /// The deserializer fixed by `declared` alone, `None` when the tag decides.
    pub(crate) fn typed_deserializer(
        &self,
        declared: &TypeRef,
        staged: Option<&mut Staged>,
    ) -> Result<Option<Arc<dyn Deserializer>>> {
        let key = match declared {
            TypeRef::Any => return Ok(None),
            TypeRef::Class(key) | TypeRef::Parameterized(key, _) => *key,
        };
        if let Some(deserializer) = staged.as_deref().and_then(|staged| staged.deserializer(declared, &key)) {
            return Ok(Some(deserializer));
        }
        let raw_hit = {
            let tables = self.tables.load();
            if let Some(deserializer) = tables.deserializers.get(declared) {
                return Ok(Some(deserializer.clone()));
            }
            match declared {
                TypeRef::Parameterized(raw, _) => tables.deserializers.get(&TypeRef::Class(*raw)).cloned(),
                _ => None,
            }
        };
        if let Some(deserializer) = raw_hit {
            self.remember_deserializer(declared, &deserializer, staged);
            return Ok(Some(deserializer));
        }

        match key.kind() {
            Kind::Dynamic | Kind::Proxy => Ok(None),
            Kind::Object | Kind::Enum => match staged {
                Some(staged) => self.stage_first_use(key, staged).map(Some),
                None => self.auto_register(key).map(|(_, deserializer)| Some(deserializer)),
            },
            kind => match builtin_codecs(kind) {
                Some((_, deserializer)) => {
                    self.remember_deserializer(declared, &deserializer, staged);
                    Ok(Some(deserializer))
                }
                None => Err(TransferError::UnsupportedType(format!("{} has no registered codec", declared))),
            },
        }
    }

    // --- lookups ---

    pub fn class_id(&self, key: &TypeKey) -> Option<u32> {
        self.tables.load().id_by_class.get(key).copied()
    }

    pub fn class_by_id(&self, id: u32) -> Result<TypeKey> {
        self.tables
            .load()
            .class_by_id
            .get(&id)
            .copied()
            .ok_or(TransferError::UnregisteredClassId(id))
    }

    pub fn class_info(&self, key: &TypeKey) -> Option<Arc<ClassInfo>> {
        self.tables.load().classes.get(key).cloned()
    }

    pub fn enum_info(&self, key: &TypeKey) -> Option<Arc<EnumInfo>> {
        self.tables.load().enums.get(key).cloned()
    }

    pub fn class_info_by_id(&self, id: u32) -> Result<Arc<ClassInfo>> {
        let tables = self.tables.load();
        let key = tables.class_by_id.get(&id).ok_or(TransferError::UnregisteredClassId(id))?;
        tables.classes.get(key).cloned().ok_or_else(|| TransferError::TypeMismatch {
            expected: "object class",
            found: format!("{} bound to id {}", key.name(), id),
        })
    }

    pub fn enum_info_by_id(&self, id: u32) -> Result<Arc<EnumInfo>> {
        let tables = self.tables.load();
        let key = tables.class_by_id.get(&id).ok_or(TransferError::UnregisteredClassId(id))?;
        tables.enums.get(key).cloned().ok_or_else(|| TransferError::TypeMismatch {
            expected: "enum",
            found: format!("{} bound to id {}", key.name(), id),
        })
    }

    // --- compiled tier ---

    /// Installs the compiled codec for `T` now instead of after the use threshold.
    pub fn compile<T: Registrable>(&self) -> Result<()> {
        let key = T::key();
        if self.class_id(&key).is_none() {
            let binding = T::binding();
            let id = binding.declared_id.ok_or_else(|| {
                TransferError::UnsupportedType(format!("{} is not registered", key.name()))
            })?;
            self.bind(key, id, binding, Bind::OnFirstUse);
        }
        let info = self.class_info(&key).ok_or_else(|| {
            TransferError::UnsupportedType(format!("{} is not an object class", key.name()))
        })?;
        self.install_compiled(&info)
    }

    pub(crate) fn install_compiled(&self, info: &Arc<ClassInfo>) -> Result<()> {
        let compiled = pair(Arc::new(CompiledObjectCodec::build(self, info.clone())?));
        let key = info.key();
        let _guard = self.write_lock.lock();
        let current = self.tables.load();
        let still_bound = current.classes.get(&key).is_some_and(|bound| Arc::ptr_eq(bound, info));
        if !still_bound || current.custom.contains(&key) || current.compiled.contains(&key) {
            return Ok(());
        }
        let mut tables = Tables::clone(&current);
        tables.install(TypeRef::Class(key), &compiled);
        tables.compiled.insert(key);
        self.publish(tables);
        debug!(class = info.name(), fields = info.fields().len(), "compiled codec installed");
        Ok(())
    }

    // --- encode / decode ---

    pub fn encode(&self, value: &dyn Transfer) -> Result<Bytes> {
        let mut ctx = WriteContext::new(self);
        ctx.write(value)?;
        Ok(ctx.finish())
    }

    /// Decodes one value of type `T`. Types first seen while decoding are bound,
    /// and their uses counted, only if the whole value decodes.
    pub fn decode<T: TransferType>(&self, bytes: impl Into<Bytes>) -> Result<T> {
        let mut ctx = ReadContext::new(self, bytes.into());
        let value = ctx.read(&T::declared_type()).and_then(T::from_value)?;
        ctx.commit();
        Ok(value)
    }

    pub fn decode_value(&self, bytes: impl Into<Bytes>, declared: &TypeRef) -> Result<Value> {
        let mut ctx = ReadContext::new(self, bytes.into());
        let value = ctx.read(declared)?;
        ctx.commit();
        Ok(value)
    }

    /// Opens a forward-only iterator over an encoded array or collection of `T`.
    pub fn iterator<T: TransferType>(&self, bytes: impl Into<Bytes>) -> Result<TransferIter<'_, T>> {
        TransferIter::open(self, bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transferable;
    use tracing_test::traced_test;

    #[derive(Transferable, Default, Debug, PartialEq)]
    #[transfer(id = 40)]
    struct First {
        value: i32,
    }

    #[derive(Transferable, Default, Debug, PartialEq)]
    #[transfer(id = 41)]
    struct Second {
        value: i32,
    }

    #[test]
    #[traced_test]
    fn conflicting_id_warns_and_latest_wins() {
        let registry = Registry::new();
        registry.register_type::<First>(7);
        registry.register_type::<Second>(7);

        assert!(logs_contain("class id rebound"));
        assert_eq!(registry.class_by_id(7).unwrap(), Second::key());
        assert_eq!(registry.class_id(&First::key()), None);
    }

    #[test]
    #[traced_test]
    fn repeated_registration_warns() {
        let registry = Registry::new();
        registry.register_type::<First>(7);
        registry.register_type::<First>(7);
        assert!(logs_contain("class registered again"));
        assert_eq!(registry.class_id(&First::key()), Some(7));
    }

    #[test]
    #[traced_test]
    fn first_use_registration_is_logged() {
        let registry = Registry::new();
        registry.encode(&Second { value: 1 }).unwrap();
        assert!(logs_contain("class registered on first use"));
        assert_eq!(registry.class_id(&Second::key()), Some(41));
    }

    #[test]
    fn reregistering_under_a_new_id_frees_the_old_one() {
        let registry = Registry::new();
        registry.register_type::<First>(3);
        registry.register_type::<First>(4);
        assert!(matches!(registry.class_by_id(3), Err(TransferError::UnregisteredClassId(3))));
        assert_eq!(registry.class_id(&First::key()), Some(4));
    }

    #[test]
    fn reset_keeps_builtins_only() {
        let registry = Registry::new();
        registry.register_type::<First>(3);
        let before = registry.epoch();
        registry.reset();
        assert!(registry.epoch() > before);
        assert!(registry.class_by_id(3).is_err());
        assert!(registry.resolve_serializer(&i32::declared_type()).is_ok());
    }

    #[test]
    fn unassigned_major_tags_are_unsupported() {
        let registry = Registry::new();
        for tag in [0xD0u8, 0xE3, 0xFF] {
            assert!(matches!(
                registry.resolve_deserializer(&TypeRef::Any, tag),
                Err(TransferError::UnsupportedTag(t)) if t == tag
            ));
        }
    }
}
