//! # Type Marshaller
//!
//! Converts local values to `Value` and back.
//!
//! There are two paths:
//!
//! - **Static**: `IntoForeign` / `FromForeign`, implemented only for types the
//!   union can represent. A type without an impl cannot be passed at all, so it
//!   is rejected before marshalling rather than after.
//! - **Dynamic**: `Marshaller` narrows a boxed value by its runtime type through
//!   a registered table. Unregistered types pass through unchanged from
//!   `narrow`, and `to_foreign` turns that pass-through into `UnsupportedType`.
//!
//! Unboxing never converts magnitude: a `Long` does not become an `i32`.

use std::any::Any;
use std::any::TypeId;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Error;
use crate::error::Result;
use crate::handle::RemoteHandle;
use crate::proxy::Wrapper;
use crate::value::Value;

/// A local type with a foreign representation.
pub trait IntoForeign {
    fn into_foreign(self) -> Value;
}

/// A local type that can be unboxed from a foreign value of one exact kind.
pub trait FromForeign: Sized {
    /// The `Value::kind` this type accepts, for mismatch reports.
    const KIND: &'static str;

    fn from_foreign(value: Value) -> Result<Self>;
}

fn mismatch<T: FromForeign>(found: &Value) -> Error {
    Error::TypeMismatch { expected: T::KIND, found: found.kind() }
}

/// Types whose foreign form is never `Unit`.
///
/// `Option<T>` encodes `None` as `Unit`, so it is only offered for these;
/// `Option<()>`, `Option<Value>` and nested options would not survive the
/// trip back.
pub trait NeverUnit {}

macro_rules! scalar {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl IntoForeign for $ty {
            fn into_foreign(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromForeign for $ty {
            const KIND: &'static str = $kind;

            fn from_foreign(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }

        impl NeverUnit for $ty {}
    };
}

scalar!(bool, Bool, "bool");
scalar!(i8, Byte, "byte");
scalar!(i16, Short, "short");
scalar!(i32, Int, "int");
scalar!(i64, Long, "long");
scalar!(f32, Float, "float");
scalar!(f64, Double, "double");
scalar!(char, Char, "char");
scalar!(String, String, "string");
scalar!(RemoteHandle, Handle, "handle");

impl IntoForeign for &str {
    fn into_foreign(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoForeign for &RemoteHandle {
    fn into_foreign(self) -> Value {
        Value::Handle(self.clone())
    }
}

impl IntoForeign for () {
    fn into_foreign(self) -> Value {
        Value::Unit
    }
}

impl FromForeign for () {
    const KIND: &'static str = "unit";

    fn from_foreign(value: Value) -> Result<Self> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoForeign for Value {
    fn into_foreign(self) -> Value {
        self
    }
}

impl FromForeign for Value {
    const KIND: &'static str = "any";

    fn from_foreign(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl NeverUnit for &str {}
impl NeverUnit for &RemoteHandle {}
impl<T> NeverUnit for Vec<T> {}
impl<K, V> NeverUnit for BTreeMap<K, V> {}
impl<K, V, S> NeverUnit for HashMap<K, V, S> {}

// The foreign side has no distinct null for optional values; Unit stands in.
impl<T: IntoForeign + NeverUnit> IntoForeign for Option<T> {
    fn into_foreign(self) -> Value {
        self.map_or(Value::Unit, IntoForeign::into_foreign)
    }
}

impl<T: FromForeign + NeverUnit> FromForeign for Option<T> {
    const KIND: &'static str = T::KIND;

    fn from_foreign(value: Value) -> Result<Self> {
        match value {
            Value::Unit => Ok(None),
            other => T::from_foreign(other).map(Some),
        }
    }
}

impl<T: IntoForeign> IntoForeign for Vec<T> {
    fn into_foreign(self) -> Value {
        Value::List(self.into_iter().map(IntoForeign::into_foreign).collect())
    }
}

impl<T: FromForeign> FromForeign for Vec<T> {
    const KIND: &'static str = "list";

    fn from_foreign(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_foreign).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<K: IntoForeign, V: IntoForeign> IntoForeign for BTreeMap<K, V> {
    fn into_foreign(self) -> Value {
        ordered_map(self)
    }
}

impl<K: FromForeign + Ord, V: FromForeign> FromForeign for BTreeMap<K, V> {
    const KIND: &'static str = "map";

    fn from_foreign(value: Value) -> Result<Self> {
        let mut out = BTreeMap::new();
        for (raw_key, raw_val) in map_entries::<Self>(value)? {
            let key = K::from_foreign(raw_key.clone())?;
            if out.contains_key(&key) {
                return Err(Error::DuplicateKey(format!("{:?}", raw_key)));
            }
            out.insert(key, V::from_foreign(raw_val)?);
        }
        Ok(out)
    }
}

impl<K: IntoForeign, V: IntoForeign, S> IntoForeign for HashMap<K, V, S> {
    fn into_foreign(self) -> Value {
        ordered_map(self)
    }
}

impl<K, V, S> FromForeign for HashMap<K, V, S>
where
    K: FromForeign + Eq + Hash,
    V: FromForeign,
    S: BuildHasher + Default,
{
    const KIND: &'static str = "map";

    fn from_foreign(value: Value) -> Result<Self> {
        let entries = map_entries::<Self>(value)?;
        let mut out = HashMap::with_capacity_and_hasher(entries.len(), S::default());
        for (raw_key, raw_val) in entries {
            let key = K::from_foreign(raw_key.clone())?;
            if out.contains_key(&key) {
                return Err(Error::DuplicateKey(format!("{:?}", raw_key)));
            }
            out.insert(key, V::from_foreign(raw_val)?);
        }
        Ok(out)
    }
}

fn map_entries<T: FromForeign>(value: Value) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(mismatch::<T>(&other)),
    }
}

/// Builds a foreign map from entries, keeping their iteration order.
pub fn ordered_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Value
where
    K: IntoForeign,
    V: IntoForeign,
{
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.into_foreign(), v.into_foreign()))
            .collect(),
    )
}

/// Converts a sequence of wrappers into a foreign array of their handles,
/// same order and count.
pub fn wrapper_array<W: Wrapper>(items: &[W]) -> Value {
    Value::List(items.iter().map(|w| Value::Handle(w.handle().clone())).collect())
}

type Narrowing = Arc<dyn Fn(Box<dyn Any + Send>) -> std::result::Result<Value, Box<dyn Any + Send>> + Send + Sync>;

/// Runtime-type dispatch from boxed local values to `Value`.
///
/// Entries are keyed by `TypeId`; adding a kind is a `register` call.
pub struct Marshaller {
    table: DashMap<TypeId, Narrowing>,
}

impl Default for Marshaller {
    fn default() -> Self {
        Self::new()
    }
}

impl Marshaller {
    /// A marshaller with no registered kinds.
    pub fn empty() -> Self {
        Self { table: DashMap::new() }
    }

    /// A marshaller that knows every scalar kind of the union, strings,
    /// handles and already-marshalled values.
    pub fn new() -> Self {
        let m = Self::empty();
        m.register::<i32>(Value::Int);
        m.register::<f64>(Value::Double);
        m.register::<f32>(Value::Float);
        m.register::<bool>(Value::Bool);
        m.register::<i64>(Value::Long);
        m.register::<i16>(Value::Short);
        m.register::<i8>(Value::Byte);
        m.register::<char>(Value::Char);
        m.register::<String>(Value::String);
        m.register::<&'static str>(|s| Value::String(s.to_string()));
        m.register::<()>(|_| Value::Unit);
        m.register::<RemoteHandle>(Value::Handle);
        m.register::<Value>(|v| v);
        m.register::<Vec<Value>>(Value::List);
        m.register::<Vec<(Value, Value)>>(Value::Map);
        m
    }

    /// Registers the narrowing for one runtime type, replacing any previous one.
    pub fn register<T: Any + Send>(&self, narrow: fn(T) -> Value) {
        let entry: Narrowing = Arc::new(move |boxed: Box<dyn Any + Send>| {
            boxed.downcast::<T>().map(|v| narrow(*v))
        });
        self.table.insert(TypeId::of::<T>(), entry);
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.table.contains_key(&TypeId::of::<T>())
    }

    /// Narrows a boxed value to the most specific foreign kind.
    ///
    /// An unregistered runtime type comes back unchanged in `Err`.
    pub fn narrow(&self, boxed: Box<dyn Any + Send>) -> std::result::Result<Value, Box<dyn Any + Send>> {
        let type_id = (*boxed).type_id();
        // clone out of the map so no shard lock is held while narrowing
        let entry = self.table.get(&type_id).map(|e| Arc::clone(e.value()));
        match entry {
            Some(narrow) => narrow(boxed),
            None => Err(boxed),
        }
    }

    /// Converts a boxed value, failing on types the union cannot represent.
    ///
    /// Boxed heterogeneous sequences (`Vec<Box<dyn Any + Send>>`) and entry
    /// lists (`Vec<(Box<dyn Any + Send>, Box<dyn Any + Send>)>`) are converted
    /// element by element, in order.
    pub fn to_foreign(&self, boxed: Box<dyn Any + Send>) -> Result<Value> {
        let boxed = match boxed.downcast::<Vec<Box<dyn Any + Send>>>() {
            Ok(items) => {
                return items.into_iter().map(|item| self.to_foreign(item)).collect::<Result<_>>().map(Value::List);
            }
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<Vec<(Box<dyn Any + Send>, Box<dyn Any + Send>)>>() {
            Ok(entries) => {
                return entries
                    .into_iter()
                    .map(|(k, v)| self.to_foreign(k).and_then(|k| Ok((k, self.to_foreign(v)?))))
                    .collect::<Result<_>>()
                    .map(Value::Map);
            }
            Err(other) => other,
        };
        self.narrow(boxed).map_err(|unknown| {
            Error::UnsupportedType(format!("unregistered runtime type {:?}", (*unknown).type_id()))
        })
    }

    /// Converts a foreign value into the most specific boxed local value.
    pub fn to_local(&self, value: Value) -> Box<dyn Any + Send> {
        value.into_boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed<T: Any + Send>(v: T) -> Box<dyn Any + Send> {
        Box::new(v)
    }

    fn roundtrip<T: Any + Send + FromForeign + PartialEq + std::fmt::Debug + Copy>(m: &Marshaller, v: T) {
        let foreign = m.to_foreign(boxed(v)).unwrap();
        assert_eq!(T::from_foreign(foreign.clone()).unwrap(), v);
        assert_eq!(*m.to_local(foreign).downcast::<T>().unwrap(), v);
    }

    #[test]
    fn test_scalar_roundtrip_at_boundaries() {
        let m = Marshaller::new();
        for v in [i8::MIN, i8::MAX, 0, -1] { roundtrip(&m, v); }
        for v in [i16::MIN, i16::MAX, 0, -1] { roundtrip(&m, v); }
        for v in [i32::MIN, i32::MAX, 0, -1] { roundtrip(&m, v); }
        for v in [i64::MIN, i64::MAX, 0, -1] { roundtrip(&m, v); }
        for v in [f32::MIN, f32::MAX, 0.0, -1.0] { roundtrip(&m, v); }
        for v in [f64::MIN, f64::MAX, 0.0, -1.0] { roundtrip(&m, v); }
        for v in ['\0', char::MAX, 'x'] { roundtrip(&m, v); }
        for v in [true, false] { roundtrip(&m, v); }
    }

    #[test]
    fn test_narrowing_picks_exact_kind() {
        let m = Marshaller::new();
        assert_eq!(m.to_foreign(boxed(7i32)).unwrap(), Value::Int(7));
        assert_eq!(m.to_foreign(boxed(7i64)).unwrap(), Value::Long(7));
        assert_eq!(m.to_foreign(boxed(7i16)).unwrap(), Value::Short(7));
        assert_eq!(m.to_foreign(boxed(7i8)).unwrap(), Value::Byte(7));
        assert_eq!(m.to_foreign(boxed(1.5f32)).unwrap(), Value::Float(1.5));
        assert_eq!(m.to_foreign(boxed(1.5f64)).unwrap(), Value::Double(1.5));
        assert_eq!(m.to_foreign(boxed("s")).unwrap(), Value::String("s".into()));
    }

    #[test]
    fn test_unknown_type_passes_through_narrow() {
        #[derive(Debug, PartialEq)]
        struct Opaque(u8);

        let m = Marshaller::new();
        let back = m.narrow(boxed(Opaque(3))).unwrap_err();
        assert_eq!(back.downcast_ref::<Opaque>(), Some(&Opaque(3)));

        let err = m.to_foreign(boxed(Opaque(3))).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_registration_adds_a_kind() {
        struct Celsius(f64);

        let m = Marshaller::new();
        assert!(!m.is_registered::<Celsius>());
        m.register::<Celsius>(|c| Value::Double(c.0));
        assert_eq!(m.to_foreign(boxed(Celsius(21.5))).unwrap(), Value::Double(21.5));
    }

    #[test]
    fn test_heterogeneous_sequence_fails_fast() {
        let m = Marshaller::new();
        let ok: Vec<Box<dyn Any + Send>> = vec![boxed(1i32), boxed("two"), boxed(3.0f64)];
        assert_eq!(
            m.to_foreign(boxed(ok)).unwrap(),
            Value::List(vec![Value::Int(1), Value::String("two".into()), Value::Double(3.0)])
        );

        let bad: Vec<Box<dyn Any + Send>> = vec![boxed(1i32), boxed(1u128)];
        assert!(matches!(m.to_foreign(boxed(bad)), Err(Error::UnsupportedType(_))));
    }

    #[test]
    fn test_option_roundtrip() {
        assert_eq!(Some(5i32).into_foreign(), Value::Int(5));
        assert_eq!(None::<i32>.into_foreign(), Value::Unit);
        assert_eq!(Option::<i32>::from_foreign(Value::Int(5)).unwrap(), Some(5));
        assert_eq!(Option::<i32>::from_foreign(Value::Unit).unwrap(), None);

        let empty: Option<Vec<i32>> = Some(Vec::new());
        assert_eq!(Option::<Vec<i32>>::from_foreign(empty.clone().into_foreign()).unwrap(), empty);
        assert!(Option::<i32>::from_foreign(Value::Long(5)).is_err());
    }

    #[test]
    fn test_no_magnitude_conversion() {
        assert!(matches!(
            i32::from_foreign(Value::Long(1)),
            Err(Error::TypeMismatch { expected: "int", found: "long" })
        ));
        assert!(f32::from_foreign(Value::Double(1.0)).is_err());
    }

    #[test]
    fn test_map_conversion_keeps_every_key() {
        let mut local = BTreeMap::new();
        local.insert("a".to_string(), 1i64);
        local.insert("b".to_string(), 2i64);

        let foreign = local.clone().into_foreign();
        assert_eq!(
            foreign,
            Value::Map(vec![
                (Value::String("a".into()), Value::Long(1)),
                (Value::String("b".into()), Value::Long(2)),
            ])
        );
        assert_eq!(BTreeMap::<String, i64>::from_foreign(foreign).unwrap(), local);
    }

    #[test]
    fn test_map_duplicate_key_is_an_error() {
        let foreign = Value::Map(vec![
            (Value::String("k".into()), Value::Int(1)),
            (Value::String("k".into()), Value::Int(2)),
        ]);
        let err = HashMap::<String, i32>::from_foreign(foreign).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn test_map_value_kind_is_checked() {
        let foreign = ordered_map([("k", "not a number")]);
        assert!(matches!(
            HashMap::<String, i32>::from_foreign(foreign),
            Err(Error::TypeMismatch { expected: "int", found: "string" })
        ));
    }

    #[test]
    fn test_option_uses_unit() {
        assert_eq!(None::<i32>.into_foreign(), Value::Unit);
        assert_eq!(Option::<i32>::from_foreign(Value::Unit).unwrap(), None);
        assert_eq!(Option::<i32>::from_foreign(Value::Int(4)).unwrap(), Some(4));
    }
}
