//! # Typed Proxies
//!
//! A wrapper is a local type that stands for one foreign class. It holds a
//! `RemoteObject` and forwards its operations through it.
//!
//! Two ways to obtain one:
//!
//! - **Static**: `Bridge::wrap::<T>(handle)`. The `Wrapper` impl is the
//!   registration, so the constructor can never be missing or ambiguous.
//! - **Dynamic**: `Bridge::wrap_dynamic(handle)` asks the foreign object for its
//!   class name and looks it up in the `ProxyRegistry`. Registration defects
//!   surface when a type is registered, not when it is first used.

use std::any::Any;
use std::any::TypeId;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::bridge::RemoteObject;
use crate::error::Error;
use crate::error::Result;
use crate::handle::RemoteHandle;

/// A local stand-in for instances of one foreign class.
///
/// Implementations must not touch the foreign runtime in `from_remote`; a
/// wrapper is constructed from a handle without a round trip.
pub trait Wrapper: Sized + Send + 'static {
    /// Fully-qualified foreign class name this type wraps.
    const FOREIGN_CLASS: &'static str;

    fn from_remote(remote: RemoteObject) -> Self;

    fn remote(&self) -> &RemoteObject;

    fn handle(&self) -> &RemoteHandle {
        self.remote().handle()
    }
}

/// Object-safe view of any `Wrapper`, returned by dynamic wrapping.
pub trait DynWrapper: Any + Send {
    fn object(&self) -> &RemoteObject;
    fn foreign_class(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Wrapper> DynWrapper for T {
    fn object(&self) -> &RemoteObject {
        Wrapper::remote(self)
    }

    fn foreign_class(&self) -> &'static str {
        T::FOREIGN_CLASS
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn DynWrapper {
    pub fn is<T: Wrapper>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Wrapper>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recovers the concrete wrapper type.
    pub fn downcast<T: Wrapper>(self: Box<Self>) -> Result<T> {
        let found = self.foreign_class();
        self.into_any()
            .downcast::<T>()
            .map(|w| *w)
            .map_err(|_| Error::TypeMismatch { expected: T::FOREIGN_CLASS, found })
    }
}

impl std::fmt::Debug for dyn DynWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.foreign_class(), self.object().handle())
    }
}

type Construct = fn(RemoteObject) -> Box<dyn DynWrapper>;

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    construct: Construct,
}

fn construct_boxed<T: Wrapper>(remote: RemoteObject) -> Box<dyn DynWrapper> {
    Box::new(T::from_remote(remote))
}

/// Foreign class name to wrapper constructor.
#[derive(Default)]
pub struct ProxyRegistry {
    by_class: DashMap<String, Registration>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `T::FOREIGN_CLASS` to `T`.
    ///
    /// Registering the same type twice is a no-op. Binding a class that is
    /// already bound to a different type fails with `AmbiguousConstructor`.
    pub fn register<T: Wrapper>(&self) -> Result<()> {
        let attempted = std::any::type_name::<T>();
        match self.by_class.entry(T::FOREIGN_CLASS.to_string()) {
            Entry::Occupied(existing) if existing.get().type_id == TypeId::of::<T>() => Ok(()),
            Entry::Occupied(existing) => Err(Error::AmbiguousConstructor {
                class: T::FOREIGN_CLASS.to_string(),
                registered: existing.get().type_name,
                attempted,
            }),
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    type_id: TypeId::of::<T>(),
                    type_name: attempted,
                    construct: construct_boxed::<T>,
                });
                tracing::debug!(class = T::FOREIGN_CLASS, wrapper = attempted, "registered wrapper");
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.by_class.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    /// Builds the wrapper registered for `class` around `remote`.
    pub fn construct(&self, class: &str, remote: RemoteObject) -> Result<Box<dyn DynWrapper>> {
        let construct = self
            .by_class
            .get(class)
            .map(|r| r.construct)
            .ok_or_else(|| Error::MissingConstructor { class: class.to_string() })?;
        Ok(construct(remote))
    }
}
