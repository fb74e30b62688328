//! # Bridge
//!
//! The calling side of the boundary. A `Bridge` owns the transport and turns a
//! method call on a `RemoteHandle` into one Invoke frame and one Reply.
//!
//! ## Invariants
//! - **One call, one round trip**: `invoke` never retries and never batches.
//! - **Correlated replies**: every invocation gets a fresh sequence number and a
//!   reply carrying any other number is a protocol error.
//! - **Failures keep their side**: a broken channel is `Error::Transport`, a
//!   foreign refusal is `Error::Remote`. They are never folded together.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::builder::BridgeBuilder;
use crate::config::BridgeConfig;
use crate::error::Error;
use crate::error::Result;
use crate::frame::Frame;
use crate::frame::InvokeEncoder;
use crate::handle::RemoteHandle;
use crate::marshal::FromForeign;
use crate::marshal::Marshaller;
use crate::persist::Loadable;
use crate::persist::Reader;
use crate::proxy::DynWrapper;
use crate::proxy::ProxyRegistry;
use crate::proxy::Wrapper;
use crate::transport::Transport;
use crate::value::Value;

pub(crate) struct Inner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: BridgeConfig,
    pub(crate) marshaller: Marshaller,
    pub(crate) registry: ProxyRegistry,
    pub(crate) seq: AtomicU64,
}

/// A connection to one foreign runtime. Cheap to clone; clones share the
/// transport, tables and sequence counter.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// A bridge with standard configuration and no registered wrappers.
    pub fn new(transport: impl Transport) -> Self {
        BridgeBuilder::new(transport).build()
    }

    pub fn builder(transport: impl Transport) -> BridgeBuilder {
        BridgeBuilder::new(transport)
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.inner.marshaller
    }

    pub fn registry(&self) -> &ProxyRegistry {
        &self.inner.registry
    }

    /// Invokes `method` on the foreign object behind `target` and blocks for
    /// the result.
    pub fn invoke(&self, target: &RemoteHandle, method: &str, args: &[Value]) -> Result<Value> {
        let max_depth = self.inner.config.max_depth;
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);

        // prepare the message
        let payload = InvokeEncoder::new(seq, target, method, args).to_bytes(max_depth)?;
        tracing::debug!(seq, target = %target, method, args = args.len(), "invoke");

        let response = self.inner.transport.call(&payload).map_err(|e| {
            tracing::warn!(seq, target = %target, method, error = %e, "transport failed");
            Error::from(e)
        })?;

        // check for a reply
        let Frame::Reply(reply) = Frame::decode(&response, max_depth)? else {
            return Err(Error::Protocol("received Invoke frame while waiting for Reply".into()));
        };
        if reply.seq != seq {
            return Err(Error::Protocol(format!("reply sequence {} does not match invocation {}", reply.seq, seq)));
        }

        match reply.outcome {
            Ok(result) => {
                tracing::trace!(seq, kind = result.kind(), "reply");
                Ok(result)
            }
            Err(failure) => {
                tracing::warn!(seq, target = %target, method, %failure, "remote failure");
                Err(Error::Remote(failure))
            }
        }
    }

    /// A callable view of a foreign object.
    pub fn object(&self, handle: RemoteHandle) -> RemoteObject {
        RemoteObject { bridge: self.clone(), handle }
    }

    /// The foreign object that resolves classes by name.
    pub fn entry_point(&self) -> RemoteObject {
        self.object(RemoteHandle::new(self.inner.config.entry_point.as_str()))
    }

    /// Resolves a foreign class object by its fully-qualified name.
    pub fn class_ref(&self, name: &str) -> Result<RemoteObject> {
        self.entry_point().call_object("classForName", &[Value::String(name.to_string())])
    }

    /// Instantiates a foreign class and returns the new object's handle.
    pub fn construct(&self, class: &str, args: &[Value]) -> Result<RemoteHandle> {
        self.class_ref(class)?.call("new", args)
    }

    /// Instantiates `T::FOREIGN_CLASS` and wraps the result.
    pub fn create<T: Wrapper>(&self, args: &[Value]) -> Result<T> {
        let handle = self.construct(T::FOREIGN_CLASS, args)?;
        Ok(self.wrap(handle))
    }

    /// Wraps a handle in `T`. No foreign call is made; each call yields an
    /// independent wrapper over the same handle.
    pub fn wrap<T: Wrapper>(&self, handle: RemoteHandle) -> T {
        T::from_remote(self.object(handle))
    }

    /// Asks the foreign object for its class and builds the wrapper registered
    /// for that class name.
    pub fn wrap_dynamic(&self, handle: RemoteHandle) -> Result<Box<dyn DynWrapper>> {
        let remote = self.object(handle);
        let class = remote.class_name()?;
        self.inner.registry.construct(&class, remote)
    }

    /// A reader for persisted instances of `T`.
    pub fn read<T: Loadable>(&self) -> Result<Reader<T>> {
        T::read(self)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.inner.config)
            .field("wrappers", &self.inner.registry.len())
            .finish()
    }
}

/// A foreign object together with the bridge that reaches it.
#[derive(Clone)]
pub struct RemoteObject {
    bridge: Bridge,
    handle: RemoteHandle,
}

impl RemoteObject {
    pub fn handle(&self) -> &RemoteHandle {
        &self.handle
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.bridge.invoke(&self.handle, method, args)
    }

    /// Invokes and unboxes the result as `R`.
    pub fn call<R: FromForeign>(&self, method: &str, args: &[Value]) -> Result<R> {
        R::from_foreign(self.invoke(method, args)?)
    }

    /// Invokes an operation that returns another foreign object.
    pub fn call_object(&self, method: &str, args: &[Value]) -> Result<RemoteObject> {
        let handle: RemoteHandle = self.call(method, args)?;
        Ok(self.bridge.object(handle))
    }

    /// Fully-qualified foreign class name of this object.
    pub fn class_name(&self) -> Result<String> {
        self.call_object("getClass", &[])?.call("getName", &[])
    }
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteObject").field(&self.handle).finish()
    }
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Arc::ptr_eq(&self.bridge.inner, &other.bridge.inner)
    }
}
