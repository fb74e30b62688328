//! # Loopback Runtime
//!
//! An in-process foreign runtime that speaks the tether protocol. It keeps an
//! object table and a class table, resolves classes through an entry point, and
//! records the invocations it receives in a journal capped at
//! `JOURNAL_LIMIT` entries.
//!
//! It implements `Transport` directly, so a bridge can call it without a
//! channel; `Inbox::serve` puts it behind a thread instead.
//!
//! ## Built-in objects
//!
//! - The entry point (`t` unless configured): `classForName(name)`, `getSession()`.
//! - Class objects (`class:<name>`): `getName()`, `new(..)`, `read()` for
//!   persistable classes, plus any static methods.
//! - Every instance answers `getClass()`; persistable ones answer `write()`.

pub mod class;
pub mod persist;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tether::BridgeConfig;
use tether::FailureKind;
use tether::RemoteFailure;
use tether::RemoteHandle;
use tether::Transport;
use tether::TransportError;
use tether::Value;
use tether::frame::Frame;
use tether::frame::Invocation;
use tether::frame::Reply;
use tether::transport;

pub use class::Args;
pub use class::ClassDef;
pub use class::Ctx;
pub use class::Method;
pub use class::MethodResult;
pub use persist::SavedComponent;

pub const CLASS_CLASS: &str = "tether.Class";
pub const ENTRY_CLASS: &str = "tether.EntryPoint";
pub const SESSION_CLASS: &str = "tether.Session";
pub const WRITER_CLASS: &str = "tether.Writer";
pub const READER_CLASS: &str = "tether.Reader";

const CLASS_PREFIX: &str = "class:";

/// Journal entries kept by default; older ones are dropped first.
pub const JOURNAL_LIMIT: usize = 4096;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Instance {
    pub(crate) class: String,
    pub(crate) fields: Mutex<Vec<(String, Value)>>,
}

/// One invocation as the runtime received it.
#[derive(Clone, Debug, PartialEq)]
pub struct JournalEntry {
    pub target: RemoteHandle,
    pub method: String,
    pub args: Vec<Value>,
    pub outcome: MethodResult,
}

pub struct LoopbackRuntime {
    entry: RemoteHandle,
    session: RemoteHandle,
    max_depth: usize,
    classes: DashMap<String, Arc<ClassDef>>,
    objects: DashMap<RemoteHandle, Arc<Instance>>,
    pub(crate) store: DashMap<String, SavedComponent>,
    journal: Mutex<VecDeque<JournalEntry>>,
    journal_limit: AtomicUsize,
    next_id: AtomicU64,
}

impl Default for LoopbackRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRuntime {
    pub fn new() -> Self {
        Self::with_config(&BridgeConfig::standard())
    }

    /// A runtime whose entry point and nesting limit match a bridge's config.
    pub fn with_config(config: &BridgeConfig) -> Self {
        let runtime = Self {
            entry: RemoteHandle::new(config.entry_point.as_str()),
            session: RemoteHandle::new("session"),
            max_depth: config.max_depth,
            classes: DashMap::new(),
            objects: DashMap::new(),
            store: DashMap::new(),
            journal: Mutex::new(VecDeque::new()),
            journal_limit: AtomicUsize::new(JOURNAL_LIMIT),
            next_id: AtomicU64::new(1),
        };
        runtime.define(ClassDef::new(CLASS_CLASS));
        runtime.define(ClassDef::new(SESSION_CLASS));
        runtime.define(persist::writer_class());
        runtime.define(persist::reader_class());
        runtime.objects.insert(
            runtime.session.clone(),
            Arc::new(Instance { class: SESSION_CLASS.to_string(), fields: Mutex::new(Vec::new()) }),
        );
        runtime
    }

    pub fn entry_point(&self) -> &RemoteHandle {
        &self.entry
    }

    pub fn session(&self) -> &RemoteHandle {
        &self.session
    }

    /// Adds or replaces a class.
    pub fn define(&self, class: ClassDef) {
        tracing::debug!(class = class.name(), methods = class.methods.len(), "define class");
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn is_defined(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Creates an instance with the given fields.
    pub fn spawn(&self, class: &str, fields: Vec<(String, Value)>) -> RemoteHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = RemoteHandle::new(format!("o{}", id));
        let instance = Instance { class: class.to_string(), fields: Mutex::new(fields) };
        self.objects.insert(handle.clone(), Arc::new(instance));
        tracing::trace!(%handle, class, "spawn");
        handle
    }

    fn instance(&self, handle: &RemoteHandle) -> std::result::Result<Arc<Instance>, RemoteFailure> {
        // clone the Arc out so no shard lock is held while a method runs
        self.objects
            .get(handle)
            .map(|o| Arc::clone(o.value()))
            .ok_or_else(|| RemoteFailure::new(FailureKind::ObjectNotFound, format!("no object {}", handle.id())))
    }

    fn class(&self, name: &str) -> std::result::Result<Arc<ClassDef>, RemoteFailure> {
        self.classes
            .get(name)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| RemoteFailure::new(FailureKind::ClassNotFound, format!("no class {}", name)))
    }

    pub fn class_of(&self, handle: &RemoteHandle) -> Option<String> {
        self.objects.get(handle).map(|o| o.class.clone())
    }

    pub fn field(&self, handle: &RemoteHandle, field: &str) -> Option<Value> {
        let instance = self.instance(handle).ok()?;
        let fields = lock(&instance.fields);
        fields.iter().find(|(k, _)| k == field).map(|(_, v)| v.clone())
    }

    pub fn set_field(&self, handle: &RemoteHandle, field: &str, value: Value) -> std::result::Result<(), RemoteFailure> {
        let instance = self.instance(handle)?;
        let mut fields = lock(&instance.fields);
        match fields.iter_mut().find(|(k, _)| k == field) {
            Some((_, slot)) => *slot = value,
            None => fields.push((field.to_string(), value)),
        }
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The most recent invocations, oldest first. At most the journal limit
    /// is kept.
    pub fn journal(&self) -> Vec<JournalEntry> {
        lock(&self.journal).iter().cloned().collect()
    }

    /// Caps the journal at `limit` entries, dropping the oldest beyond it.
    pub fn set_journal_limit(&self, limit: usize) {
        self.journal_limit.store(limit, Ordering::Relaxed);
        let mut journal = lock(&self.journal);
        while journal.len() > limit {
            journal.pop_front();
        }
    }

    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    /// Runs one decoded invocation and builds its reply.
    pub fn handle(&self, call: Invocation) -> Reply {
        let outcome = self.dispatch(&call.target, &call.method, &call.args);
        match &outcome {
            Ok(result) => tracing::debug!(seq = call.seq, target = %call.target, method = %call.method, result = result.kind(), "handled"),
            Err(failure) => tracing::debug!(seq = call.seq, target = %call.target, method = %call.method, %failure, "refused"),
        }
        self.record(JournalEntry {
            target: call.target,
            method: call.method,
            args: call.args,
            outcome: outcome.clone(),
        });
        Reply { seq: call.seq, outcome }
    }

    fn record(&self, entry: JournalEntry) {
        let limit = self.journal_limit.load(Ordering::Relaxed);
        let mut journal = lock(&self.journal);
        if limit == 0 {
            return;
        }
        while journal.len() >= limit {
            journal.pop_front();
        }
        journal.push_back(entry);
    }

    pub fn dispatch(&self, target: &RemoteHandle, method: &str, args: &[Value]) -> MethodResult {
        let args = Args::new(method, args);
        if *target == self.entry {
            return self.entry_method(method, args);
        }
        if let Some(class) = target.id().strip_prefix(CLASS_PREFIX) {
            return self.class_method(target, class, method, args);
        }
        let instance = self.instance(target)?;
        self.instance_method(target, &instance.class, method, args)
    }

    fn entry_method(&self, method: &str, args: Args<'_>) -> MethodResult {
        match method {
            "classForName" => {
                args.arity(1)?;
                let name = args.str(0)?;
                self.class(name)?;
                Ok(Value::Handle(class_handle(name)))
            }
            "getSession" => {
                args.arity(0)?;
                Ok(Value::Handle(self.session.clone()))
            }
            _ => Err(RemoteFailure::method_not_found(ENTRY_CLASS, method)),
        }
    }

    fn class_method(&self, target: &RemoteHandle, name: &str, method: &str, args: Args<'_>) -> MethodResult {
        let class = self.class(name)?;
        if let Some(f) = class.lookup_static(method) {
            return f(&Ctx { runtime: self, this: target, class: name }, args);
        }
        match method {
            "getName" => {
                args.arity(0)?;
                Ok(Value::String(name.to_string()))
            }
            "getClass" => {
                args.arity(0)?;
                Ok(Value::Handle(class_handle(CLASS_CLASS)))
            }
            "new" => {
                args.arity(0)?;
                Ok(Value::Handle(self.spawn(name, Vec::new())))
            }
            "read" if class.persistable => {
                args.arity(0)?;
                Ok(Value::Handle(self.spawn(READER_CLASS, vec![("class".to_string(), Value::String(name.to_string()))])))
            }
            _ => Err(RemoteFailure::method_not_found(CLASS_CLASS, method)),
        }
    }

    fn instance_method(&self, target: &RemoteHandle, name: &str, method: &str, args: Args<'_>) -> MethodResult {
        if method == "getClass" {
            args.arity(0)?;
            return Ok(Value::Handle(class_handle(name)));
        }
        let class = self.class(name)?;
        if let Some(f) = class.lookup(method) {
            return f(&Ctx { runtime: self, this: target, class: name }, args);
        }
        if method == "write" && class.persistable {
            args.arity(0)?;
            return Ok(Value::Handle(persist::spawn_writer(self, target)));
        }
        Err(RemoteFailure::method_not_found(name, method))
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) fn has_object(&self, handle: &RemoteHandle) -> bool {
        self.objects.contains_key(handle)
    }

    pub(crate) fn fields_of(&self, handle: &RemoteHandle) -> std::result::Result<(String, Vec<(String, Value)>), RemoteFailure> {
        let instance = self.instance(handle)?;
        let fields = lock(&instance.fields).clone();
        Ok((instance.class.clone(), fields))
    }
}

/// Handle of the class object for `name`.
pub fn class_handle(name: &str) -> RemoteHandle {
    RemoteHandle::new(format!("{}{}", CLASS_PREFIX, name))
}

impl Transport for LoopbackRuntime {
    fn call(&self, payload: &[u8]) -> transport::Result<Vec<u8>> {
        let frame = Frame::decode(payload, self.max_depth)
            .map_err(|e| TransportError::Io(format!("malformed frame: {}", e)))?;
        let Frame::Invoke(call) = frame else {
            return Err(TransportError::Io("expected an Invoke frame".into()));
        };
        self.handle(call)
            .to_bytes(self.max_depth)
            .map_err(|e| TransportError::Io(format!("failed to encode reply: {}", e)))
    }
}

#[cfg(test)]
mod tests;
