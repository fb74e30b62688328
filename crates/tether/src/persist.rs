//! # Persistence
//!
//! Save and load of foreign components, driven from this side.
//!
//! A `Writer` collects string options locally. Every save attempt first sends
//! the whole set as one `options` invocation carrying an ordered map, which
//! replaces whatever the foreign writer held, then invokes `save`. The foreign
//! options therefore always equal the local set at the last attempt, including
//! after `clear_options` or a respelled key. `overwrite` and `session` are
//! forwarded immediately.
//!
//! ```text
//! Configuring --save--> Saving --ok--> Saved
//!      ^                   |
//!      |                   +--err--> Failed
//!      +---- option / overwrite / session / save ----+
//! ```
//!
//! `save` takes `&mut self`, so two saves through one writer cannot overlap.

use std::marker::PhantomData;

use crate::bridge::Bridge;
use crate::bridge::RemoteObject;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;
use crate::handle::RemoteHandle;
use crate::proxy::Wrapper;
use crate::value::Value;

/// String options keyed case-insensitively.
///
/// A key keeps the position of its first insertion; the value and spelling of
/// the last write win.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<OptionEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct OptionEntry {
    folded: String,
    key: String,
    value: String,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let folded = key.to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.folded == folded) {
            Some(entry) => {
                entry.key = key.to_string();
                entry.value = value;
            }
            None => self.entries.push(OptionEntry { folded, key: key.to_string(), value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let folded = key.to_lowercase();
        self.entries.iter().find(|e| e.folded == folded).map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.key.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Where a `Writer` is in its save lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteState {
    Configuring,
    Saving,
    Saved,
    Failed(ErrorKind),
}

/// A foreign session object. Opaque on this side.
pub struct Session {
    remote: RemoteObject,
}

impl Wrapper for Session {
    const FOREIGN_CLASS: &'static str = "tether.Session";

    fn from_remote(remote: RemoteObject) -> Self {
        Self { remote }
    }

    fn remote(&self) -> &RemoteObject {
        &self.remote
    }
}

fn check_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Saves one foreign component.
pub struct Writer {
    writer: RemoteObject,
    options: OptionSet,
    session: Option<RemoteHandle>,
    overwrite: bool,
    state: WriteState,
}

impl Writer {
    pub fn new(writer: RemoteObject) -> Self {
        Self {
            writer,
            options: OptionSet::new(),
            session: None,
            overwrite: false,
            state: WriteState::Configuring,
        }
    }

    /// Records an option to forward at save time. Keys are case-insensitive.
    pub fn option(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.state = WriteState::Configuring;
        self.options.set(key, value);
        self
    }

    /// Tells the foreign writer to replace existing output.
    pub fn overwrite(&mut self) -> Result<&mut Self> {
        self.state = WriteState::Configuring;
        self.writer.invoke("overwrite", &[])?;
        self.overwrite = true;
        Ok(self)
    }

    /// Binds the foreign writer to a session.
    pub fn session(&mut self, session: &Session) -> Result<&mut Self> {
        self.state = WriteState::Configuring;
        let handle = session.handle().clone();
        self.writer.invoke("session", &[Value::Handle(handle.clone())])?;
        self.session = Some(handle);
        Ok(self)
    }

    /// Drops every recorded option. The next save sends an empty set.
    pub fn clear_options(&mut self) -> &mut Self {
        self.state = WriteState::Configuring;
        self.options.clear();
        self
    }

    /// Replaces the foreign writer's options with the recorded set, then saves
    /// to `path`.
    ///
    /// An empty path fails before any invocation. A failure part way through
    /// leaves the state at `Failed` with the error's kind.
    pub fn save(&mut self, path: &str) -> Result<()> {
        check_path(path)?;
        self.state = WriteState::Saving;
        match self.forward_and_save(path) {
            Ok(()) => {
                self.state = WriteState::Saved;
                tracing::info!(path, target = %self.writer.handle(), options = self.options.len(), "saved");
                Ok(())
            }
            Err(e) => {
                self.state = WriteState::Failed(e.kind());
                tracing::warn!(path, target = %self.writer.handle(), error = %e, "save failed");
                Err(e)
            }
        }
    }

    fn forward_and_save(&self, path: &str) -> Result<()> {
        let entries = self
            .options
            .iter()
            .map(|(key, value)| (Value::String(key.to_string()), Value::String(value.to_string())))
            .collect();
        self.writer.invoke("options", &[Value::Map(entries)])?;
        self.writer.invoke("save", &[Value::String(path.to_string())])?;
        Ok(())
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn session_handle(&self) -> Option<&RemoteHandle> {
        self.session.as_ref()
    }

    pub fn remote(&self) -> &RemoteObject {
        &self.writer
    }
}

/// Loads persisted instances of `T`.
pub struct Reader<T> {
    reader: RemoteObject,
    session: Option<RemoteHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Wrapper> Reader<T> {
    pub fn new(reader: RemoteObject) -> Self {
        Self { reader, session: None, _marker: PhantomData }
    }

    pub fn session(&mut self, session: &Session) -> Result<&mut Self> {
        let handle = session.handle().clone();
        self.reader.invoke("session", &[Value::Handle(handle.clone())])?;
        self.session = Some(handle);
        Ok(self)
    }

    /// Loads from `path` and wraps the returned handle as `T`.
    pub fn load(&self, path: &str) -> Result<T> {
        check_path(path)?;
        let handle = match self.reader.invoke("load", &[Value::String(path.to_string())])? {
            Value::Handle(handle) => handle,
            other => return Err(Error::TypeMismatch { expected: "handle", found: other.kind() }),
        };
        tracing::info!(path, class = T::FOREIGN_CLASS, handle = %handle, "loaded");
        Ok(self.reader.bridge().wrap(handle))
    }

    pub fn session_handle(&self) -> Option<&RemoteHandle> {
        self.session.as_ref()
    }

    pub fn remote(&self) -> &RemoteObject {
        &self.reader
    }
}

/// A wrapper whose foreign instances can be saved.
pub trait Persistable: Wrapper {
    /// Asks the component for a writer.
    fn write(&self) -> Result<Writer> {
        let writer = self.remote().call_object("write", &[])?;
        Ok(Writer::new(writer))
    }

    /// Saves with default settings.
    fn save(&self, path: &str) -> Result<()> {
        self.write()?.save(path)
    }
}

/// A wrapper whose foreign class can read persisted instances back.
pub trait Loadable: Wrapper {
    /// Asks the foreign class object for a reader.
    fn read(bridge: &Bridge) -> Result<Reader<Self>> {
        let reader = bridge.class_ref(Self::FOREIGN_CLASS)?.call_object("read", &[])?;
        Ok(Reader::new(reader))
    }

    /// Loads with default settings.
    fn load(bridge: &Bridge, path: &str) -> Result<Self> {
        Self::read(bridge)?.load(path)
    }
}
