//! Built-in writer and reader classes, and the in-memory store they share.
//!
//! Saving freezes the target's fields. Fields that hold handles to live
//! instances are frozen recursively, so a pipeline saves with its stages and
//! loads back as fresh objects.

use tether::RemoteFailure;
use tether::RemoteHandle;
use tether::Value;

use crate::LoopbackRuntime;
use crate::READER_CLASS;
use crate::WRITER_CLASS;
use crate::class::ClassDef;

/// A component saved at one path.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedComponent {
    /// Class of the saved root object.
    pub class: String,
    /// Options the writer held at save time, in the order received.
    pub options: Vec<(String, String)>,
    /// Whether the writer was bound to a session.
    pub with_session: bool,
    root: Snapshot,
}

#[derive(Clone, Debug, PartialEq)]
struct Snapshot {
    class: String,
    fields: Vec<(String, Frozen)>,
}

#[derive(Clone, Debug, PartialEq)]
enum Frozen {
    Plain(Value),
    List(Vec<Frozen>),
    Object(Snapshot),
}

impl SavedComponent {
    /// Names of the root object's fields.
    pub fn fields(&self) -> Vec<&str> {
        self.root.fields.iter().map(|(k, _)| k.as_str()).collect()
    }
}

pub(crate) fn spawn_writer(runtime: &LoopbackRuntime, target: &RemoteHandle) -> RemoteHandle {
    runtime.spawn(
        WRITER_CLASS,
        vec![
            ("target".to_string(), Value::Handle(target.clone())),
            ("overwrite".to_string(), Value::Bool(false)),
            ("options".to_string(), Value::Map(Vec::new())),
        ],
    )
}

fn bind_session(ctx: &crate::Ctx<'_>, args: crate::Args<'_>) -> crate::MethodResult {
    args.arity(1)?;
    let session = args.handle(0)?;
    if ctx.runtime().class_of(session).as_deref() != Some(crate::SESSION_CLASS) {
        return Err(RemoteFailure::bad_arguments(format!("{} is not a session", session.id())));
    }
    ctx.set("session", Value::Handle(session.clone()))?;
    Ok(Value::Handle(ctx.this().clone()))
}

fn current_options(ctx: &crate::Ctx<'_>) -> Vec<(Value, Value)> {
    match ctx.get("options") {
        Value::Map(entries) => entries,
        _ => Vec::new(),
    }
}

/// Option keys are case-insensitive. A key keeps its first position and takes
/// the latest spelling and value.
fn fold_option(options: &mut Vec<(Value, Value)>, key: &str, value: &str) {
    let folded = key.to_lowercase();
    let slot = options
        .iter_mut()
        .find(|(k, _)| k.as_str().is_some_and(|k| k.to_lowercase() == folded));
    match slot {
        Some(entry) => *entry = (Value::String(key.to_string()), Value::String(value.to_string())),
        None => options.push((Value::String(key.to_string()), Value::String(value.to_string()))),
    }
}

pub(crate) fn writer_class() -> ClassDef {
    ClassDef::new(WRITER_CLASS)
        .method("overwrite", |ctx, args| {
            args.arity(0)?;
            ctx.set("overwrite", Value::Bool(true))?;
            Ok(Value::Handle(ctx.this().clone()))
        })
        .method("option", |ctx, args| {
            args.arity(2)?;
            let mut options = current_options(ctx);
            fold_option(&mut options, args.str(0)?, args.str(1)?);
            ctx.set("options", Value::Map(options))?;
            Ok(Value::Handle(ctx.this().clone()))
        })
        .method("options", |ctx, args| {
            args.arity(1)?;
            let Value::Map(entries) = args.value(0)? else {
                return Err(RemoteFailure::bad_arguments("options takes a map of strings"));
            };
            let mut options = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                match (key.as_str(), value.as_str()) {
                    (Some(key), Some(value)) => fold_option(&mut options, key, value),
                    _ => return Err(RemoteFailure::bad_arguments("options takes a map of strings")),
                }
            }
            ctx.set("options", Value::Map(options))?;
            Ok(Value::Handle(ctx.this().clone()))
        })
        .method("session", bind_session)
        .method("save", |ctx, args| {
            args.arity(1)?;
            let path = args.str(0)?;
            let target = match ctx.get("target") {
                Value::Handle(h) => h,
                other => return Err(RemoteFailure::raised(format!("writer has no target ({})", other.kind()))),
            };
            let overwrite = matches!(ctx.get("overwrite"), Value::Bool(true));
            let options = match ctx.get("options") {
                Value::Map(entries) => entries
                    .into_iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect(),
                _ => Vec::new(),
            };
            let with_session = matches!(ctx.get("session"), Value::Handle(_));
            ctx.runtime().save_component(&target, path, overwrite, options, with_session)?;
            Ok(Value::Unit)
        })
}

pub(crate) fn reader_class() -> ClassDef {
    ClassDef::new(READER_CLASS)
        .method("session", bind_session)
        .method("load", |ctx, args| {
            args.arity(1)?;
            let path = args.str(0)?;
            let class = match ctx.get("class") {
                Value::String(s) => s,
                other => return Err(RemoteFailure::raised(format!("reader has no class ({})", other.kind()))),
            };
            let handle = ctx.runtime().load_component(&class, path)?;
            Ok(Value::Handle(handle))
        })
}

impl LoopbackRuntime {
    /// The component saved at `path`, if any.
    pub fn saved(&self, path: &str) -> Option<SavedComponent> {
        self.store.get(path).map(|s| s.value().clone())
    }

    pub fn save_component(
        &self,
        target: &RemoteHandle,
        path: &str,
        overwrite: bool,
        options: Vec<(String, String)>,
        with_session: bool,
    ) -> std::result::Result<(), RemoteFailure> {
        if !overwrite && self.store.contains_key(path) {
            return Err(RemoteFailure::raised(format!(
                "path {} already exists; use overwrite to replace it",
                path
            )));
        }
        let root = self.freeze_object(target, 0)?;
        tracing::debug!(path, class = %root.class, options = options.len(), overwrite, "save");
        let class = root.class.clone();
        self.store.insert(path.to_string(), SavedComponent { class, options, with_session, root });
        Ok(())
    }

    pub fn load_component(&self, class: &str, path: &str) -> std::result::Result<RemoteHandle, RemoteFailure> {
        let saved = self
            .saved(path)
            .ok_or_else(|| RemoteFailure::raised(format!("no component saved at {}", path)))?;
        if saved.class != class {
            return Err(RemoteFailure::raised(format!(
                "{} holds a {}, not a {}",
                path, saved.class, class
            )));
        }
        tracing::debug!(path, class, "load");
        Ok(self.thaw_object(&saved.root))
    }

    fn freeze_object(&self, handle: &RemoteHandle, depth: usize) -> std::result::Result<Snapshot, RemoteFailure> {
        if depth > self.max_depth() {
            return Err(RemoteFailure::raised("object graph too deep to save"));
        }
        let (class, fields) = self.fields_of(handle)?;
        let fields = fields
            .into_iter()
            .map(|(k, v)| self.freeze_value(v, depth + 1).map(|frozen| (k, frozen)))
            .collect::<std::result::Result<_, RemoteFailure>>()?;
        Ok(Snapshot { class, fields })
    }

    fn freeze_value(&self, value: Value, depth: usize) -> std::result::Result<Frozen, RemoteFailure> {
        match value {
            Value::Handle(h) if self.has_object(&h) && self.class_of(&h).as_deref() != Some(crate::SESSION_CLASS) => {
                Ok(Frozen::Object(self.freeze_object(&h, depth)?))
            }
            Value::List(items) => Ok(Frozen::List(
                items
                    .into_iter()
                    .map(|v| self.freeze_value(v, depth + 1))
                    .collect::<std::result::Result<_, _>>()?,
            )),
            other => Ok(Frozen::Plain(other)),
        }
    }

    fn thaw_object(&self, snapshot: &Snapshot) -> RemoteHandle {
        let fields = snapshot.fields.iter().map(|(k, v)| (k.clone(), self.thaw_value(v))).collect();
        self.spawn(&snapshot.class, fields)
    }

    fn thaw_value(&self, frozen: &Frozen) -> Value {
        match frozen {
            Frozen::Plain(v) => v.clone(),
            Frozen::List(items) => Value::List(items.iter().map(|v| self.thaw_value(v)).collect()),
            Frozen::Object(snapshot) => Value::Handle(self.thaw_object(snapshot)),
        }
    }
}
