//! # Class Definitions
//!
//! A class is a name plus a table of methods. Methods are closures over a
//! `Ctx` (the runtime and the receiving object) and the call arguments.

use std::collections::HashMap;
use std::sync::Arc;

use tether::RemoteFailure;
use tether::RemoteHandle;
use tether::Value;

use crate::LoopbackRuntime;

pub type MethodResult = std::result::Result<Value, RemoteFailure>;

pub type Method = Arc<dyn Fn(&Ctx<'_>, Args<'_>) -> MethodResult + Send + Sync>;

/// The receiver of a method call.
pub struct Ctx<'a> {
    pub(crate) runtime: &'a LoopbackRuntime,
    pub(crate) this: &'a RemoteHandle,
    pub(crate) class: &'a str,
}

impl<'a> Ctx<'a> {
    pub fn runtime(&self) -> &'a LoopbackRuntime {
        self.runtime
    }

    pub fn this(&self) -> &'a RemoteHandle {
        self.this
    }

    pub fn class(&self) -> &'a str {
        self.class
    }

    /// A field of the receiving instance; `Unit` if never set.
    pub fn get(&self, field: &str) -> Value {
        self.runtime.field(self.this, field).unwrap_or(Value::Unit)
    }

    pub fn set(&self, field: &str, value: Value) -> std::result::Result<(), RemoteFailure> {
        self.runtime.set_field(self.this, field, value)
    }
}

/// Positional call arguments with arity and kind checks.
#[derive(Clone, Copy)]
pub struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub(crate) fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn arity(&self, arity: usize) -> std::result::Result<(), RemoteFailure> {
        if self.values.len() != arity {
            return Err(RemoteFailure::bad_arguments(format!(
                "{} takes {} argument(s), got {}",
                self.method,
                arity,
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn value(&self, index: usize) -> std::result::Result<&'a Value, RemoteFailure> {
        self.values.get(index).ok_or_else(|| {
            RemoteFailure::bad_arguments(format!("{} is missing argument {}", self.method, index))
        })
    }

    pub fn str(&self, index: usize) -> std::result::Result<&'a str, RemoteFailure> {
        let value = self.value(index)?;
        value.as_str().ok_or_else(|| self.wrong_kind(index, "string", value))
    }

    pub fn handle(&self, index: usize) -> std::result::Result<&'a RemoteHandle, RemoteFailure> {
        let value = self.value(index)?;
        value.as_handle().ok_or_else(|| self.wrong_kind(index, "handle", value))
    }

    fn wrong_kind(&self, index: usize, expected: &str, found: &Value) -> RemoteFailure {
        RemoteFailure::bad_arguments(format!(
            "{} argument {}: expected {}, found {}",
            self.method,
            index,
            expected,
            found.kind()
        ))
    }
}

/// A foreign class: instance methods, static methods and flags.
#[derive(Clone)]
pub struct ClassDef {
    pub(crate) name: String,
    pub(crate) methods: HashMap<String, Method>,
    pub(crate) statics: HashMap<String, Method>,
    pub(crate) persistable: bool,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
            statics: HashMap::new(),
            persistable: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Ctx<'_>, Args<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Arc::new(f));
        self
    }

    /// A method on the class object. `new` here replaces the default
    /// constructor.
    pub fn static_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Ctx<'_>, Args<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.statics.insert(name.to_string(), Arc::new(f));
        self
    }

    /// A field with a `get<Name>` getter and a chaining `set<Name>` setter.
    pub fn property(self, field: &str) -> Self {
        let suffix = capitalize(field);
        let get_field = field.to_string();
        let set_field = field.to_string();
        self.method(&format!("get{}", suffix), move |ctx, args| {
            args.arity(0)?;
            Ok(ctx.get(&get_field))
        })
        .method(&format!("set{}", suffix), move |ctx, args| {
            args.arity(1)?;
            ctx.set(&set_field, args.value(0)?.clone())?;
            Ok(Value::Handle(ctx.this().clone()))
        })
    }

    /// Gives instances a `write` method and the class a `read` method.
    pub fn persistable(mut self) -> Self {
        self.persistable = true;
        self
    }

    pub(crate) fn lookup(&self, method: &str) -> Option<Method> {
        self.methods.get(method).cloned()
    }

    pub(crate) fn lookup_static(&self, method: &str) -> Option<Method> {
        self.statics.get(method).cloned()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("inputCol"), "InputCol");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_arity_check() {
        let values = [Value::Int(1)];
        let args = Args::new("setMaxIter", &values);
        assert!(args.arity(1).is_ok());
        assert!(args.arity(2).is_err());
        assert!(args.str(0).is_err());
        assert!(args.value(1).is_err());
    }
}
