//! The tagged union of everything that may cross the boundary.

use std::any::Any;

use crate::handle::RemoteHandle;

/// An invocation argument or result.
///
/// Scalars carry their exact width; nothing is widened implicitly.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The result of a foreign operation that returns nothing.
    Unit,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    /// A foreign-native ordered array.
    List(Vec<Value>),
    /// A foreign-native key/value mapping, in insertion order.
    Map(Vec<(Value, Value)>),
    /// A reference to another foreign object.
    Handle(RemoteHandle),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Handle(_) => "handle",
        }
    }

    pub fn as_handle(&self) -> Option<&RemoteHandle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boxes the value as its most specific local type.
    ///
    /// This is the reverse of `Marshaller::narrow` for the built-in kinds:
    /// `Int` becomes a boxed `i32`, `Double` a boxed `f64`, and so on.
    /// Containers box as `Vec<Value>` and `Vec<(Value, Value)>`.
    pub fn into_boxed(self) -> Box<dyn Any + Send> {
        match self {
            Value::Unit => Box::new(()),
            Value::Bool(v) => Box::new(v),
            Value::Byte(v) => Box::new(v),
            Value::Short(v) => Box::new(v),
            Value::Int(v) => Box::new(v),
            Value::Long(v) => Box::new(v),
            Value::Float(v) => Box::new(v),
            Value::Double(v) => Box::new(v),
            Value::Char(v) => Box::new(v),
            Value::String(v) => Box::new(v),
            Value::List(v) => Box::new(v),
            Value::Map(v) => Box::new(v),
            Value::Handle(v) => Box::new(v),
        }
    }
}
