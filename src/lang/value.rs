use std::rc::Rc;

use super::object::Object;
use serde::{Deserialize, Serialize};

/// Runtime value of the expression language.
///
/// Values are the only data that can live in a constant pool or on the VM
/// operand stack. Everything except `Obj` is copied by value; `Obj` shares its
/// heap object by reference count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit floating-point number.
    Number(f64),

    /// Boolean value.
    Bool(bool),

    /// The absent value.
    Nil,

    /// Reference to a heap object.
    Obj(Rc<Object>),
}

impl Value {
    /// Allocates a new string object.
    pub fn string(s: impl Into<Box<str>>) -> Self {
        Value::Obj(Rc::new(Object::String(s.into())))
    }

    /// `nil` and `false` are falsey; every other value is truthy.
    pub fn is_falsey(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(b) => !b,
            Value::Number(_) | Value::Obj(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Obj(obj) => obj.as_str(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Obj(obj) => write!(f, "{}", obj),
        }
    }
}
