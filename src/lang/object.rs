use serde::{Deserialize, Serialize};

/// Heap-allocated runtime object.
///
/// Objects are shared between stack cells through `Rc`, so they are freed as
/// soon as the last `Value` referencing them is dropped. The set of variants
/// is closed; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// Immutable string. Equality is by content.
    String(Box<str>),
}

impl Object {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::String(s) => Some(s),
        }
    }

    /// Concatenates two strings into a fresh object; operands are untouched.
    pub fn concat(a: &str, b: &str) -> Object {
        let mut joined = String::with_capacity(a.len() + b.len());
        joined.push_str(a);
        joined.push_str(b);
        Object::String(joined.into_boxed_str())
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::String(s) => write!(f, "{}", s),
        }
    }
}
