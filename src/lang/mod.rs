//! # Runtime data model
//!
//! The tagged `Value` shared by constant pools and the VM stack, and the
//! heap `Object` kinds a value can reference.

pub mod object;
pub mod value;

pub use object::Object;
pub use value::Value;
