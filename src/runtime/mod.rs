pub mod runtime_error;
pub mod vm;

pub use runtime_error::{InternalError, RuntimeError, VmError};
pub use vm::{InterpretResult, Vm, VmConfig};
