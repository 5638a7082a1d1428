//! Runtime values and the host environment.

pub mod environment;
pub mod function;
pub mod value;

pub use environment::{Environment, ExternalSymbol, HostEnvironment, SymbolKind};
pub use function::NativeFunction;
pub use value::Value;
