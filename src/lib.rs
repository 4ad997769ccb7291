#[macro_use]
mod macros;

mod collections;
pub mod console;

pub use collections::StringRef;
pub use console::eval::{EvalError, EvalErrorKind, Value};
pub use console::input_source::ParseError;
pub use console::shared::{global_console, SharedConsole};
pub use console::{Console, ConsoleConfig, ConsoleError};
