/// eval
///
/// Tree-walking evaluator for compiled script units. Values are weakly typed
/// (see `Value`), variables live in a stack of frames plus one global table,
/// and calls are resolved through the namespace table at the moment they are
/// made. Script mistakes are logged and evaluation continues with an empty
/// value; only running out of call depth aborts the evaluation with an
/// `EvalError`.

pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod store;
pub(crate) mod value;

pub use error::{EvalError, EvalErrorKind, EvalFrame};
pub use value::{format_float, is_numeric, parse_number, Value};
pub(crate) use store::Store;
