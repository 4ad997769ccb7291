/**
 * console/tests
 *
 * Tests that run script source through a whole console: parsing, evaluation
 * and the runtime tables together. Unit tests of the individual tables live
 * next to their code.
 */

mod utils;
mod eval_control_flow;
mod eval_namespaces;
mod eval_objects;
mod eval_tags;
mod eval_library;

pub(crate) use utils::Tester; // the testing harness
pub(crate) use crate::console::eval::{Value, EvalErrorKind};
pub(crate) use crate::console::ConsoleConfig;
