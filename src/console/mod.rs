/// console
///
/// The script engine: a front end that compiles source text into a node
/// heap, a tree-walking evaluator, and the runtime tables it works against
/// (namespaces, objects and tagged strings). Everything hangs off one
/// `Console`; separate consoles share nothing.

mod arena;
pub mod ast;
pub mod eval;
pub mod input_source;
mod library;
pub mod logging;
pub mod namespace;
mod parser;
pub mod persist;
pub mod shared;
pub mod sim;
pub mod tags;

#[cfg(test)]
mod tests;

use std::fmt;
#[cfg(not(feature = "no_logging"))]
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::collections::{StringPool, StringRef};
use ast::CodeBlock;
use eval::{EvalError, Store, Value};
use input_source::ParseError;
use logging::{Logger, StderrLogger};
use namespace::{EntryKind, NativeCall, Namespaces, LinkError};
use parser::Parser;
use sim::{ObjectRegistry, SimObjectId};
use tags::TagTable;

/// Runtime limits and id ranges of a console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Nested script calls allowed before evaluation fails with a stack
    /// exhaustion error
    pub max_call_depth: usize,
    /// Nested expressions allowed across all frames, deeper nesting fails
    /// with a stack exhaustion error as well
    pub max_expression_depth: usize,
    pub first_dynamic_id: SimObjectId,
    pub first_datablock_id: SimObjectId,
    /// Write recovered script errors to the logger
    pub echo_warnings: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            max_call_depth: 1000,
            max_expression_depth: 10_000,
            first_dynamic_id: 4096,
            first_datablock_id: 3,
            echo_warnings: true,
        }
    }
}

/// Failure of `Console::eval`: the source did not compile, or evaluating it
/// was aborted.
#[derive(Debug, derive_more::From, derive_more::Display)]
pub enum ConsoleError {
    #[display(fmt = "{}", _0)]
    Parse(ParseError),
    #[display(fmt = "{}", _0)]
    Eval(EvalError),
}

impl std::error::Error for ConsoleError {}

pub struct Console {
    pub(crate) config: ConsoleConfig,
    logger: Box<dyn Logger>,
    pub(crate) pool: StringPool,
    parser: Parser,
    pub(crate) store: Store,
    pub(crate) namespaces: Namespaces,
    pub(crate) objects: ObjectRegistry,
    pub(crate) tags: TagTable,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("config", &self.config)
            .field("logger", &self.logger)
            .field("objects", &self.objects.len())
            .field("tags", &self.tags.len())
            .finish()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        Self::with_logger(config, Box::new(StderrLogger::new()))
    }

    /// Creates a console with the built-in classes and functions registered.
    pub fn with_logger(config: ConsoleConfig, logger: Box<dyn Logger>) -> Self {
        let objects = ObjectRegistry::new(config.first_dynamic_id, config.first_datablock_id);
        let mut console = Console {
            config,
            logger,
            pool: StringPool::new(),
            parser: Parser::new(),
            store: Store::new(),
            namespaces: Namespaces::new(),
            objects,
            tags: TagTable::new(),
        };

        let registered = library::register_builtins(&mut console);
        debug_assert!(registered.is_ok(), "built-in classes failed to register");
        console
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn set_logger(&mut self, logger: Box<dyn Logger>) {
        self.logger = logger;
    }

    /// Compiles a unit without running it.
    pub fn compile(&mut self, filename: &str, source: &str) -> Result<CodeBlock, ParseError> {
        self.parser.compile(filename, source, &mut self.pool)
    }

    /// Compiles and runs source text, returning the value of a top-level
    /// `return` (or empty).
    pub fn eval(&mut self, source: &str) -> Result<Value, ConsoleError> {
        let code = self.compile("<eval>", source)?;
        Ok(self.execute(&code)?)
    }

    /// Calls a global function, or `Ns::name` through that namespace.
    /// An unknown function is logged and yields an empty value.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let (namespace, name) = match name.rfind("::") {
            Some(split) => (Some(&name[..split]), &name[split + 2..]),
            None => (None, name),
        };

        let base = match namespace {
            Some(namespace) => self.pool.lookup(namespace).and_then(|ns| self.namespaces.find(Some(&ns), None)),
            None => Some(self.namespaces.global()),
        };
        let entry = match (base, self.pool.lookup(name)) {
            (Some(base), Some(name)) => self.namespaces.resolve(base, &name, true),
            _ => None,
        };

        match entry {
            Some(entry) => self.call_entry(&entry, args.to_vec()),
            None => {
                self.warn(format_args!("unable to find function '{}'", name));
                Ok(Value::Empty)
            },
        }
    }

    /// Calls a method on an object, `args` excludes the object itself.
    pub fn call_method(&mut self, object: SimObjectId, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if !self.objects.contains(object) {
            self.warn(format_args!("unable to find object {} attempting to call function '{}'", object, name));
            return Ok(Value::Empty);
        }

        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(Value::from(object));
        full_args.extend_from_slice(args);
        let name = self.pool.intern(name);
        self.call_method_by_name(object, &name, full_args)
    }

    /// Registers a host function. `namespace` of `None` makes it global.
    /// Calls with fewer than `min_args` or more than `max_args` arguments
    /// are refused with a warning.
    pub fn register_function<F>(&mut self, namespace: Option<&str>, name: &str, min_args: usize, max_args: usize, callback: F)
    where
        F: Fn(&mut Console, &NativeCall) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.register_native(namespace, name, min_args, max_args, false, callback);
    }

    /// Registers a host method on a class or object namespace. The callback
    /// receives the object in `NativeCall::object`, the arity bounds count
    /// the explicit arguments only.
    pub fn register_method<F>(&mut self, namespace: &str, name: &str, min_args: usize, max_args: usize, callback: F)
    where
        F: Fn(&mut Console, &NativeCall) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.register_native(Some(namespace), name, min_args, max_args, true, callback);
    }

    fn register_native<F>(&mut self, namespace: Option<&str>, name: &str, min_args: usize, max_args: usize, is_method: bool, callback: F)
    where
        F: Fn(&mut Console, &NativeCall) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let namespace = namespace.map(|namespace| self.pool.intern(namespace));
        let namespace = self.namespaces.find_or_create(namespace, None);
        let name = self.pool.intern(name);
        self.namespaces.add_entry(namespace, name, EntryKind::Native {
            min_args,
            max_args,
            is_method,
            callback: namespace::native_fn(callback),
        });
    }

    /// Makes `parent` the parent namespace of `child`, creating both if
    /// needed.
    pub fn link_namespaces(&mut self, child: &str, parent: &str) -> Result<(), LinkError> {
        let child = self.pool.intern(child);
        let parent = self.pool.intern(parent);
        let child = self.namespaces.find_or_create(Some(child), None);
        let parent = self.namespaces.find_or_create(Some(parent), None);
        self.namespaces.link(child, parent)
    }

    /// Reads `$name`, the leading `$` is optional.
    pub fn get_global(&self, name: &str) -> Value {
        match self.pool.lookup(name.trim_start_matches('$')) {
            Some(name) => self.store.read_global(&name),
            None => Value::Empty,
        }
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        let name = self.pool.intern(name.trim_start_matches('$'));
        self.store.write_global(name, value);
    }

    /// Interns a name in the case-insensitive table.
    pub fn intern(&mut self, text: &str) -> StringRef {
        self.pool.intern(text)
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagTable {
        &mut self.tags
    }

    /// Writes a line to the logger.
    pub fn echo(&mut self, message: impl fmt::Display) {
        log!(self.logger, "{}", message);
    }

    /// Reports a recovered script error.
    pub(crate) fn warn(&mut self, message: impl fmt::Display) {
        if self.config.echo_warnings {
            log!(self.logger, "Warning: {}", message);
        }
    }
}
