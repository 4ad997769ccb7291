use std::collections::HashMap;

use super::value::Value;
use crate::collections::StringRef;
use crate::console::ast::CodeBlock;
use crate::console::namespace::NamespaceId;

/// The script function a frame belongs to.
#[derive(Debug, Clone)]
pub(crate) struct ActiveFunction {
    pub name: StringRef,
    /// Namespace (or package layer) the function was found in. `Parent::`
    /// calls continue resolving after this layer.
    pub layer: NamespaceId,
    /// Display name of the namespace, `None` for global functions
    pub namespace: Option<StringRef>,
}

/// One call frame. Top-level code of an executed unit gets a frame without a
/// function.
#[derive(Debug)]
pub(crate) struct Frame {
    pub locals: HashMap<StringRef, Value>,
    pub function: Option<ActiveFunction>,
    pub code: CodeBlock,
    pub line: u32,
}

/// Variable storage: the globals and the stack of call frames. Frames are
/// never captured, a frame's locals die with the call.
#[derive(Debug)]
pub(crate) struct Store {
    pub(crate) globals: HashMap<StringRef, Value>,
    pub(crate) frames: Vec<Frame>,
    /// Expressions currently being evaluated, across all frames
    pub(crate) nesting: usize,
}

impl Store {
    pub(crate) fn new() -> Self {
        Store {
            globals: HashMap::new(),
            frames: Vec::with_capacity(64),
            nesting: 0,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, function: Option<ActiveFunction>, code: CodeBlock) {
        self.frames.push(Frame {
            locals: HashMap::new(),
            function,
            code,
            line: 0,
        });
    }

    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(!self.frames.is_empty());
        self.frames.pop();
    }

    pub(crate) fn current_function(&self) -> Option<&ActiveFunction> {
        self.frames.last().and_then(|frame| frame.function.as_ref())
    }

    pub(crate) fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    pub(crate) fn read_local(&self, name: &StringRef) -> Value {
        self.frames.last()
            .and_then(|frame| frame.locals.get(name))
            .cloned()
            .unwrap_or(Value::Empty)
    }

    /// Writes a local of the innermost frame. Outside of any frame the write
    /// is dropped.
    pub(crate) fn write_local(&mut self, name: StringRef, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.insert(name, value);
        }
    }

    pub(crate) fn read_global(&self, name: &StringRef) -> Value {
        self.globals.get(name).cloned().unwrap_or(Value::Empty)
    }

    pub(crate) fn write_global(&mut self, name: StringRef, value: Value) {
        self.globals.insert(name, value);
    }
}
