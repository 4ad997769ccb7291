use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::collections::StringRef;
use crate::console::arena::{Arena, Id};
use crate::console::ast::{CodeBlock, FunctionDefinitionId};
use crate::console::eval::{EvalError, Value};
use crate::console::sim::SimObjectId;
use crate::console::Console;

pub type NamespaceId = Id<Namespace>;

/// Arguments of a native call. For methods `object` is the object the method
/// was invoked on and `args` holds only the explicit arguments.
pub struct NativeCall<'a> {
    pub object: Option<SimObjectId>,
    pub args: &'a [Value],
}

static EMPTY_VALUE: Value = Value::Empty;

impl<'a> NativeCall<'a> {
    /// Argument by position, `Empty` when it was not passed.
    pub fn arg(&self, idx: usize) -> &Value {
        self.args.get(idx).unwrap_or(&EMPTY_VALUE)
    }
}

pub type NativeFn = Arc<dyn Fn(&mut Console, &NativeCall) -> Result<Value, EvalError> + Send + Sync>;

/// Boxes a host callback.
pub fn native_fn<F>(callback: F) -> NativeFn
where
    F: Fn(&mut Console, &NativeCall) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Callable stored in a namespace. Script functions and host functions share
/// one table, so resolution does not care which kind it finds.
#[derive(Clone)]
pub enum EntryKind {
    Script {
        code: CodeBlock,
        definition: FunctionDefinitionId,
    },
    Native {
        min_args: usize,
        max_args: usize,
        /// Registered on a class namespace: the first argument of a
        /// qualified call is the object
        is_method: bool,
        callback: NativeFn,
    },
}

#[derive(Clone)]
pub struct Entry {
    /// Layer the entry lives in
    pub namespace: NamespaceId,
    pub name: StringRef,
    pub kind: EntryKind,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            EntryKind::Script { .. } => "script",
            EntryKind::Native { .. } => "native",
        };
        f.debug_struct("Entry")
            .field("namespace", &self.namespace.index())
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// A bucket of callables. A namespace with a package is the layer that the
/// package puts in front of the namespace with the same name.
#[derive(Debug)]
pub struct Namespace {
    pub this: NamespaceId,
    pub name: Option<StringRef>,
    pub package: Option<StringRef>,
    pub parent: Option<NamespaceId>,
    // Number of links that currently hold the parent binding
    parent_refs: u32,
    pub(crate) entries: HashMap<StringRef, Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The parent is the namespace itself or one of its descendants
    Cycle,
    /// The namespace already has a different parent
    AlreadyLinked,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Cycle => f.write_str("linking would create a cycle"),
            LinkError::AlreadyLinked => f.write_str("namespace is already linked to a different parent"),
        }
    }
}

/// Table of all namespaces. The global namespace (no name) ends every
/// resolution chain.
#[derive(Debug)]
pub struct Namespaces {
    arena: Arena<Namespace>,
    lookup: HashMap<(Option<StringRef>, Option<StringRef>), NamespaceId>,
    global: NamespaceId,
    // Most recently activated last
    active_packages: Vec<StringRef>,
    known_packages: HashSet<StringRef>,
}

impl Namespaces {
    pub fn new() -> Self {
        let mut namespaces = Namespaces {
            arena: Arena::new(),
            lookup: HashMap::new(),
            global: NamespaceId::new_invalid(),
            active_packages: Vec::new(),
            known_packages: HashSet::new(),
        };
        namespaces.global = namespaces.find_or_create(None, None);
        namespaces
    }

    pub fn global(&self) -> NamespaceId {
        self.global
    }

    pub fn get(&self, id: NamespaceId) -> &Namespace {
        &self.arena[id]
    }

    pub fn find(&self, name: Option<&StringRef>, package: Option<&StringRef>) -> Option<NamespaceId> {
        self.lookup.get(&(name.cloned(), package.cloned())).copied()
    }

    pub fn find_or_create(&mut self, name: Option<StringRef>, package: Option<StringRef>) -> NamespaceId {
        let key = (name, package);
        if let Some(id) = self.lookup.get(&key) {
            return *id;
        }

        if let Some(package) = &key.1 {
            self.known_packages.insert(package.clone());
        }
        let (name, package) = key.clone();
        let id = self.arena.alloc_with_id(|this| Namespace {
            this, name, package,
            parent: None,
            parent_refs: 0,
            entries: HashMap::new(),
        });
        self.lookup.insert(key, id);
        id
    }

    /// Makes `parent` the parent of `child`. Linking to the current parent
    /// again only adds a reference, `unlink` drops one.
    pub fn link(&mut self, child: NamespaceId, parent: NamespaceId) -> Result<(), LinkError> {
        if child == self.global || child == parent {
            return Err(LinkError::Cycle);
        }
        if parent == self.global {
            return Ok(());
        }

        match self.arena[child].parent {
            Some(current) if current == parent => {
                self.arena[child].parent_refs += 1;
                return Ok(());
            },
            Some(_) => return Err(LinkError::AlreadyLinked),
            None => {},
        }

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(LinkError::Cycle);
            }
            ancestor = self.arena[id].parent;
        }

        let namespace = &mut self.arena[child];
        namespace.parent = Some(parent);
        namespace.parent_refs = 1;
        Ok(())
    }

    pub fn unlink(&mut self, child: NamespaceId) {
        let namespace = &mut self.arena[child];
        if namespace.parent_refs > 0 {
            namespace.parent_refs -= 1;
            if namespace.parent_refs == 0 {
                namespace.parent = None;
            }
        }
    }

    /// Adds or replaces a callable.
    pub fn add_entry(&mut self, namespace: NamespaceId, name: StringRef, kind: EntryKind) {
        let entry = Entry { namespace, name: name.clone(), kind };
        self.arena[namespace].entries.insert(name, entry);
    }

    // -------------------------------------------------------------------------
    // Packages
    // -------------------------------------------------------------------------

    pub fn is_package(&self, name: &StringRef) -> bool {
        self.known_packages.contains(name)
    }

    pub fn is_package_active(&self, name: &StringRef) -> bool {
        self.active_packages.contains(name)
    }

    /// Returns false if no package with this name was ever declared.
    /// Activating an active package changes nothing.
    pub fn activate_package(&mut self, name: StringRef) -> bool {
        if !self.known_packages.contains(&name) {
            return false;
        }
        if !self.active_packages.contains(&name) {
            self.active_packages.push(name);
        }
        true
    }

    /// Deactivates the package along with every package activated after it.
    pub fn deactivate_package(&mut self, name: &StringRef) -> bool {
        match self.active_packages.iter().position(|active| active == name) {
            Some(position) => {
                self.active_packages.truncate(position);
                true
            },
            None => false,
        }
    }

    pub fn active_packages(&self) -> &[StringRef] {
        &self.active_packages
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    /// Layers consulted when resolving from `base`, in order. Every namespace
    /// of the parent chain contributes its active package layers (newest
    /// package first) followed by itself. The global namespace and its
    /// package layers come last.
    pub fn layers(&self, base: NamespaceId, include_global: bool) -> Vec<NamespaceId> {
        let mut result = Vec::new();
        let mut reached_global = false;
        let mut current = Some(base);
        while let Some(id) = current {
            self.push_layers_of(id, &mut result);
            reached_global |= id == self.global;
            current = self.arena[id].parent;
        }

        if include_global && !reached_global {
            self.push_layers_of(self.global, &mut result);
        }
        result
    }

    fn push_layers_of(&self, id: NamespaceId, result: &mut Vec<NamespaceId>) {
        let name = &self.arena[id].name;
        for package in self.active_packages.iter().rev() {
            if let Some(layer) = self.lookup.get(&(name.clone(), Some(package.clone()))) {
                result.push(*layer);
            }
        }
        result.push(id);
    }

    /// Finds `name` starting at `base`.
    pub fn resolve(&self, base: NamespaceId, name: &StringRef, include_global: bool) -> Option<Entry> {
        self.layers(base, include_global).into_iter()
            .find_map(|layer| self.arena[layer].entries.get(name).cloned())
    }

    /// Resolution for `Parent::name` called from a function that was found
    /// in `layer`: continues with the layer after it in the chain of that
    /// layer's namespace. So a package override reaches the function it
    /// overrides, and a namespace function reaches its parent's.
    pub fn resolve_parent(&self, layer: NamespaceId, name: &StringRef) -> Option<Entry> {
        let base = match self.lookup.get(&(self.arena[layer].name.clone(), None)) {
            Some(base) => *base,
            None => return None,
        };

        let layers = self.layers(base, true);
        let position = layers.iter().position(|id| *id == layer)?;
        layers[position + 1..].iter()
            .find_map(|id| self.arena[*id].entries.get(name).cloned())
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new()
    }
}
