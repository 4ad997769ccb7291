use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use crate::collections::StringRef;
use crate::console::eval::{EvalError, Value};
use crate::console::namespace::NamespaceId;
use crate::console::Console;

pub type SimObjectId = u32;

/// Storage type of a persistent field. Values are coerced when they are
/// stored, so reading an `Int` field always gives an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
}

impl FieldType {
    pub fn coerce(self, value: &Value) -> Value {
        match self {
            FieldType::Int => Value::Int(value.to_int()),
            FieldType::Float => Value::Float(value.to_number()),
            FieldType::Bool => Value::from(value.to_bool()),
            FieldType::String => match value {
                Value::Empty => Value::Empty,
                Value::String(_) | Value::Interned(_) => value.clone(),
                other => Value::String(other.to_text().into_owned()),
            },
        }
    }
}

/// What a protected setter decided.
#[derive(Debug, Clone)]
pub enum SetterOutcome {
    Reject,
    /// Store this (possibly transformed) value
    Accept(Value),
}

pub type FieldSetter = Arc<dyn Fn(&SimObject, &Value) -> SetterOutcome + Send + Sync>;
pub type FieldGetter = Arc<dyn Fn(&SimObject, &Value) -> Value + Send + Sync>;

/// A field declared by a native class.
#[derive(Clone)]
pub struct PersistentField {
    pub name: String,
    pub field_type: FieldType,
    /// Number of elements, fields with more than one are indexed `f[i]`
    pub element_count: usize,
    pub default: Value,
    pub setter: Option<FieldSetter>,
    pub getter: Option<FieldGetter>,
}

impl PersistentField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        PersistentField {
            name: name.to_string(),
            field_type,
            element_count: 1,
            default: Value::Empty,
            setter: None,
            getter: None,
        }
    }

    pub fn array(name: &str, field_type: FieldType, element_count: usize) -> Self {
        PersistentField { element_count: element_count.max(1), ..Self::new(name, field_type) }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = self.field_type.coerce(&default);
        self
    }

    /// The setter sees the coerced value and may reject or replace it.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where F: Fn(&SimObject, &Value) -> SetterOutcome + Send + Sync + 'static
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// The getter sees the stored value and returns what scripts read.
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where F: Fn(&SimObject, &Value) -> Value + Send + Sync + 'static
    {
        self.getter = Some(Arc::new(getter));
        self
    }
}

impl fmt::Debug for PersistentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentField")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("element_count", &self.element_count)
            .field("protected", &(self.setter.is_some() || self.getter.is_some()))
            .finish()
    }
}

/// Description of a native class, handed to `Console::register_class`.
/// Flags are inherited from the parent class.
#[derive(Debug, Clone)]
pub struct ClassRep {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<PersistentField>,
    pub is_container: bool,
    pub deletes_children: bool,
    pub is_datablock: bool,
    pub honors_class_fields: bool,
}

impl ClassRep {
    pub fn new(name: &str) -> Self {
        ClassRep {
            name: name.to_string(),
            parent: None,
            fields: Vec::new(),
            is_container: false,
            deletes_children: false,
            is_datablock: false,
            honors_class_fields: false,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_field(mut self, field: PersistentField) -> Self {
        self.fields.push(field);
        self
    }

    /// Instances hold children. A group deletes its children with itself, a
    /// set only lets go of them.
    pub fn container(mut self, deletes_children: bool) -> Self {
        self.is_container = true;
        self.deletes_children = deletes_children;
        self
    }

    pub fn datablock(mut self) -> Self {
        self.is_datablock = true;
        self
    }

    /// Instances link the namespaces named by their `class` and `superClass`
    /// fields.
    pub fn script_class(mut self) -> Self {
        self.honors_class_fields = true;
        self
    }
}

/// A registered class with the fields and flags of its ancestors folded in.
#[derive(Debug)]
pub struct ClassInfo {
    pub name: StringRef,
    pub parent: Option<Arc<ClassInfo>>,
    pub namespace: NamespaceId,
    pub fields: Vec<PersistentField>,
    pub is_container: bool,
    pub deletes_children: bool,
    pub is_datablock: bool,
    pub honors_class_fields: bool,
}

impl ClassInfo {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name.eq_ignore_case(name) {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClassError {
    AlreadyRegistered,
    UnknownParent,
}

impl fmt::Display for RegisterClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClassError::AlreadyRegistered => f.write_str("class is already registered"),
            RegisterClassError::UnknownParent => f.write_str("parent class is not registered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetFieldError {
    UnknownObject,
    /// A protected setter refused the value, or the index is out of range
    Rejected,
}

impl fmt::Display for SetFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetFieldError::UnknownObject => f.write_str("unknown object"),
            SetFieldError::Rejected => f.write_str("value rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    UnknownObject,
    NotAContainer,
    /// The object is the container itself or one of its ancestors
    WouldCycle,
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::UnknownObject => f.write_str("unknown object"),
            ContainerError::NotAContainer => f.write_str("object is not a container"),
            ContainerError::WouldCycle => f.write_str("object cannot contain itself"),
        }
    }
}

// -----------------------------------------------------------------------------
// Objects
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DynamicField {
    name: String,
    value: Value,
}

/// Live object. Created through `Console::new_object`, it gets its id and
/// name when it is registered.
#[derive(Debug)]
pub struct SimObject {
    pub(crate) id: SimObjectId,
    pub(crate) name: Option<StringRef>,
    pub(crate) class: Arc<ClassInfo>,
    pub(crate) namespace: NamespaceId,
    // Namespaces this object linked, unlinked again on deletion
    pub(crate) linked: Vec<NamespaceId>,
    pub(crate) persistent: Vec<Vec<Value>>,
    // Keyed by lowercased name, created on first assignment
    dynamic: Option<HashMap<String, DynamicField>>,
    pub(crate) group: Option<SimObjectId>,
    pub(crate) children: Vec<SimObjectId>,
}

fn dynamic_key(name: &str, index: Option<&str>) -> String {
    match index {
        Some(index) => format!("{}{}", name, index),
        None => name.to_string(),
    }
}

impl SimObject {
    pub(crate) fn new(class: Arc<ClassInfo>) -> Self {
        let persistent = class.fields.iter()
            .map(|field| vec![field.default.clone(); field.element_count])
            .collect();

        SimObject {
            id: 0,
            name: None,
            namespace: class.namespace,
            class,
            linked: Vec::new(),
            persistent,
            dynamic: None,
            group: None,
            children: Vec::new(),
        }
    }

    /// 0 until the object is registered
    pub fn id(&self) -> SimObjectId {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.id != 0
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(|name| name.as_str())
    }

    pub fn class(&self) -> &ClassInfo {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name.as_str()
    }

    pub fn group(&self) -> Option<SimObjectId> {
        self.group
    }

    pub fn children(&self) -> &[SimObjectId] {
        &self.children
    }

    /// Element of a persistent field selected by an optional index. `None`
    /// if the field is not persistent or the index does not select one of
    /// its elements, in which case the access goes to the dynamic fields.
    fn persistent_slot(&self, name: &str, index: Option<&str>) -> Option<(usize, usize)> {
        let slot = self.class.field_index(name)?;
        let element_count = self.class.fields[slot].element_count;
        match index {
            None => Some((slot, 0)),
            Some(index) if element_count > 1 => index.trim().parse::<usize>().ok().map(|element| (slot, element)),
            Some(_) => None,
        }
    }

    /// Reads a field, `Empty` when it does not exist.
    pub fn get_field(&self, name: &str, index: Option<&str>) -> Value {
        if let Some((slot, element)) = self.persistent_slot(name, index) {
            let stored = self.persistent[slot].get(element).cloned().unwrap_or(Value::Empty);
            return match &self.class.fields[slot].getter {
                Some(getter) => getter(self, &stored),
                None => stored,
            };
        }

        let key = dynamic_key(name, index).to_ascii_lowercase();
        self.dynamic.as_ref()
            .and_then(|fields| fields.get(&key))
            .map(|field| field.value.clone())
            .unwrap_or(Value::Empty)
    }

    /// Writes a field. Persistent fields coerce the value and run their
    /// protected setter. Dynamic fields are created on demand and assigning
    /// empty text removes them.
    pub fn set_field(&mut self, name: &str, index: Option<&str>, value: Value) -> Result<(), SetFieldError> {
        if let Some((slot, element)) = self.persistent_slot(name, index) {
            let class = self.class.clone();
            let field = &class.fields[slot];
            if element >= field.element_count {
                return Err(SetFieldError::Rejected);
            }

            let value = field.field_type.coerce(&value);
            let value = match &field.setter {
                Some(setter) => match setter(self, &value) {
                    SetterOutcome::Accept(value) => value,
                    SetterOutcome::Reject => return Err(SetFieldError::Rejected),
                },
                None => value,
            };
            self.persistent[slot][element] = value;
            return Ok(());
        }

        let name = dynamic_key(name, index);
        let key = name.to_ascii_lowercase();
        if value.is_empty() {
            if let Some(fields) = &mut self.dynamic {
                fields.remove(&key);
            }
        } else {
            self.dynamic.get_or_insert_with(HashMap::new)
                .insert(key, DynamicField { name, value });
        }
        Ok(())
    }

    pub fn dynamic_field_count(&self) -> usize {
        self.dynamic.as_ref().map(|fields| fields.len()).unwrap_or(0)
    }

    /// Dynamic fields sorted by name
    pub fn dynamic_fields(&self) -> Vec<(String, Value)> {
        let mut result: Vec<(String, Value)> = match &self.dynamic {
            Some(fields) => fields.values().map(|field| (field.name.clone(), field.value.clone())).collect(),
            None => Vec::new(),
        };
        result.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
        result
    }

    /// Non-empty persistent field elements in declaration order, as
    /// `(name, index, value)`. The index is only given for array fields.
    pub fn persistent_fields(&self) -> Vec<(String, Option<usize>, Value)> {
        let mut result = Vec::new();
        for (field, values) in self.class.fields.iter().zip(self.persistent.iter()) {
            for (element, value) in values.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let index = if field.element_count > 1 { Some(element) } else { None };
                result.push((field.name.clone(), index, value.clone()));
            }
        }
        result
    }

    /// Copies persistent fields with the same name and all dynamic fields.
    pub(crate) fn copy_fields_from(&mut self, source: &SimObject) {
        for (slot, field) in source.class.fields.iter().enumerate() {
            if let Some(own_slot) = self.class.field_index(&field.name) {
                if self.class.fields[own_slot].element_count == field.element_count {
                    self.persistent[own_slot] = source.persistent[slot].clone();
                }
            }
        }
        if let Some(fields) = &source.dynamic {
            self.dynamic = Some(fields.clone());
        }
    }
}

// -----------------------------------------------------------------------------
// Registry
// -----------------------------------------------------------------------------

/// All classes and live objects. Ids come from two increasing counters, one
/// for datablocks and one for everything else, and are never handed out
/// twice.
#[derive(Debug)]
pub struct ObjectRegistry {
    pub(crate) classes: HashMap<StringRef, Arc<ClassInfo>>,
    objects: HashMap<SimObjectId, SimObject>,
    names: HashMap<StringRef, SimObjectId>,
    next_dynamic_id: SimObjectId,
    next_datablock_id: SimObjectId,
}

impl ObjectRegistry {
    pub fn new(first_dynamic_id: SimObjectId, first_datablock_id: SimObjectId) -> Self {
        ObjectRegistry {
            classes: HashMap::new(),
            objects: HashMap::new(),
            names: HashMap::new(),
            next_dynamic_id: first_dynamic_id.max(1),
            next_datablock_id: first_datablock_id.max(1),
        }
    }

    pub fn get(&self, id: SimObjectId) -> Option<&SimObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: SimObjectId) -> Option<&mut SimObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: SimObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn find_by_name(&self, name: &StringRef) -> Option<SimObjectId> {
        self.names.get(name).copied()
    }

    fn allocate_id(&mut self, is_datablock: bool) -> SimObjectId {
        let counter = if is_datablock { &mut self.next_datablock_id } else { &mut self.next_dynamic_id };
        // The two ranges may run into each other, skip ids that are taken
        while self.objects.contains_key(counter) {
            *counter += 1;
        }
        let id = *counter;
        *counter += 1;
        id
    }

    /// Assigns an id and enters the object. A name that is already taken is
    /// not given to the object, the second value reports whether the name
    /// was accepted.
    pub fn register(&mut self, mut object: SimObject, name: Option<StringRef>) -> (SimObjectId, bool) {
        let id = self.allocate_id(object.class.is_datablock);
        object.id = id;
        object.name = None;

        let mut accepted = true;
        if let Some(name) = name {
            if self.names.contains_key(&name) {
                accepted = false;
            } else {
                self.names.insert(name.clone(), id);
                object.name = Some(name);
            }
        }

        self.objects.insert(id, object);
        (id, accepted)
    }

    /// Removes the object. Its container and children still refer to it,
    /// cleaning that up is the caller's job.
    pub fn deregister(&mut self, id: SimObjectId) -> Option<SimObject> {
        let object = self.objects.remove(&id)?;
        if let Some(name) = &object.name {
            if self.names.get(name) == Some(&id) {
                self.names.remove(name);
            }
        }
        Some(object)
    }

    /// Changes or clears an object's name. Fails if the name is taken by
    /// another object.
    pub fn rename(&mut self, id: SimObjectId, name: Option<StringRef>) -> bool {
        if let Some(name) = &name {
            match self.names.get(name) {
                Some(owner) if *owner == id => return true,
                Some(_) => return false,
                None => {},
            }
        }

        let object = match self.objects.get_mut(&id) {
            Some(object) => object,
            None => return false,
        };
        if let Some(old) = object.name.take() {
            self.names.remove(&old);
        }
        if let Some(name) = name {
            self.names.insert(name.clone(), id);
            object.name = Some(name);
        }
        true
    }

    pub fn add_child(&mut self, container: SimObjectId, child: SimObjectId) -> Result<(), ContainerError> {
        let is_container = match self.objects.get(&container) {
            Some(object) => object.class.is_container,
            None => return Err(ContainerError::UnknownObject),
        };
        let current_group = match self.objects.get(&child) {
            Some(object) => object.group,
            None => return Err(ContainerError::UnknownObject),
        };
        if !is_container {
            return Err(ContainerError::NotAContainer);
        }

        let mut ancestor = Some(container);
        while let Some(id) = ancestor {
            if id == child {
                return Err(ContainerError::WouldCycle);
            }
            ancestor = self.objects.get(&id).and_then(|object| object.group);
        }

        if current_group == Some(container) {
            return Ok(());
        }
        self.detach(child);
        if let Some(object) = self.objects.get_mut(&container) {
            object.children.push(child);
        }
        if let Some(object) = self.objects.get_mut(&child) {
            object.group = Some(container);
        }
        Ok(())
    }

    /// Takes the child out of its container, if it has one.
    pub fn detach(&mut self, child: SimObjectId) {
        let group = match self.objects.get_mut(&child) {
            Some(object) => object.group.take(),
            None => None,
        };
        if let Some(group) = group {
            if let Some(object) = self.objects.get_mut(&group) {
                object.children.retain(|id| *id != child);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Console operations on objects
// -----------------------------------------------------------------------------

impl Console {
    /// Registers a native class. Its namespace is linked below the parent
    /// class's namespace.
    pub fn register_class(&mut self, rep: ClassRep) -> Result<(), RegisterClassError> {
        let name = self.pool.intern(&rep.name);
        if self.objects.classes.contains_key(&name) {
            return Err(RegisterClassError::AlreadyRegistered);
        }
        let parent = match &rep.parent {
            Some(parent) => {
                let parent = self.pool.intern(parent);
                match self.objects.classes.get(&parent) {
                    Some(parent) => Some(parent.clone()),
                    None => return Err(RegisterClassError::UnknownParent),
                }
            },
            None => None,
        };

        let namespace = self.namespaces.find_or_create(Some(name.clone()), None);
        if let Some(parent) = &parent {
            if let Err(error) = self.namespaces.link(namespace, parent.namespace) {
                self.warn(format_args!("register_class: {} for class '{}'", error, &name));
            }
        }

        let mut fields = parent.as_ref().map(|p| p.fields.clone()).unwrap_or_default();
        fields.extend(rep.fields);
        let inherited = parent.as_deref();
        let info = ClassInfo {
            name: name.clone(),
            namespace,
            fields,
            is_container: rep.is_container || inherited.map_or(false, |p| p.is_container),
            deletes_children: rep.deletes_children || inherited.map_or(false, |p| p.deletes_children),
            is_datablock: rep.is_datablock || inherited.map_or(false, |p| p.is_datablock),
            honors_class_fields: rep.honors_class_fields || inherited.map_or(false, |p| p.honors_class_fields),
            parent: parent.clone(),
        };

        self.objects.classes.insert(name, Arc::new(info));
        Ok(())
    }

    pub fn class_info(&self, name: &str) -> Option<Arc<ClassInfo>> {
        let name = self.pool.lookup(name)?;
        self.objects.classes.get(&name).cloned()
    }

    /// Creates an unregistered instance of a class, `None` for an unknown
    /// class.
    pub fn new_object(&self, class_name: &str) -> Option<SimObject> {
        self.class_info(class_name).map(SimObject::new)
    }

    /// Registers the object and runs its `onAdd` callback. A name that is
    /// already in use is dropped with a warning; the object is registered
    /// either way.
    pub fn register_object(&mut self, object: SimObject, name: Option<&str>) -> Result<SimObjectId, EvalError> {
        let name = name.filter(|name| !name.is_empty()).map(|name| self.pool.intern(name));
        let (id, accepted) = self.objects.register(object, name.clone());
        if !accepted {
            if let Some(name) = &name {
                self.warn(format_args!("object name '{}' is already in use, object {} stays unnamed", name, id));
            }
        }

        self.link_object_namespaces(id);
        self.invoke_callback(id, "onAdd")?;
        Ok(id)
    }

    /// Links `name -> class -> superClass -> native class`. Links that are
    /// refused are skipped with a warning.
    fn link_object_namespaces(&mut self, id: SimObjectId) {
        let (class, name, class_field, super_class_field) = match self.objects.get(id) {
            Some(object) => (
                object.class.clone(),
                object.name.clone(),
                object.get_field("class", None).into_string(),
                object.get_field("superClass", None).into_string(),
            ),
            None => return,
        };

        let mut chain = Vec::new();
        if class.honors_class_fields {
            for field in [super_class_field, class_field].iter() {
                if !field.is_empty() {
                    chain.push(self.pool.intern(field));
                }
            }
        }
        if let Some(name) = name {
            chain.push(name);
        }

        let mut parent = class.namespace;
        let mut linked = Vec::new();
        for name in chain {
            let namespace = self.namespaces.find_or_create(Some(name.clone()), None);
            match self.namespaces.link(namespace, parent) {
                Ok(()) => {
                    linked.push(namespace);
                    parent = namespace;
                },
                Err(error) => {
                    self.warn(format_args!("cannot link namespace '{}' for object {}: {}", &name, id, error));
                },
            }
        }

        if let Some(object) = self.objects.get_mut(id) {
            object.namespace = parent;
            object.linked = linked;
        }
    }

    /// Calls `name(%this)` on the object if its namespace chain defines it.
    pub(crate) fn invoke_callback(&mut self, id: SimObjectId, name: &str) -> Result<Option<Value>, EvalError> {
        let namespace = match self.objects.get(id) {
            Some(object) => object.namespace,
            None => return Ok(None),
        };
        let name = match self.pool.lookup(name) {
            Some(name) => name,
            None => return Ok(None),
        };
        match self.namespaces.resolve(namespace, &name, false) {
            Some(entry) => self.call_entry(&entry, vec![Value::from(id)]).map(Some),
            None => Ok(None),
        }
    }

    /// Deletes the object. `onRemove` runs first, then children are deleted
    /// (groups) or let go (sets). The object leaves the registry before its
    /// container hears about it. Returns false for an unknown id.
    pub fn delete_object(&mut self, id: SimObjectId) -> Result<bool, EvalError> {
        if !self.objects.contains(id) {
            return Ok(false);
        }
        self.invoke_callback(id, "onRemove")?;

        let (children, deletes_children) = match self.objects.get(id) {
            Some(object) => (object.children.clone(), object.class.deletes_children),
            // The callback deleted it
            None => return Ok(true),
        };
        for child in children {
            if deletes_children {
                self.delete_object(child)?;
            } else {
                self.objects.detach(child);
            }
        }

        let object = match self.objects.deregister(id) {
            Some(object) => object,
            None => return Ok(true),
        };
        if let Some(group) = object.group {
            if let Some(container) = self.objects.get_mut(group) {
                container.children.retain(|child| *child != id);
            }
        }
        for namespace in object.linked {
            self.namespaces.unlink(namespace);
        }
        Ok(true)
    }

    pub fn object(&self, id: SimObjectId) -> Option<&SimObject> {
        self.objects.get(id)
    }

    /// Looks an object up by id, by name, or by a `/`-separated path of
    /// names and ids rooted at a named object (`Group/child`).
    pub fn find_object(&self, text: &str) -> Option<SimObjectId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut segments = text.split('/').filter(|segment| !segment.is_empty());
        let mut current = self.find_single_object(segments.next()?)?;
        for segment in segments {
            let container = self.objects.get(current)?;
            current = container.children.iter().copied().find(|child| {
                match self.objects.get(*child) {
                    Some(object) => object.name().map(|name| name.eq_ignore_ascii_case(segment)).unwrap_or(false)
                        || child.to_string() == segment,
                    None => false,
                }
            })?;
        }
        Some(current)
    }

    fn find_single_object(&self, text: &str) -> Option<SimObjectId> {
        if let Ok(id) = text.parse::<SimObjectId>() {
            return if self.objects.contains(id) { Some(id) } else { None };
        }

        let name = self.pool.lookup(text)?;
        self.objects.find_by_name(&name)
    }

    /// Object referenced by a script value: a number is an id, text is
    /// resolved like `find_object`.
    pub fn find_object_by_value(&self, value: &Value) -> Option<SimObjectId> {
        match value {
            Value::Empty => None,
            Value::Int(v) => SimObjectId::try_from(*v).ok()
                .filter(|id| *id > 0 && self.objects.contains(*id)),
            Value::Float(v) => self.find_object_by_value(&Value::Int(*v as i64)),
            other => self.find_object(&other.to_text()),
        }
    }

    /// `None` if the object does not exist, `Empty` if the field does not.
    pub fn get_field(&self, id: SimObjectId, field: &str, index: Option<&str>) -> Option<Value> {
        self.objects.get(id).map(|object| object.get_field(field, index))
    }

    pub fn set_field(&mut self, id: SimObjectId, field: &str, index: Option<&str>, value: Value) -> Result<(), SetFieldError> {
        match self.objects.get_mut(id) {
            Some(object) => object.set_field(field, index, value),
            None => Err(SetFieldError::UnknownObject),
        }
    }

    /// Renames an object, `None` or an empty name clears it. Fails if the
    /// name belongs to another object.
    pub fn rename_object(&mut self, id: SimObjectId, name: Option<&str>) -> bool {
        let name = name.filter(|name| !name.is_empty()).map(|name| self.pool.intern(name));
        self.objects.rename(id, name)
    }

    pub fn add_to_container(&mut self, container: SimObjectId, child: SimObjectId) -> Result<(), ContainerError> {
        self.objects.add_child(container, child)
    }

    /// Returns false if the child was not in this container.
    pub fn remove_from_container(&mut self, container: SimObjectId, child: SimObjectId) -> bool {
        match self.objects.get(child) {
            Some(object) if object.group == Some(container) => {
                self.objects.detach(child);
                true
            },
            _ => false,
        }
    }

    /// Whether the object's namespace chain (global functions excluded)
    /// defines `name`.
    pub fn object_responds_to(&self, id: SimObjectId, name: &str) -> bool {
        let (object, name) = match (self.objects.get(id), self.pool.lookup(name)) {
            (Some(object), Some(name)) => (object, name),
            _ => return false,
        };
        self.namespaces.resolve(object.namespace, &name, false).is_some()
    }
}
