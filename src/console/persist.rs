/// persist
///
/// Flat snapshots of object trees. A snapshot only carries what scripts can
/// observe: the class, the name, every field as text and the children, so
/// restoring it into another console produces an equivalent tree with new
/// ids.

use serde::{Deserialize, Serialize};

use crate::console::eval::{EvalError, Value};
use crate::console::sim::SimObjectId;
use crate::console::Console;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub name: String,
    /// Element of an array field
    pub index: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub class_name: String,
    pub name: Option<String>,
    /// Persistent fields first, then dynamic fields
    pub fields: Vec<FieldSnapshot>,
    pub children: Vec<ObjectSnapshot>,
}

#[derive(Debug, derive_more::From, derive_more::Display)]
pub enum PersistError {
    #[display(fmt = "malformed snapshot: {}", _0)]
    Encoding(bincode::Error),
    #[display(fmt = "{}", _0)]
    Eval(EvalError),
    #[from(ignore)]
    #[display(fmt = "unknown class '{}'", _0)]
    UnknownClass(String),
}

impl std::error::Error for PersistError {}

impl ObjectSnapshot {
    /// Text of a field, ignoring case like field access does.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter()
            .find(|field| field.index.is_none() && field.name.eq_ignore_ascii_case(name))
            .map(|field| field.value.as_str())
    }
}

/// Captures the object and, recursively, its children. `None` for an
/// unknown id.
pub fn snapshot(console: &Console, id: SimObjectId) -> Option<ObjectSnapshot> {
    let object = console.object(id)?;

    let mut fields = Vec::new();
    for (name, index, value) in object.persistent_fields() {
        fields.push(FieldSnapshot {
            name,
            index: index.map(|index| index.to_string()),
            value: value.into_string(),
        });
    }
    for (name, value) in object.dynamic_fields() {
        fields.push(FieldSnapshot { name, index: None, value: value.into_string() });
    }

    let children = object.children().iter()
        .filter_map(|child| snapshot(console, *child))
        .collect();

    Some(ObjectSnapshot {
        class_name: object.class_name().to_string(),
        name: object.name().map(String::from),
        fields,
        children,
    })
}

pub fn to_bytes(snapshot: &ObjectSnapshot) -> Result<Vec<u8>, PersistError> {
    Ok(bincode::serialize(snapshot)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<ObjectSnapshot, PersistError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Re-creates the tree and returns the id of its root. Fields that are
/// rejected on the way in are skipped with a warning, like they are when a
/// script declares the object. A name that is taken leaves the restored
/// object unnamed.
pub fn restore(console: &mut Console, snapshot: &ObjectSnapshot) -> Result<SimObjectId, PersistError> {
    let mut object = match console.new_object(&snapshot.class_name) {
        Some(object) => object,
        None => return Err(PersistError::UnknownClass(snapshot.class_name.clone())),
    };

    for field in &snapshot.fields {
        let value = Value::from(field.value.as_str());
        if let Err(error) = object.set_field(&field.name, field.index.as_deref(), value) {
            console.warn(format_args!("restore: cannot set field '{}' of '{}': {}", &field.name, &snapshot.class_name, error));
        }
    }

    let id = console.register_object(object, snapshot.name.as_deref())?;
    for child in &snapshot.children {
        let child_id = restore(console, child)?;
        if let Err(error) = console.add_to_container(id, child_id) {
            console.warn(format_args!("restore: cannot add object {} to {}: {}", child_id, id, error));
        }
    }
    Ok(id)
}
