use crate::console::eval::{EvalError, Value};
use crate::console::namespace::NativeCall;
use crate::console::sim::{ClassRep, FieldType, PersistentField, RegisterClassError, SetterOutcome, SimObject, SimObjectId};
use crate::console::tags;
use crate::console::Console;

type NativeResult = Result<Value, EvalError>;

const ANY: usize = usize::max_value();
const WORD_SEPARATORS: &[char] = &[' ', '\t', '\n'];

/// Registers the native classes and the functions every console starts
/// with.
pub(crate) fn register_builtins(console: &mut Console) -> Result<(), RegisterClassError> {
    register_classes(console)?;
    register_functions(console);
    register_object_methods(console);
    register_set_methods(console);
    Ok(())
}

/// `class` and `superClass` only take effect when the object is registered,
/// so they are frozen afterwards.
fn class_link_field(name: &str) -> PersistentField {
    PersistentField::new(name, FieldType::String).with_setter(|object, value| {
        if object.is_registered() {
            SetterOutcome::Reject
        } else {
            SetterOutcome::Accept(value.clone())
        }
    })
}

fn register_classes(console: &mut Console) -> Result<(), RegisterClassError> {
    console.register_class(ClassRep::new("SimObject")
        .with_field(PersistentField::new("internalName", FieldType::String))
        .with_field(PersistentField::new("canSave", FieldType::Bool).with_default(Value::Int(1)))
    )?;
    console.register_class(ClassRep::new("ScriptObject")
        .with_parent("SimObject")
        .with_field(class_link_field("class"))
        .with_field(class_link_field("superClass"))
        .script_class()
    )?;
    console.register_class(ClassRep::new("SimSet").with_parent("SimObject").container(false))?;
    console.register_class(ClassRep::new("SimGroup").with_parent("SimSet").container(true))?;
    console.register_class(ClassRep::new("ScriptGroup")
        .with_parent("SimGroup")
        .with_field(class_link_field("class"))
        .with_field(class_link_field("superClass"))
        .script_class()
    )?;
    console.register_class(ClassRep::new("SimDataBlock").with_parent("SimObject").datablock())?;
    Ok(())
}

fn joined_arguments(call: &NativeCall) -> String {
    let mut text = String::new();
    for arg in call.args {
        text.push_str(&arg.to_text());
    }
    text
}

fn object_id(console: &Console, value: &Value) -> Value {
    match console.find_object_by_value(value) {
        Some(id) => Value::from(id),
        None => Value::Int(-1),
    }
}

// -----------------------------------------------------------------------------
// Global functions
// -----------------------------------------------------------------------------

fn register_functions(console: &mut Console) {
    console.register_function(None, "echo", 0, ANY, |console, call| -> NativeResult {
        let text = joined_arguments(call);
        console.echo(text);
        Ok(Value::Empty)
    });
    console.register_function(None, "warn", 0, ANY, |console, call| -> NativeResult {
        let text = joined_arguments(call);
        console.echo(format_args!("Warning: {}", text));
        Ok(Value::Empty)
    });
    console.register_function(None, "error", 0, ANY, |console, call| -> NativeResult {
        let text = joined_arguments(call);
        console.echo(format_args!("Error: {}", text));
        Ok(Value::Empty)
    });

    // Objects and namespaces
    console.register_function(None, "isObject", 1, 1, |console, call| -> NativeResult {
        Ok(Value::from(console.find_object_by_value(call.arg(0)).is_some()))
    });
    console.register_function(None, "nameToID", 1, 1, |console, call| -> NativeResult {
        Ok(object_id(console, call.arg(0)))
    });
    console.register_function(None, "isFunction", 1, 1, |console, call| -> NativeResult {
        let name = call.arg(0).to_text();
        let found = console.pool.lookup(&name)
            .and_then(|name| console.namespaces.resolve(console.namespaces.global(), &name, true))
            .is_some();
        Ok(Value::from(found))
    });
    console.register_function(None, "isMethod", 2, 2, |console, call| -> NativeResult {
        let namespace = call.arg(0).to_text();
        let name = call.arg(1).to_text();
        let found = match (console.pool.lookup(&namespace), console.pool.lookup(&name)) {
            (Some(namespace), Some(name)) => console.namespaces.find(Some(&namespace), None)
                .and_then(|base| console.namespaces.resolve(base, &name, false))
                .is_some(),
            _ => false,
        };
        Ok(Value::from(found))
    });
    console.register_function(None, "linkNamespaces", 2, 2, |console, call| -> NativeResult {
        let child = call.arg(0).to_text().into_owned();
        let parent = call.arg(1).to_text().into_owned();
        match console.link_namespaces(&child, &parent) {
            Ok(()) => Ok(Value::from(true)),
            Err(error) => {
                console.warn(format_args!("linkNamespaces: cannot link '{}' to '{}': {}", child, parent, error));
                Ok(Value::from(false))
            },
        }
    });

    // Packages
    console.register_function(None, "isPackage", 1, 1, |console, call| -> NativeResult {
        let name = call.arg(0).to_text();
        let found = console.pool.lookup(&name).map_or(false, |name| console.namespaces.is_package(&name));
        Ok(Value::from(found))
    });
    console.register_function(None, "activatePackage", 1, 1, |console, call| -> NativeResult {
        let name = console.pool.intern(&call.arg(0).to_text());
        if !console.namespaces.activate_package(name.clone()) {
            console.warn(format_args!("activatePackage: unknown package '{}'", name));
        }
        Ok(Value::Empty)
    });
    console.register_function(None, "deactivatePackage", 1, 1, |console, call| -> NativeResult {
        let name = console.pool.intern(&call.arg(0).to_text());
        if !console.namespaces.deactivate_package(&name) {
            console.warn(format_args!("deactivatePackage: package '{}' is not active", name));
        }
        Ok(Value::Empty)
    });

    // Tagged strings
    console.register_function(None, "addTaggedString", 1, 1, |console, call| -> NativeResult {
        let id = console.tags.tag(&call.arg(0).to_text());
        Ok(Value::String(tags::encode(id)))
    });
    console.register_function(None, "removeTaggedString", 1, 1, |console, call| -> NativeResult {
        let released = tags::parse_tag(&call.arg(0).to_text())
            .map_or(false, |id| console.tags.release(id));
        if !released {
            console.warn(format_args!("removeTaggedString: '{}' is not a tagged string", call.arg(0)));
        }
        Ok(Value::Empty)
    });
    console.register_function(None, "getTaggedString", 1, 1, |console, call| -> NativeResult {
        let text = tags::parse_tag(&call.arg(0).to_text())
            .and_then(|id| console.tags.detag(id))
            .unwrap_or("")
            .to_string();
        Ok(Value::from(text))
    });

    // Strings
    console.register_function(None, "strlen", 1, 1, |_, call| -> NativeResult {
        Ok(Value::from(call.arg(0).to_text().chars().count()))
    });
    console.register_function(None, "strupr", 1, 1, |_, call| -> NativeResult {
        Ok(Value::from(call.arg(0).to_text().to_uppercase()))
    });
    console.register_function(None, "strlwr", 1, 1, |_, call| -> NativeResult {
        Ok(Value::from(call.arg(0).to_text().to_lowercase()))
    });
    console.register_function(None, "getWordCount", 1, 1, |_, call| -> NativeResult {
        let text = call.arg(0).to_text();
        let count = if text.is_empty() { 0 } else { text.split(WORD_SEPARATORS).count() };
        Ok(Value::from(count))
    });
    console.register_function(None, "getWord", 2, 2, |_, call| -> NativeResult {
        let text = call.arg(0).to_text();
        let index = call.arg(1).to_int();
        if index < 0 {
            return Ok(Value::from(""));
        }
        let word = text.split(WORD_SEPARATORS).nth(index as usize).unwrap_or("");
        Ok(Value::from(word))
    });
    console.register_function(None, "getSubStr", 2, 3, |_, call| -> NativeResult {
        let text = call.arg(0).to_text();
        let start = call.arg(1).to_int().max(0) as usize;
        let chars = text.chars().skip(start);
        // A missing or negative length takes the rest
        let sub: String = match call.args.get(2).map(|len| len.to_int()) {
            Some(len) if len >= 0 => chars.take(len as usize).collect(),
            _ => chars.collect(),
        };
        Ok(Value::from(sub))
    });

    // Math
    console.register_function(None, "mFloor", 1, 1, |_, call| -> NativeResult {
        Ok(Value::Int(call.arg(0).to_number().floor() as i64))
    });
    console.register_function(None, "mAbs", 1, 1, |_, call| -> NativeResult {
        Ok(Value::Float(call.arg(0).to_number().abs()))
    });

    console.register_function(None, "eval", 1, 1, |console, call| -> NativeResult {
        let source = call.arg(0).to_text().into_owned();
        match console.compile("<eval>", &source) {
            Ok(code) => console.execute(&code),
            Err(error) => {
                console.warn(format_args!("eval: {}", error.message()));
                Ok(Value::Empty)
            },
        }
    });
}

// -----------------------------------------------------------------------------
// SimObject methods
// -----------------------------------------------------------------------------

fn register_object_methods(console: &mut Console) {
    console.register_method("SimObject", "getId", 0, 0, |_, call| -> NativeResult {
        Ok(Value::from(this(call)))
    });
    console.register_method("SimObject", "getName", 0, 0, |console, call| -> NativeResult {
        let name = console.object(this(call)).and_then(|object| object.name()).unwrap_or("").to_string();
        Ok(Value::from(name))
    });
    console.register_method("SimObject", "setName", 1, 1, |console, call| -> NativeResult {
        let name = call.arg(0).to_text().into_owned();
        if !console.rename_object(this(call), Some(&name)) {
            console.warn(format_args!("setName: name '{}' is already in use", name));
        }
        Ok(Value::Empty)
    });
    console.register_method("SimObject", "getClassName", 0, 0, |console, call| -> NativeResult {
        let name = console.object(this(call)).map(|object| object.class_name()).unwrap_or("").to_string();
        Ok(Value::from(name))
    });
    console.register_method("SimObject", "delete", 0, 0, |console, call| -> NativeResult {
        console.delete_object(this(call))?;
        Ok(Value::Empty)
    });
    console.register_method("SimObject", "getGroup", 0, 0, |console, call| -> NativeResult {
        let group = console.object(this(call)).and_then(|object| object.group());
        Ok(group.map_or(Value::Int(-1), Value::from))
    });
    console.register_method("SimObject", "getFieldValue", 1, 1, |console, call| -> NativeResult {
        let field = call.arg(0).to_text();
        Ok(console.get_field(this(call), &field, None).unwrap_or(Value::Empty))
    });
    console.register_method("SimObject", "setFieldValue", 2, 2, |console, call| -> NativeResult {
        let field = call.arg(0).to_text().into_owned();
        match console.set_field(this(call), &field, None, call.arg(1).clone()) {
            Ok(()) => Ok(Value::from(true)),
            Err(error) => {
                console.warn(format_args!("setFieldValue: cannot set '{}': {}", field, error));
                Ok(Value::from(false))
            },
        }
    });
    console.register_method("SimObject", "getDynamicFieldCount", 0, 0, |console, call| -> NativeResult {
        let count = console.object(this(call)).map_or(0, |object| object.dynamic_field_count());
        Ok(Value::from(count))
    });
    console.register_method("SimObject", "isMemberOfClass", 1, 1, |console, call| -> NativeResult {
        let class_name = call.arg(0).to_text();
        let is_member = console.object(this(call)).map_or(false, |object| object.class().is_subclass_of(&class_name));
        Ok(Value::from(is_member))
    });
    console.register_method("SimObject", "dump", 0, 0, |console, call| -> NativeResult {
        let lines = match console.object(this(call)) {
            Some(object) => dump_lines(object),
            None => return Ok(Value::Empty),
        };
        for line in lines {
            console.echo(line);
        }
        Ok(Value::Empty)
    });
}

fn this(call: &NativeCall) -> SimObjectId {
    call.object.unwrap_or(0)
}

fn dump_lines(object: &SimObject) -> Vec<String> {
    let mut lines = Vec::new();
    match object.name() {
        Some(name) => lines.push(format!("{} {} ({})", object.class_name(), object.id(), name)),
        None => lines.push(format!("{} {}", object.class_name(), object.id())),
    }

    lines.push(String::from("  Static fields:"));
    for (name, index, value) in object.persistent_fields() {
        match index {
            Some(index) => lines.push(format!("    {}[{}] = \"{}\"", name, index, value)),
            None => lines.push(format!("    {} = \"{}\"", name, value)),
        }
    }
    lines.push(String::from("  Dynamic fields:"));
    for (name, value) in object.dynamic_fields() {
        lines.push(format!("    {} = \"{}\"", name, value));
    }
    lines
}

// -----------------------------------------------------------------------------
// SimSet methods
// -----------------------------------------------------------------------------

fn register_set_methods(console: &mut Console) {
    console.register_method("SimSet", "add", 1, ANY, |console, call| -> NativeResult {
        for arg in call.args {
            match console.find_object_by_value(arg) {
                Some(child) => {
                    if let Err(error) = console.add_to_container(this(call), child) {
                        console.warn(format_args!("SimSet::add: cannot add object {}: {}", child, error));
                    }
                },
                None => console.warn(format_args!("SimSet::add: unable to find object '{}'", arg)),
            }
        }
        Ok(Value::Empty)
    });
    console.register_method("SimSet", "remove", 1, ANY, |console, call| -> NativeResult {
        for arg in call.args {
            let removed = console.find_object_by_value(arg)
                .map_or(false, |child| console.remove_from_container(this(call), child));
            if !removed {
                console.warn(format_args!("SimSet::remove: '{}' is not a member", arg));
            }
        }
        Ok(Value::Empty)
    });
    console.register_method("SimSet", "getCount", 0, 0, |console, call| -> NativeResult {
        let count = console.object(this(call)).map_or(0, |object| object.children().len());
        Ok(Value::from(count))
    });
    console.register_method("SimSet", "getObject", 1, 1, |console, call| -> NativeResult {
        let index = call.arg(0).to_int();
        let child = console.object(this(call))
            .filter(|_| index >= 0)
            .and_then(|object| object.children().get(index as usize).copied());
        Ok(child.map_or(Value::Int(-1), Value::from))
    });
    console.register_method("SimSet", "isMember", 1, 1, |console, call| -> NativeResult {
        let is_member = console.find_object_by_value(call.arg(0))
            .and_then(|child| console.object(child))
            .map_or(false, |child| child.group() == Some(this(call)));
        Ok(Value::from(is_member))
    });
    console.register_method("SimSet", "clear", 0, 0, |console, call| -> NativeResult {
        let (children, deletes_children) = match console.object(this(call)) {
            Some(object) => (object.children().to_vec(), object.class().deletes_children),
            None => return Ok(Value::Empty),
        };
        for child in children {
            if deletes_children {
                console.delete_object(child)?;
            } else {
                console.remove_from_container(this(call), child);
            }
        }
        Ok(Value::Empty)
    });
}
