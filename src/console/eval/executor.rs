use super::error::{EvalError, EvalErrorKind};
use super::store::ActiveFunction;
use super::value::{apply_binary_operator, apply_unary_operator, Value};
use crate::collections::StringRef;
use crate::console::ast::*;
use crate::console::namespace::{Entry, EntryKind, NativeCall};
use crate::console::sim::{SimObject, SimObjectId};
use crate::console::tags;
use crate::console::Console;

// Remaining host stack below which evaluation continues on a new segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Result of executing a statement. Anything but `Stepping` skips the
/// remaining statements of the enclosing block.
#[derive(Debug, Clone)]
pub(crate) enum EvalContinuation {
    Stepping,
    Break,
    Continue,
    Return(Value),
}

/// Storage location written by assignments and `++`/`--`
#[derive(Debug)]
enum Place {
    Local(StringRef),
    Global(StringRef),
    Field {
        object: Value,
        field: StringRef,
        index: Option<String>,
    },
}

impl Console {
    /// Runs the top-level statements of a compiled unit in a fresh frame.
    /// A top-level `return` produces the result. Only stack exhaustion and
    /// internal errors end up in the `Err` case, everything else a script
    /// does wrong is logged and execution continues.
    pub fn execute(&mut self, code: &CodeBlock) -> Result<Value, EvalError> {
        self.enter_frame(None, code.clone())?;
        let result = self.eval_statements(code, code.root());
        self.store.pop_frame();

        match result? {
            EvalContinuation::Return(value) => Ok(value),
            EvalContinuation::Stepping => Ok(Value::Empty),
            EvalContinuation::Break | EvalContinuation::Continue => {
                self.warn(format_args!("{}: break or continue outside of a loop", code.filename()));
                Ok(Value::Empty)
            },
        }
    }

    fn enter_frame(&mut self, function: Option<ActiveFunction>, code: CodeBlock) -> Result<(), EvalError> {
        if self.store.depth() >= self.config.max_call_depth {
            return Err(EvalError::new(
                EvalErrorKind::StackExhaustion,
                format!("stack exhausted, call depth exceeds {}", self.config.max_call_depth),
                &self.store
            ));
        }

        self.store.push_frame(function, code);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn eval_statements(&mut self, code: &CodeBlock, statements: &[StatementId]) -> Result<EvalContinuation, EvalError> {
        for statement in statements {
            let continuation = self.eval_statement(code, *statement)?;
            if !matches!(continuation, EvalContinuation::Stepping) {
                return Ok(continuation);
            }
        }

        Ok(EvalContinuation::Stepping)
    }

    fn eval_statement(&mut self, code: &CodeBlock, id: StatementId) -> Result<EvalContinuation, EvalError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_statement_inner(code, id))
    }

    fn eval_statement_inner(&mut self, code: &CodeBlock, id: StatementId) -> Result<EvalContinuation, EvalError> {
        let heap = code.heap();
        let statement = &heap[id];
        self.store.set_line(statement.span().begin.line);

        match statement {
            Statement::Block(stmt) => self.eval_statements(code, &stmt.statements),
            Statement::Expression(stmt) => {
                self.eval_expression(code, stmt.expression)?;
                Ok(EvalContinuation::Stepping)
            },
            Statement::If(stmt) => {
                if self.eval_expression(code, stmt.test)?.to_bool() {
                    self.eval_statement(code, stmt.true_body)
                } else if let Some(false_body) = stmt.false_body {
                    self.eval_statement(code, false_body)
                } else {
                    Ok(EvalContinuation::Stepping)
                }
            },
            Statement::While(stmt) => {
                let mut skip_test = stmt.is_do_while;
                loop {
                    if !skip_test && !self.eval_expression(code, stmt.test)?.to_bool() {
                        break;
                    }
                    skip_test = false;

                    match self.eval_statement(code, stmt.body)? {
                        EvalContinuation::Break => break,
                        EvalContinuation::Return(value) => return Ok(EvalContinuation::Return(value)),
                        EvalContinuation::Stepping | EvalContinuation::Continue => {},
                    }
                }
                Ok(EvalContinuation::Stepping)
            },
            Statement::For(stmt) => {
                if let Some(initial) = stmt.initial {
                    self.eval_expression(code, initial)?;
                }
                loop {
                    // A missing test is always true
                    if let Some(test) = stmt.test {
                        if !self.eval_expression(code, test)?.to_bool() {
                            break;
                        }
                    }

                    match self.eval_statement(code, stmt.body)? {
                        EvalContinuation::Break => break,
                        EvalContinuation::Return(value) => return Ok(EvalContinuation::Return(value)),
                        EvalContinuation::Stepping | EvalContinuation::Continue => {},
                    }

                    if let Some(step) = stmt.step {
                        self.eval_expression(code, step)?;
                    }
                }
                Ok(EvalContinuation::Stepping)
            },
            Statement::Break(_) => Ok(EvalContinuation::Break),
            Statement::Continue(_) => Ok(EvalContinuation::Continue),
            Statement::Return(stmt) => {
                let value = match stmt.expression {
                    Some(expression) => self.eval_expression(code, expression)?,
                    None => Value::Empty,
                };
                Ok(EvalContinuation::Return(value))
            },
            Statement::Switch(stmt) => self.eval_switch(code, stmt),
            Statement::Function(stmt) => {
                self.define_function(code, stmt.definition, None);
                Ok(EvalContinuation::Stepping)
            },
            Statement::Package(stmt) => {
                for definition in &stmt.functions {
                    self.define_function(code, *definition, Some(stmt.identifier.clone()));
                }
                Ok(EvalContinuation::Stepping)
            },
        }
    }

    /// Cases are tried in order, the first matching value runs its body.
    /// There is no fall-through.
    fn eval_switch(&mut self, code: &CodeBlock, stmt: &SwitchStatement) -> Result<EvalContinuation, EvalError> {
        let subject = self.eval_expression(code, stmt.subject)?;
        for case in &stmt.cases {
            for value in &case.values {
                let candidate = self.eval_expression(code, *value)?;
                let matched = if stmt.compare_strings {
                    subject.to_text().eq_ignore_ascii_case(&candidate.to_text())
                } else {
                    subject.to_number() == candidate.to_number()
                };
                if matched {
                    return self.eval_statements(code, &case.body);
                }
            }
        }

        match &stmt.default_case {
            Some(body) => self.eval_statements(code, body),
            None => Ok(EvalContinuation::Stepping),
        }
    }

    /// Functions are registered when their declaration executes. Declaring
    /// a function again replaces it.
    fn define_function(&mut self, code: &CodeBlock, id: FunctionDefinitionId, package: Option<StringRef>) {
        let definition = &code.heap()[id];
        let namespace = self.namespaces.find_or_create(definition.namespace.clone(), package);
        self.namespaces.add_entry(
            namespace, definition.identifier.clone(),
            EntryKind::Script { code: code.clone(), definition: id }
        );
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    pub(crate) fn eval_expression(&mut self, code: &CodeBlock, id: ExpressionId) -> Result<Value, EvalError> {
        if self.store.nesting >= self.config.max_expression_depth {
            return Err(EvalError::new(
                EvalErrorKind::StackExhaustion,
                format!("stack exhausted, expressions nested deeper than {}", self.config.max_expression_depth),
                &self.store
            ));
        }

        self.store.nesting += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_expression_inner(code, id));
        self.store.nesting -= 1;
        result
    }

    fn eval_expression_inner(&mut self, code: &CodeBlock, id: ExpressionId) -> Result<Value, EvalError> {
        let heap = code.heap();
        match &heap[id] {
            Expression::Assignment(expr) => {
                let place = self.eval_place(code, expr.left)?;
                let value = match expr.operation.as_binary_operator() {
                    None => self.eval_expression(code, expr.right)?,
                    Some(operation) => {
                        let current = self.read_place(&place);
                        let rhs = self.eval_expression(code, expr.right)?;
                        apply_binary_operator(&current, operation, &rhs)
                    },
                };
                self.write_place(&place, value.clone());
                Ok(value)
            },
            Expression::Conditional(expr) => {
                if self.eval_expression(code, expr.test)?.to_bool() {
                    self.eval_expression(code, expr.true_expression)
                } else {
                    self.eval_expression(code, expr.false_expression)
                }
            },
            Expression::Binary(expr) => match expr.operation {
                BinaryOperator::LogicalAnd => {
                    if !self.eval_expression(code, expr.left)?.to_bool() {
                        return Ok(Value::from(false));
                    }
                    Ok(Value::from(self.eval_expression(code, expr.right)?.to_bool()))
                },
                BinaryOperator::LogicalOr => {
                    if self.eval_expression(code, expr.left)?.to_bool() {
                        return Ok(Value::from(true));
                    }
                    Ok(Value::from(self.eval_expression(code, expr.right)?.to_bool()))
                },
                operation => {
                    let lhs = self.eval_expression(code, expr.left)?;
                    let rhs = self.eval_expression(code, expr.right)?;
                    Ok(apply_binary_operator(&lhs, operation, &rhs))
                },
            },
            Expression::Unary(expr) => {
                if !expr.operation.writes_operand() {
                    let value = self.eval_expression(code, expr.expression)?;
                    return Ok(apply_unary_operator(expr.operation, &value));
                }

                let place = self.eval_place(code, expr.expression)?;
                let old = match self.read_place(&place) {
                    value @ Value::Int(_) | value @ Value::Float(_) => value,
                    other => Value::Float(other.to_number()),
                };
                let new = apply_unary_operator(expr.operation, &old);
                self.write_place(&place, new.clone());
                match expr.operation {
                    UnaryOperator::PostIncrement | UnaryOperator::PostDecrement => Ok(old),
                    _ => Ok(new),
                }
            },
            Expression::Literal(expr) => Ok(match &expr.value {
                Literal::Integer(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::String(v) => Value::Interned(v.clone()),
                Literal::Tagged(text) => {
                    // Tagged when the unit was compiled, unless released since
                    let id = match self.tags.lookup(text) {
                        Some(id) => id,
                        None => self.tags.tag(text),
                    };
                    Value::String(tags::encode(id))
                },
            }),
            Expression::Variable(_) | Expression::Slot(_) => {
                let place = self.eval_place(code, id)?;
                Ok(self.read_place(&place))
            },
            Expression::Call(expr) => self.eval_call(code, expr),
            Expression::Object(expr) => {
                let id = self.eval_object(code, expr.this)?;
                Ok(Value::from(id.unwrap_or(0)))
            },
            Expression::TagDeref(expr) => {
                let value = self.eval_expression(code, expr.expression)?;
                let detagged = tags::decode(&value.to_text())
                    .and_then(|tag| self.tags.detag(tag))
                    .map(Value::from);
                Ok(detagged.unwrap_or(value))
            },
        }
    }

    /// Index text of `a[i, j]`: the values joined with `_`.
    fn eval_indices(&mut self, code: &CodeBlock, indices: &[ExpressionId]) -> Result<String, EvalError> {
        let mut key = String::new();
        for (idx, index) in indices.iter().enumerate() {
            if idx != 0 {
                key.push('_');
            }
            let value = self.eval_expression(code, *index)?;
            key.push_str(&value.to_text());
        }
        Ok(key)
    }

    fn eval_place(&mut self, code: &CodeBlock, id: ExpressionId) -> Result<Place, EvalError> {
        let heap = code.heap();
        match &heap[id] {
            Expression::Variable(expr) => {
                let name = if expr.indices.is_empty() {
                    expr.identifier.clone()
                } else {
                    let index = self.eval_indices(code, &expr.indices)?;
                    self.pool.intern(&format!("{}{}", &expr.identifier, index))
                };
                Ok(if expr.is_global { Place::Global(name) } else { Place::Local(name) })
            },
            Expression::Slot(expr) => {
                let object = self.eval_expression(code, expr.object)?;
                let index = if expr.indices.is_empty() {
                    None
                } else {
                    Some(self.eval_indices(code, &expr.indices)?)
                };
                Ok(Place::Field { object, field: expr.field.clone(), index })
            },
            _ => Err(EvalError::new(
                EvalErrorKind::Internal, String::from("expression is not assignable"), &self.store
            )),
        }
    }

    fn read_place(&mut self, place: &Place) -> Value {
        match place {
            Place::Local(name) => self.store.read_local(name),
            Place::Global(name) => self.store.read_global(name),
            Place::Field { object, field, index } => match self.find_object_by_value(object) {
                Some(id) => self.get_field(id, field, index.as_deref()).unwrap_or(Value::Empty),
                None => {
                    self.warn(format_args!("unable to find object '{}' attempting to read field '{}'", object, field));
                    Value::Empty
                },
            },
        }
    }

    fn write_place(&mut self, place: &Place, value: Value) {
        match place {
            Place::Local(name) => self.store.write_local(name.clone(), value),
            Place::Global(name) => self.store.write_global(name.clone(), value),
            Place::Field { object, field, index } => match self.find_object_by_value(object) {
                Some(id) => {
                    if let Err(error) = self.set_field(id, field, index.as_deref(), value) {
                        self.warn(format_args!("cannot set field '{}' of object {}: {}", field, id, error));
                    }
                },
                None => {
                    self.warn(format_args!("unable to find object '{}' attempting to set field '{}'", object, field));
                },
            },
        }
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    fn eval_arguments(&mut self, code: &CodeBlock, arguments: &[ExpressionId], capacity: usize) -> Result<Vec<Value>, EvalError> {
        let mut values = Vec::with_capacity(arguments.len() + capacity);
        for argument in arguments {
            values.push(self.eval_expression(code, *argument)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, code: &CodeBlock, call: &CallExpression) -> Result<Value, EvalError> {
        match &call.target {
            CallTarget::Function { identifier } => {
                let args = self.eval_arguments(code, &call.arguments, 0)?;
                let global = self.namespaces.global();
                match self.namespaces.resolve(global, identifier, true) {
                    Some(entry) => self.call_entry(&entry, args),
                    None => {
                        self.warn(format_args!("unable to find function '{}'", identifier));
                        Ok(Value::Empty)
                    },
                }
            },
            CallTarget::Qualified { namespace, identifier } => {
                let args = self.eval_arguments(code, &call.arguments, 0)?;
                let entry = self.namespaces.find(Some(namespace), None)
                    .and_then(|base| self.namespaces.resolve(base, identifier, true));
                match entry {
                    Some(entry) => self.call_entry(&entry, args),
                    None => {
                        self.warn(format_args!("unable to find function '{}::{}'", namespace, identifier));
                        Ok(Value::Empty)
                    },
                }
            },
            CallTarget::Parent { identifier } => {
                let args = self.eval_arguments(code, &call.arguments, 0)?;
                let entry = self.store.current_function()
                    .and_then(|function| self.namespaces.resolve_parent(function.layer, identifier));
                match entry {
                    Some(entry) => self.call_entry(&entry, args),
                    None => {
                        self.warn(format_args!("no parent function '{}' to call", identifier));
                        Ok(Value::Empty)
                    },
                }
            },
            CallTarget::Method { object, identifier } => {
                let object = self.eval_expression(code, *object)?;
                let explicit = self.eval_arguments(code, &call.arguments, 1)?;
                let id = match self.find_object_by_value(&object) {
                    Some(id) => id,
                    None => {
                        self.warn(format_args!("unable to find object '{}' attempting to call function '{}'", object, identifier));
                        return Ok(Value::Empty);
                    },
                };

                let mut args = Vec::with_capacity(explicit.len() + 1);
                args.push(Value::from(id));
                args.extend(explicit);
                self.call_method_by_name(id, identifier, args)
            },
        }
    }

    /// Calls `name` on the object, `args` already holds the object id first.
    pub(crate) fn call_method_by_name(&mut self, id: SimObjectId, name: &StringRef, args: Vec<Value>) -> Result<Value, EvalError> {
        let (namespace, class_name) = match self.objects.get(id) {
            Some(object) => (object.namespace, object.class.name.clone()),
            None => return Ok(Value::Empty),
        };
        match self.namespaces.resolve(namespace, name, true) {
            Some(entry) => self.call_entry(&entry, args),
            None => {
                self.warn(format_args!("{} (object {}): unknown command '{}'", class_name, id, name));
                Ok(Value::Empty)
            },
        }
    }

    fn entry_display_name(&self, entry: &Entry) -> String {
        match &self.namespaces.get(entry.namespace).name {
            Some(namespace) => format!("{}::{}", namespace, &entry.name),
            None => entry.name.as_str().to_string(),
        }
    }

    /// Invokes a resolved callable. Script functions bind their parameters
    /// by position: missing arguments are empty, extra ones are dropped.
    /// Native callables check their declared arity first; native methods
    /// take their object from the first argument.
    pub(crate) fn call_entry(&mut self, entry: &Entry, args: Vec<Value>) -> Result<Value, EvalError> {
        match &entry.kind {
            EntryKind::Script { code, definition } => {
                let definition = &code.heap()[*definition];
                let function = ActiveFunction {
                    name: entry.name.clone(),
                    layer: entry.namespace,
                    namespace: self.namespaces.get(entry.namespace).name.clone(),
                };
                self.enter_frame(Some(function), code.clone())?;
                for (parameter, value) in definition.parameters.iter().zip(args.into_iter()) {
                    self.store.write_local(parameter.clone(), value);
                }

                let result = self.eval_statement(code, definition.body.upcast());
                self.store.pop_frame();
                match result? {
                    EvalContinuation::Return(value) => Ok(value),
                    EvalContinuation::Stepping => Ok(Value::Empty),
                    EvalContinuation::Break | EvalContinuation::Continue => {
                        let name = self.entry_display_name(entry);
                        self.warn(format_args!("{}: break or continue outside of a loop", name));
                        Ok(Value::Empty)
                    },
                }
            },
            EntryKind::Native { min_args, max_args, is_method, callback } => {
                let (object, explicit) = if *is_method {
                    match args.first().and_then(|value| self.find_object_by_value(value)) {
                        Some(object) => (Some(object), &args[1..]),
                        None => {
                            let name = self.entry_display_name(entry);
                            self.warn(format_args!("{}: method called without a valid object", name));
                            return Ok(Value::Empty);
                        },
                    }
                } else {
                    (None, &args[..])
                };

                if explicit.len() < *min_args || explicit.len() > *max_args {
                    let name = self.entry_display_name(entry);
                    if *max_args == usize::max_value() {
                        self.warn(format_args!(
                            "{}: wrong number of arguments, expected at least {}, got {}",
                            name, min_args, explicit.len()
                        ));
                    } else {
                        self.warn(format_args!(
                            "{}: wrong number of arguments, expected {} to {}, got {}",
                            name, min_args, max_args, explicit.len()
                        ));
                    }
                    return Ok(Value::Empty);
                }

                let callback = callback.clone();
                callback(self, &NativeCall { object, args: explicit })
            },
        }
    }

    // -------------------------------------------------------------------------
    // Object declarations
    // -------------------------------------------------------------------------

    /// Creates, fills and registers the declared object, then its children.
    /// `None` if the object could not be created. Declaring a datablock with
    /// the name of an existing datablock of the same class updates it.
    fn eval_object(&mut self, code: &CodeBlock, id: ObjectExpressionId) -> Result<Option<SimObjectId>, EvalError> {
        let heap = code.heap();
        let expr = &heap[id];
        let class_name = match &expr.class_name {
            Some(class_name) => class_name.clone(),
            None => return Ok(None),
        };
        let name = match expr.name {
            Some(name) => self.eval_expression(code, name)?.into_string(),
            None => String::new(),
        };

        let class = match self.class_info(&class_name) {
            Some(class) => class,
            None => {
                self.warn(format_args!("unable to instantiate unknown class '{}'", class_name));
                return Ok(None);
            },
        };
        if expr.is_datablock && !class.is_datablock {
            self.warn(format_args!("'{}' is not a datablock class", class_name));
            return Ok(None);
        }

        let mut object = SimObject::new(class.clone());
        if let Some(source) = &expr.copy_source {
            match self.find_object(source).and_then(|source| self.objects.get(source)) {
                Some(source) => object.copy_fields_from(source),
                None => self.warn(format_args!("unable to find object '{}' to copy fields from", source)),
            }
        }
        for initializer in &expr.fields {
            let value = self.eval_expression(code, initializer.value)?;
            let index = if initializer.indices.is_empty() {
                None
            } else {
                Some(self.eval_indices(code, &initializer.indices)?)
            };
            if let Err(error) = object.set_field(&initializer.field, index.as_deref(), value) {
                self.warn(format_args!("cannot set field '{}' of new '{}': {}", &initializer.field, class_name, error));
            }
        }

        let existing = if expr.is_datablock && !name.is_empty() {
            self.find_object(&name).filter(|existing| {
                self.objects.get(*existing).map_or(false, |o| o.class.name == class.name)
            })
        } else {
            None
        };
        let object_id = match existing {
            Some(existing) => {
                if let Some(target) = self.objects.get_mut(existing) {
                    target.copy_fields_from(&object);
                }
                existing
            },
            None => self.register_object(object, Some(&name))?,
        };

        for child in &expr.children {
            if let Some(child_id) = self.eval_object(code, *child)? {
                if let Err(error) = self.add_to_container(object_id, child_id) {
                    self.warn(format_args!("cannot add object {} to {}: {}", child_id, object_id, error));
                }
            }
        }
        Ok(Some(object_id))
    }
}
