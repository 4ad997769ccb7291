use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use super::arena::{Arena, Id};
use super::input_source::InputSpan;
use crate::collections::StringRef;

/// Helper macro that defines a type alias for an AST element ID. In this case
/// the alias is used for the arena that stores all variants of a node kind.
macro_rules! define_aliased_ast_id {
    // Variant where we just defined the alias, without any indexing
    ($name:ident, $parent:ty) => {
        pub type $name = $parent;
    };
    // Variant where we define the type, and the Index and IndexMut traits
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $indexed_arena:ident)
    ) => {
        define_aliased_ast_id!($name, $parent);
        impl Index<$name> for Heap {
            type Output = $indexed_type;
            fn index(&self, index: $name) -> &Self::Output {
                &self.$indexed_arena[index]
            }
        }

        impl IndexMut<$name> for Heap {
            fn index_mut(&mut self, index: $name) -> &mut Self::Output {
                &mut self.$indexed_arena[index]
            }
        }
    };
    // Variant where we define type, Index(Mut) traits and an allocation function
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $indexed_arena:ident),
        alloc($fn_name:ident)
    ) => {
        define_aliased_ast_id!($name, $parent, index($indexed_type, $indexed_arena));
        impl Heap {
            pub fn $fn_name(&mut self, f: impl FnOnce($name) -> $indexed_type) -> $name {
                self.$indexed_arena.alloc_with_id(|id| f(id))
            }
        }
    };
}

/// Helper macro that defines a wrapper type for a particular variant of an AST
/// element ID, e.g. an `IfStatementId` that wraps a `StatementId`.
macro_rules! define_new_ast_id {
    // Variant where we just defined the new type, without any indexing
    ($name:ident, $parent:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name (pub(crate) $parent);

        impl $name {
            #[allow(dead_code)]
            pub(crate) fn new_invalid() -> Self     { Self(<$parent>::new_invalid()) }
            #[allow(dead_code)]
            pub(crate) fn is_invalid(&self) -> bool { self.0.is_invalid() }
            pub fn upcast(self) -> $parent          { self.0 }
        }
    };
    // Variant where we define the type, and the Index and IndexMut traits
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $wrapper_type:path, $indexed_arena:ident)
    ) => {
        define_new_ast_id!($name, $parent);
        impl Index<$name> for Heap {
            type Output = $indexed_type;
            fn index(&self, index: $name) -> &Self::Output {
                if let $wrapper_type(v) = &self.$indexed_arena[index.0] {
                    v
                } else {
                    unreachable!()
                }
            }
        }

        impl IndexMut<$name> for Heap {
            fn index_mut(&mut self, index: $name) -> &mut Self::Output {
                if let $wrapper_type(v) = &mut self.$indexed_arena[index.0] {
                    v
                } else {
                    unreachable!()
                }
            }
        }
    };
    // Variant where we define the type, the Index and IndexMut traits, and an allocation function
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $wrapper_type:path, $indexed_arena:ident),
        alloc($fn_name:ident)
    ) => {
        define_new_ast_id!($name, $parent, index($indexed_type, $wrapper_type, $indexed_arena));
        impl Heap {
            pub fn $fn_name(&mut self, f: impl FnOnce($name) -> $indexed_type) -> $name {
                $name(
                    self.$indexed_arena.alloc_with_id(|id| {
                        $wrapper_type(f($name(id)))
                    })
                )
            }
        }
    };
    // Same as above, but the node starts out default-initialized and the
    // caller only fills in the fields that were actually present in the source.
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $wrapper_type:path, $indexed_arena:ident),
        alloc_default($fn_name:ident)
    ) => {
        define_new_ast_id!($name, $parent, index($indexed_type, $wrapper_type, $indexed_arena));
        impl Heap {
            pub fn $fn_name(&mut self, f: impl FnOnce($name, &mut $indexed_type)) -> $name {
                $name(
                    self.$indexed_arena.alloc_with_id(|id| {
                        let mut node = <$indexed_type>::default();
                        node.this = $name(id);
                        f($name(id), &mut node);
                        $wrapper_type(node)
                    })
                )
            }
        }
    };
}

define_aliased_ast_id!(FunctionDefinitionId, Id<FunctionDefinition>, index(FunctionDefinition, functions), alloc(alloc_function_definition));

define_aliased_ast_id!(StatementId, Id<Statement>, index(Statement, statements));
define_new_ast_id!(BlockStatementId, StatementId, index(BlockStatement, Statement::Block, statements), alloc(alloc_block_statement));
define_new_ast_id!(ExpressionStatementId, StatementId, index(ExpressionStatement, Statement::Expression, statements), alloc(alloc_expression_statement));
define_new_ast_id!(IfStatementId, StatementId, index(IfStatement, Statement::If, statements), alloc(alloc_if_statement));
define_new_ast_id!(WhileStatementId, StatementId, index(WhileStatement, Statement::While, statements), alloc(alloc_while_statement));
define_new_ast_id!(ForStatementId, StatementId, index(ForStatement, Statement::For, statements), alloc_default(alloc_for_statement));
define_new_ast_id!(BreakStatementId, StatementId, index(BreakStatement, Statement::Break, statements), alloc(alloc_break_statement));
define_new_ast_id!(ContinueStatementId, StatementId, index(ContinueStatement, Statement::Continue, statements), alloc(alloc_continue_statement));
define_new_ast_id!(ReturnStatementId, StatementId, index(ReturnStatement, Statement::Return, statements), alloc(alloc_return_statement));
define_new_ast_id!(SwitchStatementId, StatementId, index(SwitchStatement, Statement::Switch, statements), alloc(alloc_switch_statement));
define_new_ast_id!(FunctionStatementId, StatementId, index(FunctionStatement, Statement::Function, statements), alloc(alloc_function_statement));
define_new_ast_id!(PackageStatementId, StatementId, index(PackageStatement, Statement::Package, statements), alloc(alloc_package_statement));

define_aliased_ast_id!(ExpressionId, Id<Expression>, index(Expression, expressions));
define_new_ast_id!(AssignmentExpressionId, ExpressionId, index(AssignmentExpression, Expression::Assignment, expressions), alloc(alloc_assignment_expression));
define_new_ast_id!(ConditionalExpressionId, ExpressionId, index(ConditionalExpression, Expression::Conditional, expressions), alloc(alloc_conditional_expression));
define_new_ast_id!(BinaryExpressionId, ExpressionId, index(BinaryExpression, Expression::Binary, expressions), alloc(alloc_binary_expression));
define_new_ast_id!(UnaryExpressionId, ExpressionId, index(UnaryExpression, Expression::Unary, expressions), alloc(alloc_unary_expression));
define_new_ast_id!(LiteralExpressionId, ExpressionId, index(LiteralExpression, Expression::Literal, expressions), alloc(alloc_literal_expression));
define_new_ast_id!(VariableExpressionId, ExpressionId, index(VariableExpression, Expression::Variable, expressions), alloc(alloc_variable_expression));
define_new_ast_id!(SlotExpressionId, ExpressionId, index(SlotExpression, Expression::Slot, expressions), alloc(alloc_slot_expression));
define_new_ast_id!(CallExpressionId, ExpressionId, index(CallExpression, Expression::Call, expressions), alloc(alloc_call_expression));
define_new_ast_id!(ObjectExpressionId, ExpressionId, index(ObjectExpression, Expression::Object, expressions), alloc_default(alloc_object_expression));
define_new_ast_id!(TagDerefExpressionId, ExpressionId, index(TagDerefExpression, Expression::TagDeref, expressions), alloc(alloc_tag_deref_expression));

/// Nodes of a single compilation unit. Children are attached when a node is
/// created and never moved, so the statement and expression graphs are trees.
#[derive(Debug)]
pub struct Heap {
    pub(crate) functions: Arena<FunctionDefinition>,
    pub(crate) statements: Arena<Statement>,
    pub(crate) expressions: Arena<Expression>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            functions: Arena::new(),
            statements: Arena::new(),
            expressions: Arena::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.functions.len() + self.statements.len() + self.expressions.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled script: the node heap plus the top-level statements. Cheap to
/// clone; function entries registered while executing the unit keep it alive.
#[derive(Clone)]
pub struct CodeBlock {
    pub(crate) unit: Arc<CompiledUnit>,
}

pub(crate) struct CompiledUnit {
    pub(crate) filename: String,
    pub(crate) heap: Heap,
    pub(crate) root: Vec<StatementId>,
}

impl CodeBlock {
    pub(crate) fn new(filename: String, heap: Heap, root: Vec<StatementId>) -> Self {
        CodeBlock { unit: Arc::new(CompiledUnit { filename, heap, root }) }
    }

    pub fn filename(&self) -> &str {
        &self.unit.filename
    }

    pub fn heap(&self) -> &Heap {
        &self.unit.heap
    }

    pub fn root(&self) -> &[StatementId] {
        &self.unit.root
    }
}

impl fmt::Debug for CodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBlock")
            .field("filename", &self.unit.filename)
            .field("statements", &self.unit.root.len())
            .field("nodes", &self.unit.heap.node_count())
            .finish()
    }
}

pub trait SyntaxElement {
    fn span(&self) -> InputSpan;
}

// -----------------------------------------------------------------------------
// Definitions
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub this: FunctionDefinitionId,
    pub span: InputSpan,
    /// `Ns` in `function Ns::name(...)`
    pub namespace: Option<StringRef>,
    pub identifier: StringRef,
    pub parameters: Vec<StringRef>,
    pub body: BlockStatementId,
}

impl SyntaxElement for FunctionDefinition {
    fn span(&self) -> InputSpan {
        self.span
    }
}

// -----------------------------------------------------------------------------
// Statements
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Statement {
    Block(BlockStatement),
    Expression(ExpressionStatement),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Return(ReturnStatement),
    Switch(SwitchStatement),
    Function(FunctionStatement),
    Package(PackageStatement),
}

impl SyntaxElement for Statement {
    fn span(&self) -> InputSpan {
        match self {
            Statement::Block(stmt) => stmt.span,
            Statement::Expression(stmt) => stmt.span,
            Statement::If(stmt) => stmt.span,
            Statement::While(stmt) => stmt.span,
            Statement::For(stmt) => stmt.span,
            Statement::Break(stmt) => stmt.span,
            Statement::Continue(stmt) => stmt.span,
            Statement::Return(stmt) => stmt.span,
            Statement::Switch(stmt) => stmt.span,
            Statement::Function(stmt) => stmt.span,
            Statement::Package(stmt) => stmt.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockStatement {
    pub this: BlockStatementId,
    pub span: InputSpan,
    pub statements: Vec<StatementId>,
}

#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    pub this: ExpressionStatementId,
    pub span: InputSpan,
    pub expression: ExpressionId,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub this: IfStatementId,
    pub span: InputSpan,
    pub test: ExpressionId,
    pub true_body: StatementId,
    pub false_body: Option<StatementId>,
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub this: WhileStatementId,
    pub span: InputSpan,
    pub test: ExpressionId,
    pub body: StatementId,
    /// `do { ... } while (test);` runs the body before the first test
    pub is_do_while: bool,
}

/// Every clause is optional. A missing test reads as `None`, which the
/// evaluator treats as an always-true condition.
#[derive(Debug, Clone, Default)]
pub struct ForStatement {
    pub this: ForStatementId,
    pub span: InputSpan,
    pub initial: Option<ExpressionId>,
    pub test: Option<ExpressionId>,
    pub step: Option<ExpressionId>,
    pub body: StatementId,
}

#[derive(Debug, Clone)]
pub struct BreakStatement {
    pub this: BreakStatementId,
    pub span: InputSpan,
}

#[derive(Debug, Clone)]
pub struct ContinueStatement {
    pub this: ContinueStatementId,
    pub span: InputSpan,
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub this: ReturnStatementId,
    pub span: InputSpan,
    pub expression: Option<ExpressionId>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub span: InputSpan,
    /// `case a or b:` matches either value
    pub values: Vec<ExpressionId>,
    pub body: Vec<StatementId>,
}

#[derive(Debug, Clone)]
pub struct SwitchStatement {
    pub this: SwitchStatementId,
    pub span: InputSpan,
    pub subject: ExpressionId,
    /// `switch$` compares text instead of numbers
    pub compare_strings: bool,
    pub cases: Vec<SwitchCase>,
    pub default_case: Option<Vec<StatementId>>,
}

#[derive(Debug, Clone)]
pub struct FunctionStatement {
    pub this: FunctionStatementId,
    pub span: InputSpan,
    pub definition: FunctionDefinitionId,
}

#[derive(Debug, Clone)]
pub struct PackageStatement {
    pub this: PackageStatementId,
    pub span: InputSpan,
    pub identifier: StringRef,
    pub functions: Vec<FunctionDefinitionId>,
}

// -----------------------------------------------------------------------------
// Expressions
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Expression {
    Assignment(AssignmentExpression),
    Conditional(ConditionalExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Literal(LiteralExpression),
    Variable(VariableExpression),
    Slot(SlotExpression),
    Call(CallExpression),
    Object(ObjectExpression),
    TagDeref(TagDerefExpression),
}

impl Expression {
    /// Whether the expression can appear on the left hand side of an
    /// assignment or as the operand of `++`/`--`.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expression::Variable(_) | Expression::Slot(_) => true,
            _ => false,
        }
    }

    pub fn as_literal(&self) -> &LiteralExpression {
        match self {
            Expression::Literal(result) => result,
            _ => panic!("Unable to cast `Expression` to `LiteralExpression`"),
        }
    }
}

impl SyntaxElement for Expression {
    fn span(&self) -> InputSpan {
        match self {
            Expression::Assignment(expr) => expr.span,
            Expression::Conditional(expr) => expr.span,
            Expression::Binary(expr) => expr.span,
            Expression::Unary(expr) => expr.span,
            Expression::Literal(expr) => expr.span,
            Expression::Variable(expr) => expr.span,
            Expression::Slot(expr) => expr.span,
            Expression::Call(expr) => expr.span,
            Expression::Object(expr) => expr.span,
            Expression::TagDeref(expr) => expr.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Set,
    Added,
    Subtracted,
    Multiplied,
    Divided,
    Remained,
    BitwiseAnded,
    BitwiseOred,
    BitwiseXored,
    ShiftedLeft,
    ShiftedRight,
}

impl AssignmentOperator {
    /// The binary operator that a compound assignment applies before storing.
    pub fn as_binary_operator(self) -> Option<BinaryOperator> {
        use AssignmentOperator as AO;
        use BinaryOperator as BO;
        match self {
            AO::Set => None,
            AO::Added => Some(BO::Add),
            AO::Subtracted => Some(BO::Subtract),
            AO::Multiplied => Some(BO::Multiply),
            AO::Divided => Some(BO::Divide),
            AO::Remained => Some(BO::Remainder),
            AO::BitwiseAnded => Some(BO::BitwiseAnd),
            AO::BitwiseOred => Some(BO::BitwiseOr),
            AO::BitwiseXored => Some(BO::BitwiseXor),
            AO::ShiftedLeft => Some(BO::ShiftLeft),
            AO::ShiftedRight => Some(BO::ShiftRight),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub this: AssignmentExpressionId,
    pub span: InputSpan,
    pub left: ExpressionId,
    pub operation: AssignmentOperator,
    pub right: ExpressionId,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub this: ConditionalExpressionId,
    pub span: InputSpan,
    pub test: ExpressionId,
    pub true_expression: ExpressionId,
    pub false_expression: ExpressionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equality,
    Inequality,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    // String operators
    Concatenate,
    ConcatenateSpace,
    ConcatenateTab,
    ConcatenateNewline,
    StringEquality,
    StringInequality,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub this: BinaryExpressionId,
    pub span: InputSpan,
    pub left: ExpressionId,
    pub operation: BinaryOperator,
    pub right: ExpressionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    LogicalNot,
    BitwiseNot,
    Negate,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOperator {
    pub fn writes_operand(self) -> bool {
        match self {
            UnaryOperator::PreIncrement | UnaryOperator::PreDecrement |
            UnaryOperator::PostIncrement | UnaryOperator::PostDecrement => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub this: UnaryExpressionId,
    pub span: InputSpan,
    pub operation: UnaryOperator,
    pub expression: ExpressionId,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(StringRef),
    /// `'text'`, tagged when evaluated
    Tagged(StringRef),
}

#[derive(Debug, Clone)]
pub struct LiteralExpression {
    pub this: LiteralExpressionId,
    pub span: InputSpan,
    pub value: Literal,
}

/// `%name`, `$name`, and their array forms `%name[i]` / `$name[i, j]`. The
/// array forms store under the key `name` + `i` (`_`-joined for several
/// indices), so `%a[1]` and `%a1` share storage.
#[derive(Debug, Clone)]
pub struct VariableExpression {
    pub this: VariableExpressionId,
    pub span: InputSpan,
    pub identifier: StringRef,
    pub is_global: bool,
    pub indices: Vec<ExpressionId>,
}

/// `object.field` and `object.field[i]`
#[derive(Debug, Clone)]
pub struct SlotExpression {
    pub this: SlotExpressionId,
    pub span: InputSpan,
    pub object: ExpressionId,
    pub field: StringRef,
    pub indices: Vec<ExpressionId>,
}

#[derive(Debug, Clone)]
pub enum CallTarget {
    /// `name(...)`
    Function { identifier: StringRef },
    /// `Ns::name(...)`
    Qualified { namespace: StringRef, identifier: StringRef },
    /// `Parent::name(...)`, resolved relative to the calling function
    Parent { identifier: StringRef },
    /// `object.name(...)`, the object is passed as the first argument
    Method { object: ExpressionId, identifier: StringRef },
}

impl CallTarget {
    pub fn identifier(&self) -> &StringRef {
        match self {
            CallTarget::Function { identifier } |
            CallTarget::Qualified { identifier, .. } |
            CallTarget::Parent { identifier } |
            CallTarget::Method { identifier, .. } => identifier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub this: CallExpressionId,
    pub span: InputSpan,
    pub target: CallTarget,
    pub arguments: Vec<ExpressionId>,
}

#[derive(Debug, Clone)]
pub struct FieldInitializer {
    pub span: InputSpan,
    pub field: StringRef,
    pub indices: Vec<ExpressionId>,
    pub value: ExpressionId,
}

/// `new Class(name : copySource) { fields; children }` and the `datablock`
/// form. Optional parts read as their defaults when absent.
#[derive(Debug, Clone, Default)]
pub struct ObjectExpression {
    pub this: ObjectExpressionId,
    pub span: InputSpan,
    pub class_name: Option<StringRef>,
    pub name: Option<ExpressionId>,
    pub copy_source: Option<StringRef>,
    pub is_datablock: bool,
    pub fields: Vec<FieldInitializer>,
    pub children: Vec<ObjectExpressionId>,
}

#[derive(Debug, Clone)]
pub struct TagDerefExpression {
    pub this: TagDerefExpressionId,
    pub span: InputSpan,
    pub expression: ExpressionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::StringPool;

    #[test]
    fn test_for_statement_defaults_missing_clauses() {
        let mut heap = Heap::new();
        let body = heap.alloc_block_statement(|this| BlockStatement {
            this, span: InputSpan::default(), statements: Vec::new()
        });
        let id = heap.alloc_for_statement(|_, stmt| {
            stmt.body = body.upcast();
        });
        let stmt = &heap[id];
        assert_eq!(stmt.this, id);
        assert!(stmt.initial.is_none());
        assert!(stmt.test.is_none());
        assert!(stmt.step.is_none());
        assert_eq!(stmt.body, body.upcast());
    }

    #[test]
    fn test_typed_ids_index_their_variant() {
        let mut pool = StringPool::new();
        let mut heap = Heap::new();
        let literal = heap.alloc_literal_expression(|this| LiteralExpression {
            this, span: InputSpan::default(), value: Literal::Integer(5),
        });
        let variable = heap.alloc_variable_expression(|this| VariableExpression {
            this, span: InputSpan::default(), identifier: pool.intern("x"),
            is_global: false, indices: Vec::new(),
        });
        let assignment = heap.alloc_assignment_expression(|this| AssignmentExpression {
            this, span: InputSpan::default(), left: variable.upcast(),
            operation: AssignmentOperator::Set, right: literal.upcast(),
        });

        assert!(heap[variable.upcast()].is_assignable());
        assert!(!heap[literal.upcast()].is_assignable());
        assert_eq!(heap[assignment].left, variable.upcast());
        match heap[literal].value {
            Literal::Integer(v) => assert_eq!(v, 5),
            _ => panic!("expected an integer literal"),
        }
        assert_eq!(heap.node_count(), 3);
    }
}
