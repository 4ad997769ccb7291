mod tokens;
mod token_parsing;
mod pass_tokenizer;
mod pass_definitions;

use crate::collections::StringPool;
use crate::console::ast::{CodeBlock, Heap};
use crate::console::input_source::{InputSource, ParseError};

use pass_tokenizer::PassTokenizer;
use pass_definitions::PassDefinitions;
use tokens::TokenBuffer;

pub(crate) use token_parsing::unescape_into;

/// State shared by the parsing passes: the heap that receives the nodes and
/// the string table for names and constants.
pub(crate) struct PassCtx<'a> {
    pub heap: &'a mut Heap,
    pub pool: &'a mut StringPool,
}

/// Front end of the console. Keeps its buffers around so compiling many
/// small snippets (e.g. through `eval`) does not allocate from scratch.
pub(crate) struct Parser {
    pass_tokenizer: PassTokenizer,
    pass_definitions: PassDefinitions,
}

impl Parser {
    pub(crate) fn new() -> Self {
        Parser {
            pass_tokenizer: PassTokenizer::new(),
            pass_definitions: PassDefinitions::new(),
        }
    }

    /// Compiles one unit. Nothing is executed, and on error no node of the
    /// unit survives.
    pub(crate) fn compile(&mut self, filename: &str, text: &str, pool: &mut StringPool) -> Result<CodeBlock, ParseError> {
        let mut source = InputSource::new(filename.to_string(), Vec::from(text.as_bytes()));
        let mut tokens = TokenBuffer::new();
        self.pass_tokenizer.tokenize(&mut source, &mut tokens)?;

        let mut heap = Heap::new();
        let mut ctx = PassCtx{ heap: &mut heap, pool };
        let root = self.pass_definitions.parse(&source, &tokens, &mut ctx)?;

        Ok(CodeBlock::new(source.filename, heap, root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ast::*;

    fn compile(text: &str) -> (CodeBlock, StringPool) {
        let mut pool = StringPool::new();
        let block = Parser::new().compile("test.cs", text, &mut pool).unwrap();
        (block, pool)
    }

    fn compile_error(text: &str) -> ParseError {
        let mut pool = StringPool::new();
        match Parser::new().compile("test.cs", text, &mut pool) {
            Ok(_) => panic!("expected '{}' to fail compiling", text),
            Err(error) => error,
        }
    }

    fn single_expression(block: &CodeBlock) -> &Expression {
        assert_eq!(block.root().len(), 1);
        match &block.heap()[block.root()[0]] {
            Statement::Expression(stmt) => &block.heap()[stmt.expression],
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let (block, _) = compile("%a = %b = 3;");
        let heap = block.heap();
        let outer = match single_expression(&block) {
            Expression::Assignment(expr) => expr,
            _ => panic!("expected an assignment"),
        };
        match &heap[outer.right] {
            Expression::Assignment(inner) => assert_eq!(inner.operation, AssignmentOperator::Set),
            _ => panic!("expected the right hand side to be an assignment"),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_concatenation() {
        let (block, _) = compile("%a @ 2 * 3 SPC %b;");
        let heap = block.heap();
        // Both string operators share a level, so the tree is (a @ (2*3)) SPC b
        let root = match single_expression(&block) {
            Expression::Binary(expr) => expr,
            _ => panic!("expected a binary expression"),
        };
        assert_eq!(root.operation, BinaryOperator::ConcatenateSpace);
        let left = match &heap[root.left] {
            Expression::Binary(expr) => expr,
            _ => panic!("expected a binary expression"),
        };
        assert_eq!(left.operation, BinaryOperator::Concatenate);
        match &heap[left.right] {
            Expression::Binary(expr) => assert_eq!(expr.operation, BinaryOperator::Multiply),
            _ => panic!("expected a multiplication"),
        }
    }

    #[test]
    fn test_for_without_clauses() {
        let (block, _) = compile("for (;;) { break; }");
        match &block.heap()[block.root()[0]] {
            Statement::For(stmt) => {
                assert!(stmt.initial.is_none());
                assert!(stmt.test.is_none());
                assert!(stmt.step.is_none());
            },
            _ => panic!("expected a for statement"),
        }
    }

    #[test]
    fn test_calls_and_slots() {
        let (block, _) = compile("Parent::onAdd(%this); Foo::bar(); %obj.field[1, 2] = %obj.method(3);");
        let heap = block.heap();
        let calls: Vec<_> = block.root().iter().map(|id| match &heap[*id] {
            Statement::Expression(stmt) => &heap[stmt.expression],
            _ => panic!("expected expression statements"),
        }).collect();

        match calls[0] {
            Expression::Call(call) => match &call.target {
                CallTarget::Parent{ identifier } => assert_eq!(identifier.as_str(), "onAdd"),
                _ => panic!("expected a parent call"),
            },
            _ => panic!("expected a call"),
        }
        match calls[1] {
            Expression::Call(call) => match &call.target {
                CallTarget::Qualified{ namespace, identifier } => {
                    assert_eq!(namespace.as_str(), "Foo");
                    assert_eq!(identifier.as_str(), "bar");
                },
                _ => panic!("expected a qualified call"),
            },
            _ => panic!("expected a call"),
        }
        match calls[2] {
            Expression::Assignment(assignment) => {
                match &heap[assignment.left] {
                    Expression::Slot(slot) => assert_eq!(slot.indices.len(), 2),
                    _ => panic!("expected a slot"),
                }
                match &heap[assignment.right] {
                    Expression::Call(call) => match &call.target {
                        CallTarget::Method{ identifier, .. } => assert_eq!(identifier.as_str(), "method"),
                        _ => panic!("expected a method call"),
                    },
                    _ => panic!("expected a call"),
                }
            },
            _ => panic!("expected an assignment"),
        }
    }

    #[test]
    fn test_object_declaration() {
        let (block, _) = compile("new ScriptObject(Foo : Bar) { a = 1; list[0] = \"x\"; new SimObject() {}; };");
        let heap = block.heap();
        match single_expression(&block) {
            Expression::Object(object) => {
                assert_eq!(object.class_name.as_ref().map(|c| c.as_str()), Some("ScriptObject"));
                assert_eq!(object.copy_source.as_ref().map(|c| c.as_str()), Some("Bar"));
                assert_eq!(object.fields.len(), 2);
                assert_eq!(object.fields[1].indices.len(), 1);
                assert_eq!(object.children.len(), 1);
                assert!(!object.is_datablock);
                let name = object.name.expect("object has a name");
                match &heap[name].as_literal().value {
                    Literal::String(text) => assert_eq!(text.as_str(), "Foo"),
                    _ => panic!("expected a bare-word name"),
                }
            },
            _ => panic!("expected an object declaration"),
        }
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let (block, mut pool) = compile("%Value = 1;");
        match single_expression(&block) {
            Expression::Assignment(assignment) => match &block.heap()[assignment.left] {
                Expression::Variable(var) => assert_eq!(var.identifier, pool.intern("value")),
                _ => panic!("expected a variable"),
            },
            _ => panic!("expected an assignment"),
        }
    }

    #[test]
    fn test_compile_errors_carry_line() {
        let error = compile_error("%a = 1;\n%b = ;\n");
        assert_eq!(error.line(), 2);
        assert_eq!(error.message(), "expected an expression");

        let error = compile_error("function foo(%a, %a) {}");
        assert_eq!(error.message(), "duplicate parameter name");

        let error = compile_error("5 = %x;");
        assert_eq!(error.message(), "cannot assign to this expression");

        let error = compile_error("%a = 1\n%b = 2;");
        assert_eq!(error.line(), 2);
        assert_eq!(error.message(), "expected ';'");
    }
}
