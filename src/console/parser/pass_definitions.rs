use crate::collections::StringRef;
use crate::console::ast::*;
use crate::console::input_source::{InputSource, InputSpan, ParseError};
use super::PassCtx;
use super::tokens::*;
use super::token_parsing::*;

/// Statements and expressions nested deeper than this fail to compile
pub(crate) const MAX_NESTING_DEPTH: usize = 1024;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Parses the token stream of one source file into AST nodes. Single pass:
/// nodes are allocated as soon as their children are known.
pub(crate) struct PassDefinitions {
    buffer: String,
    depth: usize,
}

impl PassDefinitions {
    pub(crate) fn new() -> Self {
        Self{ buffer: String::with_capacity(128), depth: 0 }
    }

    pub(crate) fn parse(
        &mut self, source: &InputSource, tokens: &TokenBuffer, ctx: &mut PassCtx
    ) -> Result<Vec<StatementId>, ParseError> {
        let mut iter = tokens.iter();
        let mut root = Vec::new();
        self.depth = 0;
        while iter.next().is_some() {
            let statement = self.consume_statement(source, &mut iter, ctx)?;
            root.push(statement);
        }

        Ok(root)
    }

    //--------------------------------------------------------------------------
    // Declarations
    //--------------------------------------------------------------------------

    fn consume_function_definition(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<FunctionDefinitionId, ParseError> {
        let mut span = consume_exact_ident(source, iter, KW_FUNCTION)?;
        let (first, first_span) = consume_ident(source, iter)?;
        span.end = first_span.end;

        let (namespace, identifier) = if maybe_consume_token(iter, TokenKind::ColonColon) {
            let (second, second_span) = consume_ident(source, iter)?;
            span.end = second_span.end;
            (Some(ctx.pool.intern(first)), ctx.pool.intern(second))
        } else {
            (None, ctx.pool.intern(first))
        };

        let mut parameters = Vec::new();
        consume_comma_separated(
            TokenKind::OpenParen, TokenKind::CloseParen, source, iter,
            |source, iter| {
                let (name, is_global, span) = consume_variable_name(source, iter)?;
                if is_global {
                    return Err(ParseError::new_error_str_at_span(
                        source, span, "function parameters must be local variables"
                    ));
                }
                Ok((name.to_string(), span))
            },
            &mut parameters, "a parameter", "a parameter list"
        )?;

        for (idx, (name, param_span)) in parameters.iter().enumerate() {
            if parameters[..idx].iter().any(|(other, _)| other.eq_ignore_ascii_case(name)) {
                return Err(ParseError::new_error_str_at_span(source, *param_span, "duplicate parameter name"));
            }
        }
        let parameters: Vec<_> = parameters.into_iter().map(|(name, _)| ctx.pool.intern(&name)).collect();

        let body = self.consume_block_statement(source, iter, ctx)?;
        Ok(ctx.heap.alloc_function_definition(|this| FunctionDefinition{
            this, span, namespace, identifier, parameters, body,
        }))
    }

    fn consume_function_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let definition = self.consume_function_definition(source, iter, ctx)?;
        let span = ctx.heap[definition].span;
        Ok(ctx.heap.alloc_function_statement(|this| FunctionStatement{
            this, span, definition,
        }).upcast())
    }

    /// `package Name { function ...; };` may only contain function
    /// declarations.
    fn consume_package_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let mut span = consume_exact_ident(source, iter, KW_PACKAGE)?;
        let (name, name_span) = consume_ident(source, iter)?;
        span.end = name_span.end;
        let identifier = ctx.pool.intern(name);

        consume_token(source, iter, TokenKind::OpenCurly)?;
        let mut functions = Vec::new();
        loop {
            match iter.next() {
                Some(TokenKind::CloseCurly) => break,
                Some(TokenKind::SemiColon) => iter.consume(),
                _ if has_ident(source, iter, KW_FUNCTION) => {
                    functions.push(self.consume_function_definition(source, iter, ctx)?);
                },
                _ => return Err(ParseError::new_error_str_at_pos(
                    source, iter.last_valid_pos(), "expected a function declaration inside the package"
                )),
            }
        }
        consume_token(source, iter, TokenKind::CloseCurly)?;
        consume_token(source, iter, TokenKind::SemiColon)?;

        Ok(ctx.heap.alloc_package_statement(|this| PackageStatement{
            this, span, identifier, functions,
        }).upcast())
    }

    //--------------------------------------------------------------------------
    // Statements
    //--------------------------------------------------------------------------

    fn enter_nesting(&mut self, source: &InputSource, iter: &TokenIter) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new_error_at_pos(
                source, iter.last_valid_pos(),
                format!("nesting is deeper than {} levels", MAX_NESTING_DEPTH)
            ));
        }

        self.depth += 1;
        Ok(())
    }

    fn consume_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        self.enter_nesting(source, iter)?;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.consume_statement_inner(source, iter, ctx)
        });
        self.depth -= 1;
        result
    }

    fn consume_statement_inner(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let next = iter.next();

        if next == Some(TokenKind::OpenCurly) {
            return Ok(self.consume_block_statement(source, iter, ctx)?.upcast());
        } else if next == Some(TokenKind::SemiColon) {
            // Empty statement
            let span = consume_token(source, iter, TokenKind::SemiColon)?;
            return Ok(ctx.heap.alloc_block_statement(|this| BlockStatement{
                this, span, statements: Vec::new(),
            }).upcast());
        } else if let Some(ident) = peek_ident(source, iter) {
            if ident == KW_STMT_IF {
                return self.consume_if_statement(source, iter, ctx);
            } else if ident == KW_STMT_WHILE {
                return self.consume_while_statement(source, iter, ctx);
            } else if ident == KW_STMT_DO {
                return self.consume_do_while_statement(source, iter, ctx);
            } else if ident == KW_STMT_FOR {
                return self.consume_for_statement(source, iter, ctx);
            } else if ident == KW_STMT_BREAK {
                let span = consume_exact_ident(source, iter, KW_STMT_BREAK)?;
                consume_token(source, iter, TokenKind::SemiColon)?;
                return Ok(ctx.heap.alloc_break_statement(|this| BreakStatement{ this, span }).upcast());
            } else if ident == KW_STMT_CONTINUE {
                let span = consume_exact_ident(source, iter, KW_STMT_CONTINUE)?;
                consume_token(source, iter, TokenKind::SemiColon)?;
                return Ok(ctx.heap.alloc_continue_statement(|this| ContinueStatement{ this, span }).upcast());
            } else if ident == KW_STMT_RETURN {
                return self.consume_return_statement(source, iter, ctx);
            } else if ident == KW_STMT_SWITCH || ident == KW_STMT_SWITCH_STR {
                return self.consume_switch_statement(source, iter, ctx);
            } else if ident == KW_FUNCTION {
                return self.consume_function_statement(source, iter, ctx);
            } else if ident == KW_PACKAGE {
                return self.consume_package_statement(source, iter, ctx);
            } else if ident == KW_DATABLOCK {
                let expression = self.consume_datablock_expression(source, iter, ctx)?.upcast();
                return self.finish_expression_statement(source, iter, ctx, expression);
            } else if ident == KW_STMT_ELSE || ident == KW_STMT_CASE || ident == KW_STMT_DEFAULT {
                return Err(ParseError::new_error_at_pos(
                    source, iter.last_valid_pos(),
                    format!("unexpected '{}'", String::from_utf8_lossy(ident))
                ));
            }
        }

        // If here then attempt to parse as expression
        let expression = self.consume_expression(source, iter, ctx)?;
        self.finish_expression_statement(source, iter, ctx, expression)
    }

    fn finish_expression_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx, expression: ExpressionId
    ) -> Result<StatementId, ParseError> {
        let mut span = ctx.heap[expression].span();
        let end_span = consume_token(source, iter, TokenKind::SemiColon)?;
        span.end = end_span.end;
        Ok(ctx.heap.alloc_expression_statement(|this| ExpressionStatement{
            this, span, expression,
        }).upcast())
    }

    fn consume_block_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<BlockStatementId, ParseError> {
        let open_span = consume_token(source, iter, TokenKind::OpenCurly)?;
        let mut statements = Vec::new();
        let mut next = iter.next();
        while next.is_some() && next != Some(TokenKind::CloseCurly) {
            statements.push(self.consume_statement(source, iter, ctx)?);
            next = iter.next();
        }

        let mut span = consume_token(source, iter, TokenKind::CloseCurly)?;
        span.begin = open_span.begin;

        Ok(ctx.heap.alloc_block_statement(|this| BlockStatement{
            this, span, statements,
        }))
    }

    fn consume_if_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let span = consume_exact_ident(source, iter, KW_STMT_IF)?;
        let test = self.consume_parenthesized_expression(source, iter, ctx)?;
        let true_body = self.consume_statement(source, iter, ctx)?;
        let false_body = if has_ident(source, iter, KW_STMT_ELSE) {
            iter.consume();
            Some(self.consume_statement(source, iter, ctx)?)
        } else {
            None
        };

        Ok(ctx.heap.alloc_if_statement(|this| IfStatement{
            this, span, test, true_body, false_body,
        }).upcast())
    }

    fn consume_while_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let span = consume_exact_ident(source, iter, KW_STMT_WHILE)?;
        let test = self.consume_parenthesized_expression(source, iter, ctx)?;
        let body = self.consume_statement(source, iter, ctx)?;

        Ok(ctx.heap.alloc_while_statement(|this| WhileStatement{
            this, span, test, body, is_do_while: false,
        }).upcast())
    }

    fn consume_do_while_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let span = consume_exact_ident(source, iter, KW_STMT_DO)?;
        let body = self.consume_statement(source, iter, ctx)?;
        consume_exact_ident(source, iter, KW_STMT_WHILE)?;
        let test = self.consume_parenthesized_expression(source, iter, ctx)?;
        consume_token(source, iter, TokenKind::SemiColon)?;

        Ok(ctx.heap.alloc_while_statement(|this| WhileStatement{
            this, span, test, body, is_do_while: true,
        }).upcast())
    }

    /// `for (init; test; step) body`, where each of the clauses may be left
    /// out.
    fn consume_for_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let span = consume_exact_ident(source, iter, KW_STMT_FOR)?;
        consume_token(source, iter, TokenKind::OpenParen)?;
        let initial = self.maybe_consume_expression_until(source, iter, ctx, TokenKind::SemiColon)?;
        consume_token(source, iter, TokenKind::SemiColon)?;
        let test = self.maybe_consume_expression_until(source, iter, ctx, TokenKind::SemiColon)?;
        consume_token(source, iter, TokenKind::SemiColon)?;
        let step = self.maybe_consume_expression_until(source, iter, ctx, TokenKind::CloseParen)?;
        consume_token(source, iter, TokenKind::CloseParen)?;
        let body = self.consume_statement(source, iter, ctx)?;

        Ok(ctx.heap.alloc_for_statement(|_, stmt| {
            stmt.span = span;
            stmt.body = body;
            stmt.initial = initial;
            stmt.test = test;
            stmt.step = step;
        }).upcast())
    }

    fn consume_return_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let span = consume_exact_ident(source, iter, KW_STMT_RETURN)?;
        let expression = self.maybe_consume_expression_until(source, iter, ctx, TokenKind::SemiColon)?;
        consume_token(source, iter, TokenKind::SemiColon)?;

        Ok(ctx.heap.alloc_return_statement(|this| ReturnStatement{
            this, span, expression,
        }).upcast())
    }

    fn consume_switch_statement(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<StatementId, ParseError> {
        let (keyword, span) = consume_any_ident(source, iter)?;
        let compare_strings = keyword == KW_STMT_SWITCH_STR;
        let subject = self.consume_parenthesized_expression(source, iter, ctx)?;

        consume_token(source, iter, TokenKind::OpenCurly)?;
        let mut cases = Vec::new();
        let mut default_case = None;
        while iter.next() != Some(TokenKind::CloseCurly) {
            if has_ident(source, iter, KW_STMT_CASE) {
                let case_span = iter.next_span();
                iter.consume();
                let mut values = vec![self.consume_expression(source, iter, ctx)?];
                while has_ident(source, iter, KW_STMT_OR) {
                    iter.consume();
                    values.push(self.consume_expression(source, iter, ctx)?);
                }
                consume_token(source, iter, TokenKind::Colon)?;
                let body = self.consume_case_body(source, iter, ctx)?;
                cases.push(SwitchCase{ span: case_span, values, body });
            } else if has_ident(source, iter, KW_STMT_DEFAULT) {
                let default_pos = iter.last_valid_pos();
                iter.consume();
                if default_case.is_some() {
                    return Err(ParseError::new_error_str_at_pos(
                        source, default_pos, "switch statement has more than one default case"
                    ));
                }
                consume_token(source, iter, TokenKind::Colon)?;
                default_case = Some(self.consume_case_body(source, iter, ctx)?);
            } else {
                return Err(ParseError::new_error_str_at_pos(
                    source, iter.last_valid_pos(), "expected 'case' or 'default'"
                ));
            }
        }
        consume_token(source, iter, TokenKind::CloseCurly)?;

        Ok(ctx.heap.alloc_switch_statement(|this| SwitchStatement{
            this, span, subject, compare_strings, cases, default_case,
        }).upcast())
    }

    fn consume_case_body(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<Vec<StatementId>, ParseError> {
        let mut body = Vec::new();
        loop {
            let next = iter.next();
            if next.is_none() || next == Some(TokenKind::CloseCurly) ||
                has_ident(source, iter, KW_STMT_CASE) || has_ident(source, iter, KW_STMT_DEFAULT) {
                break;
            }
            body.push(self.consume_statement(source, iter, ctx)?);
        }

        Ok(body)
    }

    //--------------------------------------------------------------------------
    // Expression Parsing
    //--------------------------------------------------------------------------

    fn consume_parenthesized_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        consume_token(source, iter, TokenKind::OpenParen)?;
        let result = self.consume_expression(source, iter, ctx)?;
        consume_token(source, iter, TokenKind::CloseParen)?;
        Ok(result)
    }

    fn maybe_consume_expression_until(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx, terminator: TokenKind
    ) -> Result<Option<ExpressionId>, ParseError> {
        if iter.next() == Some(terminator) {
            return Ok(None);
        }

        Ok(Some(self.consume_expression(source, iter, ctx)?))
    }

    fn consume_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.enter_nesting(source, iter)?;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.consume_assignment_expression(source, iter, ctx)
        });
        self.depth -= 1;
        result
    }

    fn consume_assignment_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        // Utility to convert token into assignment operator
        fn parse_assignment_operator(token: Option<TokenKind>) -> Option<AssignmentOperator> {
            use TokenKind as TK;
            use AssignmentOperator as AO;

            match token? {
                TK::Equal               => Some(AO::Set),
                TK::StarEquals          => Some(AO::Multiplied),
                TK::SlashEquals         => Some(AO::Divided),
                TK::PercentEquals       => Some(AO::Remained),
                TK::PlusEquals          => Some(AO::Added),
                TK::MinusEquals         => Some(AO::Subtracted),
                TK::ShiftLeftEquals     => Some(AO::ShiftedLeft),
                TK::ShiftRightEquals    => Some(AO::ShiftedRight),
                TK::AndEquals           => Some(AO::BitwiseAnded),
                TK::CaretEquals         => Some(AO::BitwiseXored),
                TK::OrEquals            => Some(AO::BitwiseOred),
                _                       => None
            }
        }

        let expr = self.consume_conditional_expression(source, iter, ctx)?;
        if let Some(operation) = parse_assignment_operator(iter.next()) {
            let span = iter.next_span();
            if !ctx.heap[expr].is_assignable() {
                return Err(ParseError::new_error_str_at_span(
                    source, ctx.heap[expr].span(), "cannot assign to this expression"
                ));
            }
            iter.consume();

            let left = expr;
            let right = self.consume_expression(source, iter, ctx)?;

            Ok(ctx.heap.alloc_assignment_expression(|this| AssignmentExpression{
                this, span, left, operation, right,
            }).upcast())
        } else {
            Ok(expr)
        }
    }

    fn consume_conditional_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        let result = self.consume_logical_or_expression(source, iter, ctx)?;
        if let Some(TokenKind::Question) = iter.next() {
            let span = iter.next_span();
            iter.consume();

            let test = result;
            let true_expression = self.consume_expression(source, iter, ctx)?;
            consume_token(source, iter, TokenKind::Colon)?;
            let false_expression = self.consume_expression(source, iter, ctx)?;
            Ok(ctx.heap.alloc_conditional_expression(|this| ConditionalExpression{
                this, span, test, true_expression, false_expression,
            }).upcast())
        } else {
            Ok(result)
        }
    }

    fn consume_logical_or_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::OrOr) => Some(BinaryOperator::LogicalOr),
                _ => None
            },
            Self::consume_logical_and_expression
        )
    }

    fn consume_logical_and_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::AndAnd) => Some(BinaryOperator::LogicalAnd),
                _ => None
            },
            Self::consume_bitwise_or_expression
        )
    }

    fn consume_bitwise_or_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::Or) => Some(BinaryOperator::BitwiseOr),
                _ => None
            },
            Self::consume_bitwise_xor_expression
        )
    }

    fn consume_bitwise_xor_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::Caret) => Some(BinaryOperator::BitwiseXor),
                _ => None
            },
            Self::consume_bitwise_and_expression
        )
    }

    fn consume_bitwise_and_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::And) => Some(BinaryOperator::BitwiseAnd),
                _ => None
            },
            Self::consume_equality_expression
        )
    }

    fn consume_equality_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::EqualEqual) => Some(BinaryOperator::Equality),
                Some(TokenKind::NotEqual) => Some(BinaryOperator::Inequality),
                _ => None
            },
            Self::consume_relational_expression
        )
    }

    fn consume_relational_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::OpenAngle) => Some(BinaryOperator::LessThan),
                Some(TokenKind::LessEquals) => Some(BinaryOperator::LessThanEqual),
                Some(TokenKind::CloseAngle) => Some(BinaryOperator::GreaterThan),
                Some(TokenKind::GreaterEquals) => Some(BinaryOperator::GreaterThanEqual),
                _ => None
            },
            Self::consume_string_expression
        )
    }

    /// Concatenation and string comparison. `SPC`, `TAB` and `NL` are
    /// identifiers as far as the tokenizer is concerned.
    fn consume_string_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |ident, token| match token {
                Some(TokenKind::At) => Some(BinaryOperator::Concatenate),
                Some(TokenKind::DollarEquals) => Some(BinaryOperator::StringEquality),
                Some(TokenKind::NotDollarEquals) => Some(BinaryOperator::StringInequality),
                Some(TokenKind::Ident) => match ident {
                    Some(KW_OP_SPC) => Some(BinaryOperator::ConcatenateSpace),
                    Some(KW_OP_TAB) => Some(BinaryOperator::ConcatenateTab),
                    Some(KW_OP_NL) => Some(BinaryOperator::ConcatenateNewline),
                    _ => None,
                },
                _ => None
            },
            Self::consume_shift_expression
        )
    }

    fn consume_shift_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::ShiftLeft) => Some(BinaryOperator::ShiftLeft),
                Some(TokenKind::ShiftRight) => Some(BinaryOperator::ShiftRight),
                _ => None
            },
            Self::consume_add_or_subtract_expression
        )
    }

    fn consume_add_or_subtract_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::Plus) => Some(BinaryOperator::Add),
                Some(TokenKind::Minus) => Some(BinaryOperator::Subtract),
                _ => None
            },
            Self::consume_multiply_divide_or_modulus_expression
        )
    }

    fn consume_multiply_divide_or_modulus_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        self.consume_generic_binary_expression(
            source, iter, ctx,
            |_, token| match token {
                Some(TokenKind::Star) => Some(BinaryOperator::Multiply),
                Some(TokenKind::Slash) => Some(BinaryOperator::Divide),
                Some(TokenKind::Percent) => Some(BinaryOperator::Remainder),
                _ => None
            },
            Self::consume_prefix_expression
        )
    }

    fn consume_prefix_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        fn parse_prefix_token(token: Option<TokenKind>) -> Option<UnaryOperator> {
            use TokenKind as TK;
            use UnaryOperator as UO;
            match token {
                Some(TK::Minus) => Some(UO::Negate),
                Some(TK::PlusPlus) => Some(UO::PreIncrement),
                Some(TK::MinusMinus) => Some(UO::PreDecrement),
                Some(TK::Tilde) => Some(UO::BitwiseNot),
                Some(TK::Exclamation) => Some(UO::LogicalNot),
                _ => None
            }
        }

        if let Some(operation) = parse_prefix_token(iter.next()) {
            let span = iter.next_span();
            iter.consume();

            self.enter_nesting(source, iter)?;
            let expression = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.consume_prefix_expression(source, iter, ctx)
            });
            self.depth -= 1;
            let expression = expression?;
            if operation.writes_operand() && !ctx.heap[expression].is_assignable() {
                return Err(ParseError::new_error_str_at_span(
                    source, span, "operand of '++' or '--' must be a variable or field"
                ));
            }
            Ok(ctx.heap.alloc_unary_expression(|this| UnaryExpression {
                this, span, operation, expression,
            }).upcast())
        } else {
            self.consume_postfix_expression(source, iter, ctx)
        }
    }

    fn consume_postfix_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        fn has_matching_postfix_token(token: Option<TokenKind>) -> bool {
            use TokenKind as TK;
            match token {
                Some(TK::PlusPlus) | Some(TK::MinusMinus) | Some(TK::Dot) => true,
                _ => false
            }
        }

        let mut result = self.consume_primary_expression(source, iter, ctx)?;
        let mut next = iter.next();
        while has_matching_postfix_token(next) {
            let token = next.unwrap_or(TokenKind::Dot);
            let span = iter.next_span();
            iter.consume();

            if token == TokenKind::PlusPlus || token == TokenKind::MinusMinus {
                if !ctx.heap[result].is_assignable() {
                    return Err(ParseError::new_error_str_at_span(
                        source, span, "operand of '++' or '--' must be a variable or field"
                    ));
                }
                let operation = if token == TokenKind::PlusPlus {
                    UnaryOperator::PostIncrement
                } else {
                    UnaryOperator::PostDecrement
                };
                let expression = result;
                result = ctx.heap.alloc_unary_expression(|this| UnaryExpression{
                    this, span, operation, expression,
                }).upcast();
            } else {
                debug_assert_eq!(token, TokenKind::Dot);
                let object = result;
                let (field_text, field_span) = consume_any_ident(source, iter)?;
                let identifier = ctx.pool.intern(&String::from_utf8_lossy(field_text));

                if iter.next() == Some(TokenKind::OpenParen) {
                    // Method call, the object becomes the first argument
                    let arguments = self.consume_call_arguments(source, iter, ctx)?;
                    result = ctx.heap.alloc_call_expression(|this| CallExpression{
                        this, span: field_span,
                        target: CallTarget::Method{ object, identifier },
                        arguments,
                    }).upcast();
                } else {
                    let indices = self.maybe_consume_indices(source, iter, ctx)?;
                    result = ctx.heap.alloc_slot_expression(|this| SlotExpression{
                        this, span: field_span, object, field: identifier, indices,
                    }).upcast();
                }
            }

            next = iter.next();
        }

        Ok(result)
    }

    fn consume_primary_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        let next = iter.next();

        let result;
        if next == Some(TokenKind::OpenParen) {
            // Expression between parentheses
            result = self.consume_parenthesized_expression(source, iter, ctx)?;
        } else if next == Some(TokenKind::Number) {
            let (value, span) = consume_number_literal(source, iter)?;
            result = ctx.heap.alloc_literal_expression(|this| LiteralExpression{
                this, span, value,
            }).upcast();
        } else if next == Some(TokenKind::String) || next == Some(TokenKind::Tagged) {
            let (is_tagged, span) = consume_string_literal(source, iter, &mut self.buffer)?;
            let interned = ctx.pool.intern_case_sensitive(&self.buffer);
            let value = if is_tagged { Literal::Tagged(interned) } else { Literal::String(interned) };
            result = ctx.heap.alloc_literal_expression(|this| LiteralExpression{
                this, span, value,
            }).upcast();
        } else if next == Some(TokenKind::LocalVar) || next == Some(TokenKind::GlobalVar) {
            let (name, is_global, span) = consume_variable_name(source, iter)?;
            let identifier = ctx.pool.intern(name);
            let indices = self.maybe_consume_indices(source, iter, ctx)?;
            result = ctx.heap.alloc_variable_expression(|this| VariableExpression{
                this, span, identifier, is_global, indices,
            }).upcast();
        } else if next == Some(TokenKind::Ident) {
            result = self.consume_identifier_expression(source, iter, ctx)?;
        } else {
            return Err(ParseError::new_error_str_at_pos(
                source, iter.last_valid_pos(), "expected an expression"
            ));
        }

        Ok(result)
    }

    /// Anything starting with an identifier: literals, object creation, calls
    /// and bare words (which evaluate to their own text).
    fn consume_identifier_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ExpressionId, ParseError> {
        let ident = peek_ident(source, iter).unwrap_or(b"");
        if ident == KW_LIT_TRUE || ident == KW_LIT_FALSE {
            let span = iter.next_span();
            let value = Literal::Integer(if ident == KW_LIT_TRUE { 1 } else { 0 });
            iter.consume();
            return Ok(ctx.heap.alloc_literal_expression(|this| LiteralExpression{
                this, span, value,
            }).upcast());
        } else if ident == KW_NEW {
            return Ok(self.consume_new_expression(source, iter, ctx)?.upcast());
        } else if ident == KW_FUNC_DETAG && iter.peek_second() == Some(TokenKind::OpenParen) {
            let span = consume_exact_ident(source, iter, KW_FUNC_DETAG)?;
            let expression = self.consume_parenthesized_expression(source, iter, ctx)?;
            return Ok(ctx.heap.alloc_tag_deref_expression(|this| TagDerefExpression{
                this, span, expression,
            }).upcast());
        }

        let (first, mut span) = consume_ident(source, iter)?;
        if maybe_consume_token(iter, TokenKind::ColonColon) {
            // Qualified call, `Ns::name(...)` or `Parent::name(...)`
            let is_parent = first.as_bytes().eq_ignore_ascii_case(KW_PARENT);
            let namespace = ctx.pool.intern(first);
            let (second, second_span) = consume_ident(source, iter)?;
            span.end = second_span.end;
            let identifier = ctx.pool.intern(second);
            let arguments = self.consume_call_arguments(source, iter, ctx)?;
            let target = if is_parent {
                CallTarget::Parent{ identifier }
            } else {
                CallTarget::Qualified{ namespace, identifier }
            };
            return Ok(ctx.heap.alloc_call_expression(|this| CallExpression{
                this, span, target, arguments,
            }).upcast());
        } else if iter.next() == Some(TokenKind::OpenParen) {
            let identifier = ctx.pool.intern(first);
            let arguments = self.consume_call_arguments(source, iter, ctx)?;
            return Ok(ctx.heap.alloc_call_expression(|this| CallExpression{
                this, span, target: CallTarget::Function{ identifier }, arguments,
            }).upcast());
        }

        let value = Literal::String(ctx.pool.intern_case_sensitive(first));
        Ok(ctx.heap.alloc_literal_expression(|this| LiteralExpression{
            this, span, value,
        }).upcast())
    }

    /// `new Class(name : copySource) { field = value; new Child() {}; }`. The
    /// name, the copy source and the body are all optional.
    fn consume_new_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ObjectExpressionId, ParseError> {
        let mut span = consume_exact_ident(source, iter, KW_NEW)?;
        let (class_text, class_span) = consume_ident(source, iter)?;
        span.end = class_span.end;
        let class_name = ctx.pool.intern(class_text);

        consume_token(source, iter, TokenKind::OpenParen)?;
        let name = match iter.next() {
            Some(TokenKind::CloseParen) | Some(TokenKind::Colon) => None,
            _ => Some(self.consume_expression(source, iter, ctx)?),
        };
        let copy_source = self.maybe_consume_copy_source(source, iter, ctx)?;
        consume_token(source, iter, TokenKind::CloseParen)?;

        let (fields, children) = if iter.next() == Some(TokenKind::OpenCurly) {
            self.consume_object_body(source, iter, ctx)?
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(ctx.heap.alloc_object_expression(|_, object| {
            object.span = span;
            object.class_name = Some(class_name);
            object.name = name;
            object.copy_source = copy_source;
            object.fields = fields;
            object.children = children;
        }))
    }

    /// `datablock Class(Name : Parent) { ... }`, the name is a plain
    /// identifier and the body is required.
    fn consume_datablock_expression(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<ObjectExpressionId, ParseError> {
        let mut span = consume_exact_ident(source, iter, KW_DATABLOCK)?;
        let (class_text, class_span) = consume_ident(source, iter)?;
        span.end = class_span.end;
        let class_name = ctx.pool.intern(class_text);

        consume_token(source, iter, TokenKind::OpenParen)?;
        let (name_text, name_span) = consume_ident(source, iter)?;
        let name_value = Literal::String(ctx.pool.intern_case_sensitive(name_text));
        let name = ctx.heap.alloc_literal_expression(|this| LiteralExpression{
            this, span: name_span, value: name_value,
        }).upcast();
        let copy_source = self.maybe_consume_copy_source(source, iter, ctx)?;
        consume_token(source, iter, TokenKind::CloseParen)?;
        let (fields, children) = self.consume_object_body(source, iter, ctx)?;

        Ok(ctx.heap.alloc_object_expression(|_, object| {
            object.span = span;
            object.class_name = Some(class_name);
            object.name = Some(name);
            object.copy_source = copy_source;
            object.is_datablock = true;
            object.fields = fields;
            object.children = children;
        }))
    }

    fn maybe_consume_copy_source(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<Option<StringRef>, ParseError> {
        if !maybe_consume_token(iter, TokenKind::Colon) {
            return Ok(None);
        }
        let (copy_text, _) = consume_ident(source, iter)?;
        Ok(Some(ctx.pool.intern(copy_text)))
    }

    fn consume_object_body(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<(Vec<FieldInitializer>, Vec<ObjectExpressionId>), ParseError> {
        consume_token(source, iter, TokenKind::OpenCurly)?;
        let mut fields = Vec::new();
        let mut children = Vec::new();
        loop {
            match iter.next() {
                Some(TokenKind::CloseCurly) => break,
                Some(TokenKind::SemiColon) => iter.consume(),
                Some(TokenKind::Ident) if has_ident(source, iter, KW_NEW) => {
                    children.push(self.consume_new_expression(source, iter, ctx)?);
                    consume_token(source, iter, TokenKind::SemiColon)?;
                },
                Some(TokenKind::Ident) if has_ident(source, iter, KW_DATABLOCK) => {
                    children.push(self.consume_datablock_expression(source, iter, ctx)?);
                    consume_token(source, iter, TokenKind::SemiColon)?;
                },
                Some(TokenKind::Ident) => {
                    // Field names may be keywords, e.g. `default = 1;`
                    let (field_text, mut span) = consume_any_ident(source, iter)?;
                    let field = ctx.pool.intern(&String::from_utf8_lossy(field_text));
                    let indices = self.maybe_consume_indices(source, iter, ctx)?;
                    consume_token(source, iter, TokenKind::Equal)?;
                    let value = self.consume_expression(source, iter, ctx)?;
                    let end_span = consume_token(source, iter, TokenKind::SemiColon)?;
                    span.end = end_span.end;
                    fields.push(FieldInitializer{ span, field, indices, value });
                },
                _ => return Err(ParseError::new_error_str_at_pos(
                    source, iter.last_valid_pos(), "expected a field assignment or a nested object"
                )),
            }
        }
        consume_token(source, iter, TokenKind::CloseCurly)?;

        Ok((fields, children))
    }

    //--------------------------------------------------------------------------
    // Expression Utilities
    //--------------------------------------------------------------------------

    fn consume_call_arguments(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<Vec<ExpressionId>, ParseError> {
        let mut arguments = Vec::new();
        consume_comma_separated(
            TokenKind::OpenParen, TokenKind::CloseParen, source, iter,
            |source, iter| self.consume_expression(source, iter, ctx),
            &mut arguments, "an argument", "a list of arguments"
        )?;
        Ok(arguments)
    }

    /// `[i]` or `[i, j]` after a variable or a field name.
    fn maybe_consume_indices(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx
    ) -> Result<Vec<ExpressionId>, ParseError> {
        let mut indices = Vec::new();
        let start_pos = iter.last_valid_pos();
        let had_indices = maybe_consume_comma_separated(
            TokenKind::OpenSquare, TokenKind::CloseSquare, source, iter,
            |source, iter| self.consume_expression(source, iter, ctx),
            &mut indices, "an index"
        )?;
        if had_indices && indices.is_empty() {
            return Err(ParseError::new_error_str_at_pos(source, start_pos, "expected at least one index"));
        }
        Ok(indices)
    }

    #[inline]
    fn consume_generic_binary_expression<
        M: Fn(Option<&[u8]>, Option<TokenKind>) -> Option<BinaryOperator>,
        F: Fn(&mut PassDefinitions, &InputSource, &mut TokenIter, &mut PassCtx) -> Result<ExpressionId, ParseError>
    >(
        &mut self, source: &InputSource, iter: &mut TokenIter, ctx: &mut PassCtx, match_fn: M, higher_precedence_fn: F
    ) -> Result<ExpressionId, ParseError> {
        let mut result = higher_precedence_fn(self, source, iter, ctx)?;
        while let Some(operation) = match_fn(peek_ident(source, iter), iter.next()) {
            let span: InputSpan = iter.next_span();
            iter.consume();

            let left = result;
            let right = higher_precedence_fn(self, source, iter, ctx)?;

            result = ctx.heap.alloc_binary_expression(|this| BinaryExpression{
                this, span, left, operation, right,
            }).upcast();
        }

        Ok(result)
    }
}
