mod converter;
mod declaration;

use crate::{
    ast::{ArithmeticOperator, Body, BooleanOperator, File, Node, Root},
    tokenizer::{Token, TokenType},
};

pub use self::{
    converter::PostfixConverter,
    declaration::{DeclarationReader, Recognition},
};

#[derive(Debug)]
pub struct BuildErrors(pub Vec<BuildErrorWithContext>);

impl std::error::Error for BuildErrors {}

impl std::fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Found {} errors while building the tree", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl BuildErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
pub struct BuildErrorWithContext {
    pub error: BuildError,
    pub token: Token,
}

impl std::fmt::Display for BuildErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {} near \"{}\"",
            self.error, self.token.span, self.token.lexeme
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Not enough operands for \"{0}\"")]
    NotEnoughOperands(String),
    #[error("Invalid number \"{0}\"")]
    InvalidNumber(String),
    #[error("Unknown operator \"{0}\"")]
    UnknownOperator(String),
    #[error("Unknown type specifier \"{0}\"")]
    UnknownSpecifier(String),
    #[error("\"done\" without a matching \"do\"")]
    UnmatchedDone,
    #[error("\"do\" is never closed by \"done\"")]
    UnclosedDo,
    #[error("\"if\", \"while\" and \"for\" need a \"do\" block")]
    MissingBlock,
    #[error("\"else\" block must follow a closed \"if\" block")]
    UnattachableElse,
    #[error("\"else\" without a block")]
    DanglingElse,
    #[error("Unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("\",\" outside of a function call")]
    CommaOutsideCall,
    #[error("\"in\" outside of a for loop")]
    InOutsideFor,
    #[error("Unexpected \"{0}\"")]
    Unexpected(TokenType),
    #[error("Expected {0} in declaration")]
    ExpectedInDeclaration(&'static str),
    #[error("System handler declaration cannot take parameters")]
    HandlerParameters,
    #[error("Unexpected end of file in declaration")]
    UnfinishedDeclaration,
}

/// Result of a tolerant build: every statement that could be built, plus what went wrong.
#[derive(Debug)]
pub struct Built {
    pub file: File,
    pub errors: BuildErrors,
}

/// Assembles roots out of postfix tokens with two stacks.
///
/// `recent_expressions` holds partial subtrees used as operands, `roots` the finished
/// statements. A `do` marker travels from the first to the second and is consumed by the
/// matching `done`.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    recent_expressions: Vec<Node>,
    roots: Vec<Root>,
    open_blocks: Vec<Token>,
    errors: Vec<BuildErrorWithContext>,
    skipping: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_declaration(&mut self, declaration: Node, token: &Token) {
        tracing::trace!(%declaration, "declaration");
        self.drop_header_without_block(token);
        self.roots.push(Root(declaration));
    }

    pub fn report(&mut self, error: BuildError, token: &Token) {
        tracing::debug!(%error, %token, "build error");
        self.errors.push(BuildErrorWithContext {
            error,
            token: token.clone(),
        });
    }

    /// Consumes one postfix token. Errors discard the statement being built.
    pub fn parse_token(&mut self, token: &Token) {
        let structural = matches!(
            token.token_type(),
            TokenType::NextLine | TokenType::Do | TokenType::Done | TokenType::Else
        );
        if self.skipping {
            if !structural {
                return;
            }
            self.skipping = false;
            self.recent_expressions.clear();
            if token.token_type() == &TokenType::NextLine {
                return;
            }
        }

        tracing::trace!(%token, "tree node");
        if let Err(error) = self.transform_token_into_tree_node(token) {
            self.recent_expressions.clear();
            self.skipping = !structural;
            self.report(error, token);
        }
    }

    fn transform_token_into_tree_node(&mut self, token: &Token) -> Result<(), BuildError> {
        let lexeme = &token.lexeme;
        match token.token_type() {
            TokenType::IntNumber => {
                let value = lexeme
                    .parse()
                    .map_err(|_| BuildError::InvalidNumber(lexeme.clone()))?;
                self.recent_expressions.push(Node::Int(value));
            }
            TokenType::RealNumber => {
                let value = lexeme
                    .parse()
                    .map_err(|_| BuildError::InvalidNumber(lexeme.clone()))?;
                self.recent_expressions.push(Node::Real(value));
            }
            TokenType::Name => self.recent_expressions.push(Node::Name(lexeme.clone())),
            TokenType::String => self.recent_expressions.push(Node::Str(lexeme.clone())),
            TokenType::NoArgFunctionName => self
                .recent_expressions
                .push(Node::NoArgFunction(lexeme.clone())),
            TokenType::AddOperator | TokenType::MultOperator => {
                let operator = ArithmeticOperator::from_lexeme(lexeme)
                    .ok_or_else(|| BuildError::UnknownOperator(lexeme.clone()))?;
                self.set_double_args_expr(token, |left, right| Node::Arithmetic {
                    operator,
                    left,
                    right,
                })?;
            }
            TokenType::BooleanOperator => {
                let operator = BooleanOperator::from_lexeme(lexeme)
                    .ok_or_else(|| BuildError::UnknownOperator(lexeme.clone()))?;
                self.set_double_args_expr(token, |left, right| Node::Boolean {
                    operator,
                    left,
                    right,
                })?;
            }
            TokenType::And => self.set_double_args_expr(token, |left, right| Node::Boolean {
                operator: BooleanOperator::And,
                left,
                right,
            })?,
            TokenType::Or => self.set_double_args_expr(token, |left, right| Node::Boolean {
                operator: BooleanOperator::Or,
                left,
                right,
            })?,
            TokenType::Assign => {
                self.set_double_args_expr(token, |target, value| Node::Assign { target, value })?
            }
            TokenType::Dot => self.set_double_args_expr(token, |object, field| {
                Node::FieldReference { object, field }
            })?,
            TokenType::Comma => self.set_double_args_expr(token, |left, right| {
                Node::FunctionArg {
                    left,
                    right: Some(right),
                }
            })?,
            TokenType::FunctionCall => {
                let arguments = match self.pop_operand(token)? {
                    chain @ Node::FunctionArg { .. } => chain,
                    only => Node::FunctionArg {
                        left: Box::new(only),
                        right: None,
                    },
                };
                self.recent_expressions.push(Node::FunctionCall {
                    name: lexeme.clone(),
                    arguments: Box::new(arguments),
                });
            }
            TokenType::Put => {
                let operand = self.pop_operand(token)?;
                self.recent_expressions.push(Node::Put(Box::new(operand)));
            }
            TokenType::Ret => {
                let operand = self.pop_operand(token)?;
                self.recent_expressions.push(Node::Return(Box::new(operand)));
            }
            TokenType::If => {
                let condition = self.pop_operand(token)?;
                self.recent_expressions.push(Node::If {
                    condition: Box::new(condition),
                    body: None,
                    else_body: None,
                });
            }
            TokenType::While => {
                let condition = self.pop_operand(token)?;
                self.recent_expressions.push(Node::While {
                    condition: Box::new(condition),
                    body: None,
                });
            }
            TokenType::For => self.set_double_args_expr(token, |iterator, collection| Node::For {
                iterator,
                collection,
                body: None,
            })?,
            TokenType::Else => self.recent_expressions.push(Node::Else),
            TokenType::Do => {
                self.open_blocks.push(token.clone());
                self.recent_expressions.push(Node::Do);
            }
            TokenType::Done => self.close_block(token)?,
            TokenType::NextLine => self.assign_tree_to_root(token),
            token_type @ (TokenType::Specifier
            | TokenType::In
            | TokenType::Semicolon
            | TokenType::OpeningParenthesis
            | TokenType::ClosingParenthesis
            | TokenType::Eof) => return Err(BuildError::Unexpected(*token_type)),
        }
        Ok(())
    }

    fn pop_operand(&mut self, token: &Token) -> Result<Node, BuildError> {
        match self.recent_expressions.pop() {
            Some(Node::Do) | None => Err(BuildError::NotEnoughOperands(token.lexeme.clone())),
            Some(node) => Ok(node),
        }
    }

    /// Right operand is popped first, then the left one.
    fn set_double_args_expr(
        &mut self,
        token: &Token,
        combine: impl FnOnce(Box<Node>, Box<Node>) -> Node,
    ) -> Result<(), BuildError> {
        let right = self.pop_operand(token)?;
        let left = self.pop_operand(token)?;
        self.recent_expressions
            .push(combine(Box::new(left), Box::new(right)));
        Ok(())
    }

    /// Drains pending nodes in stack order: the most recent one becomes a root first.
    fn assign_tree_to_root(&mut self, token: &Token) {
        while let Some(expr) = self.recent_expressions.pop() {
            if expr != Node::Do {
                self.drop_header_without_block(token);
            }
            self.roots.push(Root(expr));
        }
    }

    /// A control header only stays a root while its `do` may still follow.
    fn drop_header_without_block(&mut self, token: &Token) {
        if matches!(self.roots.last(), Some(root) if root.0.awaits_body()) {
            self.roots.pop();
            self.report(BuildError::MissingBlock, token);
        }
    }

    fn close_block(&mut self, token: &Token) -> Result<(), BuildError> {
        self.drop_header_without_block(token);
        let position = self
            .roots
            .iter()
            .rposition(|root| root.0 == Node::Do)
            .ok_or(BuildError::UnmatchedDone)?;

        let statements = self
            .roots
            .drain(position + 1..)
            .map(|root| root.0)
            .collect();
        self.roots.pop();
        self.open_blocks.pop();

        self.assign_body_to_upper_expression(Body(statements))
    }

    fn assign_body_to_upper_expression(&mut self, body: Body) -> Result<(), BuildError> {
        match self.roots.last_mut().map(|root| &mut root.0) {
            Some(Node::Else) => self.assign_body_to_upper_else(body),
            Some(Node::Function(declaration)) if declaration.body.0.is_empty() => {
                declaration.body.0.push(Node::Body(body));
                Ok(())
            }
            Some(
                Node::If { body: slot, .. }
                | Node::While { body: slot, .. }
                | Node::For { body: slot, .. },
            ) if slot.is_none() => {
                *slot = Some(body);
                Ok(())
            }
            _ => {
                self.roots.push(Root(Node::Body(body)));
                Ok(())
            }
        }
    }

    fn assign_body_to_upper_else(&mut self, body: Body) -> Result<(), BuildError> {
        self.roots.pop();
        match self.roots.last_mut().map(|root| &mut root.0) {
            Some(Node::If {
                body: Some(_),
                else_body,
                ..
            }) if else_body.is_none() => {
                *else_body = Some(body);
                Ok(())
            }
            _ => Err(BuildError::UnattachableElse),
        }
    }

    /// Flushes what is left and reports blocks that were never closed.
    pub fn finish(mut self, end: &Token) -> Built {
        self.assign_tree_to_root(end);
        self.drop_header_without_block(end);

        if let Some(position) = self.roots.iter().position(|root| root.0 == Node::Do) {
            let header = position
                .checked_sub(1)
                .filter(|&before| {
                    let node = &self.roots[before].0;
                    node.awaits_body() || *node == Node::Else
                })
                .unwrap_or(position);
            self.roots.truncate(header);
            for token in std::mem::take(&mut self.open_blocks) {
                self.report(BuildError::UnclosedDo, &token);
            }
        }

        let before = self.roots.len();
        self.roots.retain(|root| root.0 != Node::Else);
        if self.roots.len() != before {
            self.report(BuildError::DanglingElse, end);
        }

        Built {
            file: File(self.roots),
            errors: BuildErrors(self.errors),
        }
    }
}

/// Runs tokens through the declaration reader, the postfix converter and the tree builder.
pub fn build(tokens: &[Token]) -> Built {
    let mut declaration_reader = DeclarationReader::new();
    let mut converter = PostfixConverter::new();
    let mut builder = TreeBuilder::new();

    for token in tokens {
        tracing::trace!(%token, "parsing");

        match declaration_reader.try_to_build_declaration(token) {
            Ok(Recognition::Complete(declaration)) => {
                builder.add_declaration(declaration, token);
                continue;
            }
            Ok(Recognition::Consumed) => continue,
            Ok(Recognition::Declined) => {}
            Err(error) => {
                builder.report(error, token);
                if !is_block_structure(token) {
                    continue;
                }
            }
        }

        let postfix = match converter.generate_postfix_representation(token) {
            Ok(postfix) => postfix,
            Err(error) => {
                builder.report(error, token);
                if !is_block_structure(token) {
                    continue;
                }
                // The broken statement is gone, the block keyword itself must survive.
                match converter.generate_postfix_representation(token) {
                    Ok(postfix) => postfix,
                    Err(error) => {
                        builder.report(error, token);
                        continue;
                    }
                }
            }
        };

        for postfix_token in &postfix {
            builder.parse_token(postfix_token);
        }
    }

    let end = tokens
        .last()
        .cloned()
        .unwrap_or_else(|| Token::new(TokenType::Eof, "", Default::default()));
    builder.finish(&end)
}

/// Strict variant of [`build`]: any build error fails the whole file.
pub fn file(tokens: &[Token]) -> Result<File, BuildErrors> {
    let built = build(tokens);
    if built.errors.is_empty() {
        Ok(built.file)
    } else {
        Err(built.errors)
    }
}

fn is_block_structure(token: &Token) -> bool {
    matches!(
        token.token_type(),
        TokenType::Do | TokenType::Done | TokenType::Else | TokenType::Eof
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::tokens;
    use proptest::prelude::*;

    fn roots(source: &str) -> Vec<String> {
        let tokens = tokens(source).expect("Tokenize should work on valid program");
        let file = file(&tokens).expect("Build should work on valid program");
        file.0.iter().map(|root| root.to_string()).collect()
    }

    fn built(source: &str) -> Built {
        build(&tokens(source).expect("Tokenize should work"))
    }

    #[test]
    fn test_assignment() {
        assert_eq!(roots("x = 1 + 2 * 3;"), ["(= x (+ 1 (* 2 3)))"]);
    }

    #[test]
    fn test_declarations_bypass_expressions() {
        assert_eq!(roots("int x; x = 5; put x;"), ["(int x)", "(= x 5)", "(put x)"]);
    }

    #[test]
    fn test_if_block() {
        assert_eq!(
            roots("if x do y = 2; put y; done"),
            ["(if x (do (= y 2) (put y)))"]
        );
    }

    #[test]
    fn test_if_else_block() {
        assert_eq!(
            roots("if x do put 1; done else do put 0; done put 2;"),
            ["(if x (do (put 1)) else (do (put 0)))", "(put 2)"]
        );
    }

    #[test]
    fn test_nested_blocks() {
        assert_eq!(
            roots("while a do if b do put 1; done put 2; done"),
            ["(while a (do (if b (do (put 1))) (put 2)))"]
        );
    }

    #[test]
    fn test_for_block() {
        assert_eq!(
            roots("for i in 3 do put i; done"),
            ["(for i in 3 (do (put i)))"]
        );
    }

    #[test]
    fn test_function_declaration_body() {
        assert_eq!(
            roots("int f(int a) do put a; done f(x);"),
            ["(fn int f (int a) (do (do (put a))))", "f(x)"]
        );
    }

    #[test]
    fn test_function_call_arguments() {
        assert_eq!(roots("f(a, b, c);"), ["f(a, b, c)"]);
        assert_eq!(roots("g();"), ["g()"]);
    }

    #[test]
    fn test_handler_control() {
        assert_eq!(
            roots("system_handler h; h.start;"),
            ["(system_handler h)", "(. h start)"]
        );
    }

    #[test]
    fn test_standalone_block() {
        assert_eq!(roots("do put 1; done"), ["(do (put 1))"]);
        assert_eq!(
            roots("put 1; do put 2; done put 3;"),
            ["(put 1)", "(do (put 2))", "(put 3)"]
        );
        assert_eq!(
            roots("int x; do put 2; done"),
            ["(int x)", "(do (put 2))"]
        );
        assert_eq!(
            roots("if x do put 1; done do put 2; done"),
            ["(if x (do (put 1)))", "(do (put 2))"]
        );
    }

    #[test]
    fn test_block_after_function_body_stands_alone() {
        assert_eq!(
            roots("int f() do put 1; done do put 2; done put 3;"),
            ["(fn int f () (do (do (put 1))))", "(do (put 2))", "(put 3)"]
        );
    }

    #[test]
    fn test_independent_expressions_drain_in_stack_order() {
        assert_eq!(roots("1 2;"), ["2", "1"]);
    }

    #[test]
    fn test_not_enough_operands() {
        let built = built("x = ; put 1;");
        assert_eq!(built.errors.0.len(), 1);
        assert!(matches!(
            built.errors.0[0].error,
            BuildError::NotEnoughOperands(_)
        ));
        assert_eq!(built.file.0.len(), 1);
        assert_eq!(built.file.0[0].to_string(), "(put 1)");
    }

    #[test]
    fn test_unmatched_done() {
        let built = built("put 1; done put 2;");
        assert!(matches!(built.errors.0[0].error, BuildError::UnmatchedDone));
        let file: Vec<_> = built.file.0.iter().map(ToString::to_string).collect();
        assert_eq!(file, ["(put 1)", "(put 2)"]);
    }

    #[test]
    fn test_unclosed_do() {
        let built = built("put 1; if x do put 2;");
        assert!(matches!(built.errors.0[0].error, BuildError::UnclosedDo));
        let file: Vec<_> = built.file.0.iter().map(ToString::to_string).collect();
        assert_eq!(file, ["(put 1)"]);
    }

    #[test]
    fn test_header_without_block() {
        let if_only = built("if x; put 1;");
        assert_eq!(if_only.errors.0.len(), 1);
        assert!(matches!(if_only.errors.0[0].error, BuildError::MissingBlock));
        let file: Vec<_> = if_only.file.0.iter().map(ToString::to_string).collect();
        assert_eq!(file, ["(put 1)"]);

        let loops = built("while x; int y; do for i in 3; done");
        assert_eq!(loops.errors.0.len(), 2);
        assert!(loops
            .errors
            .0
            .iter()
            .all(|error| matches!(error.error, BuildError::MissingBlock)));
        let file: Vec<_> = loops.file.0.iter().map(ToString::to_string).collect();
        assert_eq!(file, ["(int y)", "(do)"]);

        let at_end = built("put 1; if x;");
        assert!(matches!(at_end.errors.0[0].error, BuildError::MissingBlock));
        assert_eq!(at_end.file.0.len(), 1);
    }

    #[test]
    fn test_else_without_if() {
        let built = built("put 1; else do put 2; done");
        assert!(matches!(
            built.errors.0[0].error,
            BuildError::UnattachableElse
        ));
    }

    #[test]
    fn test_dangling_else() {
        let built = built("if x do put 1; done else;");
        assert!(matches!(built.errors.0[0].error, BuildError::DanglingElse));
        assert_eq!(built.file.0.len(), 1);
    }

    #[test]
    fn test_recovers_after_broken_statement_inside_block() {
        let built = built("if x do put (1; put 2; done");
        assert_eq!(built.errors.0.len(), 1);
        let file: Vec<_> = built.file.0.iter().map(ToString::to_string).collect();
        assert_eq!(file, ["(if x (do (put 2)))"]);
    }

    #[test]
    fn test_broken_declaration_keeps_block_structure() {
        let built = built("int f(int) do put 1; done put 2;");
        assert_eq!(built.errors.0.len(), 1);
        assert!(built.file.0.iter().any(|root| root.to_string() == "(put 2)"));
    }

    proptest! {
        #[test]
        fn test_operands_keep_source_order(a in 0i64..1000, b in 0i64..1000, op in "[-+*/]") {
            let source = format!("{a} {op} {b};");
            let file = file(&tokens(&source).unwrap()).unwrap();
            let Node::Arithmetic { left, right, .. } = &file.0[0].0 else {
                panic!("expected arithmetic node");
            };
            prop_assert_eq!(left.as_ref(), &Node::Int(a));
            prop_assert_eq!(right.as_ref(), &Node::Int(b));
        }

        #[test]
        fn test_body_keeps_source_order(depth in 0usize..5, count in 1usize..6) {
            let statements: String = (0..count).map(|i| format!("put {i}; ")).collect();
            let source = format!(
                "{}{}{}",
                "while 1 do ".repeat(depth),
                statements,
                "done ".repeat(depth)
            );
            let file = file(&tokens(&source).unwrap()).unwrap();

            let mut nodes: Vec<Node> = file.0.into_iter().map(|root| root.0).collect();
            for _ in 0..depth {
                prop_assert_eq!(nodes.len(), 1);
                let Some(Node::While { body: Some(body), .. }) = nodes.pop() else {
                    panic!("expected while with a body");
                };
                nodes = body.0;
            }

            let expected: Vec<Node> = (0..count)
                .map(|i| Node::Put(Box::new(Node::Int(i as i64))))
                .collect();
            prop_assert_eq!(nodes, expected);
        }
    }
}
