use crate::tokenizer::{Token, TokenType};

use super::BuildError;

#[derive(Debug, Clone)]
enum Operator {
    Binary(Token),
    /// `put`, `ret`, `if`, `while`, `for`. Emitted after everything else in the statement.
    Prefix(Token),
    Parenthesis,
    Call { name: Token, output_len: usize },
}

/// Turns one statement at a time into postfix order.
///
/// Every statement end produces a `NextLine` marker. `do`, `done` and `else` are statement
/// ends as well and are forwarded right after that marker.
#[derive(Debug, Default)]
pub struct PostfixConverter {
    output: Vec<Token>,
    operators: Vec<Operator>,
    deferred_name: Option<Token>,
    skipping: bool,
}

fn precedence(token_type: &TokenType) -> u8 {
    match token_type {
        TokenType::Comma => 1,
        TokenType::Assign => 2,
        TokenType::Or => 3,
        TokenType::And => 4,
        TokenType::BooleanOperator => 5,
        TokenType::AddOperator => 6,
        TokenType::MultOperator => 7,
        TokenType::Dot => 8,
        _ => 0,
    }
}

fn is_right_associative(token_type: &TokenType) -> bool {
    matches!(token_type, TokenType::Assign)
}

impl PostfixConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one token and returns the postfix tokens that became ready.
    pub fn generate_postfix_representation(
        &mut self,
        token: &Token,
    ) -> Result<Vec<Token>, BuildError> {
        let ends_statement = matches!(
            token.token_type(),
            TokenType::Semicolon
                | TokenType::Do
                | TokenType::Done
                | TokenType::Else
                | TokenType::Eof
        );

        if self.skipping {
            if !ends_statement {
                return Ok(Vec::new());
            }
            self.skipping = false;
        }

        match self.convert(token) {
            Ok(ready) => Ok(ready),
            Err(error) => {
                self.reset();
                self.skipping = !ends_statement;
                Err(error)
            }
        }
    }

    fn convert(&mut self, token: &Token) -> Result<Vec<Token>, BuildError> {
        if let Some(name) = self.deferred_name.take() {
            if token.token_type() == &TokenType::OpeningParenthesis {
                self.operators.push(Operator::Call {
                    name,
                    output_len: self.output.len(),
                });
                return Ok(Vec::new());
            }
            self.output.push(name);
        }

        match token.token_type() {
            TokenType::Name => self.deferred_name = Some(token.clone()),
            TokenType::IntNumber | TokenType::RealNumber | TokenType::String => {
                self.output.push(token.clone())
            }
            TokenType::Put
            | TokenType::Ret
            | TokenType::If
            | TokenType::While
            | TokenType::For => self.operators.push(Operator::Prefix(token.clone())),
            TokenType::In => self.close_for_iterator()?,
            TokenType::AddOperator
            | TokenType::MultOperator
            | TokenType::BooleanOperator
            | TokenType::And
            | TokenType::Or
            | TokenType::Assign
            | TokenType::Dot => self.push_binary(token),
            TokenType::Comma => {
                self.push_binary(token);
                if !matches!(
                    self.operators.iter().rev().nth(1),
                    Some(Operator::Call { .. })
                ) {
                    return Err(BuildError::CommaOutsideCall);
                }
            }
            TokenType::OpeningParenthesis => {
                self.operators.push(Operator::Parenthesis)
            }
            TokenType::ClosingParenthesis => self.close_parenthesis(token)?,
            TokenType::Semicolon | TokenType::Eof => {
                return self.finish_statement(token, None);
            }
            TokenType::Do | TokenType::Else => {
                let mut ready = self.finish_statement(token, Some(token.clone()))?;
                ready.push(token.retyped(TokenType::NextLine));
                return Ok(ready);
            }
            TokenType::Done => return self.finish_statement(token, Some(token.clone())),
            token_type @ (TokenType::Specifier
            | TokenType::FunctionCall
            | TokenType::NoArgFunctionName
            | TokenType::NextLine) => return Err(BuildError::Unexpected(*token_type)),
        }

        Ok(Vec::new())
    }

    fn push_binary(&mut self, token: &Token) {
        let incoming = precedence(token.token_type());
        while let Some(Operator::Binary(top)) = self.operators.last() {
            let stacked = precedence(top.token_type());
            let pops = stacked > incoming
                || (stacked == incoming && !is_right_associative(token.token_type()));
            if !pops {
                break;
            }
            if let Some(Operator::Binary(top)) = self.operators.pop() {
                self.output.push(top);
            }
        }
        self.operators.push(Operator::Binary(token.clone()));
    }

    fn pop_binaries(&mut self) {
        while let Some(Operator::Binary(_)) = self.operators.last() {
            if let Some(Operator::Binary(top)) = self.operators.pop() {
                self.output.push(top);
            }
        }
    }

    fn close_for_iterator(&mut self) -> Result<(), BuildError> {
        self.pop_binaries();
        match self.operators.last() {
            Some(Operator::Prefix(top)) if top.token_type() == &TokenType::For => Ok(()),
            _ => Err(BuildError::InOutsideFor),
        }
    }

    /// A closed call covers its name through the closing parenthesis.
    fn close_parenthesis(&mut self, closing: &Token) -> Result<(), BuildError> {
        self.pop_binaries();
        match self.operators.pop() {
            Some(Operator::Parenthesis) => Ok(()),
            Some(Operator::Call { name, output_len }) => {
                let token_type = if self.output.len() == output_len {
                    TokenType::NoArgFunctionName
                } else {
                    TokenType::FunctionCall
                };
                let mut call = name.retyped(token_type);
                call.span = name.span + closing.span;
                self.output.push(call);
                Ok(())
            }
            _ => Err(BuildError::UnbalancedParenthesis),
        }
    }

    fn finish_statement(
        &mut self,
        end: &Token,
        forwarded: Option<Token>,
    ) -> Result<Vec<Token>, BuildError> {
        if let Some(name) = self.deferred_name.take() {
            self.output.push(name);
        }

        while let Some(operator) = self.operators.pop() {
            match operator {
                Operator::Binary(token) | Operator::Prefix(token) => self.output.push(token),
                Operator::Parenthesis | Operator::Call { .. } => {
                    return Err(BuildError::UnbalancedParenthesis)
                }
            }
        }

        let mut ready = std::mem::take(&mut self.output);
        ready.push(end.retyped(TokenType::NextLine));
        ready.extend(forwarded);
        Ok(ready)
    }

    fn reset(&mut self) {
        self.output.clear();
        self.operators.clear();
        self.deferred_name = None;
    }
}
