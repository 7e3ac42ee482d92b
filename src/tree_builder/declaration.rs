use crate::{
    ast::{Body, FunctionDecl, Node, TypeName, TypeSpecifier},
    tokenizer::{Token, TokenType},
};

use super::BuildError;

#[derive(Debug, PartialEq)]
pub enum Recognition {
    /// Not a declaration token; the expression path handles it.
    Declined,
    /// Part of a declaration that is still being read.
    Consumed,
    Complete(Node),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Specifier(TypeName),
    Named {
        type_name: TypeName,
        name: String,
    },
    Parameters {
        header: FunctionDecl,
        expecting: Expecting,
    },
    /// Discarding a broken declaration up to the next `;`.
    Skipping,
}

#[derive(Debug, Clone, Copy)]
enum Expecting {
    FirstParameterOrClose,
    ParameterSpecifier,
    ParameterName(TypeName),
    CommaOrClose,
}

/// Recognizes `int x;`, `system_handler h;` and function headers `int f(int a, float b)`.
#[derive(Debug, Default)]
pub struct DeclarationReader {
    state: State,
}

impl DeclarationReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_to_build_declaration(&mut self, token: &Token) -> Result<Recognition, BuildError> {
        let state = std::mem::take(&mut self.state);
        let result = self.advance(state, token);
        if result.is_err() {
            self.state = match token.token_type() {
                TokenType::Semicolon
                | TokenType::Do
                | TokenType::Done
                | TokenType::Else
                | TokenType::Eof => State::Idle,
                _ => State::Skipping,
            };
        }
        result
    }

    fn advance(&mut self, state: State, token: &Token) -> Result<Recognition, BuildError> {
        let token_type = *token.token_type();
        match (state, token_type) {
            (State::Idle, TokenType::Specifier) => {
                self.state = State::Specifier(specifier(token)?);
                Ok(Recognition::Consumed)
            }
            (State::Idle, _) => Ok(Recognition::Declined),

            (State::Specifier(type_name), TokenType::Name) => {
                self.state = State::Named {
                    type_name,
                    name: token.lexeme.clone(),
                };
                Ok(Recognition::Consumed)
            }
            (State::Specifier(_), _) => Err(BuildError::ExpectedInDeclaration("a name")),

            (State::Named { type_name, name }, TokenType::Semicolon) => {
                Ok(Recognition::Complete(match type_name {
                    TypeName::SystemHandler => Node::SystemHandler(name),
                    type_name => Node::TypeSpecifier(TypeSpecifier { name, type_name }),
                }))
            }
            (
                State::Named {
                    type_name: TypeName::SystemHandler,
                    ..
                },
                TokenType::OpeningParenthesis,
            ) => Err(BuildError::HandlerParameters),
            (State::Named { type_name, name }, TokenType::OpeningParenthesis) => {
                self.state = State::Parameters {
                    header: FunctionDecl {
                        name,
                        return_type: type_name,
                        params: Vec::new(),
                        body: Body::default(),
                    },
                    expecting: Expecting::FirstParameterOrClose,
                };
                Ok(Recognition::Consumed)
            }
            (State::Named { .. }, _) => Err(BuildError::ExpectedInDeclaration("\";\" or \"(\"")),

            (State::Parameters { header, expecting }, token_type) => {
                self.parameter(header, expecting, token_type, token)
            }

            (State::Skipping, TokenType::Semicolon) => Ok(Recognition::Consumed),
            (
                State::Skipping,
                TokenType::Do | TokenType::Done | TokenType::Else | TokenType::Eof,
            ) => Ok(Recognition::Declined),
            (State::Skipping, _) => {
                self.state = State::Skipping;
                Ok(Recognition::Consumed)
            }
        }
    }

    fn parameter(
        &mut self,
        mut header: FunctionDecl,
        expecting: Expecting,
        token_type: TokenType,
        token: &Token,
    ) -> Result<Recognition, BuildError> {
        let expecting = match (expecting, token_type) {
            (
                Expecting::FirstParameterOrClose | Expecting::CommaOrClose,
                TokenType::ClosingParenthesis,
            ) => return Ok(Recognition::Complete(Node::Function(header))),
            (
                Expecting::FirstParameterOrClose | Expecting::ParameterSpecifier,
                TokenType::Specifier,
            ) => Expecting::ParameterName(specifier(token)?),
            (Expecting::ParameterName(type_name), TokenType::Name) => {
                header.params.push(TypeSpecifier {
                    name: token.lexeme.clone(),
                    type_name,
                });
                Expecting::CommaOrClose
            }
            (Expecting::CommaOrClose, TokenType::Comma) => Expecting::ParameterSpecifier,
            (_, TokenType::Eof) => return Err(BuildError::UnfinishedDeclaration),
            (Expecting::ParameterName(_), _) => {
                return Err(BuildError::ExpectedInDeclaration("a parameter name"))
            }
            (Expecting::CommaOrClose, _) => {
                return Err(BuildError::ExpectedInDeclaration("\",\" or \")\""))
            }
            (Expecting::FirstParameterOrClose | Expecting::ParameterSpecifier, _) => {
                return Err(BuildError::ExpectedInDeclaration("a parameter type"))
            }
        };

        self.state = State::Parameters { header, expecting };
        Ok(Recognition::Consumed)
    }
}

fn specifier(token: &Token) -> Result<TypeName, BuildError> {
    TypeName::from_specifier(&token.lexeme)
        .ok_or_else(|| BuildError::UnknownSpecifier(token.lexeme.clone()))
}
