use std::{fmt::Display, rc::Rc};

use crate::ast::{FunctionDecl, Node};

use super::{
    scope::{Context, Declarable},
    ExecutionErrorKind, Interpreter, Value,
};

/// Nested calls allowed before a call fails instead of exhausting the native stack.
pub const MAX_CALL_DEPTH: usize = 64;

/// Flattens a `FunctionArg` chain into source order.
pub fn argument_list(arguments: &Node) -> Vec<&Node> {
    match arguments {
        Node::FunctionArg { left, right } => {
            let mut list = argument_list(left);
            if let Some(right) = right {
                list.push(right);
            }
            list
        }
        argument => vec![argument],
    }
}

#[derive(Debug, Clone)]
pub struct CallableFunction {
    pub decl: Rc<FunctionDecl>,
}

impl CallableFunction {
    pub fn new(decl: Rc<FunctionDecl>) -> Self {
        Self { decl }
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    /// Arguments are bare caller variables. Each one must be declared with exactly the
    /// parameter's type; its current value, if any, is copied into the call context.
    fn bind_arguments(
        &self,
        interpreter: &Interpreter,
        arguments: &[&Node],
    ) -> Result<Context, ExecutionErrorKind> {
        let mut context = Context::default();

        for (param, argument) in self.decl.params.iter().zip(arguments) {
            let Node::Name(variable) = argument else {
                return Err(ExecutionErrorKind::ArgumentNotAVariable {
                    function: self.decl.name.clone(),
                    argument: argument.to_string(),
                });
            };

            let declared = interpreter
                .contexts
                .get(variable)
                .and_then(Declarable::type_name)
                .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(variable.clone()))?;
            if declared != param.type_name {
                return Err(ExecutionErrorKind::ArgumentMismatch {
                    function: self.decl.name.clone(),
                    parameter: param.name.clone(),
                    expected: param.type_name,
                    found: declared,
                });
            }

            context.declare(param.name.clone(), Declarable::Variable(param.type_name));
            if let Some(value) = interpreter.contexts.value(variable) {
                context.bind(param.name.clone(), value.clone());
            }
        }

        Ok(context)
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[&Node],
    ) -> Result<Value, ExecutionErrorKind> {
        if arguments.len() != self.arity() {
            return Err(ExecutionErrorKind::ArgumentCount {
                function: self.decl.name.clone(),
                given: arguments.len(),
                expected: self.arity(),
            });
        }

        if interpreter.call_depth >= MAX_CALL_DEPTH {
            return Err(ExecutionErrorKind::CallDepthExceeded(self.decl.name.clone()));
        }

        let context = self.bind_arguments(interpreter, arguments)?;
        interpreter.call_depth += 1;
        let result = interpreter
            .execute_in_context(context, |interpreter| interpreter.execute_body(&self.decl.body));
        interpreter.call_depth -= 1;
        let value = result?.unwrap_or(Value::Void);

        if value != Value::Void && !value.conforms_to(self.decl.return_type) {
            return Err(ExecutionErrorKind::ReturnTypeMismatch {
                function: self.decl.name.clone(),
                expected: self.decl.return_type,
                value,
            });
        }

        Ok(value)
    }
}

impl Display for CallableFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function {} {}>", self.decl.name, self.arity())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(name: &str) -> Box<Node> {
        Box::new(Node::Name(name.to_string()))
    }

    #[test]
    fn test_argument_list_order() {
        let chain = Node::FunctionArg {
            left: Box::new(Node::FunctionArg {
                left: name("a"),
                right: Some(name("b")),
            }),
            right: Some(name("c")),
        };
        let names: Vec<_> = argument_list(&chain)
            .into_iter()
            .filter_map(Node::name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_single_argument() {
        let chain = Node::FunctionArg {
            left: name("a"),
            right: None,
        };
        assert_eq!(argument_list(&chain), vec![&Node::Name("a".to_string())]);
    }
}
