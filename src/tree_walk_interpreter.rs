mod callable;
mod handler;
mod scope;

use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt::{Debug, Display},
    rc::Rc,
};

use crate::ast::{ArithmeticOperator, Body, BooleanOperator, File, Node, Root, TypeName};

pub use self::handler::{HandlerRegistry, HandlerState, SystemHandlers};
use self::{
    callable::{argument_list, CallableFunction},
    scope::{Context, ContextStack, Declarable},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    /// Unresolved name. Resolved to a variable's value wherever a value is needed.
    Name(String),
    Void,
}

impl Value {
    fn as_real(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Real(n) => Some(*n),
            _ => None,
        }
    }

    pub fn conforms_to(&self, type_name: TypeName) -> bool {
        match (type_name, self) {
            (TypeName::Int, Value::Int(_)) => true,
            (TypeName::UnsignedInt, Value::Int(n)) => *n >= 0,
            (TypeName::Float, Value::Real(_)) => true,
            (TypeName::String, Value::Str(_)) => true,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Name(name) => write!(f, "{}", name),
            Value::Void => Ok(()),
        }
    }
}

pub struct Interpreter {
    contexts: ContextStack,
    call_depth: usize,
    stdout: Rc<RefCell<dyn std::io::Write>>,
    handlers: Rc<RefCell<dyn SystemHandlers>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("contexts", &self.contexts)
            .field("call_depth", &self.call_depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Error executing statement: {current_statement} - {kind}")]
    Execution {
        kind: ExecutionErrorKind,
        current_statement: Node,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> &ExecutionErrorKind {
        match self {
            ExecutionError::Execution { kind, .. } => kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("No value assigned to variable: {0}")]
    UnassignedVariable(String),
    #[error("Undeclared function: {0}")]
    UndeclaredFunction(String),
    #[error("Undeclared system handler: {0}")]
    UndeclaredHandler(String),
    #[error("Type mismatch: {name} is declared {expected}, got {value:?}")]
    TypeMismatch {
        name: String,
        expected: TypeName,
        value: Value,
    },
    #[error("Values can only be assigned to variables: {0}")]
    InvalidAssignmentTarget(String),
    #[error("Invalid function call: {function} called with {given} arguments, expected {expected}")]
    ArgumentCount {
        function: String,
        given: usize,
        expected: usize,
    },
    #[error("Argument mismatch: {function} expects {expected} {parameter}, got a {found} variable")]
    ArgumentMismatch {
        function: String,
        parameter: String,
        expected: TypeName,
        found: TypeName,
    },
    #[error("Arguments to {function} must be variables, got {argument}")]
    ArgumentNotAVariable { function: String, argument: String },
    #[error("Return type mismatch: {function} returns {expected}, got {value:?}")]
    ReturnTypeMismatch {
        function: String,
        expected: TypeName,
        value: Value,
    },
    #[error("Maximum call depth exceeded calling {0}")]
    CallDepthExceeded(String),
    #[error("Return outside of a function: {0:?}")]
    ReturnOutsideFunction(Value),
    #[error("Invalid operands for {operator}: {left:?} and {right:?}")]
    InvalidOperands {
        operator: String,
        left: Value,
        right: Value,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {0}")]
    Overflow(ArithmeticOperator),
    #[error("Condition must be an integer, got {0:?}")]
    InvalidCondition(Value),
    #[error("Loop iterator must be a name, got {0}")]
    InvalidIterator(String),
    #[error("Cannot iterate over {0:?}")]
    InvalidIterable(Value),
    #[error("{0} statement without a body")]
    MissingBody(&'static str),
    #[error("Unexpected marker: {0}")]
    UnexpectedMarker(String),
    #[error("Not an expression: {0}")]
    NotAnExpression(String),
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn std::io::Write>>) -> Self {
        Self::with_handlers(stdout, Rc::new(RefCell::new(HandlerRegistry::new())))
    }

    pub fn with_handlers(
        stdout: Rc<RefCell<dyn std::io::Write>>,
        handlers: Rc<RefCell<dyn SystemHandlers>>,
    ) -> Self {
        Self {
            contexts: ContextStack::new(),
            call_depth: 0,
            stdout,
            handlers,
        }
    }

    /// Runs every root in order and stops at the first failing one.
    pub fn interpret(&mut self, file: &File) -> Result<(), ExecutionError> {
        for root in file.0.iter() {
            self.execute_root(root)?;
        }

        Ok(())
    }

    /// Runs every root in order, collecting the errors of the ones that fail.
    pub fn interpret_all(&mut self, file: &File) -> Vec<ExecutionError> {
        file.0
            .iter()
            .filter_map(|root| self.execute_root(root).err())
            .collect()
    }

    fn execute_root(&mut self, root: &Root) -> Result<(), ExecutionError> {
        tracing::debug!(statement = %root, "executing");
        let result = match self.execute(&root.0) {
            Ok(None) => Ok(()),
            Ok(Some(value)) => Err(ExecutionErrorKind::ReturnOutsideFunction(value)),
            Err(kind) => Err(kind),
        };

        result.map_err(|kind| {
            tracing::debug!(error = %kind, "statement failed");
            ExecutionError::Execution {
                kind,
                current_statement: root.0.clone(),
            }
        })
    }

    /// `Some` carries a `ret` value up to the enclosing call.
    fn execute(&mut self, node: &Node) -> Result<Option<Value>, ExecutionErrorKind> {
        let result = match node {
            Node::TypeSpecifier(specifier) => {
                self.contexts.current().declare(
                    specifier.name.clone(),
                    Declarable::Variable(specifier.type_name),
                );
                None
            }
            Node::Function(decl) => {
                self.contexts.current().declare(
                    decl.name.clone(),
                    Declarable::Function(Rc::new(decl.clone())),
                );
                None
            }
            Node::SystemHandler(name) => {
                self.contexts
                    .current()
                    .declare(name.clone(), Declarable::Handler);
                None
            }
            Node::Put(operand) => {
                let value = self.evaluate(operand)?;
                self.put(value)?;
                None
            }
            Node::Return(operand) => Some(self.evaluate_resolved(operand)?),
            Node::Body(body) => self.execute_block(body)?,
            Node::If {
                condition,
                body,
                else_body,
            } => {
                let body = body.as_ref().ok_or(ExecutionErrorKind::MissingBody("if"))?;
                if self.condition(condition)? {
                    self.execute_block(body)?
                } else if let Some(else_body) = else_body {
                    self.execute_block(else_body)?
                } else {
                    None
                }
            }
            Node::While { condition, body } => {
                let body = body
                    .as_ref()
                    .ok_or(ExecutionErrorKind::MissingBody("while"))?;
                let mut res = None;
                while self.condition(condition)? {
                    res = self.execute_block(body)?;
                    if res.is_some() {
                        break;
                    }
                }
                res
            }
            Node::For {
                iterator,
                collection,
                body,
            } => {
                let body = body.as_ref().ok_or(ExecutionErrorKind::MissingBody("for"))?;
                self.execute_for(iterator, collection, body)?
            }
            Node::Else | Node::Do | Node::NewLine => {
                return Err(ExecutionErrorKind::UnexpectedMarker(node.to_string()))
            }
            expression => {
                self.evaluate(expression)?;
                None
            }
        };

        Ok(result)
    }

    fn execute_body(&mut self, body: &Body) -> Result<Option<Value>, ExecutionErrorKind> {
        for statement in body.0.iter() {
            let result = self.execute(statement)?;
            if result.is_some() {
                return Ok(result);
            }
        }
        Ok(None)
    }

    fn execute_block(&mut self, body: &Body) -> Result<Option<Value>, ExecutionErrorKind> {
        self.execute_in_context(Context::default(), |interpreter| {
            interpreter.execute_body(body)
        })
    }

    /// Every iteration gets its own context holding the iterator.
    fn execute_for(
        &mut self,
        iterator: &Node,
        collection: &Node,
        body: &Body,
    ) -> Result<Option<Value>, ExecutionErrorKind> {
        let Node::Name(iterator) = iterator else {
            return Err(ExecutionErrorKind::InvalidIterator(iterator.to_string()));
        };

        match self.evaluate_resolved(collection)? {
            Value::Int(n) => self.iterate(iterator, TypeName::Int, body, (0..n).map(Value::Int)),
            Value::Str(s) => {
                let characters: Vec<_> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                self.iterate(iterator, TypeName::String, body, characters)
            }
            other => Err(ExecutionErrorKind::InvalidIterable(other)),
        }
    }

    fn iterate(
        &mut self,
        iterator: &str,
        type_name: TypeName,
        body: &Body,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Option<Value>, ExecutionErrorKind> {
        for item in items {
            let mut context = Context::default();
            context.declare(iterator.to_string(), Declarable::Variable(type_name));
            context.bind(iterator.to_string(), item);

            let result = self.execute_in_context(context, |interpreter| {
                interpreter.execute_body(body)
            })?;
            if result.is_some() {
                return Ok(result);
            }
        }

        Ok(None)
    }

    fn execute_in_context<T>(
        &mut self,
        context: Context,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionErrorKind>,
    ) -> Result<T, ExecutionErrorKind> {
        self.contexts.push(context);
        let result = f(self);
        self.contexts.pop();
        result
    }

    fn evaluate(&mut self, node: &Node) -> Result<Value, ExecutionErrorKind> {
        match node {
            Node::Int(n) => Ok(Value::Int(*n)),
            Node::Real(n) => Ok(Value::Real(*n)),
            Node::Name(name) => Ok(Value::Name(name.clone())),
            Node::Str(s) => Ok(Value::Str(s.clone())),
            Node::Arithmetic {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate_resolved(left)?;
                let right = self.evaluate_resolved(right)?;
                arithmetic(*operator, left, right)
            }
            Node::Boolean {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate_resolved(left)?;
                let right = self.evaluate_resolved(right)?;
                boolean(*operator, left, right)
            }
            Node::Assign { target, value } => self.assign(target, value),
            Node::FieldReference { object, field } => self.field_reference(object, field),
            Node::FunctionCall { name, arguments } => self.call(name, &argument_list(arguments)),
            Node::NoArgFunction(name) => self.call(name, &[]),
            Node::Else | Node::Do | Node::NewLine => {
                Err(ExecutionErrorKind::UnexpectedMarker(node.to_string()))
            }
            Node::FunctionArg { .. }
            | Node::TypeSpecifier(_)
            | Node::Function(_)
            | Node::SystemHandler(_)
            | Node::If { .. }
            | Node::While { .. }
            | Node::For { .. }
            | Node::Put(_)
            | Node::Return(_)
            | Node::Body(_) => Err(ExecutionErrorKind::NotAnExpression(node.to_string())),
        }
    }

    fn evaluate_resolved(&mut self, node: &Node) -> Result<Value, ExecutionErrorKind> {
        let value = self.evaluate(node)?;
        self.resolve(value)
    }

    fn resolve(&self, value: Value) -> Result<Value, ExecutionErrorKind> {
        let Value::Name(name) = value else {
            return Ok(value);
        };

        match self.contexts.value(&name) {
            Some(value) => Ok(value.clone()),
            None if self.contexts.get(&name).is_some() => {
                Err(ExecutionErrorKind::UnassignedVariable(name))
            }
            None => Err(ExecutionErrorKind::UndeclaredVariable(name)),
        }
    }

    fn condition(&mut self, condition: &Node) -> Result<bool, ExecutionErrorKind> {
        match self.evaluate_resolved(condition)? {
            Value::Int(n) => Ok(n != 0),
            other => Err(ExecutionErrorKind::InvalidCondition(other)),
        }
    }

    fn assign(&mut self, target: &Node, value: &Node) -> Result<Value, ExecutionErrorKind> {
        match target {
            Node::FieldReference { object, field } => {
                self.field_reference(object, field)?;
                self.evaluate(value)?;
                Ok(Value::Void)
            }
            Node::Name(name) => {
                let type_name = match self.contexts.get(name) {
                    Some(declarable) => declarable.type_name().ok_or_else(|| {
                        ExecutionErrorKind::InvalidAssignmentTarget(name.clone())
                    })?,
                    None => return Err(ExecutionErrorKind::UndeclaredVariable(name.clone())),
                };

                let value = self.evaluate_resolved(value)?;
                if !value.conforms_to(type_name) {
                    return Err(ExecutionErrorKind::TypeMismatch {
                        name: name.clone(),
                        expected: type_name,
                        value,
                    });
                }

                tracing::trace!(variable = %name, %value, "assign");
                self.contexts.assign(name, value.clone());
                Ok(value)
            }
            other => Err(ExecutionErrorKind::InvalidAssignmentTarget(
                other.to_string(),
            )),
        }
    }

    /// `h.start` and `h.stop` drive the handler runtime, anything else evaluates both sides.
    fn field_reference(&mut self, object: &Node, field: &Node) -> Result<Value, ExecutionErrorKind> {
        match (object, field.name()) {
            (Node::Name(handler), Some("start")) => {
                self.ensure_handler(handler)?;
                tracing::debug!(handler = %handler, "run");
                self.handlers.borrow_mut().run(handler);
                Ok(Value::Void)
            }
            (Node::Name(handler), Some("stop")) => {
                self.ensure_handler(handler)?;
                tracing::debug!(handler = %handler, "stop");
                self.handlers.borrow_mut().stop(handler);
                Ok(Value::Void)
            }
            _ => {
                self.evaluate(object)?;
                self.evaluate(field)
            }
        }
    }

    fn ensure_handler(&self, name: &str) -> Result<(), ExecutionErrorKind> {
        match self.contexts.get(name) {
            Some(Declarable::Handler) => Ok(()),
            _ => Err(ExecutionErrorKind::UndeclaredHandler(name.to_string())),
        }
    }

    fn call(&mut self, name: &str, arguments: &[&Node]) -> Result<Value, ExecutionErrorKind> {
        let function = match self.contexts.get(name) {
            Some(Declarable::Function(decl)) => CallableFunction::new(decl.clone()),
            _ => return Err(ExecutionErrorKind::UndeclaredFunction(name.to_string())),
        };

        tracing::debug!(%function, depth = self.call_depth, "call");
        function.call(self, arguments)
    }

    fn put(&mut self, value: Value) -> Result<(), ExecutionErrorKind> {
        let mut stdout = self.stdout.borrow_mut();
        match value {
            Value::Name(name) => match self.contexts.get(&name) {
                Some(Declarable::Function(decl)) => {
                    writeln!(stdout, "{} is a function with:", name)?;
                    writeln!(stdout, "\t{} specifier", decl.return_type)?;
                }
                Some(Declarable::Handler) => writeln!(stdout, "{} is a system handler.", name)?,
                Some(Declarable::Variable(_)) | None => match self.contexts.value(&name) {
                    Some(value) => writeln!(stdout, "{}", value)?,
                    None => writeln!(stdout, "no value assigned to {} variable.", name)?,
                },
            },
            Value::Void => {}
            value => writeln!(stdout, "{}", value)?,
        }
        Ok(())
    }
}

fn arithmetic(
    operator: ArithmeticOperator,
    left: Value,
    right: Value,
) -> Result<Value, ExecutionErrorKind> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match operator {
                ArithmeticOperator::Plus => a.checked_add(b),
                ArithmeticOperator::Minus => a.checked_sub(b),
                ArithmeticOperator::Multiply => a.checked_mul(b),
                ArithmeticOperator::Divide => {
                    if b == 0 {
                        return Err(ExecutionErrorKind::DivisionByZero);
                    }
                    a.checked_div(b)
                }
            };
            result
                .map(Value::Int)
                .ok_or(ExecutionErrorKind::Overflow(operator))
        }
        (left, right) => match (left.as_real(), right.as_real()) {
            (Some(a), Some(b)) => Ok(Value::Real(match operator {
                ArithmeticOperator::Plus => a + b,
                ArithmeticOperator::Minus => a - b,
                ArithmeticOperator::Multiply => a * b,
                ArithmeticOperator::Divide => a / b,
            })),
            _ => Err(ExecutionErrorKind::InvalidOperands {
                operator: operator.to_string(),
                left,
                right,
            }),
        },
    }
}

fn boolean(
    operator: BooleanOperator,
    left: Value,
    right: Value,
) -> Result<Value, ExecutionErrorKind> {
    let holds = match (operator, &left, &right) {
        (BooleanOperator::And, Value::Int(a), Value::Int(b)) => *a != 0 && *b != 0,
        (BooleanOperator::Or, Value::Int(a), Value::Int(b)) => *a != 0 || *b != 0,
        (BooleanOperator::Equal, Value::Str(a), Value::Str(b)) => a == b,
        (BooleanOperator::NotEqual, Value::Str(a), Value::Str(b)) => a != b,
        (BooleanOperator::And | BooleanOperator::Or, _, _) => {
            return Err(ExecutionErrorKind::InvalidOperands {
                operator: operator.to_string(),
                left,
                right,
            })
        }
        (_, Value::Int(a), Value::Int(b)) => compare(operator, Some(a.cmp(b))),
        _ => match (left.as_real(), right.as_real()) {
            (Some(a), Some(b)) => compare(operator, a.partial_cmp(&b)),
            _ => {
                return Err(ExecutionErrorKind::InvalidOperands {
                    operator: operator.to_string(),
                    left,
                    right,
                })
            }
        },
    };

    Ok(Value::Int(holds as i64))
}

fn compare(operator: BooleanOperator, ordering: Option<Ordering>) -> bool {
    match operator {
        BooleanOperator::Equal => ordering == Some(Ordering::Equal),
        BooleanOperator::NotEqual => ordering != Some(Ordering::Equal),
        BooleanOperator::LessThan => ordering == Some(Ordering::Less),
        BooleanOperator::LessThanOrEqual => {
            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
        }
        BooleanOperator::GreaterThan => ordering == Some(Ordering::Greater),
        BooleanOperator::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        BooleanOperator::And | BooleanOperator::Or => false,
    }
}
