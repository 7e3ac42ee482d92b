use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{FunctionDecl, TypeName};

use super::Value;

#[derive(Debug, Clone)]
pub enum Declarable {
    Variable(TypeName),
    Function(Rc<FunctionDecl>),
    Handler,
}

impl Declarable {
    /// Type an assigned value is checked against.
    pub fn type_name(&self) -> Option<TypeName> {
        match self {
            Declarable::Variable(type_name) => Some(*type_name),
            Declarable::Handler => Some(TypeName::SystemHandler),
            Declarable::Function(_) => None,
        }
    }
}

/// One lexical scope. Declaring a name does not allocate storage, the first assignment does.
#[derive(Debug, Default)]
pub struct Context {
    declarables: FxHashMap<String, Declarable>,
    values: FxHashMap<String, Value>,
}

impl Context {
    pub fn declare(&mut self, name: String, declarable: Declarable) {
        self.declarables.insert(name, declarable);
    }

    pub fn bind(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    fn owns(&self, name: &str) -> bool {
        self.declarables.contains_key(name) || self.values.contains_key(name)
    }
}

/// Scope chain searched innermost first. The global context is never popped.
#[derive(Debug, Default)]
pub struct ContextStack {
    global: Context,
    nested: Vec<Context>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: Context) {
        self.nested.push(context);
    }

    pub fn pop(&mut self) -> Option<Context> {
        self.nested.pop()
    }

    pub fn depth(&self) -> usize {
        self.nested.len() + 1
    }

    pub fn current(&mut self) -> &mut Context {
        self.nested.last_mut().unwrap_or(&mut self.global)
    }

    fn innermost_first(&self) -> impl Iterator<Item = &Context> {
        self.nested.iter().rev().chain(std::iter::once(&self.global))
    }

    fn innermost_first_mut(&mut self) -> impl Iterator<Item = &mut Context> {
        self.nested
            .iter_mut()
            .rev()
            .chain(std::iter::once(&mut self.global))
    }

    pub fn get(&self, name: &str) -> Option<&Declarable> {
        self.innermost_first()
            .find_map(|context| context.declarables.get(name))
    }

    /// Reads from the innermost context that declares `name` or holds a value for it, so a
    /// local declaration without a value hides the outer one.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.innermost_first()
            .find(|context| context.owns(name))
            .and_then(|context| context.values.get(name))
    }

    /// Stores into the innermost context that declares `name` or holds a value for it,
    /// otherwise into the current one.
    pub fn assign(&mut self, name: &str, value: Value) {
        let owner = self.innermost_first_mut().find(|context| context.owns(name));
        match owner {
            Some(context) => context.bind(name.to_string(), value),
            None => self.current().bind(name.to_string(), value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_innermost_declaration_wins() {
        let mut stack = ContextStack::new();
        stack
            .current()
            .declare("x".to_string(), Declarable::Variable(TypeName::Int));
        stack.push(Context::default());
        stack
            .current()
            .declare("x".to_string(), Declarable::Variable(TypeName::String));

        assert!(matches!(
            stack.get("x"),
            Some(Declarable::Variable(TypeName::String))
        ));
        stack.pop();
        assert!(matches!(
            stack.get("x"),
            Some(Declarable::Variable(TypeName::Int))
        ));
    }

    #[test]
    fn test_assignment_lands_in_declaring_context() {
        let mut stack = ContextStack::new();
        stack
            .current()
            .declare("y".to_string(), Declarable::Variable(TypeName::Int));
        stack.push(Context::default());
        stack.assign("y", Value::Int(2));
        stack.pop();

        assert!(matches!(stack.value("y"), Some(Value::Int(2))));
    }

    #[test]
    fn test_assignment_updates_existing_binding() {
        let mut stack = ContextStack::new();
        stack
            .current()
            .declare("y".to_string(), Declarable::Variable(TypeName::Int));
        stack.push(Context::default());
        stack
            .current()
            .declare("y".to_string(), Declarable::Variable(TypeName::Int));
        stack.current().bind("y".to_string(), Value::Int(1));
        stack.assign("y", Value::Int(3));

        assert!(matches!(stack.value("y"), Some(Value::Int(3))));
        stack.pop();
        assert!(stack.value("y").is_none());
    }

    #[test]
    fn test_shadowed_assignment_stays_local() {
        let mut stack = ContextStack::new();
        stack
            .current()
            .declare("x".to_string(), Declarable::Variable(TypeName::Int));
        stack.assign("x", Value::Int(1));
        stack.push(Context::default());
        stack
            .current()
            .declare("x".to_string(), Declarable::Variable(TypeName::String));
        stack.assign("x", Value::Str("a".to_string()));

        assert_eq!(stack.value("x"), Some(&Value::Str("a".to_string())));
        stack.pop();
        assert_eq!(stack.value("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_unassigned_local_hides_outer_value() {
        let mut stack = ContextStack::new();
        stack
            .current()
            .declare("a".to_string(), Declarable::Variable(TypeName::Int));
        stack.assign("a", Value::Int(5));
        stack.push(Context::default());
        stack
            .current()
            .declare("a".to_string(), Declarable::Variable(TypeName::Int));

        assert_eq!(stack.value("a"), None);
    }

    #[test]
    fn test_global_is_never_popped() {
        let mut stack = ContextStack::new();
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
    }
}
