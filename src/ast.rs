use std::fmt::Display;

/// An ordered list of top-level statements. Evaluation order is this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File(pub Vec<Root>);

/// Wraps exactly one top-level statement tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Root(pub Node);

/// A `do ... done` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body(pub Vec<Node>);

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Int(i64),
    Real(f64),
    /// A name token. Whether it is an identifier or a plain string is decided when it is used.
    Name(String),
    Str(String),

    Arithmetic {
        operator: ArithmeticOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    Boolean {
        operator: BooleanOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    FieldReference {
        object: Box<Node>,
        field: Box<Node>,
    },
    /// Argument list link. An empty `right` marks the last argument.
    FunctionArg {
        left: Box<Node>,
        right: Option<Box<Node>>,
    },

    TypeSpecifier(TypeSpecifier),
    Function(FunctionDecl),
    FunctionCall {
        name: String,
        arguments: Box<Node>,
    },
    NoArgFunction(String),
    SystemHandler(String),

    If {
        condition: Box<Node>,
        body: Option<Body>,
        else_body: Option<Body>,
    },
    While {
        condition: Box<Node>,
        body: Option<Body>,
    },
    For {
        iterator: Box<Node>,
        collection: Box<Node>,
        body: Option<Body>,
    },

    Put(Box<Node>),
    Return(Box<Node>),
    Body(Body),

    // Structural markers, never evaluated
    Else,
    Do,
    NewLine,
}

impl Node {
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Name(name) => Some(name),
            _ => None,
        }
    }

    /// True for `if`/`while`/`for` whose block has not been attached yet.
    pub fn awaits_body(&self) -> bool {
        matches!(
            self,
            Node::If { body: None, .. } | Node::While { body: None, .. } | Node::For { body: None, .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpecifier {
    pub name: String,
    pub type_name: TypeName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: TypeName,
    pub params: Vec<TypeSpecifier>,
    pub body: Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Int,
    UnsignedInt,
    Float,
    String,
    SystemHandler,
}

impl TypeName {
    pub fn from_specifier(specifier: &str) -> Option<Self> {
        match specifier {
            "int" => Some(TypeName::Int),
            "unsigned_int" => Some(TypeName::UnsignedInt),
            "float" => Some(TypeName::Float),
            "string" => Some(TypeName::String),
            "system_handler" => Some(TypeName::SystemHandler),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl ArithmeticOperator {
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "+" => Some(ArithmeticOperator::Plus),
            "-" => Some(ArithmeticOperator::Minus),
            "*" => Some(ArithmeticOperator::Multiply),
            "/" => Some(ArithmeticOperator::Divide),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl BooleanOperator {
    /// Comparison operators only; `and`/`or` have their own token kinds.
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "==" => Some(BooleanOperator::Equal),
            "!=" => Some(BooleanOperator::NotEqual),
            "<" => Some(BooleanOperator::LessThan),
            "<=" => Some(BooleanOperator::LessThanOrEqual),
            ">" => Some(BooleanOperator::GreaterThan),
            ">=" => Some(BooleanOperator::GreaterThanOrEqual),
            _ => None,
        }
    }
}

impl Display for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for root in &self.0 {
            writeln!(f, "{}", root)?;
        }
        Ok(())
    }
}

impl Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(do")?;
        for statement in &self.0 {
            write!(f, " {}", statement)?;
        }
        write!(f, ")")
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Int(n) => write!(f, "{}", n),
            Node::Real(n) => write!(f, "{:?}", n),
            Node::Name(name) => write!(f, "{}", name),
            Node::Str(s) => write!(f, "\"{}\"", s),
            Node::Arithmetic {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", operator, left, right),
            Node::Boolean {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", operator, left, right),
            Node::Assign { target, value } => write!(f, "(= {} {})", target, value),
            Node::FieldReference { object, field } => write!(f, "(. {} {})", object, field),
            Node::FunctionArg { left, right } => match right {
                Some(right) => write!(f, "{}, {}", left, right),
                None => write!(f, "{}", left),
            },
            Node::TypeSpecifier(specifier) => write!(f, "({})", specifier),
            Node::Function(decl) => {
                write!(f, "(fn {} {} (", decl.return_type, decl.name)?;
                for (i, param) in decl.params.iter().enumerate() {
                    write!(f, "{param}")?;
                    if i != decl.params.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, ") {})", decl.body)
            }
            Node::FunctionCall { name, arguments } => write!(f, "{}({})", name, arguments),
            Node::NoArgFunction(name) => write!(f, "{}()", name),
            Node::SystemHandler(name) => write!(f, "(system_handler {})", name),
            Node::If {
                condition,
                body,
                else_body,
            } => {
                write!(f, "(if {}", condition)?;
                if let Some(body) = body {
                    write!(f, " {}", body)?;
                }
                if let Some(else_body) = else_body {
                    write!(f, " else {}", else_body)?;
                }
                write!(f, ")")
            }
            Node::While { condition, body } => {
                write!(f, "(while {}", condition)?;
                if let Some(body) = body {
                    write!(f, " {}", body)?;
                }
                write!(f, ")")
            }
            Node::For {
                iterator,
                collection,
                body,
            } => {
                write!(f, "(for {} in {}", iterator, collection)?;
                if let Some(body) = body {
                    write!(f, " {}", body)?;
                }
                write!(f, ")")
            }
            Node::Put(node) => write!(f, "(put {})", node),
            Node::Return(node) => write!(f, "(ret {})", node),
            Node::Body(body) => write!(f, "{}", body),
            Node::Else => write!(f, "else"),
            Node::Do => write!(f, "do"),
            Node::NewLine => write!(f, "\\n"),
        }
    }
}

impl Display for TypeSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.type_name, self.name)
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Int => write!(f, "int"),
            TypeName::UnsignedInt => write!(f, "unsigned_int"),
            TypeName::Float => write!(f, "float"),
            TypeName::String => write!(f, "string"),
            TypeName::SystemHandler => write!(f, "system_handler"),
        }
    }
}

impl Display for ArithmeticOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArithmeticOperator::Plus => write!(f, "+"),
            ArithmeticOperator::Minus => write!(f, "-"),
            ArithmeticOperator::Multiply => write!(f, "*"),
            ArithmeticOperator::Divide => write!(f, "/"),
        }
    }
}

impl Display for BooleanOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BooleanOperator::And => write!(f, "and"),
            BooleanOperator::Or => write!(f, "or"),
            BooleanOperator::Equal => write!(f, "=="),
            BooleanOperator::NotEqual => write!(f, "!="),
            BooleanOperator::LessThan => write!(f, "<"),
            BooleanOperator::LessThanOrEqual => write!(f, "<="),
            BooleanOperator::GreaterThan => write!(f, ">"),
            BooleanOperator::GreaterThanOrEqual => write!(f, ">="),
        }
    }
}
