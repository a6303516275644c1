//! Formula Abstract Syntax Tree types

use calcflow_core::Decimal;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Literals ===
    Literal(Literal),

    // === Names ===
    /// Reference to an argument, constant, import or formula
    Identifier(String),
    /// Member lookup: `value.member`
    Access { value: Box<Expr>, member: String },

    // === Operators ===
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // === Calls ===
    /// Ordinary call of a function value
    Invoke { function: Box<Expr>, args: Vec<Expr> },
    /// Compile-time macro (`if`, `where`, `list`, `object`)
    Macro { name: String, args: Vec<Argument> },

    /// Parenthesised expression
    Block(Box<Expr>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Number(Decimal),
    String(String),
}

/// Macro argument, optionally labelled (`name: value`)
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

impl Argument {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }

    pub fn named<S: Into<String>>(name: S, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }

    /// Whether the label matches, ignoring case
    pub fn is_named(&self, label: &str) -> bool {
        self.name
            .as_deref()
            .map_or(false, |n| n.eq_ignore_ascii_case(label))
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical
    And,
    Or,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl Expr {
    pub fn number<N: Into<Decimal>>(n: N) -> Self {
        Expr::Literal(Literal::Number(n.into()))
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Expr::Literal(Literal::Boolean(b))
    }

    pub fn ident<S: Into<String>>(name: S) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(function: Expr, args: Vec<Expr>) -> Self {
        Expr::Invoke {
            function: Box::new(function),
            args,
        }
    }

    pub fn macro_call<S: Into<String>>(name: S, args: Vec<Argument>) -> Self {
        Expr::Macro {
            name: name.into(),
            args,
        }
    }

    /// Names this expression refers to, in order of appearance.
    ///
    /// Macro argument labels and member names are not references.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Identifier(name) => names.push(name),
            Expr::Access { value, .. } => value.collect_identifiers(names),
            Expr::Unary { operand, .. } => operand.collect_identifiers(names),
            Expr::Binary { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
            Expr::Invoke { function, args } => {
                function.collect_identifiers(names);
                for arg in args {
                    arg.collect_identifiers(names);
                }
            }
            Expr::Macro { args, .. } => {
                for arg in args {
                    arg.value.collect_identifiers(names);
                }
            }
            Expr::Block(inner) => inner.collect_identifiers(names),
            // Literals have no references
            Expr::Literal(_) => {}
        }
    }
}
