//! Abstract Syntax Tree (AST) definitions.
//!
//! Produced by the parser, consumed read-only by the compiler.

/// A complete program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let`, `var` or `const` declaration
    Declaration(Declaration),
    /// Function declaration
    FunctionDeclaration(FunctionDeclaration),
    /// Expression statement
    Expression(Expression),
    /// Block statement { ... }
    Block(Block),
    /// if / else
    Condition(Condition),
    /// while and for loops
    Loop(Loop),
    /// `break` out of one or more loops
    Break(Break),
    /// Return statement
    Return(Return),
    /// Empty statement (;)
    Empty,
}

/// A variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub initializer: Option<Expression>,
    pub is_constant: bool,
    /// Annotated type name, `"any"` when omitted
    pub declared_type: String,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Annotated type name, `"any"` when omitted
    pub declared_type: String,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<Parameter>,
    /// Annotated return type, `"any"` when omitted
    pub return_type: String,
    pub body: Vec<Statement>,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub body: Vec<Statement>,
}

/// An if statement. `else if` chains nest in `else_body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub test: Expression,
    pub body: Box<Statement>,
    pub else_body: Option<Box<Statement>>,
}

/// A loop; `while (c) s` is a loop with only a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub initializer: Option<Box<Statement>>,
    pub test: Option<Expression>,
    pub increment: Option<Expression>,
    pub body: Option<Box<Statement>>,
}

/// A break statement. Level 1 exits the innermost loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Break {
    pub level: u32,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: Option<Expression>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Template string with interpolations
    Template(Template),
    /// Identifier reference
    Identifier(Identifier),
    /// Prefix or postfix unary operation
    Unary(UnaryExpression),
    /// Binary operation
    Binary(BinaryExpression),
    /// `object.member`
    Member(MemberExpression),
    /// `object[index, ...]`
    Index(IndexExpression),
    /// Function call
    Call(CallExpression),
    /// Assignment, plain or compound
    Assignment(AssignmentExpression),
    /// `[a, b]`
    Array(Vec<Expression>),
    /// `{ key: value }`
    Object(Vec<Property>),
    /// `#{a, b}`
    Set(Vec<Expression>),
    /// `test ? consequent : alternate`
    Ternary(TernaryExpression),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// A template string: `chunks` interleave with `expressions`, and there is
/// always one more chunk than expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub chunks: Vec<String>,
    pub expressions: Vec<Expression>,
}

/// An object literal property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expression,
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    /// Source spelling, used in registry keys.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Returns true for `&&` and `||`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    /// `x++` rather than `++x`
    pub postfix: bool,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Not,
    Increment,
    Decrement,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
        }
    }
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    pub operator: AssignmentOperator,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    PowAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Sub),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Mul),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Div),
            AssignmentOperator::ModAssign => Some(BinaryOperator::Mod),
            AssignmentOperator::PowAssign => Some(BinaryOperator::Pow),
        }
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

/// A member access.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub member: String,
}

/// An indexed access; several indices apply one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    pub object: Box<Expression>,
    pub indices: Vec<Expression>,
}

/// A conditional expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
}
