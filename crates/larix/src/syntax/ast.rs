//! Syntax tree for the supported statement and expression subset.
//!
//! One variant per node kind, each carrying its own struct so evaluation
//! can be written as one `impl` per node.

#![allow(missing_docs)]

use std::rc::Rc;

/// 1-based source position of a node, relative to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    /// Line number
    pub line: usize,
    /// Column number
    pub col: usize,
}

impl Loc {
    /// Create a location.
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinOp {
    /// Operator symbol, for error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "** or pow()",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }

    /// Parse an operator symbol (without any trailing `=`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mult,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            _ => return None,
        })
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

/// Whether a target expression is read, written or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
    Del,
}

// ═══════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(ExprConstant),
    Name(ExprName),
    Attribute(ExprAttribute),
    Subscript(ExprSubscript),
    List(ExprList),
    Tuple(ExprTuple),
    Dict(ExprDict),
    ListComp(ExprListComp),
    DictComp(ExprDictComp),
    BinOp(ExprBinOp),
    UnaryOp(ExprUnaryOp),
    BoolOp(ExprBoolOp),
    Compare(ExprCompare),
    IfExp(ExprIfExp),
    Call(ExprCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprConstant {
    pub value: Constant,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprName {
    pub id: String,
    pub ctx: ExprContext,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAttribute {
    pub value: Box<Expr>,
    pub attr: String,
    pub ctx: ExprContext,
    pub loc: Loc,
}

/// What goes between the brackets of a subscript.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// `a[i]`
    Single(Expr),
    /// `a[lower:upper:step]`
    Slice {
        lower: Option<Expr>,
        upper: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprSubscript {
    pub value: Box<Expr>,
    pub index: Box<Index>,
    pub ctx: ExprContext,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprList {
    pub elts: Vec<Expr>,
    pub ctx: ExprContext,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprTuple {
    pub elts: Vec<Expr>,
    pub ctx: ExprContext,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprDict {
    pub keys: Vec<Expr>,
    pub values: Vec<Expr>,
    pub loc: Loc,
}

/// One `for target in iter if cond...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprListComp {
    pub elt: Box<Expr>,
    pub generators: Vec<Comprehension>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprDictComp {
    pub key: Box<Expr>,
    pub value: Box<Expr>,
    pub generators: Vec<Comprehension>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBinOp {
    pub left: Box<Expr>,
    pub op: BinOp,
    pub right: Box<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprUnaryOp {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBoolOp {
    pub op: BoolOp,
    pub values: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprCompare {
    pub left: Box<Expr>,
    pub ops: Vec<CmpOp>,
    pub comparators: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprIfExp {
    pub test: Box<Expr>,
    pub body: Box<Expr>,
    pub orelse: Box<Expr>,
    pub loc: Loc,
}

/// Positional call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    /// `*seq`
    Starred(Expr),
}

/// Keyword call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Named { name: String, value: Expr },
    /// `**mapping`
    DoubleStarred(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprCall {
    pub func: Box<Expr>,
    pub args: Vec<Arg>,
    pub keywords: Vec<Keyword>,
    pub loc: Loc,
}

impl Expr {
    /// Position of the node.
    pub fn loc(&self) -> Loc {
        match self {
            Expr::Constant(e) => e.loc,
            Expr::Name(e) => e.loc,
            Expr::Attribute(e) => e.loc,
            Expr::Subscript(e) => e.loc,
            Expr::List(e) => e.loc,
            Expr::Tuple(e) => e.loc,
            Expr::Dict(e) => e.loc,
            Expr::ListComp(e) => e.loc,
            Expr::DictComp(e) => e.loc,
            Expr::BinOp(e) => e.loc,
            Expr::UnaryOp(e) => e.loc,
            Expr::BoolOp(e) => e.loc,
            Expr::Compare(e) => e.loc,
            Expr::IfExp(e) => e.loc,
            Expr::Call(e) => e.loc,
        }
    }

    /// Node kind name used in error records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::Name(_) => "Name",
            Expr::Attribute(_) => "Attribute",
            Expr::Subscript(_) => "Subscript",
            Expr::List(_) => "List",
            Expr::Tuple(_) => "Tuple",
            Expr::Dict(_) => "Dict",
            Expr::ListComp(_) => "ListComp",
            Expr::DictComp(_) => "DictComp",
            Expr::BinOp(_) => "BinOp",
            Expr::UnaryOp(_) => "UnaryOp",
            Expr::BoolOp(_) => "BoolOp",
            Expr::Compare(_) => "Compare",
            Expr::IfExp(_) => "IfExp",
            Expr::Call(_) => "Call",
        }
    }

    /// Dotted name for `a.b.c` chains of plain names, if this is one.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name(n) => Some(n.id.clone()),
            Expr::Attribute(a) => a.value.dotted_name().map(|p| format!("{}.{}", p, a.attr)),
            _ => None,
        }
    }

    /// Number of nodes on the longest path down from this one, itself included.
    pub fn height(&self) -> usize {
        let below = match self {
            Expr::Constant(_) | Expr::Name(_) => 0,
            Expr::Attribute(e) => e.value.height(),
            Expr::Subscript(e) => e.value.height().max(e.index.height()),
            Expr::List(e) => max_height(&e.elts),
            Expr::Tuple(e) => max_height(&e.elts),
            Expr::Dict(e) => max_height(&e.keys).max(max_height(&e.values)),
            Expr::ListComp(e) => e.elt.height().max(generators_height(&e.generators)),
            Expr::DictComp(e) => e
                .key
                .height()
                .max(e.value.height())
                .max(generators_height(&e.generators)),
            Expr::BinOp(e) => e.left.height().max(e.right.height()),
            Expr::UnaryOp(e) => e.operand.height(),
            Expr::BoolOp(e) => max_height(&e.values),
            Expr::Compare(e) => e.left.height().max(max_height(&e.comparators)),
            Expr::IfExp(e) => e.test.height().max(e.body.height()).max(e.orelse.height()),
            Expr::Call(e) => e.func.height().max(e.args_height()),
        };
        below + 1
    }
}

impl Index {
    pub fn height(&self) -> usize {
        match self {
            Index::Single(expr) => expr.height(),
            Index::Slice { lower, upper, step } => [lower, upper, step]
                .into_iter()
                .flatten()
                .map(Expr::height)
                .max()
                .unwrap_or(0),
        }
    }
}

impl ExprCall {
    /// Tallest argument expression, or 0 without arguments.
    pub fn args_height(&self) -> usize {
        let args = self.args.iter().map(|arg| match arg {
            Arg::Positional(e) | Arg::Starred(e) => e.height(),
        });
        let keywords = self.keywords.iter().map(|kw| match kw {
            Keyword::Named { value, .. } => value.height(),
            Keyword::DoubleStarred(e) => e.height(),
        });
        args.chain(keywords).max().unwrap_or(0)
    }
}

fn max_height(exprs: &[Expr]) -> usize {
    exprs.iter().map(Expr::height).max().unwrap_or(0)
}

fn generators_height(generators: &[Comprehension]) -> usize {
    generators
        .iter()
        .map(|g| g.target.height().max(g.iter.height()).max(max_height(&g.ifs)))
        .max()
        .unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════

/// Parameter list of a procedure definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    /// Required positional parameters
    pub args: Vec<String>,
    /// Optional parameters and their default expressions
    pub defaults: Vec<(String, Expr)>,
    /// `*name`
    pub vararg: Option<String>,
    /// `**name`
    pub kwarg: Option<String>,
}

impl Params {
    /// All parameter names, in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(String::as_str)
            .chain(self.defaults.iter().map(|(n, _)| n.as_str()))
            .chain(self.vararg.as_deref())
            .chain(self.kwarg.as_deref())
    }
}

/// A `def` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Params,
    pub body: Vec<Stmt>,
    /// Leading string literal of the body
    pub doc: Option<String>,
    pub loc: Loc,
}

/// `import a.b as c` or `from m import x as y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

/// An `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// Exception class (or tuple of classes); `None` catches everything
    pub typ: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(StmtExpr),
    Assign(StmtAssign),
    AugAssign(StmtAugAssign),
    FunctionDef(Rc<FunctionDef>),
    If(StmtIf),
    For(StmtFor),
    While(StmtWhile),
    Try(StmtTry),
    Raise(StmtRaise),
    Import(StmtImport),
    ImportFrom(StmtImportFrom),
    Assert(StmtAssert),
    Delete(StmtDelete),
    Return(StmtReturn),
    Break(Loc),
    Continue(Loc),
    Pass(Loc),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtExpr {
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtAssign {
    pub targets: Vec<Expr>,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtAugAssign {
    pub target: Expr,
    pub op: BinOp,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtIf {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtFor {
    pub target: Expr,
    pub iter: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtWhile {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtTry {
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtRaise {
    pub exc: Option<Expr>,
    pub cause: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtImport {
    pub names: Vec<Alias>,
    pub loc: Loc,
}

/// `from module import names`; a single `*` name imports everything.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtImportFrom {
    pub module: String,
    pub names: Vec<Alias>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtAssert {
    pub test: Expr,
    pub msg: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtDelete {
    pub targets: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtReturn {
    pub value: Option<Expr>,
    pub loc: Loc,
}

impl Stmt {
    /// Position of the node.
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Expr(s) => s.loc,
            Stmt::Assign(s) => s.loc,
            Stmt::AugAssign(s) => s.loc,
            Stmt::FunctionDef(s) => s.loc,
            Stmt::If(s) => s.loc,
            Stmt::For(s) => s.loc,
            Stmt::While(s) => s.loc,
            Stmt::Try(s) => s.loc,
            Stmt::Raise(s) => s.loc,
            Stmt::Import(s) => s.loc,
            Stmt::ImportFrom(s) => s.loc,
            Stmt::Assert(s) => s.loc,
            Stmt::Delete(s) => s.loc,
            Stmt::Return(s) => s.loc,
            Stmt::Break(loc) | Stmt::Continue(loc) | Stmt::Pass(loc) => *loc,
        }
    }

    /// Node kind name used in error records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "Expr",
            Stmt::Assign(_) => "Assign",
            Stmt::AugAssign(_) => "AugAssign",
            Stmt::FunctionDef(_) => "FunctionDef",
            Stmt::If(_) => "If",
            Stmt::For(_) => "For",
            Stmt::While(_) => "While",
            Stmt::Try(_) => "Try",
            Stmt::Raise(_) => "Raise",
            Stmt::Import(_) => "Import",
            Stmt::ImportFrom(_) => "ImportFrom",
            Stmt::Assert(_) => "Assert",
            Stmt::Delete(_) => "Delete",
            Stmt::Return(_) => "Return",
            Stmt::Break(_) => "Break",
            Stmt::Continue(_) => "Continue",
            Stmt::Pass(_) => "Pass",
        }
    }
}
