use std::fmt;

use miette::SourceSpan;

use crate::compiler::Word;

pub type Identifier<'a> = &'a str;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program<'a> {
    pub statements: Vec<Statement<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement<'a> {
    pub kind: StatementKind<'a>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind<'a> {
    /// `VAR name;`
    Declare(Identifier<'a>),
    /// `name = value;`
    Assign {
        target: Identifier<'a>,
        value: Expression<'a>,
    },
    /// `MEM[address] = value;`
    MemoryWrite {
        address: Expression<'a>,
        value: Expression<'a>,
    },
    /// `PRINT_CHAR(line, column, code);`
    PrintChar {
        line: Expression<'a>,
        column: Expression<'a>,
        code: Expression<'a>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression<'a> {
    Literal(Word),
    Variable(Identifier<'a>),
    MemoryRef(Box<Expression<'a>>), // MEM[expr]
    Binary(Box<BinaryExpr<'a>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr<'a> {
    pub lhs: Expression<'a>,
    pub op: BinOp,
    pub rhs: Expression<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl<'a> Statement<'a> {
    pub fn new(kind: StatementKind<'a>, span: SourceSpan) -> Self {
        Self { kind, span }
    }
}

impl<'a> StatementKind<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Declare(_) => "declaration",
            StatementKind::Assign { .. } => "assignment",
            StatementKind::MemoryWrite { .. } => "memory write",
            StatementKind::PrintChar { .. } => "PRINT_CHAR",
        }
    }
}

impl<'a> Expression<'a> {
    pub fn binary(lhs: Expression<'a>, op: BinOp, rhs: Expression<'a>) -> Self {
        Expression::Binary(Box::new(BinaryExpr { lhs, op, rhs }))
    }

    pub fn memory(address: Expression<'a>) -> Self {
        Expression::MemoryRef(Box::new(address))
    }
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl<'a> fmt::Display for Expression<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Variable(name) => write!(f, "{name}"),
            Expression::MemoryRef(address) => write!(f, "MEM[{address}]"),
            Expression::Binary(bin) => write!(f, "({} {} {})", bin.lhs, bin.op, bin.rhs),
        }
    }
}

impl<'a> fmt::Display for Statement<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::Declare(name) => write!(f, "VAR {name};"),
            StatementKind::Assign { target, value } => write!(f, "{target} = {value};"),
            StatementKind::MemoryWrite { address, value } => {
                write!(f, "MEM[{address}] = {value};")
            }
            StatementKind::PrintChar { line, column, code } => {
                write!(f, "PRINT_CHAR({line}, {column}, {code});")
            }
        }
    }
}
