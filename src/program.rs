use std::fmt;

use crate::ast::LoopKind;

/// The lowering-ready form of a parsed source, produced by [`crate::fold`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Function(Function),
    Global(VarDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Box<str>,
    pub params: Vec<Param>,
    /// `None` if the header had no return type clause.
    pub ret_type: Option<Box<str>>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Box<str>,
    pub ty: Box<str>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Decl(VarDecl),
    Assign(Assignment),
    Return(Option<Expr>),
    Cond(Conditional),
    Loop(Loop),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: Box<str>,
    pub ty: Box<str>,
    pub is_const: bool,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub target: Box<str>,
    pub value: Expr,
}

/// An `if` with its `elif` chain and `else` body.
#[derive(Clone, Debug, PartialEq)]
pub struct Conditional {
    pub cond: Expr,
    pub if_body: Vec<Stmt>,
    pub elifs: Vec<ElifBranch>,
    /// Empty when there is no `else`.
    pub else_body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElifBranch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Loop {
    pub kind: LoopKind,
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// An expression in postfix order, precedence and parentheses already
/// resolved: `a + b * c` is `a b c * +`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expr {
    pub items: Vec<ExprItem>,
}

impl Expr {
    pub fn new(items: Vec<ExprItem>) -> Expr {
        Expr { items }
    }

    /// Returns the call if the whole expression is a single call.
    pub fn as_call(&self) -> Option<&Call> {
        match &*self.items {
            [ExprItem::Operand(Operand::Call(call))] => Some(call),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprItem {
    Operand(Operand),
    /// A binary operator symbol.
    Op(Box<str>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Int(i128),
    Float(f64),
    Str(Box<str>),
    Bool(bool),
    Ident(Box<str>),
    /// `&name`
    AddressOf(Box<str>),
    /// `*name`
    Deref(Box<str>),
    Call(Call),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub name: Box<str>,
    pub args: Vec<Expr>,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match item {
                ExprItem::Operand(operand) => write!(f, "{operand}")?,
                ExprItem::Op(op) => f.write_str(op)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(value) => write!(f, "{value}"),
            Operand::Float(value) => write!(f, "{value:?}"),
            Operand::Str(value) => write!(f, "{value:?}"),
            Operand::Bool(value) => write!(f, "{value}"),
            Operand::Ident(name) => f.write_str(name),
            Operand::AddressOf(name) => write!(f, "&{name}"),
            Operand::Deref(name) => write!(f, "*{name}"),
            Operand::Call(Call { name, args }) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
