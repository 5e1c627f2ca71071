//! Expression syntax tree.

use std::collections::BTreeMap;

use crate::value::Variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuit; yields the deciding operand.
    And,
    /// Short-circuit; yields the deciding operand.
    Or,
}

/// One expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Variant),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    Record(Vec<(String, Expr)>),
    /// `target = value`; the target is an [`Expr::Ident`] or [`Expr::Member`].
    Assign(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// The literal this expression always evaluates to, if it reads nothing.
    pub fn constant(&self) -> Option<Variant> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::Unary(UnaryOp::Neg, operand) => match operand.constant()? {
                Variant::Int(i) => i.checked_neg().map(Variant::Int),
                Variant::Float(f) => Some(Variant::Float(-f)),
                _ => None,
            },
            Expr::List(items) => items
                .iter()
                .map(Expr::constant)
                .collect::<Option<Vec<_>>>()
                .map(Variant::List),
            Expr::Record(fields) => fields
                .iter()
                .map(|(key, expr)| expr.constant().map(|v| (key.clone(), v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Variant::Record),
            _ => None,
        }
    }
}

/// A `;`-separated statement sequence; its value is the last statement's.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Expr>,
}

impl Block {
    pub fn constant(&self) -> Option<Variant> {
        match self.statements.as_slice() {
            [single] => single.constant(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negated_literal_is_constant() {
        let expr = Expr::Unary(UnaryOp::Neg, Box::new(Expr::Literal(Variant::Int(4))));
        assert_eq!(expr.constant(), Some(Variant::Int(-4)));
    }

    #[test]
    fn identifiers_are_not_constant() {
        let expr = Expr::List(vec![
            Expr::Literal(Variant::Int(1)),
            Expr::Ident("x".into()),
        ]);
        assert_eq!(expr.constant(), None);
    }

    #[test]
    fn multi_statement_block_is_not_constant() {
        let block = Block {
            statements: vec![Expr::Literal(Variant::Int(1)), Expr::Literal(Variant::Int(2))],
        };
        assert_eq!(block.constant(), None);
    }
}
