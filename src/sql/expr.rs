//! Clause-level expressions.
//!
//! Expression bodies arrive already parsed and qualified (see
//! [`crate::sql::parse`]); this layer only composes them into clauses.

use super::dialect::Dialect;
use super::query::SelectExpr;
use super::token::{Token, TokenStream};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare column or SELECT alias, quoted on output.
    Column(String),

    /// SQL rendered by the parse layer for the target dialect.
    Raw(String),

    And(Box<Expr>, Box<Expr>),

    Paren(Box<Expr>),
}

impl Expr {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column(name) => {
                ts.push(Token::Ident(name.clone()));
            }
            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
            Expr::And(left, right) => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }
            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
        }
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

pub fn col(name: &str) -> Expr {
    Expr::Column(name.into())
}

pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

/// AND all predicates together, parenthesizing each when there are several.
pub fn conjunction(predicates: Vec<Expr>) -> Option<Expr> {
    let wrap = predicates.len() > 1;
    predicates
        .into_iter()
        .map(|p| if wrap { p.paren() } else { p })
        .reduce(|acc, p| acc.and(p))
}

/// Fluent combinators over [`Expr`].
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self.into_expr()), Box::new(other))
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }

    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr {
            expr: self.into_expr(),
            alias: name.into(),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}
