//! The SELECT statement a compiled trace becomes.
//!
//! Every FROM/JOIN target is a CTE name and every CTE body is model SQL,
//! so tables here are plain identifiers.

use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

/// A SELECT list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: String,
}

impl SelectExpr {
    fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        ts.space()
            .push(Token::As)
            .space()
            .push(Token::Ident(self.alias.clone()));
        ts
    }
}

/// How two models are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    #[serde(alias = "outer")]
    Full,
    Cross,
}

impl JoinType {
    /// The same join seen from the other side.
    pub fn flipped(self) -> Self {
        match self {
            JoinType::Left => JoinType::Right,
            JoinType::Right => JoinType::Left,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    /// `None` only for CROSS joins.
    pub on: Option<Expr>,
}

impl Join {
    fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Right => ts.push(Token::Right),
            JoinType::Full => ts.push(Token::Full).space().push(Token::Outer),
            JoinType::Cross => ts.push(Token::Cross),
        };
        ts.space()
            .push(Token::Join)
            .space()
            .push(Token::Ident(self.table.clone()));

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }
        ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// An ORDER BY entry. Without a direction the database default applies.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn new(expr: Expr, dir: Option<SortDir>) -> Self {
        Self { expr, dir }
    }

    fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        match self.dir {
            Some(SortDir::Asc) => {
                ts.space().push(Token::Asc);
            }
            Some(SortDir::Desc) => {
                ts.space().push(Token::Desc);
            }
            None => {}
        }
        ts
    }
}

/// A named WITH entry whose body is model SQL, emitted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub sql: String,
}

impl Cte {
    pub fn raw(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::As)
            .space()
            .lparen()
            .newline()
            .indent(1)
            .push(Token::Raw(self.sql.clone()))
            .newline()
            .rparen();
        ts
    }
}

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until rendered with to_sql()"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub from: Option<String>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    pub fn select(mut self, exprs: Vec<SelectExpr>) -> Self {
        self.select = exprs;
        self
    }

    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(table.into());
        self
    }

    pub fn join(mut self, join_type: JoinType, table: &str, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table: table.into(),
            on: Some(on),
        });
        self
    }

    pub fn cross_join(mut self, table: &str) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Cross,
            table: table.into(),
            on: None,
        });
        self
    }

    /// Add a WHERE condition, ANDed onto any existing one.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if !self.with.is_empty() {
            ts.push(Token::With).space();
            separated(&mut ts, &self.with, &[Token::Comma, Token::Newline], |ts, cte| {
                ts.append(&cte.to_tokens());
            });
            ts.newline();
        }

        ts.push(Token::Select);
        separated(&mut ts, &self.select, &[Token::Comma], |ts, item| {
            ts.newline().indent(1).append(&item.to_tokens(dialect));
        });

        if let Some(from) = &self.from {
            clause(&mut ts, Token::From).push(Token::Ident(from.clone()));
        }
        for join in &self.joins {
            ts.newline().append(&join.to_tokens(dialect));
        }
        if let Some(condition) = &self.where_clause {
            clause(&mut ts, Token::Where).append(&condition.to_tokens_for_dialect(dialect));
        }
        if !self.group_by.is_empty() {
            clause(&mut ts, Token::GroupBy);
            separated(&mut ts, &self.group_by, LIST_SEPARATOR, |ts, expr| {
                ts.append(&expr.to_tokens_for_dialect(dialect));
            });
        }
        if let Some(condition) = &self.having {
            clause(&mut ts, Token::Having).append(&condition.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            clause(&mut ts, Token::OrderBy);
            separated(&mut ts, &self.order_by, LIST_SEPARATOR, |ts, entry| {
                ts.append(&entry.to_tokens(dialect));
            });
        } else if self.limit.is_some() && dialect.limit_requires_order_by() {
            // Arbitrary but legal ordering.
            clause(&mut ts, Token::OrderBy)
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        if let Some(limit) = self.limit {
            ts.newline().append(&dialect.emit_limit(limit));
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// Single-line SQL.
    pub fn to_sql_compact(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize_compact(dialect)
    }
}

/// Start a clause on a new line: `\nKEYWORD `.
fn clause(ts: &mut TokenStream, keyword: Token) -> &mut TokenStream {
    ts.newline().push(keyword).space()
}

const LIST_SEPARATOR: &[Token] = &[Token::Comma, Token::Space];

fn separated<T>(
    ts: &mut TokenStream,
    items: &[T],
    separator: &[Token],
    mut emit: impl FnMut(&mut TokenStream, &T),
) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            for token in separator {
                ts.push(token.clone());
            }
        }
        emit(ts, item);
    }
}
