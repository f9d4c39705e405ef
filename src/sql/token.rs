//! Output tokens.
//!
//! The query builder emits a flat stream of tokens; only identifiers
//! depend on the dialect when the stream is written out.

use super::dialect::{Dialect, SqlDialect};

/// One element of emitted SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    As,
    On,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    Fetch,
    Next,
    Rows,
    Only,
    With,
    Null,

    // === Punctuation ===
    Comma,
    LParen,
    RParen,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Identifier (table, column, alias), quoted per dialect.
    Ident(String),
    LitInt(u64),

    /// SQL already rendered for the target dialect.
    ///
    /// Holds expressions that went through the parse and qualify pass, and
    /// model SQL. Never pass unparsed user input here.
    Raw(String),
}

const INDENT: &str = "  ";

impl Token {
    /// Append this token's text for `dialect` to `out`.
    pub fn write_to(&self, out: &mut String, dialect: Dialect) {
        let text = match self {
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::As => "AS",
            Token::On => "ON",
            Token::Join => "JOIN",
            Token::Inner => "INNER",
            Token::Left => "LEFT",
            Token::Right => "RIGHT",
            Token::Full => "FULL",
            Token::Outer => "OUTER",
            Token::Cross => "CROSS",
            Token::GroupBy => "GROUP BY",
            Token::Having => "HAVING",
            Token::OrderBy => "ORDER BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::Fetch => "FETCH",
            Token::Next => "NEXT",
            Token::Rows => "ROWS",
            Token::Only => "ONLY",
            Token::With => "WITH",
            Token::Null => "NULL",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Space => " ",
            Token::Newline => "\n",
            Token::Raw(sql) => sql.as_str(),
            Token::Indent(depth) => {
                for _ in 0..*depth {
                    out.push_str(INDENT);
                }
                return;
            }
            Token::Ident(name) => {
                out.push_str(&dialect.quote_identifier(name));
                return;
            }
            Token::LitInt(n) => {
                out.push_str(&n.to_string());
                return;
            }
        };
        out.push_str(text);
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.write_to(&mut out, dialect);
        out
    }
}

/// Tokens in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            token.write_to(&mut out, dialect);
        }
        out
    }

    /// Serialize on one line: newlines become spaces, indentation is dropped.
    pub fn serialize_compact(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Newline => out.push(' '),
                Token::Indent(_) => {}
                other => other.write_to(&mut out, dialect),
            }
        }
        out
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_serialize() {
        assert_eq!(Token::Select.serialize(Dialect::DuckDb), "SELECT");
        assert_eq!(Token::GroupBy.serialize(Dialect::TSql), "GROUP BY");
    }

    #[test]
    fn test_ident_serialize() {
        let tok = Token::Ident("orders_cte".into());
        assert_eq!(tok.serialize(Dialect::DuckDb), "\"orders_cte\"");
        assert_eq!(tok.serialize(Dialect::TSql), "[orders_cte]");
        assert_eq!(tok.serialize(Dialect::BigQuery), "`orders_cte`");
    }

    #[test]
    fn test_token_stream() {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Raw("SUM(\"amount\")".into()))
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident("total".into()));

        assert_eq!(
            ts.serialize(Dialect::Postgres),
            "SELECT SUM(\"amount\") AS \"total\""
        );
    }

    #[test]
    fn test_compact_serialize() {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .newline()
            .indent(1)
            .push(Token::Ident("a".into()))
            .newline()
            .push(Token::From)
            .space()
            .push(Token::Ident("t".into()));
        assert_eq!(ts.serialize_compact(Dialect::DuckDb), "SELECT \"a\" FROM \"t\"");
    }
}
