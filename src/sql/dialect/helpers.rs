//! Pieces shared between dialect implementations.

use super::super::token::{Token, TokenStream};

/// Wrap `ident` in the quote pair opened by `open`, doubling any closing
/// quote inside it. `[` closes with `]`; every other quote closes with itself.
pub fn quote_with(ident: &str, open: char) -> String {
    let close = if open == '[' { ']' } else { open };
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push(open);
    for c in ident.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// `LIMIT n`.
pub fn emit_limit_standard(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Limit).space().push(Token::LitInt(limit));
    ts
}

/// `OFFSET 0 ROWS FETCH NEXT n ROWS ONLY`. FETCH is only legal after OFFSET.
pub fn emit_limit_fetch(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    let tokens = [
        Token::Offset,
        Token::LitInt(0),
        Token::Rows,
        Token::Fetch,
        Token::Next,
        Token::LitInt(limit),
        Token::Rows,
        Token::Only,
    ];
    for (i, token) in tokens.into_iter().enumerate() {
        if i > 0 {
            ts.space();
        }
        ts.push(token);
    }
    ts
}

/// Function renames for one dialect: every name on the left becomes the
/// name on the right. Names are matched case-insensitively.
pub type FunctionMap = &'static [(&'static [&'static str], &'static str)];

pub fn remap(name: &str, functions: FunctionMap) -> Option<&'static str> {
    let name = name.to_uppercase();
    functions
        .iter()
        .find(|(aliases, _)| aliases.contains(&name.as_str()))
        .map(|(_, target)| *target)
}
