//! SQL text plus its positional parameters.

use std::fmt;

use dbbox_core::SqlValue;

/// A statement ready to run: SQL with `?` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Parameters rendered for logs and error messages, e.g. `42, 'Deutschland'`.
    #[must_use]
    pub fn render_params(&self) -> String {
        render_params(&self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.sql)
        } else {
            write!(f, "{} [{}]", self.sql, self.render_params())
        }
    }
}

#[must_use]
pub fn render_params(params: &[SqlValue]) -> String {
    params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Copy)]
enum Skip {
    Quote(char),
    LineComment,
    BlockComment,
}

/// Count `?` placeholders outside quoted literals, backtick identifiers and
/// comments (`# ...`, `-- ...`, `/* ... */`).
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut skip: Option<Skip> = None;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        match skip {
            Some(Skip::Quote(q)) if ch == '\\' && q != '`' => {
                chars.next();
            }
            Some(Skip::Quote(q)) if ch == q => skip = None,
            Some(Skip::LineComment) if ch == '\n' => skip = None,
            Some(Skip::BlockComment) if ch == '*' && chars.peek() == Some(&'/') => {
                chars.next();
                skip = None;
            }
            Some(_) => {}
            None => match ch {
                '\'' | '"' | '`' => skip = Some(Skip::Quote(ch)),
                '#' => skip = Some(Skip::LineComment),
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    skip = Some(Skip::BlockComment);
                }
                '-' if chars.peek() == Some(&'-') => {
                    // `--` only starts a comment when followed by whitespace.
                    let mut ahead = chars.clone();
                    ahead.next();
                    if ahead.peek().is_none_or(|c| c.is_whitespace()) {
                        chars.next();
                        skip = Some(Skip::LineComment);
                    }
                }
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}
