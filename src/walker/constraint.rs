//! Build constraint lines (`// +build` and `//go:build`).
//!
//! A file is dropped only when its constraints can never hold while every
//! excluded tag is unset. Tags outside the excluded set are unknown, so a
//! line with at least one alternative that does not depend solely on excluded
//! tags keeps the file. Lines are ANDed together.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Truth {
    False,
    Unknown,
    True,
}

impl Expr {
    fn eval(&self, excluded: &BTreeSet<String>) -> Truth {
        match self {
            Expr::Tag(tag) => {
                if excluded.contains(tag) {
                    Truth::False
                } else {
                    Truth::Unknown
                }
            }
            Expr::Not(inner) => match inner.eval(excluded) {
                Truth::False => Truth::True,
                Truth::True => Truth::False,
                Truth::Unknown => Truth::Unknown,
            },
            Expr::And(items) => {
                let values: Vec<Truth> = items.iter().map(|e| e.eval(excluded)).collect();
                if values.contains(&Truth::False) {
                    Truth::False
                } else if values.iter().all(|v| *v == Truth::True) {
                    Truth::True
                } else {
                    Truth::Unknown
                }
            }
            Expr::Or(items) => {
                let values: Vec<Truth> = items.iter().map(|e| e.eval(excluded)).collect();
                if values.contains(&Truth::True) {
                    Truth::True
                } else if values.iter().all(|v| *v == Truth::False) {
                    Truth::False
                } else {
                    Truth::Unknown
                }
            }
        }
    }
}

/// A constraint line as it appeared in the file, with its parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintLine {
    pub text: String,
    pub expr: Expr,
}

/// Collects the constraint lines from the comment block above `package`.
pub fn parse_constraints(src: &str) -> Vec<ConstraintLine> {
    let mut lines = Vec::new();
    let mut in_block = false;

    for raw in src.lines() {
        let line = raw.trim();
        if in_block {
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        let Some(comment) = line.strip_prefix("//") else {
            break;
        };

        let parsed = if let Some(rest) = comment.strip_prefix("go:build") {
            parse_go_build(rest)
        } else if let Some(rest) = comment.trim_start().strip_prefix("+build") {
            parse_plus_build(rest)
        } else {
            None
        };
        if let Some(expr) = parsed {
            lines.push(ConstraintLine {
                text: comment.trim().to_string(),
                expr,
            });
        }
    }

    lines
}

/// Returns the first constraint line that rules the file out, if any.
pub fn excluding_line<'a>(
    lines: &'a [ConstraintLine],
    excluded: &BTreeSet<String>,
) -> Option<&'a ConstraintLine> {
    if excluded.is_empty() {
        return None;
    }
    lines
        .iter()
        .find(|line| line.expr.eval(excluded) == Truth::False)
}

/// `// +build a b,!c`: space separated alternatives, comma joined terms.
fn parse_plus_build(rest: &str) -> Option<Expr> {
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let alternatives: Vec<Expr> = rest
        .split_whitespace()
        .map(|alt| {
            let terms: Vec<Expr> = alt
                .split(',')
                .filter(|t| !t.is_empty())
                .map(|t| match t.strip_prefix('!') {
                    Some(tag) => Expr::Not(Box::new(Expr::Tag(tag.to_string()))),
                    None => Expr::Tag(t.to_string()),
                })
                .collect();
            Expr::And(terms)
        })
        .collect();
    if alternatives.is_empty() {
        None
    } else {
        Some(Expr::Or(alternatives))
    }
}

fn parse_go_build(rest: &str) -> Option<Expr> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let tokens = tokenize(rest)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos == parser.tokens.len() {
        Some(expr)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(src: &str) -> Option<Vec<Tok>> {
    let mut out = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '!' => out.push(Tok::Not),
            '(' => out.push(Tok::Open),
            ')' => out.push(Tok::Close),
            '&' if chars.next() == Some('&') => out.push(Tok::And),
            '|' if chars.next() == Some('|') => out.push(Tok::Or),
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        tag.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Tok::Tag(tag));
            }
            _ => return None,
        }
    }
    Some(out)
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Option<Expr> {
        let mut items = vec![self.and()?];
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            items.push(self.and()?);
        }
        Some(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Or(items)
        })
    }

    fn and(&mut self) -> Option<Expr> {
        let mut items = vec![self.unary()?];
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            items.push(self.unary()?);
        }
        Some(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::And(items)
        })
    }

    fn unary(&mut self) -> Option<Expr> {
        let tok = self.peek()?.clone();
        self.pos += 1;
        match tok {
            Tok::Not => Some(Expr::Not(Box::new(self.unary()?))),
            Tok::Open => {
                let inner = self.or()?;
                if self.peek() == Some(&Tok::Close) {
                    self.pos += 1;
                    Some(inner)
                } else {
                    None
                }
            }
            Tok::Tag(tag) => Some(Expr::Tag(tag)),
            _ => None,
        }
    }
}
