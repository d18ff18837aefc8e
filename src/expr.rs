use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::value::Value;

/// Compiled selector expression. Immutable once built; identifiers are plain
/// names and carry no per-evaluation state, so one tree can be evaluated from
/// many threads at once.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Identifier(Arc<str>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Between {
        operand: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    In {
        operand: Box<Expr>,
        list: Vec<Value>,
        negated: bool,
    },
    Like {
        operand: Box<Expr>,
        pattern: LikePattern,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum UnaryOp {
    #[strum(to_string = "-")] Neg,
    #[strum(to_string = "+")] Plus,
    #[strum(to_string = "NOT")] Not,
    #[strum(to_string = "IS NULL")] IsNull,
    #[strum(to_string = "IS NOT NULL")] IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum BinaryOp {
    #[strum(to_string = "+")] Add,
    #[strum(to_string = "-")] Sub,
    #[strum(to_string = "*")] Mul,
    #[strum(to_string = "/")] Div,
    #[strum(to_string = "=")] Eq,
    #[strum(to_string = "<>")] Neq,
    #[strum(to_string = "<")] Lt,
    #[strum(to_string = "<=")] Le,
    #[strum(to_string = ">")] Gt,
    #[strum(to_string = ">=")] Ge,
    #[strum(to_string = "AND")] And,
    #[strum(to_string = "OR")] Or,
}

/// A LIKE pattern translated once into an anchored regular expression.
#[derive(Debug, Clone)]
pub struct LikePattern {
    pattern: String,
    escape: Option<char>,
    regex: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikePatternError {
    DanglingEscape,
    Regex(String),
}

impl LikePattern {
    /// `%` matches any run of characters, `_` exactly one. The escape character
    /// makes the character after it literal.
    pub fn new(pattern: &str, escape: Option<char>) -> Result<Self, LikePatternError> {
        let mut source = String::with_capacity(pattern.len() * 2 + 8);
        source.push_str("(?s)^");
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if Some(c) == escape {
                match chars.next() {
                    Some(next) => literal.push(next),
                    None => return Err(LikePatternError::DanglingEscape),
                }
                continue;
            }
            match c {
                '%' | '_' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(if c == '%' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| LikePatternError::Regex(e.to_string()))?;
        Ok(LikePattern { pattern: pattern.to_string(), escape, regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn escape(&self) -> Option<char> {
        self.escape
    }
}

// Two patterns are the same if they were written the same way.
impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.escape == other.escape
    }
}

impl fmt::Display for Expr {
    /// Fully parenthesized rendering, parseable as a selector again.
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Unary { op: op @ (UnaryOp::IsNull | UnaryOp::IsNotNull), operand } => {
                write!(f, "({} {})", operand, op)
            }
            Expr::Unary { op, operand } => write!(f, "({} {})", op, operand),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Between { operand, low, high, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({} {}BETWEEN {} AND {})", operand, not, low, high)
            }
            Expr::In { operand, list, negated } => {
                let not = if *negated { "NOT " } else { "" };
                let items: Vec<String> = list.iter().map(|v| v.to_string()).collect();
                write!(f, "({} {}IN ({}))", operand, not, items.join(", "))
            }
            Expr::Like { operand, pattern, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({} {}LIKE {}", operand, not, Value::from(pattern.pattern()))?;
                if let Some(escape) = pattern.escape() {
                    write!(f, " ESCAPE {}", Value::from(escape.to_string()))?;
                }
                write!(f, ")")
            }
        }
    }
}
