//! Untyped expression tree
//!
//! An expression is a tagged node with ordered keyword arguments:
//!
//! ```text
//! (fallback :entries [(entry :selector (status :build-status "stable") :filter (accept-all))])
//! ```
//!
//! The typed layer (selectors and filters) maps tags to concrete variants; this
//! crate only knows the shape.

use std::fmt;

/// A tagged node: `(tag :key value ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub tag: String,
    pub args: Vec<Arg>,
}

/// A keyword argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Null,
    Expr(Box<Expr>),
    List(Vec<Value>),
}

impl Expr {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.push(Arg {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// First argument with the given key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|a| a.key.as_str())
    }

    /// Canonical text form
    pub fn to_expr_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('(');
        out.push_str(&self.tag);
        for arg in &self.args {
            out.push_str(" :");
            out.push_str(&arg.key);
            out.push(' ');
            arg.value.write_to(out);
        }
        out.push(')');
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Kind name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Null => "nil",
            Value::Expr(_) => "expression",
            Value::List(_) => "list",
        }
    }

    pub fn to_expr_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Value::String(s) => write_string(s, out),
            Value::Integer(i) => out.push_str(&i.to_string()),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Null => out.push_str("nil"),
            Value::Expr(e) => e.write_to(out),
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expr_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Expr> for Value {
    fn from(e: Expr) -> Self {
        Value::Expr(Box::new(e))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
