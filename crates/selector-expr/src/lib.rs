//! Selector Expr - text form of serialized selectors and filters
//!
//! Parses and renders the untyped S-expression layer. Mapping tags onto typed
//! selector and filter variants happens in the `run-selector` codec.

pub mod ast;
pub mod parser;

pub use ast::{Arg, Expr, Value};
pub use parser::{parse_expr, MAX_NESTING_DEPTH};
