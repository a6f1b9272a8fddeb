// nom parsers: column formulas and legacy import method files

pub mod ast;
pub mod formula;
pub mod legacy;
pub mod lexer;

// Public API re-exports
pub use ast::{BinaryOp, Expr, Function};
pub use formula::parse_formula;
