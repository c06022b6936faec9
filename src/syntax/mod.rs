//! The front end: a hand-rolled scanner plus a recursive-descent parser
//! producing `ast::Node` trees. Brace-delimited rather than
//! indentation-sensitive, with no surface tokens left over for the
//! desugarer — by the time `parse` returns, every operator and piece of
//! call sugar is already an ordinary AST node.

pub mod lexer;
pub mod parser;

pub use parser::parse;

#[cfg(test)]
mod tests;
