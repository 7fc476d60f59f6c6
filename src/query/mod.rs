pub mod ident;
pub mod builder;
pub mod expr;
pub mod pivot;
