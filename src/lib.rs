#![doc = include_str!("../README.md")]

mod catalog;
mod codegen;
mod engine;
mod error;
mod exec;
mod ir;
mod lexer;
mod optimizer;
mod parser;

pub use engine::{Evaluator, Options};
pub use error::EvalError;
pub use ir::{Bindable, NumericType};
