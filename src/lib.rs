//! A single-pass compiler from a tiny C-like language to x86-64 assembly.
//!
//! `tokenizer` -> `parser` -> `frame` -> `codegen`. Each stage runs once and
//! hands its output to the next; the first error stops the pipeline.

pub mod codegen;
pub mod error;
pub mod frame;
pub mod parser;
pub mod tokenizer;

pub use codegen::*;
pub use error::*;
pub use frame::assign_offsets;
pub use parser::*;
pub use tokenizer::*;

/// Compiles a whole program to AT&T-syntax assembly defining `main`.
pub fn compile(src: &str) -> CompileResult<String> {
    let tokens = tokenize(src)?;
    let mut func = Parser::new(src.as_bytes().to_vec(), tokens).parse()?;
    assign_offsets(&mut func);
    Codegen::new(&func).program()
}
