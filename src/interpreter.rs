//! Driver tying the front-end to the evaluator.
//!
//! Execution pipeline:
//! run -> lex -> parse -> root Compound execute (top-level closure, Context
//! over the output sink).

use std::fmt;

use anyhow::Result;

use crate::ast::ExecResult;
use crate::lexer::Lexer;
use crate::parser;
use crate::runtime::{Closure, Context, RuntimeError};

/// Runs a Mython program, returning everything it printed.
pub fn run(source: &str) -> Result<String> {
    let mut output = String::new();
    run_with_output(source, &mut output)?;
    Ok(output)
}

/// Runs a Mython program against a caller-supplied output sink.
pub fn run_with_output(source: &str, output: &mut dyn fmt::Write) -> Result<()> {
    let mut lexer = Lexer::new(source)?;
    let program = parser::parse_program(&mut lexer)?;

    let mut closure = Closure::new();
    let mut context = Context::new(output);
    match program.execute(&mut closure, &mut context)? {
        ExecResult::Normal(_) => Ok(()),
        ExecResult::Returned(_) => Err(RuntimeError::ReturnOutsideMethod.into()),
    }
}
