use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use mython::interpreter;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let source = match (args.next(), args.next()) {
        (Some(path), None) => {
            fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
        }
        (None, _) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            buffer
        }
        (Some(_), Some(_)) => bail!("Only one input file is supported"),
    };

    let output = interpreter::run(&source)?;
    print!("{output}");
    Ok(())
}
