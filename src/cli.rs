//! Command-line interface for the Tessera closure inspector.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tessera_core::{Closure, ClosureError, Expr, ValueType};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Inspect closure records and the code that moves them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the record layout of a capture set
    Layout {
        #[command(flatten)]
        captures: CaptureArgs,
        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the CLIF of the task and spawn functions for a capture set
    Clif {
        #[command(flatten)]
        captures: CaptureArgs,
        /// Prefix of the generated function names
        #[arg(long, default_value = "closure")]
        name: String,
    },
    /// Compile the task and spawn functions to an object file
    Object {
        #[command(flatten)]
        captures: CaptureArgs,
        #[arg(long, default_value = "closure")]
        name: String,
        /// Output path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Fold allocation extents to a constant element count
    AllocSize {
        /// Allocation name used in diagnostics
        #[arg(long, default_value = "alloc")]
        name: String,
        /// Extents: integers, or names for values known only at run time
        #[arg(value_parser = parse_extent, allow_negative_numbers = true)]
        extents: Vec<Expr>,
    },
    /// Tell whether a runtime function takes an implicit user_context
    Classify {
        symbol: String,
    },
}

#[derive(Args)]
pub struct CaptureArgs {
    /// Scalar capture, as `name:type` (e.g. `x:int32`, `v:float32x4`)
    #[arg(long = "var", value_name = "NAME:TYPE", value_parser = parse_capture)]
    pub vars: Vec<(String, ValueType)>,
    /// Buffer capture, as `name:element-type`
    #[arg(long = "buffer", value_name = "NAME:TYPE", value_parser = parse_capture)]
    pub buffers: Vec<(String, ValueType)>,
    /// Target triple (defaults to the host)
    #[arg(long)]
    pub target: Option<target_lexicon::Triple>,
}

impl CaptureArgs {
    pub fn closure(&self) -> Result<Closure, ClosureError> {
        let mut closure = Closure::new();
        for (name, ty) in &self.vars {
            closure.add_var(name.as_str(), *ty)?;
        }
        for (name, elem_type) in &self.buffers {
            closure.add_buffer(name.as_str(), *elem_type)?;
        }
        Ok(closure)
    }
}

fn parse_capture(text: &str) -> Result<(String, ValueType), String> {
    let (name, ty) = text
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:TYPE, got `{text}`"))?;
    if name.is_empty() {
        return Err(format!("missing capture name in `{text}`"));
    }
    let ty = ty.parse::<ValueType>().map_err(|e| e.to_string())?;
    Ok((name.to_owned(), ty))
}

fn parse_extent(text: &str) -> Result<Expr, String> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Expr::int(value));
    }
    let is_name = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if is_name {
        Ok(Expr::var(text))
    } else {
        Err(format!("`{text}` is neither an integer nor a name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_capture() {
        assert_eq!(
            parse_capture("x:int32").unwrap(),
            ("x".to_owned(), ValueType::int(32))
        );
        assert_eq!(
            parse_capture("a:b:uint8").unwrap(),
            ("a:b".to_owned(), ValueType::uint(8))
        );
        assert!(parse_capture("x").is_err());
        assert!(parse_capture(":int32").is_err());
        assert!(parse_capture("x:float").is_err());
    }

    #[test]
    fn test_parse_extent() {
        assert_eq!(parse_extent("16").unwrap(), Expr::int(16));
        assert_eq!(parse_extent("-3").unwrap(), Expr::int(-3));
        assert_eq!(parse_extent("width").unwrap(), Expr::var("width"));
        assert!(parse_extent("4x").is_err());
    }
}
