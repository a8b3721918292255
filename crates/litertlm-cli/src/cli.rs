//! Command-line surface (`spec.md` §6.3): `writer [-o out.litertlm]
//! [--section_metadata=<spec>] <input-file>...`.
//!
//! Mirrors `tokmd/src/cli.rs`'s `clap`-derive `Parser` convention.

use std::path::PathBuf;

use clap::Parser;

/// Composes a LiteRTLM archive from one or more input files, dispatched
/// to a section type by extension.
#[derive(Parser, Debug)]
#[command(name = "litertlm-writer", version, about, long_about = None)]
pub struct Cli {
    /// Output archive path.
    #[arg(short = 'o', long = "output", value_name = "PATH", default_value = "out.litertlm")]
    pub output: PathBuf,

    /// Per-section metadata, `section_spec (';' section_spec)*` where
    /// `section_spec := name ':' [ kv (',' kv)* ]` and `kv := key '='
    /// value` (`spec.md` §6.3). Must have exactly one `section_spec` per
    /// input file, in the same order.
    #[arg(long = "section_metadata", value_name = "SPEC")]
    pub section_metadata: Option<String>,

    /// Input files, dispatched to a section type by extension.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,
}
