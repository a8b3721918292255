//! Writer CLI library (`spec.md` §6.3): parses arguments, dispatches
//! each input file to a typed archive section, and writes the archive.
//!
//! Mirrors `tokmd`'s `lib.rs`/`cli.rs` split: the binary in
//! `src/bin/litertlm-writer.rs` is a thin `main` that prints and exits
//! on error; all the logic lives here in [`run`].

mod cli;
mod dispatch;
mod section_metadata;

use clap::Parser;

pub use cli::Cli;

/// Installs a `tracing-subscriber` `fmt` layer gated by `RUST_LOG`
/// (default `info`), matching `driver-tester`'s init pattern.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Parses arguments from the process's own `argv`, dispatches inputs,
/// and writes the archive. Returns an error on any `--section_metadata`
/// mismatch, unreadable input file, or write failure; the caller is
/// responsible for surfacing it and exiting non-zero.
pub fn run() -> anyhow::Result<()> {
    init_tracing();
    run_with(std::env::args_os())
}

/// Same as [`run`], but parses `args` instead of the process's `argv` —
/// the seam integration tests drive directly.
pub fn run_with<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let sections = section_metadata::parse_section_metadata(cli.section_metadata.as_deref(), cli.inputs.len())?;
    let inputs = dispatch::build_section_inputs(&cli.inputs, &sections)?;

    tracing::info!(output = %cli.output.display(), num_sections = inputs.len(), "writing archive");
    litertlm_writer::write_archive(&cli.output, Vec::new(), inputs)?;
    tracing::info!(output = %cli.output.display(), "archive written");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_output_and_section_metadata_flags() {
        let cli = Cli::parse_from([
            "litertlm-writer",
            "-o",
            "out.litertlm",
            "--section_metadata",
            "tflite:name=tf_lite_embedder",
            "model.tflite",
        ]);
        assert_eq!(cli.output.to_str().unwrap(), "out.litertlm");
        assert_eq!(cli.section_metadata.as_deref(), Some("tflite:name=tf_lite_embedder"));
        assert_eq!(cli.inputs.len(), 1);
    }

    #[test]
    fn cli_defaults_output_when_omitted() {
        let cli = Cli::parse_from(["litertlm-writer", "model.tflite"]);
        assert_eq!(cli.output.to_str().unwrap(), "out.litertlm");
        assert!(cli.section_metadata.is_none());
    }
}
