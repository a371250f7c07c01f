//! Rewrites the direct-call stubs of a saved commands unit.
//!
//! `vk-rewrite stubs.ron` rewrites in place; `-o` writes the result elsewhere and `--render`
//! also writes it out as Rust source.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vk_bindgen::{CallConv, FatalError, NativeCallRewriter, StubModule, UNIT_HEADER};

#[derive(Debug, Parser)]
#[command(name = "vk-rewrite", version, about = "Rewrites direct-call command stubs")]
struct Args {
    /// Commands unit saved by the generator (RON).
    input: PathBuf,

    /// Where to write the rewritten unit. Defaults to rewriting INPUT in place.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the rewritten unit as Rust source to this path.
    #[arg(long)]
    render: Option<PathBuf>,

    /// Calling convention of the native commands: `system` or `C`. Defaults to the unit's own.
    #[arg(long)]
    call_conv: Option<CallConv>,
}

fn run(args: &Args) -> Result<(), FatalError> {
    let mut module = StubModule::load(&args.input)?;
    let call_conv = args.call_conv.unwrap_or(module.call_conv);
    let report = NativeCallRewriter::new(call_conv).rewrite(&mut module)?;

    let output = args.output.as_ref().unwrap_or(&args.input);
    module.save(output)?;
    log::info!(
        "{} stubs rewritten, saved to {}",
        report.rewritten.len(),
        output.display()
    );

    if let Some(ref path) = args.render {
        std::fs::write(path, format!("{}{}", UNIT_HEADER, module.render()))?;
        log::info!("rendered to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("vk-rewrite: {}", e);
            ExitCode::FAILURE
        }
    }
}
