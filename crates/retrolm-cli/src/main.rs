mod cli;
mod repl;

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::info;
use retrolm_model::TransformerParameters;

use crate::cli::Args;
use crate::repl::Repl;

/// Seeds the PRNG from the wall clock at startup, per the spec's
/// environment section — overridden by `--seed` for reproducible runs.
fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn run(args: Args) -> retrolm_model::Result<()> {
    info!("loading weights from {}", args.weights_dir);
    let params = TransformerParameters::from_weights_dir(&args.weights_dir)?;
    info!(
        "model loaded: vocab={} embed={} ff={} max_seq_len={}",
        params.dims.vocab, params.dims.embed, params.dims.ff, params.dims.max_seq_len
    );

    let seed = args.seed.unwrap_or_else(wall_clock_seed);
    let mut repl = Repl::new(&params, args.max_tokens, args.temperature, seed);

    let stdin = io::stdin();
    let stdout = io::stdout();
    repl.run(stdin.lock(), stdout.lock())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            let code = repl::report_fatal(&err);
            std::process::exit(code);
        }
    }
}
