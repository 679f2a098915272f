use clap::Parser;

/// RetroLM — a from-scratch inference engine for a small decoder-only
/// transformer, targeted at memory- and CPU-constrained environments.
#[derive(Debug, Parser)]
#[command(name = "retrolm", version, about)]
pub struct Args {
    /// Path to the directory of weight files (see the weight file format
    /// in the design docs: one `[rows, cols]` binary matrix per file).
    #[arg(default_value = "./weights")]
    pub weights_dir: String,

    /// Maximum number of tokens to decode per REPL turn.
    #[arg(long, default_value_t = 256)]
    pub max_tokens: usize,

    /// Sampling temperature. Non-positive values are normalized to 1.0
    /// by the sampler itself, not rejected here.
    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    /// Overrides the wall-clock PRNG seed. Intended for reproducible runs
    /// and for this binary's own integration tests.
    #[arg(long)]
    pub seed: Option<u64>,
}
