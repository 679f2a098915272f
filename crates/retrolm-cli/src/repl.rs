//! The console front end: reads one line per turn, drives one generation
//! session against it, and streams printable output back to stdout.
//!
//! This module is deliberately outside the core transformer/attention/
//! sampling path (see the design docs) — it is the "external collaborator"
//! the core specifies only an interface to. Its only obligations are: cap
//! input length, recognize the `quit`/`exit` meta-inputs, skip empty lines,
//! and flush streamed output immediately.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use log::info;
use retrolm_model::{generate, ModelError, Result, TransformerParameters};
use retrolm_sampler::TemperatureSampler;

/// Longest line accepted from the console before truncation. The spec
/// calls 256 bytes "sufficient"; this implementation truncates rather
/// than rejecting an overlong line, since a REPL prompt is not a
/// programming interface a caller needs a hard failure from.
const INPUT_CAP: usize = 256;

/// Number of past turns kept in the REPL's in-memory history window.
/// This is purely a front-end convenience (e.g. for a future "show
/// history" command); it is not fed back into the model; every turn
/// starts a fresh [`retrolm_model::GenerationSession`] with an empty
/// attention cache.
const HISTORY_CAPACITY: usize = 32;

pub struct Repl<'p> {
    params: &'p TransformerParameters,
    max_tokens: usize,
    sampler: TemperatureSampler,
    history: VecDeque<String>,
}

impl<'p> Repl<'p> {
    pub fn new(
        params: &'p TransformerParameters,
        max_tokens: usize,
        temperature: f32,
        seed: u64,
    ) -> Self {
        Repl {
            params,
            max_tokens,
            sampler: TemperatureSampler::new(temperature, seed),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    fn push_history(&mut self, line: String) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    /// Runs the read-eval-print loop against `input`/`output` until the
    /// user types `quit`/`exit` or the input stream is exhausted (EOF).
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        loop {
            write!(output, "> ")?;
            output.flush()?;

            let mut line = String::new();
            let bytes_read = input.read_line(&mut line)?;
            if bytes_read == 0 {
                // EOF: clean shutdown, same as an explicit `quit`.
                writeln!(output)?;
                return Ok(());
            }

            let trimmed = line.trim_end_matches(['\n', '\r']);
            let trimmed = if trimmed.len() > INPUT_CAP { &trimmed[..INPUT_CAP] } else { trimmed };
            let trimmed = trimmed.trim();

            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "quit" || trimmed == "exit" {
                return Ok(());
            }

            self.push_history(trimmed.to_string());
            info!("generating for prompt of {} bytes", trimmed.len());

            let prompt = trimmed.as_bytes();
            generate(self.params, prompt, self.max_tokens, &mut self.sampler, |b| {
                let _ = output.write_all(&[b]);
                let _ = output.flush();
            })?;
            writeln!(output)?;
        }
    }
}

/// Maps a fatal [`ModelError`] to the process-level exit code it carries,
/// after logging its message at ERROR severity. Used by `main` at the
/// top-level error boundary.
pub fn report_fatal(err: &ModelError) -> i32 {
    log::error!("{err}");
    err.exit_code()
}
