//! The autoregressive generation loop: prefill, then repeated decode steps
//! with temperature sampling, a stop rule, and streaming emission.

use log::trace;
use retrolm_sampler::TemperatureSampler;
use retrolm_tensor::{IndexTensor, Tensor};

use crate::error::Result;
use crate::transformer::{transformer_forward, AttentionCache, TransformerParameters};

/// Stop-rule and streaming-policy byte boundaries (see spec §4.5, §9 Open
/// Questions: non-printable tokens terminate generation at `\n`/`>=127`,
/// and are otherwise suppressed from the visible stream but still appended
/// to the output sequence).
const NEWLINE: usize = 10;
const TERMINATE_AT_OR_ABOVE: usize = 127;
const PRINTABLE_RANGE: std::ops::RangeInclusive<u8> = 32..=126;

/// Owns one generation session's cache and the `[1, 1]` decode-step index
/// tensor, reused across every decode step instead of being reallocated
/// (see spec §9, "per-step allocation churn").
pub struct GenerationSession<'p> {
    params: &'p TransformerParameters,
    cache: AttentionCache,
    scratch_idx: IndexTensor,
}

impl<'p> GenerationSession<'p> {
    pub fn new(params: &'p TransformerParameters) -> Result<Self> {
        Ok(GenerationSession {
            params,
            cache: AttentionCache::new(params.dims.embed)?,
            scratch_idx: IndexTensor::scalar(0),
        })
    }

    /// One-shot forward pass over the entire prompt, populating the cache.
    /// The resulting logits are discarded; prefill exists only to prime
    /// the key/value cache before interactive decoding begins.
    pub fn prefill(&mut self, prompt: &[u8]) -> Result<()> {
        if prompt.is_empty() {
            return Ok(());
        }
        let tokens: Vec<u32> = prompt.iter().map(|&b| b as u32).collect();
        let idx = IndexTensor::row(tokens);
        transformer_forward(self.params, &idx, 0, &mut self.cache)?;
        Ok(())
    }

    /// Advances the cache by one token and returns the `[1, vocab]` logits
    /// row for the next token.
    pub fn decode_step(&mut self, last_token: u8) -> Result<Tensor> {
        self.scratch_idx.set_scalar(last_token as u32)?;
        let pos = self.cache.len();
        transformer_forward(self.params, &self.scratch_idx, pos, &mut self.cache)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Runs prefill followed by up to `max_tokens` decode steps, sampling each
/// next token with `sampler` and invoking `sink` immediately for every
/// printable emitted byte (codes 32-126). Returns the full output sequence,
/// including non-printable bytes that were appended but not streamed.
///
/// Generation stops early if a sampled token is the newline character
/// (code 10) or falls outside the byte-printable range (code >= 127); that
/// terminating token itself is never appended to the output or streamed.
pub fn generate<F: FnMut(u8)>(
    params: &TransformerParameters,
    prompt: &[u8],
    max_tokens: usize,
    sampler: &mut TemperatureSampler,
    mut sink: F,
) -> Result<Vec<u8>> {
    let mut session = GenerationSession::new(params)?;
    session.prefill(prompt)?;

    let mut last_token = *prompt.last().unwrap_or(&0);
    let mut output = Vec::with_capacity(max_tokens);

    for _ in 0..max_tokens {
        let logits = session.decode_step(last_token)?;
        let next_id = sampler.sample(logits.data());
        trace!("sampled token id {next_id}");

        if next_id == NEWLINE || next_id >= TERMINATE_AT_OR_ABOVE {
            break;
        }

        let byte = next_id as u8;
        output.push(byte);
        if PRINTABLE_RANGE.contains(&byte) {
            sink(byte);
        }
        last_token = byte;
    }

    Ok(output)
}
