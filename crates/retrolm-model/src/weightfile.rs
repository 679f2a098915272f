//! Binary weight-file loader.
//!
//! Each weight matrix lives in its own file: a 4-byte little-endian row
//! count, a 4-byte little-endian column count, then `rows * cols` IEEE-754
//! single-precision floats in row-major order. This module reads that
//! format and assembles the full [`TransformerParameters`] from a
//! directory containing the fixed set of files the spec names.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use retrolm_tensor::Tensor;

use crate::error::{ModelError, Result};
use crate::transformer::config::ModelDims;
use crate::transformer::layers::{AttentionWeights, EmbeddingWeights, LinearWeights, TransformerParameters};

/// Reads one `[rows, cols]` tensor from its binary file.
fn read_tensor_file(path: &Path) -> Result<Tensor> {
    let mut file = File::open(path).map_err(|e| {
        ModelError::FileFormat(format!("failed to open {}: {e}", path.display()))
    })?;

    let mut header = [0u8; 8];
    file.read_exact(&mut header)?;
    let rows = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let cols = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

    let expected_bytes = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| ModelError::FileFormat(format!("{}: dimensions overflow", path.display())))?;
    let mut raw = vec![0u8; expected_bytes];
    file.read_exact(&mut raw).map_err(|e| {
        ModelError::FileFormat(format!(
            "{}: expected {rows}x{cols} floats, short read: {e}",
            path.display()
        ))
    })?;

    let data: Vec<f32> = raw
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect();

    debug!("loaded {} -> [{rows}, {cols}]", path.display());
    Ok(Tensor::new(rows, cols, data)?)
}

fn read_linear(dir: &Path, weight_stem: &str, bias_stem: &str) -> Result<LinearWeights> {
    let w = read_tensor_file(&dir.join(format!("{weight_stem}.bin")))?;
    let b = read_tensor_file(&dir.join(format!("{bias_stem}.bin")))?;
    LinearWeights::new(w, b)
}

impl TransformerParameters {
    /// Loads the fixed set of weight files from `dir` and assembles the
    /// full parameter set. `dir` must exist and be a directory; any
    /// missing or malformed file is `FileError`/`FileFormat`, and any
    /// inconsistency between the loaded shapes (e.g. `W1`'s input width
    /// not matching the embedding width) is `InvalidInput`.
    pub fn from_weights_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir: PathBuf = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(ModelError::Config(format!(
                "weights directory not found: {}",
                dir.display()
            )));
        }

        let token_embed_tensor = read_tensor_file(&dir.join("token_embed.bin"))?;
        let pos_embed = read_tensor_file(&dir.join("pos_embed.bin"))?;

        let vocab = token_embed_tensor.rows();
        let embed = token_embed_tensor.cols();
        let max_seq_len = pos_embed.rows();
        if pos_embed.cols() != embed {
            return Err(ModelError::InvalidInput(format!(
                "pos_embed width {} does not match token_embed width {embed}",
                pos_embed.cols()
            )));
        }

        let token_embed_rc = Rc::new(token_embed_tensor);
        let token_embed = EmbeddingWeights { weight: token_embed_rc.clone() };

        let attn = AttentionWeights {
            q: read_linear(&dir, "Wq_weight", "Wq_bias")?,
            k: read_linear(&dir, "Wk_weight", "Wk_bias")?,
            v: read_linear(&dir, "Wv_weight", "Wv_bias")?,
            o: read_linear(&dir, "Wo_weight", "Wo_bias")?,
        };
        for lw in [&attn.q, &attn.k, &attn.v, &attn.o] {
            if lw.w.rows() != embed || lw.w.cols() != embed {
                return Err(ModelError::InvalidInput(format!(
                    "attention projection shape {:?} does not match embed width {embed}",
                    lw.w.shape()
                )));
            }
        }

        let w1 = read_linear(&dir, "W1_weight", "W1_bias")?;
        let w2 = read_linear(&dir, "W2_weight", "W2_bias")?;
        let ff = w1.w.rows();
        if w1.w.cols() != embed {
            return Err(ModelError::InvalidInput(format!(
                "W1 input width {} does not match embed width {embed}",
                w1.w.cols()
            )));
        }
        if w2.w.rows() != embed || w2.w.cols() != ff {
            return Err(ModelError::InvalidInput(format!(
                "W2 shape {:?} does not match [embed={embed}, ff={ff}]",
                w2.w.shape()
            )));
        }

        // The LM head's weight matrix is not stored on disk; it is tied to
        // token_embed. Only its bias is a separate file.
        let lm_bias = read_tensor_file(&dir.join("lm_head_bias.bin"))?;
        if lm_bias.cols() != vocab {
            return Err(ModelError::InvalidInput(format!(
                "lm_head_bias width {} does not match vocab size {vocab}",
                lm_bias.cols()
            )));
        }
        let lm_head = LinearWeights::from_shared(token_embed_rc, lm_bias)?;

        Ok(TransformerParameters {
            token_embed,
            pos_embed,
            attn,
            w1,
            w2,
            lm_head,
            dims: ModelDims { vocab, embed, ff, max_seq_len },
        })
    }
}
