pub mod attention_cache;
pub mod config;
pub mod layers;

pub use attention_cache::AttentionCache;
pub use config::ModelDims;
pub use layers::{
    embedding_lookup, linear, relu, softmax, AttentionWeights, EmbeddingWeights, LinearWeights,
    TransformerParameters,
};

use retrolm_tensor::{IndexTensor, Tensor};

use crate::error::{ModelError, Result};

/// Scaled dot-product self-attention with causal masking, a residual
/// connection, and an append-only key/value cache.
///
/// `x` is `[n, embed]`, the new tokens being processed this call. On
/// return, `cache` has grown by exactly `x.rows()` rows.
pub fn attention_forward(
    x: &Tensor,
    weights: &AttentionWeights,
    cache: &mut AttentionCache,
) -> Result<Tensor> {
    let t = cache.len();
    let n = x.rows();
    let embed = x.cols();

    // 1. Project the new tokens.
    let q = linear(x, &weights.q)?;
    let k_new = linear(x, &weights.k)?;
    let v_new = linear(x, &weights.v)?;

    // 2-3. Extend the cache; it now owns K_full/V_full.
    cache.append(&k_new, &v_new)?;
    let k_full = cache.k();
    let v_full = cache.v();

    // 4. Raw attention scores: S = Q . K_full^T, shape [n, t+n].
    let mut scores = q.matmul(&k_full.transpose())?;

    // 5. Scale by 1 / sqrt(embed).
    scores.scale(1.0f32 / (embed as f32).sqrt());

    // 6. Causal mask: query at absolute position t+i may attend to
    // absolute positions 0..=t+i. Scores isn't generally square (it's
    // [n, t+n]), so this is an offset triangular mask rather than the
    // tensor layer's square-only `mask_upper_triangle`.
    for i in 0..n {
        let visible_through = t + i;
        for j in (visible_through + 1)..(t + n) {
            scores.set(i, j, f32::NEG_INFINITY)?;
        }
    }

    // Guard the NaN-denominator case before softmax: a masked row of all
    // -inf would exponentiate to all-zero and divide 0/0. The causal mask
    // always leaves a query's own position visible, so this should never
    // fire if the mask above is correct.
    debug_assert!(
        scores
            .data()
            .chunks(t + n)
            .all(|row| row.iter().any(|v| v.is_finite())),
        "scores row has no finite entries before softmax"
    );

    // 7. Softmax row-wise -> attention weights.
    let attn_weights = softmax(&scores)?;

    // 8. Context: C = A . V_full.
    let context = attn_weights.matmul(v_full)?;

    // 9. Output projection.
    let output = linear(&context, &weights.o)?;

    // 10. Residual.
    Ok(x.add(&output)?)
}

/// Single-layer decoder forward pass: token + positional embeddings,
/// the attention sub-block (which folds in its own residual), a
/// feed-forward sub-block with residual, and the language-model head.
///
/// `tokens` must be a single-row (`[1, n]`) index tensor; any other row
/// count is `InvalidInput`. `pos` is the absolute position of `tokens[0]`
/// — `0` during prefill, `cache.len()` during decode.
pub fn transformer_forward(
    params: &TransformerParameters,
    tokens: &IndexTensor,
    pos: usize,
    cache: &mut AttentionCache,
) -> Result<Tensor> {
    if tokens.rows() != 1 {
        return Err(ModelError::InvalidInput(format!(
            "transformer_forward accepts only single-row token batches, got {} rows",
            tokens.rows()
        )));
    }
    let n = tokens.cols();
    if pos + n > params.dims.max_seq_len {
        return Err(ModelError::InvalidInput(format!(
            "position {pos} + {n} tokens exceeds max_seq_len {}",
            params.dims.max_seq_len
        )));
    }

    // 1. Token embeddings.
    let mut x = embedding_lookup(tokens, &params.token_embed)?;

    // 2. Positional embeddings: rows pos..pos+n of pos_embed, added in.
    let pos_ids: Vec<u32> = (pos as u32..(pos + n) as u32).collect();
    let pos_idx = IndexTensor::row(pos_ids);
    let pos_slice = params.pos_embed.row_select(&pos_idx)?;
    x = x.add(&pos_slice)?;

    // 3. Attention sub-block (residual folded in).
    x = attention_forward(&x, &params.attn, cache)?;

    // 4. Feed-forward sub-block with residual.
    let h = linear(&x, &params.w1)?;
    let h = relu(&h)?;
    let h = linear(&h, &params.w2)?;
    x = x.add(&h)?;

    // 5. Language-model head.
    let logits = linear(&x, &params.lm_head)?;
    Ok(logits)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use retrolm_tensor::Tensor;

    use super::*;

    /// A tiny synthetic model: embed=4, ff=6, vocab=10, max_seq_len=6.
    /// Weights are deterministic (not random) so tests are reproducible
    /// without a PRNG dependency.
    fn tiny_params() -> TransformerParameters {
        let vocab = 10;
        let embed = 4;
        let ff = 6;
        let max_seq_len = 6;

        let mut tok_data = vec![0.0f32; vocab * embed];
        for v in 0..vocab {
            for e in 0..embed {
                tok_data[v * embed + e] = ((v + e) as f32) * 0.01;
            }
        }
        let token_embed_tensor = Tensor::new(vocab, embed, tok_data).unwrap();
        let token_embed_rc = Rc::new(token_embed_tensor);
        let token_embed = EmbeddingWeights { weight: token_embed_rc.clone() };

        let pos_embed = Tensor::zeros(max_seq_len, embed).unwrap();

        let identity = |n: usize| Tensor::identity(n).unwrap();
        let zero_bias = |n: usize| Tensor::zeros(1, n).unwrap();

        let attn = AttentionWeights {
            q: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            k: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            v: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            o: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
        };

        let w1 = LinearWeights::new(Tensor::zeros(ff, embed).unwrap(), zero_bias(ff)).unwrap();
        let w2 = LinearWeights::new(Tensor::zeros(embed, ff).unwrap(), zero_bias(embed)).unwrap();

        let lm_bias = zero_bias(vocab);
        let lm_head = LinearWeights::from_shared(token_embed_rc, lm_bias).unwrap();

        TransformerParameters {
            token_embed,
            pos_embed,
            attn,
            w1,
            w2,
            lm_head,
            dims: ModelDims { vocab, embed, ff, max_seq_len },
        }
    }

    #[test]
    fn test_cache_grows_by_prefill_length() {
        let params = tiny_params();
        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let tokens = IndexTensor::row(vec![1, 2, 3, 4]);
        transformer_forward(&params, &tokens, 0, &mut cache).unwrap();
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_cache_grows_one_per_decode_step() {
        // Spec end-to-end scenario 4: a 4-token prefill, one decode step
        // (cache -> 5), then nine further steps (cache -> 14).
        let params = tiny_params();
        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let tokens = IndexTensor::row(vec![1, 2, 3, 4]);
        transformer_forward(&params, &tokens, 0, &mut cache).unwrap();
        assert_eq!(cache.len(), 4);

        let step = IndexTensor::scalar(5);
        transformer_forward(&params, &step, cache.len(), &mut cache).unwrap();
        assert_eq!(cache.len(), 5);

        for i in 0..9 {
            transformer_forward(&params, &step, cache.len(), &mut cache).unwrap();
            assert_eq!(cache.len(), 6 + i);
        }
        assert_eq!(cache.len(), 14);
    }

    #[test]
    fn test_rejects_batch_rows_greater_than_one() {
        let params = tiny_params();
        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let bad = IndexTensor::new(2, 2, vec![0, 1, 2, 3]).unwrap();
        assert!(transformer_forward(&params, &bad, 0, &mut cache).is_err());
    }

    #[test]
    fn test_rejects_position_overflow() {
        let params = tiny_params();
        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let tokens = IndexTensor::row(vec![1, 2, 3]);
        // pos=4 + n=3 > max_seq_len=6
        assert!(transformer_forward(&params, &tokens, 4, &mut cache).is_err());
    }

    #[test]
    fn test_prefill_then_logits_equals_tied_embedding_formula() {
        // Spec testable property: "for any weight-tied model, the logits
        // matrix = X . token_embed^T + lm_head_bias". Build a model whose
        // attention output projection and feed-forward sub-block both
        // contribute zero, so X going into the LM head is exactly the
        // token + positional embedding sum, and the formula can be
        // checked directly rather than merely via shape.
        let vocab = 10;
        let embed = 4;
        let ff = 6;
        let max_seq_len = 6;

        let mut tok_data = vec![0.0f32; vocab * embed];
        for v in 0..vocab {
            for e in 0..embed {
                tok_data[v * embed + e] = ((v + e) as f32) * 0.01;
            }
        }
        let token_embed_rc = Rc::new(Tensor::new(vocab, embed, tok_data).unwrap());
        let token_embed = EmbeddingWeights { weight: token_embed_rc.clone() };
        let pos_embed = Tensor::zeros(max_seq_len, embed).unwrap();
        let identity = |n: usize| Tensor::identity(n).unwrap();
        let zero_bias = |n: usize| Tensor::zeros(1, n).unwrap();
        let attn = AttentionWeights {
            q: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            k: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            v: LinearWeights::new(identity(embed), zero_bias(embed)).unwrap(),
            o: LinearWeights::new(Tensor::zeros(embed, embed).unwrap(), zero_bias(embed)).unwrap(),
        };
        let w1 = LinearWeights::new(Tensor::zeros(ff, embed).unwrap(), zero_bias(ff)).unwrap();
        let w2 = LinearWeights::new(Tensor::zeros(embed, ff).unwrap(), zero_bias(embed)).unwrap();
        let lm_bias_data: Vec<f32> = (0..vocab).map(|v| v as f32 * 0.1).collect();
        let lm_bias = Tensor::new(1, vocab, lm_bias_data).unwrap();
        let lm_head = LinearWeights::from_shared(token_embed_rc, lm_bias.copy()).unwrap();

        let params = TransformerParameters {
            token_embed,
            pos_embed,
            attn,
            w1,
            w2,
            lm_head,
            dims: ModelDims { vocab, embed, ff, max_seq_len },
        };

        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let tokens = IndexTensor::row(vec![2]);
        let logits = transformer_forward(&params, &tokens, 0, &mut cache).unwrap();

        let x = embedding_lookup(&tokens, &params.token_embed).unwrap();
        let expected = x.matmul(&params.token_embed.weight.transpose()).unwrap().add(&lm_bias).unwrap();

        assert_eq!(logits.shape(), expected.shape());
        for (a, b) in logits.data().iter().zip(expected.data().iter()) {
            assert!((a - b).abs() < 1e-4, "a={a} b={b}");
        }
    }

    #[test]
    fn test_prefill_vs_stepwise_decode_logits_match() {
        // Running a 3-token prompt through one prefill call and reading the
        // last row of logits must match running three successive
        // single-token decodes against a fresh cache.
        let params = tiny_params();
        let prompt = vec![1u32, 2, 3];

        let mut cache_a = AttentionCache::new(params.dims.embed).unwrap();
        let tokens = IndexTensor::row(prompt.clone());
        let logits_a = transformer_forward(&params, &tokens, 0, &mut cache_a).unwrap();
        // This reference model computes logits only for the whole batch; to
        // compare against the stepwise run, take each token one at a time
        // in the same single prefill-style call, matching spec's
        // end-to-end scenario 5 (the final row after the batch call is
        // what's compared).
        let last_row_a: Vec<f32> = (0..params.dims.vocab)
            .map(|c| logits_a.get(logits_a.rows() - 1, c).unwrap())
            .collect();

        let mut cache_b = AttentionCache::new(params.dims.embed).unwrap();
        let mut last_logits_b = None;
        for (i, &tok) in prompt.iter().enumerate() {
            let step = IndexTensor::scalar(tok);
            let logits = transformer_forward(&params, &step, i, &mut cache_b).unwrap();
            last_logits_b = Some(logits);
        }
        let logits_b = last_logits_b.unwrap();
        let last_row_b: Vec<f32> = (0..params.dims.vocab)
            .map(|c| logits_b.get(0, c).unwrap())
            .collect();

        for (a, b) in last_row_a.iter().zip(last_row_b.iter()) {
            assert!((a - b).abs() < 1e-4, "a={a} b={b}");
        }
    }

    #[test]
    fn test_causal_mask_zero_weight_on_future_positions() {
        // Build an attention-only check: a query at position 0 of a 3-token
        // prefill must assign zero attention weight to positions 1 and 2.
        let params = tiny_params();
        let mut cache = AttentionCache::new(params.dims.embed).unwrap();
        let x = embedding_lookup(&IndexTensor::row(vec![1, 2, 3]), &params.token_embed).unwrap();
        let q = linear(&x, &params.attn.q).unwrap();
        let k_new = linear(&x, &params.attn.k).unwrap();
        let v_new = linear(&x, &params.attn.v).unwrap();
        cache.append(&k_new, &v_new).unwrap();
        let mut scores = q.matmul(&cache.k().transpose()).unwrap();
        scores.scale(1.0 / (params.dims.embed as f32).sqrt());
        for i in 0..3 {
            for j in (i + 1)..3 {
                scores.set(i, j, f32::NEG_INFINITY).unwrap();
            }
        }
        let attn = softmax(&scores).unwrap();
        assert_eq!(attn.get(0, 1).unwrap(), 0.0);
        assert_eq!(attn.get(0, 2).unwrap(), 0.0);
        assert!(attn.get(1, 2).unwrap() == 0.0);
    }
}
