use std::rc::Rc;

use retrolm_tensor::{IndexTensor, Tensor};

use crate::error::{ModelError, Result};
use super::config::ModelDims;

/// An owned affine projection `x -> x * Wᵀ + b`.
///
/// `w` keeps the `[out, in]` shape the weight file format stores; the
/// transpose used on every forward call is precomputed once here rather
/// than recomputed per token, since the weights never change after load.
pub struct LinearWeights {
    pub w: Rc<Tensor>,
    pub b: Tensor,
    w_t: Tensor,
}

impl LinearWeights {
    pub fn new(w: Tensor, b: Tensor) -> Result<Self> {
        Self::from_shared(Rc::new(w), b)
    }

    /// Builds a `LinearWeights` from a weight matrix already shared by
    /// reference — used for the language-model head, whose `w` is tied to
    /// the token-embedding matrix (see [`EmbeddingWeights`]).
    pub fn from_shared(w: Rc<Tensor>, b: Tensor) -> Result<Self> {
        if w.rows() != b.cols() || b.rows() != 1 {
            return Err(ModelError::InvalidInput(format!(
                "linear weight/bias shape mismatch: w={:?} b={:?}",
                w.shape(),
                b.shape()
            )));
        }
        let w_t = w.transpose();
        Ok(LinearWeights { w, b, w_t })
    }
}

/// An owned token- or position-embedding table, shape `[vocab, embed]`.
pub struct EmbeddingWeights {
    pub weight: Rc<Tensor>,
}

impl EmbeddingWeights {
    pub fn new(weight: Tensor) -> Self {
        EmbeddingWeights { weight: Rc::new(weight) }
    }
}

/// The four projections of a single self-attention block, each `[embed, embed]`.
pub struct AttentionWeights {
    pub q: LinearWeights,
    pub k: LinearWeights,
    pub v: LinearWeights,
    pub o: LinearWeights,
}

/// The complete, immutable parameter set of the single-layer transformer.
pub struct TransformerParameters {
    pub token_embed: EmbeddingWeights,
    pub pos_embed: Tensor,
    pub attn: AttentionWeights,
    pub w1: LinearWeights,
    pub w2: LinearWeights,
    /// Tied to `token_embed`: `lm_head.w` is the same `Rc<Tensor>` as
    /// `token_embed.weight`, so the two are bit-identical by construction
    /// and cost nothing extra to keep in sync.
    pub lm_head: LinearWeights,
    pub dims: ModelDims,
}

/// Given input `x: [n, in]` and weights `(W: [out, in], b: [1, out])`,
/// returns `x · Wᵀ + b` of shape `[n, out]`. The bias adds as a row
/// broadcast.
pub fn linear(x: &Tensor, weights: &LinearWeights) -> Result<Tensor> {
    let projected = x.matmul(&weights.w_t)?;
    Ok(projected.add(&weights.b)?)
}

/// Given a `1×k` index vector and an embedding table of shape
/// `[vocab, embed]`, gathers the `k` rows it names. Any index `>= vocab`
/// fails with `InvalidInput` — checked here, ahead of the generic
/// `IndexError` that `Tensor::row_select` would otherwise raise, since an
/// out-of-vocabulary token id is a caller-input problem, not a bounds bug.
pub fn embedding_lookup(idx: &IndexTensor, weights: &EmbeddingWeights) -> Result<Tensor> {
    let vocab = weights.weight.rows();
    for &id in idx.data() {
        if id as usize >= vocab {
            return Err(ModelError::InvalidInput(format!(
                "token id {id} exceeds vocabulary size {vocab}"
            )));
        }
    }
    Ok(weights.weight.row_select(idx)?)
}

/// Element-wise rectifier: `max(x, 0)`.
pub fn relu(x: &Tensor) -> Result<Tensor> {
    Ok(x.relu()?)
}

/// Row-wise softmax with max-subtraction stabilization (see
/// `Tensor::softmax_rows` for the numerics).
pub fn softmax(x: &Tensor) -> Result<Tensor> {
    Ok(x.softmax_rows()?)
}
