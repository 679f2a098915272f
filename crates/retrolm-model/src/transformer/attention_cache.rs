use retrolm_tensor::Tensor;

use crate::error::Result;

/// Append-only key/value cache for the attention block.
///
/// Starts empty (`[0, embed]` for both `k` and `v`) and grows monotonically:
/// every call to `append` concatenates new rows on top of the existing ones.
/// There is no in-place mutation of prior rows and no reset short of
/// dropping the cache and building a new one for the next generation
/// session.
pub struct AttentionCache {
    k: Tensor,
    v: Tensor,
}

impl AttentionCache {
    /// Creates an empty cache for the given embedding width.
    pub fn new(embed: usize) -> Result<Self> {
        Ok(AttentionCache { k: Tensor::empty(embed)?, v: Tensor::empty(embed)? })
    }

    pub fn k(&self) -> &Tensor {
        &self.k
    }

    pub fn v(&self) -> &Tensor {
        &self.v
    }

    /// Number of tokens currently held in the cache.
    pub fn len(&self) -> usize {
        self.k.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates `k_new`/`v_new` (each `[n, embed]`) onto the cache,
    /// replacing its contents with the combined rows.
    pub fn append(&mut self, k_new: &Tensor, v_new: &Tensor) -> Result<()> {
        self.k = vstack(&self.k, k_new)?;
        self.v = vstack(&self.v, v_new)?;
        Ok(())
    }
}

fn vstack(top: &Tensor, bottom: &Tensor) -> Result<Tensor> {
    let cols = top.cols();
    let rows = top.rows() + bottom.rows();
    if rows == 0 {
        return Ok(Tensor::empty(cols)?);
    }
    let mut data = Vec::with_capacity(rows * cols);
    data.extend_from_slice(top.data());
    data.extend_from_slice(bottom.data());
    Ok(Tensor::new(rows, cols, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let cache = AttentionCache::new(8).unwrap();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.k().cols(), 8);
    }

    #[test]
    fn test_append_grows_monotonically() {
        let mut cache = AttentionCache::new(2).unwrap();
        let k1 = Tensor::new(3, 2, vec![0.0; 6]).unwrap();
        let v1 = Tensor::new(3, 2, vec![0.0; 6]).unwrap();
        cache.append(&k1, &v1).unwrap();
        assert_eq!(cache.len(), 3);

        let k2 = Tensor::new(1, 2, vec![1.0, 2.0]).unwrap();
        let v2 = Tensor::new(1, 2, vec![3.0, 4.0]).unwrap();
        cache.append(&k2, &v2).unwrap();
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.k().rows(), cache.v().rows());
    }

    #[test]
    fn test_append_preserves_row_order() {
        let mut cache = AttentionCache::new(1).unwrap();
        cache.append(&Tensor::new(1, 1, vec![1.0]).unwrap(), &Tensor::new(1, 1, vec![10.0]).unwrap()).unwrap();
        cache.append(&Tensor::new(1, 1, vec![2.0]).unwrap(), &Tensor::new(1, 1, vec![20.0]).unwrap()).unwrap();
        assert_eq!(cache.k().data(), &[1.0, 2.0]);
        assert_eq!(cache.v().data(), &[10.0, 20.0]);
    }
}
