/// Model dimensions, inferred from the shapes of the loaded weight tensors
/// rather than a separate textual configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    /// Vocabulary size (number of token embeddings).
    pub vocab: usize,
    /// Embedding dimension / hidden size.
    pub embed: usize,
    /// Feed-forward inner width.
    pub ff: usize,
    /// Maximum sequence length / context window size.
    pub max_seq_len: usize,
}
