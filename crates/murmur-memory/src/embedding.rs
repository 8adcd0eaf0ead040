//! Embedding generation and vector similarity.
//!
//! The engine treats the embedder as an injectable capability so a real
//! model-backed implementation can replace [`PlaceholderEmbedder`] without
//! touching anything else.

use async_trait::async_trait;

use murmur_core::error::EmbeddingError;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a vector of exactly [`dimension`](Self::dimension)
    /// components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Output vector length.
    fn dimension(&self) -> usize;
}

/// Deterministic placeholder embedder.
///
/// Not semantically meaningful, but exactly reproducible: identical text
/// always yields an identical unit vector, which is what retrieval tests
/// and the similarity pipeline need. Each character folds
/// `sin(code * (index + 1)) * 0.1` into one component, then the vector is
/// L2-normalized.
#[derive(Debug, Clone)]
pub struct PlaceholderEmbedder {
    dimension: usize,
}

impl PlaceholderEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0_f64; self.dimension];
        for (i, ch) in text.chars().enumerate() {
            let code = ch as u32 as f64;
            acc[i % self.dimension] += (code * (i as f64 + 1.0)).sin() * 0.1;
        }
        let magnitude = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            for v in &mut acc {
                *v /= magnitude;
            }
        }
        acc.into_iter().map(|v| v as f32).collect()
    }
}

#[async_trait]
impl Embedder for PlaceholderEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.generate(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ or either magnitude is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        mag_a += f64::from(*x) * f64::from(*x);
        mag_b += f64::from(*y) * f64::from(*y);
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a.sqrt() * mag_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = PlaceholderEmbedder::new(16);
        let a = embedder.embed("the same text").await.unwrap();
        let b = embedder.embed("the same text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn self_similarity_is_one() {
        let embedder = PlaceholderEmbedder::new(32);
        for text in ["a", "hello world", "Zażółć gęślą jaźń"] {
            let v = embedder.embed(text).await.unwrap();
            let sim = cosine_similarity(&v, &v);
            assert!((sim - 1.0).abs() < 1e-6, "self-similarity for {:?}: {}", text, sim);
        }
    }

    #[tokio::test]
    async fn different_text_differs() {
        let embedder = PlaceholderEmbedder::new(32);
        let a = embedder.embed("alpha").await.unwrap();
        let b = embedder.embed("omega").await.unwrap();
        assert!(cosine_similarity(&a, &b) < 1.0 - 1e-6);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let embedder = PlaceholderEmbedder::new(8);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        // Zero magnitude never divides.
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }
}
