use crate::error::EmbedError;
use std::sync::Arc;

const DEFAULT: usize = 384;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Maps strings to fixed-dimension vectors. Implementations must be
/// deterministic for a fixed model.
pub trait Embedder {
    /// Identifies the model and its dimension; stored alongside every snapshot.
    fn model_id(&self) -> String;

    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        if vectors.len() != 1 {
            return Err(EmbedError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> String {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts)
    }
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn model_id(&self) -> String {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts)
    }
}

pub fn embed_in_batches<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let expected = embedder.dimensions();
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_no, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        let embedded = embedder.embed_batch(batch)?;
        if embedded.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: embedded.len(),
            });
        }
        if let Some(bad) = embedded.iter().find(|vector| vector.len() != expected) {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        tracing::debug!(batch = batch_no, size = batch.len(), "embedded batch");
        vectors.extend(embedded);
    }

    Ok(vectors)
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, EmbedError> {
        if dimensions == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        Ok(Self { dimensions })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> String {
        format!("char-trigram-fnv1a-{}", self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(feature = "minilm")]
pub use minilm::MiniLmEmbedder;

#[cfg(feature = "minilm")]
mod minilm {
    use super::Embedder;
    use crate::error::EmbedError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;

    pub const MINILM_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

    pub struct MiniLmEmbedder {
        model: Mutex<TextEmbedding>,
        dimensions: usize,
    }

    impl MiniLmEmbedder {
        pub fn new() -> Result<Self, EmbedError> {
            let mut model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
            )
            .map_err(|error| EmbedError::ModelInit(error.to_string()))?;

            let probe = model
                .embed(vec!["dimension probe"], None)
                .map_err(|error| EmbedError::ModelInit(error.to_string()))?;
            let dimensions = probe
                .first()
                .map(Vec::len)
                .ok_or_else(|| EmbedError::ModelInit("model returned no probe vector".to_string()))?;

            Ok(Self {
                model: Mutex::new(model),
                dimensions,
            })
        }
    }

    impl Embedder for MiniLmEmbedder {
        fn model_id(&self) -> String {
            format!("{MINILM_MODEL_ID}-{}", self.dimensions)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.model
                .lock()
                .embed(texts.to_vec(), Some(texts.len()))
                .map_err(|error| EmbedError::Embedding(error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() -> Result<(), EmbedError> {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow")?;
        let second = embedder.embed("Hydraulic pressure and flow")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn embedder_outputs_expected_length() -> Result<(), EmbedError> {
        let embedder = CharacterNgramEmbedder::new(32)?;
        let vector = embedder.embed("abc")?;
        assert_eq!(vector.len(), 32);
        assert_eq!(embedder.model_id(), "char-trigram-fnv1a-32");
        Ok(())
    }

    #[test]
    fn batches_preserve_input_order() -> Result<(), EmbedError> {
        let embedder = CharacterNgramEmbedder::new(64)?;
        let texts = (0..5).map(|i| format!("passage {i}")).collect::<Vec<_>>();

        let batched = embed_in_batches(&embedder, &texts, 2)?;
        assert_eq!(batched.len(), 5);
        for (text, vector) in texts.iter().zip(&batched) {
            assert_eq!(&embedder.embed(text)?, vector);
        }
        Ok(())
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(
            CharacterNgramEmbedder::new(0),
            Err(EmbedError::ZeroDimension)
        ));
    }

    struct TruncatingEmbedder;

    impl Embedder for TruncatingEmbedder {
        fn model_id(&self) -> String {
            "truncating".to_string()
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }
    }

    #[test]
    fn wrong_vector_length_is_rejected() {
        let result = embed_in_batches(&TruncatingEmbedder, &["x".to_string()], 16);
        assert!(matches!(
            result,
            Err(EmbedError::DimensionMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn boxed_embedder_delegates() -> Result<(), EmbedError> {
        let boxed: Box<dyn Embedder + Send + Sync> = Box::new(CharacterNgramEmbedder::new(16)?);
        assert_eq!(boxed.dimensions(), 16);
        assert_eq!(boxed.embed("abc")?.len(), 16);
        Ok(())
    }
}
