//! Text embedding providers
//!
//! Providers are synchronous and may be slow; the engine calls them from
//! `tokio::task::spawn_blocking`.

use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::{Result, StateLockError};

/// Maps text to a fixed-length vector
pub trait EmbeddingProvider: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// Build the provider selected in config
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.trim().to_ascii_lowercase().as_str() {
        "local" | "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "hash" => Ok(Arc::new(HashEmbeddingProvider::new(config.hash_dimension)?)),
        other => Err(StateLockError::Config(format!(
            "Unknown embedding provider: {other} (expected local or hash)"
        ))),
    }
}

/// Local ONNX sentence-embedding model via fastembed
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Models that can be selected by name, with their output dimension
    pub const SUPPORTED_MODELS: &'static [(&'static str, usize)] = &[
        ("all-MiniLM-L6-v2", 384),
        ("bge-small-en-v1.5", 384),
        ("multilingual-e5-small", 384),
    ];

    pub fn new(model_name: &str) -> Result<Self> {
        let (model, dimension) = resolve_model(model_name)?;

        info!(model = model_name, "Loading embedding model");
        let model = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| StateLockError::Embedding(format!("Failed to load {model_name}: {e}")))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let model = match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            EmbeddingModel::MultilingualE5Small
        }
        _ => {
            let supported: Vec<&str> = FastEmbedProvider::SUPPORTED_MODELS
                .iter()
                .map(|(n, _)| *n)
                .collect();
            return Err(StateLockError::Config(format!(
                "Unsupported embedding model: {name} (supported: {})",
                supported.join(", ")
            )));
        }
    };
    Ok((model, 384))
}

impl EmbeddingProvider for FastEmbedProvider {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| StateLockError::Embedding("Embedding model lock poisoned".to_string()))?;

        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| StateLockError::Embedding(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| StateLockError::Embedding("No embedding returned".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic bag-of-words embedder.
///
/// Each lowercase token is hashed with SHA-256 into a signed bucket and
/// the result is L2-normalized. Texts sharing words land close together,
/// which is enough for tests and offline use without a model download.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(StateLockError::Config(
                "Hash embedding dimension must be > 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[test]
    fn test_hash_embedding_is_deterministic() {
        let provider = HashEmbeddingProvider::new(64).unwrap();
        let a = provider.encode("The sky is blue.").unwrap();
        let b = provider.encode("The sky is blue.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_embedding_is_normalized() {
        let provider = HashEmbeddingProvider::new(64).unwrap();
        let v = provider.encode("remember the milk").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_is_case_insensitive() {
        let provider = HashEmbeddingProvider::new(64).unwrap();
        assert_eq!(
            provider.encode("Blue SKY").unwrap(),
            provider.encode("blue sky").unwrap()
        );
    }

    #[test]
    fn test_shared_words_are_closer() {
        let provider = HashEmbeddingProvider::new(256).unwrap();
        let query = provider.encode("what color is the sky").unwrap();
        let related = provider.encode("the sky is blue").unwrap();
        let unrelated = provider.encode("quarterly revenue projections").unwrap();
        assert!(squared_l2(&query, &related) < squared_l2(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = HashEmbeddingProvider::new(8).unwrap();
        assert_eq!(provider.encode("").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashEmbeddingProvider::new(0).is_err());
    }

    #[test]
    fn test_from_config_hash() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            model: "ignored".to_string(),
            hash_dimension: 32,
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.dimension(), 32);
        assert_eq!(provider.name(), "hash");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = EmbeddingConfig {
            provider: "remote".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(from_config(&config), Err(StateLockError::Config(_))));
    }

    #[test]
    fn test_unsupported_model_is_config_error() {
        assert!(matches!(
            resolve_model("gpt-embedding"),
            Err(StateLockError::Config(_))
        ));
        assert!(resolve_model("BGE-small-en-v1.5").is_ok());
    }
}
