//! Embedding space identity.

use super::EmbeddingProvider;
use pdfchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// The model identity that produced the vectors in an index.
///
/// Vectors from two different spaces are not comparable, so an index only
/// ever holds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingSpace {
    /// Identity of the vectors a provider produces.
    pub fn of(provider: &dyn EmbeddingProvider) -> Self {
        Self {
            provider: provider.provider_name().to_string(),
            model: provider.model_name().to_string(),
            dimensions: provider.dimensions(),
        }
    }

    /// Validate that another space is consistent with this one.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Index(format!(
                "Provider mismatch: index was built with '{}', configured '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Index(format!(
                "Model mismatch: index was built with '{}', configured '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Index(format!(
                "Dimension mismatch: index has {}, configured {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({} dims)", self.provider, self.model, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;

    fn space() -> EmbeddingSpace {
        EmbeddingSpace::of(&MockProvider::new(384))
    }

    #[test]
    fn test_space_of_provider() {
        let space = space();
        assert_eq!(space.provider, "mock");
        assert_eq!(space.model, "trigram-v1");
        assert_eq!(space.dimensions, 384);
        assert_eq!(space.to_string(), "mock/trigram-v1 (384 dims)");
    }

    #[test]
    fn test_validate_consistency_success() {
        assert!(space().validate_consistency(&space()).is_ok());
    }

    #[test]
    fn test_validate_consistency_provider_mismatch() {
        let other = EmbeddingSpace {
            provider: "gemini".to_string(),
            ..space()
        };
        let err = space().validate_consistency(&other).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
        assert!(err.to_string().contains("Provider mismatch"));
    }

    #[test]
    fn test_validate_consistency_model_and_dimension_mismatch() {
        let model = EmbeddingSpace {
            model: "other".to_string(),
            ..space()
        };
        assert!(space()
            .validate_consistency(&model)
            .unwrap_err()
            .to_string()
            .contains("Model mismatch"));

        let dims = EmbeddingSpace {
            dimensions: 768,
            ..space()
        };
        assert!(space()
            .validate_consistency(&dims)
            .unwrap_err()
            .to_string()
            .contains("Dimension mismatch"));
    }
}
