use serde::{Deserialize, Serialize};

use attendx_core::embedding::Embedding;
use attendx_core::extractor::{EmbeddingExtractor, ExtractError};

/// On-disk shape produced by the external capture/extraction tooling: a
/// JSON document listing every face found in one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub num_faces: usize,
    pub faces: Vec<CaptureFace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureFace {
    pub embedding: Vec<f64>,
}

impl CaptureSummary {
    pub fn single(embedding: Vec<f64>) -> Self {
        Self {
            num_faces: 1,
            faces: vec![CaptureFace { embedding }],
        }
    }
}

/// Extractor over pre-extracted capture summaries. The exactly-one-face
/// rule lives here so the pipeline sees the same typed failures it would
/// get from a live extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryFileExtractor;

impl EmbeddingExtractor for SummaryFileExtractor {
    fn extract(&self, sample: &[u8]) -> Result<Embedding, ExtractError> {
        let summary: CaptureSummary = serde_json::from_slice(sample)
            .map_err(|err| ExtractError::Decode(format!("invalid capture summary: {err}")))?;

        let mut faces = summary.faces;
        match faces.len() {
            0 => Err(ExtractError::NoFace),
            1 => Ok(Embedding::from_raw(faces.remove(0).embedding)),
            count => Err(ExtractError::MultipleFaces { count }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendx_core::embedding::EMBEDDING_LEN;

    fn summary_bytes(faces: usize) -> Vec<u8> {
        let summary = CaptureSummary {
            num_faces: faces,
            faces: (0..faces)
                .map(|_| CaptureFace {
                    embedding: vec![0.1; EMBEDDING_LEN],
                })
                .collect(),
        };
        serde_json::to_vec(&summary).unwrap()
    }

    #[test]
    fn single_face_yields_embedding() {
        let embedding = SummaryFileExtractor.extract(&summary_bytes(1)).unwrap();
        assert_eq!(embedding.len(), EMBEDDING_LEN);
    }

    #[test]
    fn empty_summary_is_no_face() {
        let err = SummaryFileExtractor.extract(&summary_bytes(0)).unwrap_err();
        assert!(matches!(err, ExtractError::NoFace));
    }

    #[test]
    fn crowd_is_rejected_with_count() {
        let err = SummaryFileExtractor.extract(&summary_bytes(3)).unwrap_err();
        assert!(matches!(err, ExtractError::MultipleFaces { count: 3 }));
    }

    #[test]
    fn garbage_bytes_fail_decode() {
        let err = SummaryFileExtractor.extract(b"not json").unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }
}
