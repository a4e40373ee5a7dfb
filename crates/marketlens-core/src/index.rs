//! Semantic index over a knowledge base
//!
//! A flat, exact inner-product index. Every stored vector is L2-normalized,
//! so the inner product with a normalized query is the cosine similarity.
//! Built once from the whole knowledge base; read-only afterwards.

use tracing::{debug, info};

use crate::embedding::{EmbeddingBackend, EmbeddingError};
use crate::error::Result;
use crate::knowledge::{KnowledgeBase, KnowledgeRecord};

/// A retrieved record with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: KnowledgeRecord,
    /// Position of the record in the knowledge base
    pub position: usize,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    records: Vec<KnowledgeRecord>,
    /// Row-major normalized vectors, `dimension` floats per record
    vectors: Vec<f32>,
    dimension: usize,
}

impl SemanticIndex {
    /// Embed every record in one batch and index the vectors
    ///
    /// An empty knowledge base yields an empty index without calling the
    /// embedder.
    pub async fn build<E>(kb: &KnowledgeBase, embedder: &E) -> Result<Self>
    where
        E: EmbeddingBackend + ?Sized,
    {
        if kb.is_empty() {
            debug!("Empty knowledge base, skipping embedding");
            return Ok(Self::default());
        }

        let inputs: Vec<String> = kb.records().iter().map(|r| r.embedding_input()).collect();
        let vectors = embedder.embed(&inputs).await?;
        let index = Self::from_vectors(kb.records().to_vec(), vectors)?;

        info!(
            records = index.len(),
            dimension = index.dimension,
            model = embedder.model(),
            "Built semantic index"
        );
        Ok(index)
    }

    /// Index precomputed vectors, one per record
    pub fn from_vectors(records: Vec<KnowledgeRecord>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        crate::embedding::validate_batch(records.len(), &vectors)?;
        let dimension = vectors.first().map_or(0, |v| v.len());

        let mut flat = Vec::with_capacity(records.len() * dimension);
        for vector in &vectors {
            flat.extend(normalized(vector));
        }

        Ok(Self {
            records,
            vectors: flat,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector size, 0 for an empty index
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    /// The `k` records most similar to `query`, best first
    ///
    /// Equal scores keep knowledge base order. `k` beyond the corpus size
    /// returns the whole corpus; an empty index returns nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }
            .into());
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::MalformedResponse(
                "query vector contains non-finite values".into(),
            )
            .into());
        }

        let query = normalized(query);
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| inner_product(&query, row))
            .enumerate()
            .collect();

        // stable: ties stay in insertion order
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(position, score)| ScoredRecord {
                record: self.records[position].clone(),
                position,
                score,
            })
            .collect())
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum::<f64>() as f32
}

/// L2-normalize; the zero vector stays zero
fn normalized(vector: &[f32]) -> Vec<f32> {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm <= f64::EPSILON {
        return vector.to_vec();
    }
    vector
        .iter()
        .map(|v| (f64::from(*v) / norm) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::error::Error;
    use crate::knowledge::{Actionability, BusinessImpact, InsightCategory};

    fn record(text: &str) -> KnowledgeRecord {
        KnowledgeRecord {
            id: format!("INSIGHT_{}", text),
            timestamp: Utc::now(),
            category: InsightCategory::SuccessFactors,
            app_category: None,
            insight_text: text.to_string(),
            supporting_data: BTreeMap::new(),
            confidence_score: 0.9,
            business_impact: BusinessImpact::High,
            actionability: Actionability::Immediate,
            recommendations: vec![],
            tags: vec![],
            narrative_source: None,
        }
    }

    fn index() -> SemanticIndex {
        SemanticIndex::from_vectors(
            vec![record("a"), record("b"), record("c")],
            vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_normalized() {
        let v = normalized(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_search_orders_by_cosine() {
        let hits = index().search(&[0.0, 5.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let idx = SemanticIndex::from_vectors(
            vec![record("x"), record("y"), record("z")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let hits = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_k_larger_than_corpus() {
        assert_eq!(index().search(&[1.0, 1.0], 50).unwrap().len(), 3);
        assert!(index().search(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index() {
        let empty = SemanticIndex::default();
        assert!(empty.search(&[1.0, 2.0, 3.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = index().search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Embedding(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_build_skips_embedder_for_empty_kb() {
        let embedder = MockEmbedder::new(4);
        let idx = SemanticIndex::build(&KnowledgeBase::default(), &embedder)
            .await
            .unwrap();
        assert!(idx.is_empty());
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_build_propagates_embedding_failure() {
        let kb = KnowledgeBase::new(vec![record("a")]);
        let result = SemanticIndex::build(&kb, &MockEmbedder::failing(4)).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }
}
