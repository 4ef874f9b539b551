//! Vector-Space Ranker - TF-IDF 코사인 유사도
//!
//! 질의 벡터는 색인 시 계산한 `idf_tfidf` 테이블로 만듭니다.
//! 코퍼스에 없는 term은 가중치 0입니다.

use std::sync::Arc;

use super::index::{norm, DocumentIndex, SparseVector};
use super::RankedHit;

// ============================================================================
// VectorSpaceRanker
// ============================================================================

/// TF-IDF 벡터 공간 랭커
#[derive(Debug, Clone)]
pub struct VectorSpaceRanker {
    index: Arc<DocumentIndex>,
}

impl VectorSpaceRanker {
    pub fn new(index: Arc<DocumentIndex>) -> Self {
        Self { index }
    }

    /// 모든 문서와의 코사인 유사도 (문서 순서, 정렬 안 됨)
    pub fn score(&self, query: &[String]) -> Vec<RankedHit> {
        let index = &self.index;
        let query_vector = index.query_vector(query);
        let query_norm = norm(&query_vector);

        (0..index.len())
            .map(|doc| {
                let score = match index.tfidf_vector(doc) {
                    Some(doc_vector) => {
                        let doc_norm = index.tfidf_norm(doc);
                        if query_norm == 0.0 || doc_norm == 0.0 {
                            0.0
                        } else {
                            sparse_dot(&query_vector, doc_vector) / (query_norm * doc_norm)
                        }
                    }
                    None => 0.0,
                };
                RankedHit { doc, score }
            })
            .collect()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 희소 벡터 내적 (작은 쪽을 순회)
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

/// 밀집 벡터 코사인 유사도
///
/// 길이가 다르거나 비어 있거나 노름이 0이면 0.0을 반환합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
