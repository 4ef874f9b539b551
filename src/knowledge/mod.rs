//! Knowledge 모듈 - 지식베이스와 통계 기반 검색
//!
//! - Store: 불변 지식 항목 (JSON 로드)
//! - Normalizer: 색인/질의 공통 토큰 정규화
//! - Index: df, 두 종류의 idf, TF-IDF 벡터
//! - BM25 / Vector: 두 가지 랭커
//! - Hybrid: 분류기 결과와 랭커 결과 병합

mod store;
mod stopwords;
mod normalizer;
mod index;
mod bm25;
mod vector;
mod hybrid;

// Re-exports
pub use store::{
    KnowledgeBase, KnowledgeItem, ItemId,
    get_data_dir, default_knowledge_base_path, KNOWLEDGE_BASE_ENV,
};
pub use stopwords::{PORTUGUESE_STOPWORDS, DOMAIN_KEEP_TERMS};
pub use normalizer::{Normalizer, Lemmatizer};
pub use index::{DocumentIndex, IndexState, SparseVector, bm25_idf, tfidf_idf};
pub use bm25::{Bm25Ranker, Bm25Params, bm25_term_weight};
pub use vector::{VectorSpaceRanker, cosine_similarity, sparse_dot};
pub use hybrid::{ResultMerger, ResultSource, ScoredResult, DEFAULT_MIN_SCORE, DEFAULT_MODULE};

/// 랭커 출력 한 건 (문서 번호, 스코어)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
    pub doc: usize,
    pub score: f64,
}

/// 스코어 내림차순 정렬 후 상위 `top_k`
///
/// 동점이면 `tie_key`(보통 항목 ID) 오름차순으로 정렬합니다.
pub fn top_k<K, F>(mut hits: Vec<RankedHit>, top_k: usize, tie_key: F) -> Vec<RankedHit>
where
    K: Ord,
    F: Fn(usize) -> K,
{
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| tie_key(a.doc).cmp(&tie_key(b.doc)))
    });
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_sorts_descending() {
        let hits = vec![
            RankedHit { doc: 0, score: 0.5 },
            RankedHit { doc: 1, score: 2.0 },
            RankedHit { doc: 2, score: 1.0 },
        ];
        let ranked = top_k(hits, 2, |doc| doc);
        assert_eq!(ranked.iter().map(|h| h.doc).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_top_k_ties_by_ascending_key() {
        let ids = [ItemId::from(30), ItemId::from(10), ItemId::from(20)];
        let hits = (0..3).map(|doc| RankedHit { doc, score: 1.0 }).collect();
        let ranked = top_k(hits, 3, |doc| ids[doc].clone());
        assert_eq!(ranked.iter().map(|h| h.doc).collect::<Vec<_>>(), vec![1, 2, 0]);
    }
}
