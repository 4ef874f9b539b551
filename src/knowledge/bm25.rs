//! BM25 Ranker - Okapi BM25 스코어링
//!
//! ref: https://en.wikipedia.org/wiki/Okapi_BM25
//!
//! score(D, Q) = Σ idf(t) · tf · (k1 + 1) / (tf + k1 · (1 - b + b · |D| / avgdl))

use std::sync::Arc;

use super::index::DocumentIndex;
use super::RankedHit;

/// BM25 파라미터
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// term frequency 포화 계수
    pub k1: f64,
    /// 문서 길이 정규화 강도 (0.0 ~ 1.0)
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// 단일 term의 BM25 기여도
pub fn bm25_term_weight(idf: f64, tf: f64, doc_len: f64, avgdl: f64, params: Bm25Params) -> f64 {
    let length_ratio = if avgdl > 0.0 { doc_len / avgdl } else { 0.0 };
    let denom = tf + params.k1 * (1.0 - params.b + params.b * length_ratio);
    idf * tf * (params.k1 + 1.0) / denom
}

/// BM25 랭커
///
/// 인덱스는 외부에서 주입되며 질의마다 다시 계산하지 않습니다.
#[derive(Debug, Clone)]
pub struct Bm25Ranker {
    index: Arc<DocumentIndex>,
    params: Bm25Params,
}

impl Bm25Ranker {
    pub fn new(index: Arc<DocumentIndex>, params: Bm25Params) -> Self {
        Self { index, params }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// 모든 문서의 BM25 스코어 (문서 순서, 정렬 안 됨)
    ///
    /// 질의에 같은 토큰이 반복되면 반복 횟수만큼 더해집니다.
    /// 빈 코퍼스면 빈 목록을 반환합니다.
    pub fn score(&self, query: &[String]) -> Vec<RankedHit> {
        let index = &self.index;
        if index.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0.0f64; index.len()];
        let avgdl = index.avgdl();

        for term in query {
            let idf = index.idf(term);
            // term을 포함한 문서만 순회 (역색인)
            for &doc in index.postings(term) {
                let tf = index.tf(doc, term) as f64;
                let doc_len = index.doc_len(doc) as f64;
                scores[doc] += bm25_term_weight(idf, tf, doc_len, avgdl, self.params);
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(doc, score)| RankedHit { doc, score })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(String::from).collect()
    }

    fn ranker(texts: &[&str]) -> Bm25Ranker {
        let docs: Vec<Vec<String>> = texts.iter().map(|t| tokens(t)).collect();
        Bm25Ranker::new(Arc::new(DocumentIndex::build(&docs)), Bm25Params::default())
    }

    #[test]
    fn test_one_score_per_document() {
        let r = ranker(&["banho higiene idoso", "diabetes alimentação idoso", "quedas"]);
        let hits = r.score(&tokens("banho"));
        assert_eq!(hits.len(), 3);
        assert_eq!(hits.iter().map(|h| h.doc).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_shared_terms_rank_higher() {
        let r = ranker(&["banho higiene idoso", "diabetes alimentação idoso"]);
        let hits = r.score(&tokens("banho idoso"));

        // A: ln(2) + ln(1.2), B: ln(1.2) (tf=1, |D|=avgdl 이므로 기여도 = idf)
        assert!((hits[0].score - (2f64.ln() + 1.2f64.ln())).abs() < 1e-9);
        assert!((hits[1].score - 1.2f64.ln()).abs() < 1e-9);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_out_of_vocabulary_scores_zero() {
        let r = ranker(&["banho higiene idoso", "diabetes alimentação idoso"]);
        let hits = r.score(&tokens("computador teclado"));
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        let r = ranker(&[]);
        assert!(r.score(&tokens("banho")).is_empty());
    }

    #[test]
    fn test_contribution_increases_with_tf() {
        let params = Bm25Params::default();
        let mut previous = 0.0;
        for tf in 1..50 {
            let w = bm25_term_weight(0.7, tf as f64, 10.0, 8.0, params);
            assert!(w > previous);
            previous = w;
        }
        // k1 + 1 로 포화
        assert!(previous < 0.7 * (params.k1 + 1.0));
    }

    #[test]
    fn test_longer_documents_penalized() {
        let params = Bm25Params::default();
        let short = bm25_term_weight(1.0, 2.0, 5.0, 10.0, params);
        let long = bm25_term_weight(1.0, 2.0, 20.0, 10.0, params);
        assert!(short > long);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let r = ranker(&["banho higiene", "diabetes"]);
        let once = r.score(&tokens("banho"))[0].score;
        let twice = r.score(&tokens("banho banho"))[0].score;
        assert!((twice - 2.0 * once).abs() < 1e-9);
    }
}
