//! Document Index - 코퍼스 통계 사전 계산
//!
//! 시작 시 한 번 만들고 이후 읽기 전용으로 두 랭커(BM25, TF-IDF)가 공유합니다.
//! 갱신이 필요하면 전체를 새로 만들어 통째로 교체합니다.
//!
//! 두 가지 idf 테이블을 따로 유지합니다:
//! - `idf`: BM25용 `ln(1 + (N - df + 0.5) / (df + 0.5))`
//! - `idf_tfidf`: 벡터 공간용 `ln(N / df)`

use std::collections::HashMap;
use std::sync::Arc;

/// 희소 가중치 벡터 (term -> weight)
pub type SparseVector = HashMap<String, f64>;

/// 인덱스 준비 상태
///
/// 완성된 인덱스(또는 인덱스를 소유한 엔진)만 `Ready`로 공개됩니다.
#[derive(Debug)]
pub enum IndexState<T = DocumentIndex> {
    /// 아직 색인 중
    Building,
    /// 조회 가능
    Ready(Arc<T>),
}

impl<T> Default for IndexState<T> {
    fn default() -> Self {
        IndexState::Building
    }
}

impl<T> Clone for IndexState<T> {
    fn clone(&self) -> Self {
        match self {
            IndexState::Building => IndexState::Building,
            IndexState::Ready(inner) => IndexState::Ready(Arc::clone(inner)),
        }
    }
}

impl<T> IndexState<T> {
    pub fn ready(&self) -> Option<&Arc<T>> {
        match self {
            IndexState::Ready(inner) => Some(inner),
            IndexState::Building => None,
        }
    }
}

// ============================================================================
// DocumentIndex
// ============================================================================

/// 불변 문서 인덱스
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    n: usize,
    avgdl: f64,
    lengths: Vec<usize>,
    df: HashMap<String, usize>,
    idf: HashMap<String, f64>,
    idf_tfidf: HashMap<String, f64>,
    freqs: Vec<HashMap<String, u32>>,
    tfidf_vectors: Vec<SparseVector>,
    tfidf_norms: Vec<f64>,
    /// term -> 해당 term을 포함한 문서 번호 (오름차순)
    postings: HashMap<String, Vec<usize>>,
}

impl DocumentIndex {
    /// 토큰 열 목록으로 인덱스 생성
    ///
    /// 문서 번호는 입력 순서와 같습니다.
    pub fn build(documents: &[Vec<String>]) -> Self {
        let n = documents.len();
        let lengths: Vec<usize> = documents.iter().map(Vec::len).collect();
        let avgdl = if n > 0 {
            lengths.iter().sum::<usize>() as f64 / n as f64
        } else {
            0.0
        };

        let freqs: Vec<HashMap<String, u32>> = documents
            .iter()
            .map(|tokens| {
                let mut counts = HashMap::new();
                for token in tokens {
                    *counts.entry(token.clone()).or_insert(0u32) += 1;
                }
                counts
            })
            .collect();

        // 문서 빈도 (집합 기준)
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        for (doc, counts) in freqs.iter().enumerate() {
            for term in counts.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
                postings.entry(term.clone()).or_default().push(doc);
            }
        }

        let idf: HashMap<String, f64> = df
            .iter()
            .map(|(term, &freq)| (term.clone(), bm25_idf(n, freq)))
            .collect();

        let idf_tfidf: HashMap<String, f64> = df
            .iter()
            .map(|(term, &freq)| (term.clone(), tfidf_idf(n, freq)))
            .collect();

        let tfidf_vectors: Vec<SparseVector> = freqs
            .iter()
            .map(|counts| weigh(counts, &idf_tfidf))
            .collect();
        let tfidf_norms = tfidf_vectors.iter().map(norm).collect();

        tracing::info!(
            "Built document index: {} documents, {} terms, avgdl={:.2}",
            n,
            df.len(),
            avgdl
        );

        Self {
            n,
            avgdl,
            lengths,
            df,
            idf,
            idf_tfidf,
            freqs,
            tfidf_vectors,
            tfidf_norms,
            postings,
        }
    }

    /// 문서 수 (N)
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 평균 문서 길이
    pub fn avgdl(&self) -> f64 {
        self.avgdl
    }

    /// 어휘 크기
    pub fn vocabulary_size(&self) -> usize {
        self.df.len()
    }

    pub fn doc_len(&self, doc: usize) -> usize {
        self.lengths.get(doc).copied().unwrap_or(0)
    }

    pub fn df(&self, term: &str) -> usize {
        self.df.get(term).copied().unwrap_or(0)
    }

    /// BM25 idf (미등록 term은 0)
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// TF-IDF idf (미등록 term은 0)
    pub fn idf_tfidf(&self, term: &str) -> f64 {
        self.idf_tfidf.get(term).copied().unwrap_or(0.0)
    }

    /// 문서 내 term 빈도
    pub fn tf(&self, doc: usize, term: &str) -> u32 {
        self.freqs
            .get(doc)
            .and_then(|counts| counts.get(term))
            .copied()
            .unwrap_or(0)
    }

    pub fn tfidf_vector(&self, doc: usize) -> Option<&SparseVector> {
        self.tfidf_vectors.get(doc)
    }

    pub(crate) fn tfidf_norm(&self, doc: usize) -> f64 {
        self.tfidf_norms.get(doc).copied().unwrap_or(0.0)
    }

    /// term을 포함한 문서 번호 목록
    pub(crate) fn postings(&self, term: &str) -> &[usize] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 질의 토큰을 TF-IDF 벡터로 변환 (미등록 term은 제외)
    pub fn query_vector(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            if self.idf_tfidf.contains_key(token) {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }
        }
        weigh(&counts, &self.idf_tfidf)
    }
}

// ============================================================================
// Weighting
// ============================================================================

/// BM25 idf (평활화)
pub fn bm25_idf(n: usize, df: usize) -> f64 {
    let n = n as f64;
    let df = df as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// 전통적인 TF-IDF idf
pub fn tfidf_idf(n: usize, df: usize) -> f64 {
    if df == 0 {
        return 0.0;
    }
    (n as f64 / df as f64).ln()
}

fn weigh(counts: &HashMap<String, u32>, idf: &HashMap<String, f64>) -> SparseVector {
    counts
        .iter()
        .map(|(term, &tf)| {
            let weight = tf as f64 * idf.get(term).copied().unwrap_or(0.0);
            (term.clone(), weight)
        })
        .collect()
}

/// 희소 벡터 L2 노름
pub fn norm(vector: &SparseVector) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Vec<String>> {
        texts
            .iter()
            .map(|t| t.split_whitespace().map(String::from).collect())
            .collect()
    }

    #[test]
    fn test_basic_statistics() {
        let index = DocumentIndex::build(&docs(&[
            "banho higiene idoso",
            "diabetes alimentação idoso",
        ]));

        assert_eq!(index.len(), 2);
        assert!((index.avgdl() - 3.0).abs() < 1e-9);
        assert_eq!(index.df("idoso"), 2);
        assert_eq!(index.df("banho"), 1);
        assert_eq!(index.df("ausente"), 0);
        assert_eq!(index.vocabulary_size(), 5);
    }

    #[test]
    fn test_df_uses_set_semantics() {
        let index = DocumentIndex::build(&docs(&["queda queda queda", "banho"]));
        assert_eq!(index.df("queda"), 1);
        assert_eq!(index.tf(0, "queda"), 3);
        assert_eq!(index.doc_len(0), 3);
    }

    #[test]
    fn test_idf_tables_are_distinct() {
        let index = DocumentIndex::build(&docs(&["banho idoso", "diabetes idoso"]));

        // ln(1 + 0.5 / 2.5) = ln(1.2)
        assert!((index.idf("idoso") - 1.2f64.ln()).abs() < 1e-9);
        // ln(2 / 2) = 0
        assert!(index.idf_tfidf("idoso").abs() < 1e-9);

        // ln(1 + 1.5 / 1.5) = ln(2) == ln(2 / 1)
        assert!((index.idf("banho") - 2f64.ln()).abs() < 1e-9);
        assert!((index.idf_tfidf("banho") - 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_idf_monotonic_and_non_negative() {
        let n = 20;
        let mut previous = f64::INFINITY;
        for df in 1..=n {
            let idf = bm25_idf(n, df);
            assert!(idf < previous, "idf must decrease as df grows");
            if df <= (n + 1) / 2 {
                assert!(idf >= 0.0);
            }
            previous = idf;
        }
    }

    #[test]
    fn test_empty_corpus() {
        let index = DocumentIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.avgdl(), 0.0);
        assert!(index.query_vector(&["banho".to_string()]).is_empty());
    }

    #[test]
    fn test_tfidf_vector() {
        let index = DocumentIndex::build(&docs(&["banho banho idoso", "diabetes idoso"]));
        let vector = index.tfidf_vector(0).unwrap();
        assert!((vector["banho"] - 2.0 * 2f64.ln()).abs() < 1e-9);
        assert!(vector["idoso"].abs() < 1e-9);
        assert!((index.tfidf_norm(0) - 2.0 * 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_query_vector_skips_unknown_terms() {
        let index = DocumentIndex::build(&docs(&["banho idoso", "diabetes idoso"]));
        let q = index.query_vector(&["banho".to_string(), "xyz".to_string()]);
        assert_eq!(q.len(), 1);
        assert!(q.contains_key("banho"));
    }

    #[test]
    fn test_postings() {
        let index = DocumentIndex::build(&docs(&["banho idoso", "diabetes idoso"]));
        let mut idoso = index.postings("idoso").to_vec();
        idoso.sort_unstable();
        assert_eq!(idoso, vec![0, 1]);
        assert_eq!(index.postings("banho"), &[0]);
        assert!(index.postings("nada").is_empty());
    }

    #[test]
    fn test_index_state() {
        assert!(IndexState::<DocumentIndex>::default().ready().is_none());
        let state = IndexState::Ready(Arc::new(DocumentIndex::build(&docs(&["banho"]))));
        assert_eq!(state.ready().map(|i| i.len()), Some(1));
    }
}
