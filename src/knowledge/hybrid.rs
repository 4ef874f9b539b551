//! Result Merger - 분류기 결과와 랭커 결과 통합
//!
//! 우선순위:
//! 1. 신뢰된 분류기 결과가 있으면 그 하나만 반환 (랭커 무시)
//! 2. BM25 목록 상위 top_k 중 `min_score` 초과 항목 (id 중복 제거)
//! 3. 아무것도 남지 않으면 SystemFallback 하나
//!
//! 벡터 공간 결과는 진단용으로 함께 받지만 현재 정책에서는 결과에 들어가지 않습니다.
//! BM25 스코어는 상한이 없어 고정 하한과 비교할 수 있지만 코사인은 [0, 1] 범위입니다.

use std::collections::HashSet;

use serde::Serialize;

use super::store::{ItemId, KnowledgeItem};

/// 기본 최소 BM25 스코어
pub const DEFAULT_MIN_SCORE: f64 = 1.0;

/// 모듈이 없는 항목의 모듈 이름
pub const DEFAULT_MODULE: &str = "Geral";

/// SystemFallback 응답
const FALLBACK_TOPIC: &str = "Não entendi bem";
const FALLBACK_MODULE: &str = "Sistema";
const FALLBACK_CONTENT: &str = "Desculpe, não encontrei essa informação no guia. \
     Tente reformular sua pergunta ou use palavras-chave mais simples \
     (ex: 'banho', 'alimentação', 'diabetes').";

// ============================================================================
// Types
// ============================================================================

/// 결과 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// 의도 분류기 (신뢰됨)
    Classifier,
    /// BM25 폴백 검색
    Bm25,
    /// TF-IDF 벡터 검색
    Vector,
    /// 최종 폴백 (답을 찾지 못함)
    SystemFallback,
}

/// 검색 결과 한 건
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    /// 지식 항목 ID (SystemFallback은 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    pub topic: String,
    /// 항목에 모듈이 없으면 "Geral"
    pub module: String,
    pub content: String,
    /// BM25/코사인 스코어 또는 분류기 신뢰도
    pub score: f64,
    pub source: ResultSource,
}

impl ScoredResult {
    /// 지식 항목에서 생성
    pub fn from_item(item: &KnowledgeItem, score: f64, source: ResultSource) -> Self {
        Self {
            id: Some(item.id.clone()),
            topic: item.topic.clone(),
            module: item
                .module
                .clone()
                .unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            content: item.content.clone(),
            score,
            source,
        }
    }

    /// "답을 찾지 못함" 결과 (score 0)
    pub fn system_fallback() -> Self {
        Self {
            id: None,
            topic: FALLBACK_TOPIC.to_string(),
            module: FALLBACK_MODULE.to_string(),
            content: FALLBACK_CONTENT.to_string(),
            score: 0.0,
            source: ResultSource::SystemFallback,
        }
    }
}

// ============================================================================
// ResultMerger
// ============================================================================

/// 결과 병합기
#[derive(Debug, Clone, Copy)]
pub struct ResultMerger {
    min_score: f64,
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORE)
    }
}

impl ResultMerger {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// 결과 병합
    ///
    /// `bm25`와 `vector`는 스코어 내림차순으로 정렬되어 있어야 합니다.
    /// 반환 목록은 비어 있지 않습니다.
    pub fn merge(
        &self,
        classifier: Option<ScoredResult>,
        bm25: &[ScoredResult],
        vector: &[ScoredResult],
        top_k: usize,
    ) -> Vec<ScoredResult> {
        if let Some(trusted) = classifier {
            return vec![trusted];
        }

        let mut seen: HashSet<&ItemId> = HashSet::new();
        let mut results = Vec::with_capacity(top_k.min(bm25.len()));

        for candidate in bm25.iter().take(top_k) {
            if candidate.score <= self.min_score {
                continue;
            }
            let Some(id) = candidate.id.as_ref() else {
                continue;
            };
            if seen.insert(id) {
                results.push(ScoredResult {
                    source: ResultSource::Bm25,
                    ..candidate.clone()
                });
            }
        }

        if let Some(best) = vector.first() {
            tracing::debug!(
                "Vector ranker best: {:?} (cos={:.4})",
                best.id,
                best.score
            );
        }

        if results.is_empty() {
            tracing::debug!(
                "No BM25 candidate above min_score={}, using system fallback",
                self.min_score
            );
            return vec![ScoredResult::system_fallback()];
        }

        results
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, topic: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: ItemId::from(id),
            topic: topic.to_string(),
            module: None,
            content: format!("{} content", topic),
            keywords: vec![],
        }
    }

    fn bm25(id: i64, score: f64) -> ScoredResult {
        ScoredResult::from_item(&item(id, "t"), score, ResultSource::Bm25)
    }

    #[test]
    fn test_trusted_classifier_short_circuits() {
        let merger = ResultMerger::default();
        let trusted = ScoredResult::from_item(&item(2, "Diabetes"), 0.9, ResultSource::Classifier);
        let results = merger.merge(Some(trusted), &[bm25(1, 5.0), bm25(3, 4.0)], &[], 3);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, Some(ItemId::from(2)));
        assert_eq!(results[0].source, ResultSource::Classifier);
        assert!((results[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_min_score_filter() {
        let merger = ResultMerger::default();
        let results = merger.merge(None, &[bm25(1, 3.0), bm25(2, 1.0), bm25(3, 0.5)], &[], 3);

        // 1.0은 하한을 "초과"하지 않음
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, Some(ItemId::from(1)));
        assert_eq!(results[0].source, ResultSource::Bm25);
    }

    #[test]
    fn test_truncates_before_filtering() {
        let merger = ResultMerger::default();
        let results = merger.merge(
            None,
            &[bm25(1, 9.0), bm25(2, 8.0), bm25(3, 7.0), bm25(4, 6.0)],
            &[],
            2,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].id, Some(ItemId::from(2)));
    }

    #[test]
    fn test_deduplicates_first_wins() {
        let merger = ResultMerger::default();
        let results = merger.merge(None, &[bm25(1, 5.0), bm25(1, 4.0), bm25(2, 3.0)], &[], 3);

        let ids: Vec<_> = results.iter().filter_map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![ItemId::from(1), ItemId::from(2)]);
        assert!((results[0].score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_module_defaults_to_geral() {
        let result = bm25(1, 2.0);
        assert_eq!(result.module, DEFAULT_MODULE);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["module"], "Geral");

        let mut with_module = item(2, "Banho");
        with_module.module = Some("Higiene".to_string());
        let result = ScoredResult::from_item(&with_module, 0.9, ResultSource::Classifier);
        assert_eq!(result.module, "Higiene");
    }

    #[test]
    fn test_vector_results_never_populate() {
        let merger = ResultMerger::default();
        let vector = vec![ScoredResult::from_item(&item(9, "v"), 0.99, ResultSource::Vector)];
        let results = merger.merge(None, &[bm25(1, 0.2)], &vector, 3);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, ResultSource::SystemFallback);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_empty_inputs_fall_back() {
        let merger = ResultMerger::default();
        let results = merger.merge(None, &[], &[], 3);
        assert_eq!(results, vec![ScoredResult::system_fallback()]);
        assert!(results[0].id.is_none());
    }

    #[test]
    fn test_descending_order_preserved() {
        let merger = ResultMerger::new(0.0);
        let results = merger.merge(None, &[bm25(4, 3.0), bm25(2, 2.0), bm25(7, 1.5)], &[], 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_serialized_source_tags() {
        let json = serde_json::to_value(ScoredResult::system_fallback()).unwrap();
        assert_eq!(json["source"], "system_fallback");
        assert!(json.get("id").is_none());

        let json = serde_json::to_value(bm25(1, 2.0)).unwrap();
        assert_eq!(json["source"], "bm25");
        assert_eq!(json["id"], 1);
    }
}
