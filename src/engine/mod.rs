//! Query Engine - 질의 처리 파이프라인
//!
//! Received -> Normalized -> ClassifierScored
//!   -> Trusted => Answered
//!   -> Deferred -> FallbackRanked -> Merged -> Answered
//!
//! 모든 경로는 Answered로 끝나며, 좋은 답이 없으면 SystemFallback 결과를 냅니다.
//! 엔진은 시작 시 한 번 만들어지고 이후 불변이므로 여러 질의를 동시에 처리해도 됩니다.

mod config;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::intent::{GateDecision, IntentClassifier, IntentGate};
use crate::knowledge::{
    top_k, Bm25Ranker, DocumentIndex, IndexState, KnowledgeBase, Normalizer, RankedHit,
    ResultMerger, ResultSource, ScoredResult, VectorSpaceRanker,
};

pub use config::{
    EngineConfig, DEFAULT_TOP_K, ENV_BM25_B, ENV_BM25_K1, ENV_CONFIDENCE_THRESHOLD,
    ENV_MIN_SCORE, ENV_TOP_K,
};

// ============================================================================
// Types
// ============================================================================

/// 질의 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<ScoredResult>,
}

/// 생존 확인 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub items: usize,
}

/// 파이프라인 단계 (로그용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Received,
    Normalized,
    ClassifierScored,
    Trusted,
    Deferred,
    FallbackRanked,
    Merged,
    Answered,
}

// ============================================================================
// QueryEngine
// ============================================================================

/// 하이브리드 검색 엔진
pub struct QueryEngine {
    kb: Arc<KnowledgeBase>,
    normalizer: Normalizer,
    index: Arc<DocumentIndex>,
    bm25: Bm25Ranker,
    vector: VectorSpaceRanker,
    classifier: Option<Arc<dyn IntentClassifier>>,
    gate: IntentGate,
    merger: ResultMerger,
    config: EngineConfig,
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("items", &self.kb.len())
            .field("vocabulary", &self.index.vocabulary_size())
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl QueryEngine {
    pub fn builder(kb: KnowledgeBase) -> EngineBuilder {
        EngineBuilder::new(kb)
    }

    /// 질의 처리
    ///
    /// 에러를 반환하지 않습니다. 분류기 호출 실패는 Defer로 처리됩니다.
    pub async fn query(&self, text: &str, requested_top_k: Option<i64>) -> QueryResponse {
        let top_k = self.config.effective_top_k(requested_top_k);
        trace_stage(QueryStage::Received, text);

        let tokens = self.normalizer.normalize(text);
        trace_stage(QueryStage::Normalized, &tokens.join(" "));

        if let Some(trusted) = self.classify(&tokens).await {
            trace_stage(QueryStage::Trusted, &trusted.topic);
            // 랭커는 실행하지 않음
            let results = self.merger.merge(Some(trusted), &[], &[], top_k);
            trace_stage(QueryStage::Answered, "classifier");
            return QueryResponse {
                query: text.to_string(),
                results,
            };
        }
        trace_stage(QueryStage::Deferred, "");

        let bm25 = self.ranked(self.bm25.score(&tokens), top_k, ResultSource::Bm25);
        let vector = self.ranked(self.vector.score(&tokens), top_k, ResultSource::Vector);
        trace_stage(QueryStage::FallbackRanked, "");

        let results = self.merger.merge(None, &bm25, &vector, top_k);
        trace_stage(QueryStage::Merged, "");

        tracing::debug!(
            "Answered {:?}: {} result(s), first={:?}",
            text,
            results.len(),
            results.first().map(|r| r.source)
        );
        trace_stage(QueryStage::Answered, "fallback");

        QueryResponse {
            query: text.to_string(),
            results,
        }
    }

    /// 분류기 호출 + 게이트. Trust면 결과 한 건
    async fn classify(&self, tokens: &[String]) -> Option<ScoredResult> {
        let classifier = self.classifier.as_ref()?;
        // 빈 질의는 분류기를 거치지 않고 폴백으로
        if tokens.is_empty() {
            return None;
        }

        let prediction = match classifier.classify(tokens).await {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::warn!("Classifier {} failed, deferring: {:#}", classifier.name(), e);
                return None;
            }
        };
        tracing::debug!(
            stage = ?QueryStage::ClassifierScored,
            "predicted={} confidence={:.4}",
            prediction.item_id,
            prediction.confidence
        );

        match self.gate.decide(&prediction, &self.kb) {
            GateDecision::Trust {
                item_id,
                confidence,
            } => self
                .kb
                .get(&item_id)
                .map(|item| ScoredResult::from_item(item, confidence as f64, ResultSource::Classifier)),
            GateDecision::Defer => None,
        }
    }

    /// 랭커 출력 정렬 후 결과로 변환 (동점은 항목 ID 오름차순)
    fn ranked(&self, hits: Vec<RankedHit>, k: usize, source: ResultSource) -> Vec<ScoredResult> {
        let kb = &self.kb;
        top_k(hits, k, |doc| kb.item(doc).map(|item| &item.id))
            .into_iter()
            .filter_map(|hit| {
                kb.item(hit.doc)
                    .map(|item| ScoredResult::from_item(item, hit.score, source))
            })
            .collect()
    }

    /// 생존 확인
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            items: self.kb.len(),
        }
    }

    /// 주제 추천 (지식베이스 전체에 고르게 분산, 중복 제외)
    pub fn suggestions(&self, limit: usize) -> Vec<&str> {
        let total = self.kb.len();
        let mut topics: Vec<&str> = Vec::with_capacity(limit.min(total));
        if limit == 0 {
            return topics;
        }
        for slot in 0..limit.min(total) {
            let position = slot * total / limit.min(total);
            if let Some(item) = self.kb.item(position) {
                if !topics.contains(&item.topic.as_str()) {
                    topics.push(item.topic.as_str());
                }
            }
        }
        topics
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 연결된 분류기 이름 (폴백 전용이면 None)
    pub fn classifier_name(&self) -> Option<&str> {
        self.classifier.as_ref().map(|c| c.name())
    }
}

fn trace_stage(stage: QueryStage, detail: &str) {
    tracing::debug!(stage = ?stage, "{}", detail);
}

// ============================================================================
// EngineBuilder
// ============================================================================

/// 엔진 빌더
pub struct EngineBuilder {
    kb: KnowledgeBase,
    normalizer: Normalizer,
    classifier: Option<Arc<dyn IntentClassifier>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            kb,
            normalizer: Normalizer::default(),
            classifier: None,
            config: EngineConfig::default(),
        }
    }

    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// 분류기 연결 (없으면 폴백 전용)
    pub fn classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 문서 인덱스를 만들고 랭커에 주입
    pub fn build(self) -> QueryEngine {
        let documents: Vec<Vec<String>> = self
            .kb
            .iter()
            .map(|item| self.normalizer.normalize(&item.document_text()))
            .collect();
        let index = Arc::new(DocumentIndex::build(&documents));

        tracing::info!(
            "Query engine ready: {} items, classifier={}",
            self.kb.len(),
            self.classifier.as_ref().map(|c| c.name()).unwrap_or("none")
        );

        QueryEngine {
            bm25: Bm25Ranker::new(Arc::clone(&index), self.config.bm25),
            vector: VectorSpaceRanker::new(Arc::clone(&index)),
            gate: IntentGate::new(self.config.confidence_threshold),
            merger: ResultMerger::new(self.config.min_score),
            kb: Arc::new(self.kb),
            normalizer: self.normalizer,
            index,
            classifier: self.classifier,
            config: self.config,
        }
    }
}

// ============================================================================
// EngineHandle
// ============================================================================

/// 교체 가능한 엔진 핸들
///
/// 질의는 현재 엔진의 `Arc`를 복제해 사용하므로 교체 중에도 일관된 상태만 봅니다.
#[derive(Debug)]
pub struct EngineHandle {
    state: RwLock<IndexState<QueryEngine>>,
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHandle {
    /// 색인 전 상태로 생성
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::Building),
        }
    }

    /// 완성된 엔진으로 생성
    pub fn ready(engine: QueryEngine) -> Self {
        Self {
            state: RwLock::new(IndexState::Ready(Arc::new(engine))),
        }
    }

    /// 엔진을 통째로 교체
    pub fn install(&self, engine: QueryEngine) {
        let engine = Arc::new(engine);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = IndexState::Ready(engine);
    }

    /// 현재 엔진 (색인 중이면 None)
    pub fn current(&self) -> Option<Arc<QueryEngine>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.ready().cloned()
    }

    /// 생존 확인 (색인 중이면 status = "building")
    pub fn health(&self) -> HealthStatus {
        match self.current() {
            Some(engine) => engine.health(),
            None => HealthStatus {
                status: "building",
                items: 0,
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
