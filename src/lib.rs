//! cuidar-rag - 돌봄 가이드 질의응답 엔진
//!
//! 의도 분류기의 확신 있는 예측을 우선 사용하고,
//! 확신이 없으면 BM25 / TF-IDF 통계 랭커로 폴백하는
//! 하이브리드 검색 엔진입니다.

pub mod cli;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod intent;
pub mod knowledge;

// Re-exports
pub use embedding::{EmbeddingProvider, GeminiEmbedding, TaskType, get_api_key, has_api_key};
pub use engine::{EngineBuilder, EngineConfig, EngineHandle, HealthStatus, QueryEngine, QueryResponse, QueryStage};
pub use error::KnowledgeBaseError;
pub use intent::{
    GateDecision, IntentClassifier, IntentGate, IntentPrediction, PrototypeClassifier,
    PrototypeConfig, planned_embedding_calls,
};
pub use knowledge::{
    Bm25Params, Bm25Ranker, DocumentIndex, IndexState, ItemId, KnowledgeBase, KnowledgeItem,
    Lemmatizer, Normalizer, RankedHit, ResultMerger, ResultSource, ScoredResult,
    VectorSpaceRanker, get_data_dir,
};
