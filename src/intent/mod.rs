//! Intent 모듈 - 의도 분류기 계약과 신뢰도 게이트
//!
//! - `IntentClassifier`: 정규화된 토큰 -> (예측 항목 ID, 신뢰도)
//! - `IntentGate`: 예측을 그대로 믿을지(Trust) 랭커로 넘길지(Defer) 결정
//! - `PrototypeClassifier`: 임베딩 프로토타입 기반 기본 분류기

mod phrases;
mod prototype;

use anyhow::Result;
use async_trait::async_trait;

use crate::knowledge::{ItemId, KnowledgeBase};

pub use phrases::training_phrases;
pub use prototype::{planned_embedding_calls, PrototypeClassifier, PrototypeConfig};

/// 기본 신뢰도 임계값
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

// ============================================================================
// Classifier Contract
// ============================================================================

/// 분류기 예측
#[derive(Debug, Clone, PartialEq)]
pub struct IntentPrediction {
    pub item_id: ItemId,
    /// 0.0 ~ 1.0
    pub confidence: f32,
}

/// 의도 분류기 트레이트
///
/// 모델이 고정되어 있으면 같은 입력에 같은 결과를 내야 합니다.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// 정규화된 토큰으로 의도 예측
    async fn classify(&self, tokens: &[String]) -> Result<IntentPrediction>;

    /// 분류기 이름
    fn name(&self) -> &str;
}

// ============================================================================
// IntentGate
// ============================================================================

/// 게이트 결정
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// 분류기 예측을 그대로 사용
    Trust { item_id: ItemId, confidence: f32 },
    /// 폴백 랭커로 넘김
    Defer,
}

/// 신뢰도 게이트 (상태 없음)
#[derive(Debug, Clone, Copy)]
pub struct IntentGate {
    threshold: f32,
}

impl Default for IntentGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl IntentGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `confidence > threshold` 이고 예측 ID가 지식베이스에 있을 때만 Trust
    pub fn decide(&self, prediction: &IntentPrediction, kb: &KnowledgeBase) -> GateDecision {
        if prediction.confidence > self.threshold && kb.contains(&prediction.item_id) {
            GateDecision::Trust {
                item_id: prediction.item_id.clone(),
                confidence: prediction.confidence,
            }
        } else {
            GateDecision::Defer
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
