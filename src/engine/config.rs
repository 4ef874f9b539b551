//! 엔진 설정
//!
//! 기본값 + 환경변수 덮어쓰기. 잘못된 값은 경고 후 무시합니다.

use std::str::FromStr;

use crate::intent::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::knowledge::{Bm25Params, DEFAULT_MIN_SCORE};

/// 기본 결과 개수
pub const DEFAULT_TOP_K: usize = 3;

pub const ENV_BM25_K1: &str = "CUIDAR_BM25_K1";
pub const ENV_BM25_B: &str = "CUIDAR_BM25_B";
pub const ENV_CONFIDENCE_THRESHOLD: &str = "CUIDAR_CONFIDENCE_THRESHOLD";
pub const ENV_MIN_SCORE: &str = "CUIDAR_MIN_SCORE";
pub const ENV_TOP_K: &str = "CUIDAR_TOP_K";

/// 검색 엔진 설정
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// BM25 파라미터
    pub bm25: Bm25Params,
    /// 분류기 신뢰도 임계값 (초과해야 Trust)
    pub confidence_threshold: f32,
    /// 폴백 결과 최소 BM25 스코어 (초과해야 채택)
    pub min_score: f64,
    /// top_k 미지정/무효 시 기본값
    pub default_top_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_score: DEFAULT_MIN_SCORE,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl EngineConfig {
    /// 기본값에 환경변수 적용
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(k1) = env_value::<f64>(ENV_BM25_K1) {
            config.bm25.k1 = k1;
        }
        if let Some(b) = env_value::<f64>(ENV_BM25_B) {
            config.bm25.b = b;
        }
        if let Some(threshold) = env_value::<f32>(ENV_CONFIDENCE_THRESHOLD) {
            config.confidence_threshold = threshold;
        }
        if let Some(min_score) = env_value::<f64>(ENV_MIN_SCORE) {
            config.min_score = min_score;
        }
        if let Some(top_k) = env_value::<usize>(ENV_TOP_K).filter(|k| *k >= 1) {
            config.default_top_k = top_k;
        }
        config
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_bm25(mut self, bm25: Bm25Params) -> Self {
        self.bm25 = bm25;
        self
    }

    /// 요청된 top_k 검증 (없거나 1 미만이면 기본값)
    pub fn effective_top_k(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(k) if k >= 1 => usize::try_from(k).unwrap_or(self.default_top_k),
            _ => self.default_top_k,
        }
    }
}

fn env_value<T: FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", var, raw);
            None
        }
    }
}
