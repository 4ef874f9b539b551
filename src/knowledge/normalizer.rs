//! Lexical Normalizer - 원문을 정규화된 토큰 열로 변환
//!
//! 색인과 질의에 동일하게 적용됩니다:
//! 1. 소문자화
//! 2. 문자/숫자/악센트 문자/공백 외 문자를 공백으로 치환
//! 3. 공백 기준 분할
//! 4. 2글자 이하 토큰 제거
//! 5. 불용어 제거
//! 6. (선택) 표제어 변환

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::stopwords::{DOMAIN_KEEP_TERMS, PORTUGUESE_STOPWORDS};

/// 허용 문자 외 문자 (Latin-1 악센트 문자는 유지, × ÷ 제외)
static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-zà-öø-ÿ\s]").expect("Invalid regex"));

/// 최소 토큰 길이 (문자 수, 이 값 이하는 제거)
const MAX_DROPPED_LEN: usize = 2;

// ============================================================================
// Lemmatizer Trait
// ============================================================================

/// 표제어 변환기 트레이트
///
/// 외부 형태소 분석기를 연결하는 지점입니다. 이 크레이트는 구현을 소유하지 않습니다.
pub trait Lemmatizer: Send + Sync {
    /// 토큰을 표제어로 변환
    fn lemmatize(&self, token: &str) -> String;
}

impl<F> Lemmatizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn lemmatize(&self, token: &str) -> String {
        self(token)
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// 정규화기
#[derive(Clone)]
pub struct Normalizer {
    stopwords: HashSet<String>,
    lemmatizer: Option<Arc<dyn Lemmatizer>>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("stopwords", &self.stopwords.len())
            .field("lemmatizer", &self.lemmatizer.is_some())
            .finish()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::portuguese(DOMAIN_KEEP_TERMS)
    }
}

impl Normalizer {
    /// 임의의 불용어 집합으로 생성
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: stopwords.into_iter().map(Into::into).collect(),
            lemmatizer: None,
        }
    }

    /// 포르투갈어 불용어에서 `keep` 단어를 뺀 집합으로 생성
    pub fn portuguese(keep: &[&str]) -> Self {
        Self::new(
            PORTUGUESE_STOPWORDS
                .iter()
                .filter(|w| !keep.contains(w))
                .copied(),
        )
    }

    /// 표제어 변환기 연결
    pub fn with_lemmatizer(mut self, lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        self.lemmatizer = Some(lemmatizer);
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// 텍스트 정규화
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = STRIP_RE.replace_all(&lowered, " ");

        cleaned
            .split_whitespace()
            .filter(|token| token.chars().count() > MAX_DROPPED_LEN)
            .filter(|token| !self.stopwords.contains(*token))
            .map(|token| match &self.lemmatizer {
                Some(lemmatizer) => lemmatizer.lemmatize(token),
                None => token.to_string(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
