//! Knowledge Base - 불변 지식 항목 저장소
//!
//! 시작 시 JSON 파일에서 한 번 로드되고 이후 변경되지 않습니다.
//! 저장 위치 기본값: ~/.cuidar-rag/knowledge_base.json

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeBaseError;

// ============================================================================
// Data Directory
// ============================================================================

/// 지식베이스 파일 경로 환경변수
pub const KNOWLEDGE_BASE_ENV: &str = "CUIDAR_KNOWLEDGE_BASE";

/// 데이터 디렉토리 경로 (~/.cuidar-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cuidar-rag")
}

/// 지식베이스 경로 결정
///
/// 우선순위: `CUIDAR_KNOWLEDGE_BASE` > ~/.cuidar-rag/knowledge_base.json
pub fn default_knowledge_base_path() -> PathBuf {
    if let Ok(path) = std::env::var(KNOWLEDGE_BASE_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    get_data_dir().join("knowledge_base.json")
}

// ============================================================================
// Types
// ============================================================================

/// 지식 항목 식별자
///
/// JSON에서 정수(i64) 또는 문자열로 주어집니다. 소수/불리언은 거부됩니다.
/// 정렬 순서: 숫자(오름차순) < 문자열(사전순)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Number(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

/// 지식 항목 (가이드의 한 주제)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: ItemId,
    pub topic: String,
    #[serde(default)]
    pub module: Option<String>,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl KnowledgeItem {
    /// 색인용 원문: topic + content + keywords
    pub fn document_text(&self) -> String {
        let mut text = String::with_capacity(self.topic.len() + self.content.len() + 1);
        text.push_str(&self.topic);
        text.push(' ');
        text.push_str(&self.content);
        for keyword in &self.keywords {
            text.push(' ');
            text.push_str(keyword);
        }
        text
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 불변 지식베이스
///
/// 순서 있는 항목 목록과 `id -> 위치` 조회 테이블을 가집니다.
/// 항목의 위치가 곧 문서 인덱스의 문서 번호입니다.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
    by_id: HashMap<ItemId, usize>,
}

impl KnowledgeBase {
    /// 항목 목록으로 생성 (중복 id는 거부)
    pub fn from_items(items: Vec<KnowledgeItem>) -> Result<Self, KnowledgeBaseError> {
        let mut by_id = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if by_id.insert(item.id.clone(), position).is_some() {
                return Err(KnowledgeBaseError::DuplicateId {
                    id: item.id.clone(),
                });
            }
        }
        Ok(Self { items, by_id })
    }

    /// JSON 배열 문자열에서 로드
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeBaseError> {
        let items: Vec<KnowledgeItem> =
            serde_json::from_str(json).map_err(|source| KnowledgeBaseError::Parse { source })?;
        Self::from_items(items)
    }

    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> Result<Self, KnowledgeBaseError> {
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeBaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_json_str(&json)?;
        tracing::info!("Loaded knowledge base: {} items from {:?}", kb.len(), path);
        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// id로 항목 조회
    pub fn get(&self, id: &ItemId) -> Option<&KnowledgeItem> {
        self.by_id.get(id).map(|&position| &self.items[position])
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.by_id.contains_key(id)
    }

    /// 위치(문서 번호)로 항목 조회
    pub fn item(&self, position: usize) -> Option<&KnowledgeItem> {
        self.items.get(position)
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeItem> {
        self.items.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
