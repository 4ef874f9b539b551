//! 시작 단계 에러 타입
//!
//! 지식베이스를 읽지 못하면 서비스를 시작하지 않습니다.
//! 질의 처리 중에는 에러를 노출하지 않고 SystemFallback 결과로 끝납니다.

use std::path::PathBuf;

use crate::knowledge::ItemId;

/// 지식베이스 로딩 에러
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeBaseError {
    #[error("failed to read knowledge base {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed knowledge base: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate knowledge item id: {id}")]
    DuplicateId { id: ItemId },
}
