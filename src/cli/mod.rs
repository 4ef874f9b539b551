//! CLI 모듈
//!
//! cuidar-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::embedding::{has_api_key, GeminiEmbedding, TaskType, MIN_INTERVAL};
use crate::engine::{EngineConfig, EngineHandle, QueryEngine, QueryResponse};
use crate::intent::{planned_embedding_calls, PrototypeClassifier, PrototypeConfig};
use crate::knowledge::{
    default_knowledge_base_path, Bm25Params, KnowledgeBase, Normalizer, ResultSource,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "cuidar-rag")]
#[command(version, about = "돌봄 가이드 질의응답 - 의도 분류 + BM25 하이브리드 검색", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 엔진 구성 옵션 (모든 명령 공통)
#[derive(Args, Clone, Debug, Default)]
pub struct EngineArgs {
    /// 지식베이스 JSON 경로 (기본: $CUIDAR_KNOWLEDGE_BASE 또는 ~/.cuidar-rag/knowledge_base.json)
    #[arg(long, global = true)]
    pub kb: Option<PathBuf>,

    /// 의도 분류기 없이 BM25 폴백만 사용
    #[arg(long, global = true)]
    pub fallback_only: bool,

    /// 분류기 신뢰도 임계값
    #[arg(long, global = true)]
    pub threshold: Option<f32>,

    /// 폴백 결과 최소 BM25 스코어
    #[arg(long, global = true)]
    pub min_score: Option<f64>,

    /// BM25 k1 (term frequency 포화)
    #[arg(long, global = true)]
    pub bm25_k1: Option<f64>,

    /// BM25 b (문서 길이 정규화)
    #[arg(long, global = true)]
    pub bm25_b: Option<f64>,

    /// 임베딩 작업 유형 (기본: classification)
    #[arg(long, global = true, value_enum)]
    pub task_type: Option<TaskType>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 한 건 처리
    Query {
        /// 질문
        question: String,

        /// 결과 개수 (1 미만이면 기본값)
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 대화 모드 ('sair'로 종료, ':reload'로 지식베이스 다시 로드)
    Chat {
        /// 결과 개수
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,
    },

    /// 상태 확인
    Status,

    /// 추천 주제 목록
    Topics {
        /// 주제 개수
        #[arg(short = 'n', long, default_value = "6")]
        limit: usize,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Query {
            question,
            top_k,
            json,
        } => cmd_query(&cli.engine, &question, top_k, json).await,
        Commands::Chat { top_k } => cmd_chat(&cli.engine, top_k).await,
        Commands::Status => cmd_status(&cli.engine),
        Commands::Topics { limit } => cmd_topics(&cli.engine, limit),
    }
}

// ============================================================================
// Engine Startup
// ============================================================================

impl EngineArgs {
    /// 환경변수 설정에 CLI 옵션 적용
    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(threshold) = self.threshold {
            config = config.with_confidence_threshold(threshold);
        }
        if let Some(min_score) = self.min_score {
            config = config.with_min_score(min_score);
        }
        if self.bm25_k1.is_some() || self.bm25_b.is_some() {
            let bm25 = Bm25Params {
                k1: self.bm25_k1.unwrap_or(config.bm25.k1),
                b: self.bm25_b.unwrap_or(config.bm25.b),
            };
            config = config.with_bm25(bm25);
        }
        config
    }

    fn kb_path(&self) -> PathBuf {
        self.kb.clone().unwrap_or_else(default_knowledge_base_path)
    }

    fn load_knowledge_base(&self) -> Result<KnowledgeBase> {
        let path = self.kb_path();
        KnowledgeBase::load(&path)
            .with_context(|| format!("지식베이스 로드 실패: {}", path.display()))
    }
}

/// 엔진 생성 (실패 시 시작 중단)
///
/// `--fallback-only`가 아니면 임베딩 API로 의도 분류기를 학습합니다.
async fn build_engine(args: &EngineArgs) -> Result<QueryEngine> {
    let kb = args.load_knowledge_base()?;
    let normalizer = Normalizer::default();
    let mut builder = QueryEngine::builder(kb.clone())
        .normalizer(normalizer.clone())
        .config(args.config());

    if args.fallback_only {
        tracing::info!("Running in fallback-only mode (no intent classifier)");
    } else {
        if !has_api_key() {
            bail!(
                "API 키가 설정되지 않았습니다.\n\n\
                 설정 방법:\n  \
                 export GEMINI_API_KEY=your-api-key\n\n\
                 분류기 없이 실행하려면 --fallback-only 를 사용하세요."
            );
        }

        let prototype_config = PrototypeConfig::default();
        let calls = planned_embedding_calls(&kb, &normalizer, &prototype_config);
        tracing::info!(
            "Training intent classifier over {} items: {} embedding calls (at least {:?})",
            kb.len(),
            calls,
            MIN_INTERVAL * u32::try_from(calls).unwrap_or(u32::MAX)
        );

        let embedder = GeminiEmbedding::from_env()
            .context("임베딩 프로바이더 생성 실패")?
            .with_task_type(args.task_type.unwrap_or_default());
        let classifier = PrototypeClassifier::train(embedder, &kb, &normalizer, prototype_config)
            .await
            .context("의도 분류기 학습 실패")?;
        builder = builder.classifier(Arc::new(classifier));
    }

    Ok(builder.build())
}

/// 분류기 없는 엔진 (통계/주제 조회용)
fn build_fallback_engine(args: &EngineArgs) -> Result<QueryEngine> {
    let kb = args.load_knowledge_base()?;
    Ok(QueryEngine::builder(kb).config(args.config()).build())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (query)
async fn cmd_query(args: &EngineArgs, question: &str, top_k: Option<i64>, json: bool) -> Result<()> {
    let engine = build_engine(args).await?;
    let response = engine.query(question, top_k).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("응답 직렬화 실패")?
        );
    } else {
        print_response(&response);
    }

    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(args: &EngineArgs, top_k: Option<i64>) -> Result<()> {
    let handle = EngineHandle::ready(build_engine(args).await?);

    println!("=== Cuidar+ Idosos ===");
    println!("'sair' 입력 시 종료, ':reload' 로 지식베이스 다시 로드\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all("Você: ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "sair" | "exit" | "quit" => break,
            ":reload" => match build_engine(args).await {
                Ok(engine) => {
                    handle.install(engine);
                    println!("[OK] 지식베이스 다시 로드됨 ({} 항목)\n", handle.health().items);
                }
                Err(e) => println!("[!] 다시 로드 실패 (기존 엔진 유지): {:#}\n", e),
            },
            question => {
                let Some(engine) = handle.current() else {
                    println!("[!] 색인 중입니다. 잠시 후 다시 시도하세요.\n");
                    continue;
                };
                let response = engine.query(question, top_k).await;
                print_response(&response);
            }
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(args: &EngineArgs) -> Result<()> {
    println!("cuidar-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 지식베이스: {}", args.kb_path().display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정 (--fallback-only 로만 실행 가능)");
    }

    if args.fallback_only {
        println!("[*] 분류기: 없음 (폴백 전용)");
    } else {
        println!("[*] 분류기: prototype (Gemini embedding)");
    }

    let engine = build_fallback_engine(args)?;
    let health = engine.health();
    let index = engine.index();
    let config = engine.config();

    println!("[OK] 상태: {} ({} 항목)", health.status, health.items);
    println!(
        "     어휘: {} 단어, 평균 문서 길이: {:.1}",
        index.vocabulary_size(),
        index.avgdl()
    );
    println!(
        "     BM25 k1={} b={}, 신뢰도 임계값={}, 최소 스코어={}",
        config.bm25.k1, config.bm25.b, config.confidence_threshold, config.min_score
    );

    Ok(())
}

/// 주제 명령어 (topics)
fn cmd_topics(args: &EngineArgs, limit: usize) -> Result<()> {
    let engine = build_fallback_engine(args)?;
    let topics = engine.suggestions(limit);

    if topics.is_empty() {
        println!("[!] 지식베이스가 비어 있습니다.");
        return Ok(());
    }

    println!("[OK] 추천 주제:\n");
    for topic in topics {
        println!("  - {}", topic);
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_response(response: &QueryResponse) {
    println!();
    for (i, result) in response.results.iter().enumerate() {
        let source = match result.source {
            ResultSource::Classifier => "CLS",
            ResultSource::Bm25 => "BM25",
            ResultSource::Vector => "VEC",
            ResultSource::SystemFallback => "SYS",
        };

        println!(
            "{}. [{}] [점수: {:.4}] {} ({})",
            i + 1,
            source,
            result.score,
            result.topic,
            result.module
        );
        println!("   {}", truncate_text(&result.content, 300));
        println!();
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
