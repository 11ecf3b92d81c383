//! CLI 모듈
//!
//! rag-chat CLI 명령어 정의 및 구현
//!
//! - `ask`: 단발성 질의 (Query 전략 + HyDE)
//! - `chat`: 터미널 대화
//! - `serve`: 웹 챗 UI
//! - `status`: 상태 확인

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::{CollectionStats, FileCollector, FileType};
use crate::config::{
    ChatConfig, ResponseStrategy, RetrievalMode, UiConfig, VectorBackend, DEFAULT_DATA_DIR,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_MEMORY_TOKEN_LIMIT, DEFAULT_PROMPT_TEMPLATE,
    DEFAULT_QUESTION, DEFAULT_TOP_K,
};
use crate::embedding::{has_api_key, EmbeddingProvider, GeminiEmbedding};
use crate::engine::{ChatEngine, EngineResponse};
use crate::knowledge::{default_lance_path, IndexBuilder, IndexHandle, RetrievedChunk};
use crate::llm::{ChatModel, GeminiChat, GenerationSettings, DEFAULT_CHAT_MODEL};
use crate::server::{self, AppState};
use crate::session::{ChatSession, TurnOutcome};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(version, about = "로컬 문서 기반 RAG 챗 어시스턴트", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 하나에 답하고 종료
    Ask {
        /// 질문 (생략하면 기본 질문)
        question: Option<String>,

        /// HyDE 질의 변환 끄기
        #[arg(long)]
        no_hyde: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// 터미널에서 대화 (/reset, /quit)
    Chat {
        /// HyDE 질의 변환 사용
        #[arg(long)]
        hyde: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// 웹 챗 UI 실행
    Serve {
        /// 바인드 주소
        #[arg(long, default_value = "127.0.0.1:8501")]
        addr: SocketAddr,

        /// 유휴 세션 만료 시간 (분)
        #[arg(long, default_value_t = 30)]
        session_ttl_minutes: u64,

        /// HyDE 질의 변환 사용
        #[arg(long)]
        hyde: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// 상태 확인
    Status {
        /// 문서 디렉토리
        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
    },
}

/// 엔진/인덱스 공통 인자
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// 문서 디렉토리 (재귀 탐색)
    #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// 응답 전략 (기본: ask는 query, 나머지는 condense-question)
    #[arg(long, value_enum)]
    pub strategy: Option<ResponseStrategy>,

    /// 검색할 청크 수
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// 대화 메모리 토큰 상한
    #[arg(long, default_value_t = DEFAULT_MEMORY_TOKEN_LIMIT)]
    pub memory_tokens: usize,

    /// 생성 모델
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    pub model: String,

    /// 생성 온도
    #[arg(long, default_value_t = 0.1)]
    pub temperature: f32,

    /// 임베딩 차원 (768, 1536, 3072)
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSION)]
    pub dimension: usize,

    /// 벡터 저장소
    #[arg(long, value_enum, default_value_t = VectorBackend::Memory)]
    pub backend: VectorBackend,

    /// 검색 모드
    #[arg(long, value_enum, default_value_t = RetrievalMode::Vector)]
    pub retrieval: RetrievalMode,

    /// 사용자 메시지 템플릿 ({question} 포함)
    #[arg(long, default_value = DEFAULT_PROMPT_TEMPLATE)]
    pub template: String,
}

impl EngineArgs {
    /// 프리셋 위에 인자를 덮어써서 설정 생성
    pub fn into_config(self, base: ChatConfig) -> ChatConfig {
        ChatConfig {
            data_dir: self.data_dir,
            strategy: self.strategy.unwrap_or(base.strategy),
            top_k: self.top_k,
            memory_token_limit: self.memory_tokens,
            model: self.model,
            generation: GenerationSettings {
                temperature: self.temperature,
                ..base.generation
            },
            embedding_dimension: self.dimension,
            backend: self.backend,
            retrieval: self.retrieval,
            prompt_template: self.template,
            ..base
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            question,
            no_hyde,
            engine,
        } => {
            let mut config = engine.into_config(ChatConfig::batch());
            config.hyde = !no_hyde;
            cmd_ask(question.as_deref().unwrap_or(DEFAULT_QUESTION), config).await
        }
        Commands::Chat { hyde, engine } => {
            let mut config = engine.into_config(ChatConfig::default());
            config.hyde = hyde;
            cmd_chat(config).await
        }
        Commands::Serve {
            addr,
            session_ttl_minutes,
            hyde,
            engine,
        } => {
            let mut config = engine.into_config(ChatConfig::default());
            config.hyde = hyde;
            cmd_serve(addr, session_ttl(session_ttl_minutes), config).await
        }
        Commands::Status { data_dir } => cmd_status(&data_dir).await,
    }
}

/// Gemini 클라이언트와 인덱스 핸들 생성 (빌드는 첫 접근 시)
fn build_components(config: &ChatConfig) -> Result<(Arc<IndexHandle>, Arc<dyn ChatModel>)> {
    if !has_api_key() {
        tracing::warn!("No API key set; model calls will fail until GEMINI_API_KEY is provided");
    }

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        GeminiEmbedding::from_env_with_dimension(config.embedding_dimension)
            .context("GeminiEmbedding 생성 실패")?,
    );
    let model: Arc<dyn ChatModel> = Arc::new(
        GeminiChat::from_env(config.model.clone())
            .context("GeminiChat 생성 실패")?
            .with_settings(config.generation),
    );

    tracing::info!(
        model = model.name(),
        embedder = embedder.name(),
        strategy = ?config.strategy,
        hyde = config.hyde,
        "Engine components ready"
    );

    let handle = Arc::new(IndexHandle::new(IndexBuilder::from_config(config, embedder)));
    Ok((handle, model))
}

/// 인덱스를 빌드하고 엔진 생성
async fn build_engine(config: &ChatConfig) -> Result<ChatEngine> {
    let (handle, model) = build_components(config)?;

    println!("[*] 인덱스 빌드 중: {}", config.data_dir.display());
    let index = handle.get().await?;
    let stats = index.stats().await?;
    println!(
        "[OK] 문서 {} 건, 청크 {} 개 ({})",
        stats.document_count, stats.chunk_count, stats.backend
    );

    ChatEngine::from_config(index, model, config)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 단발성 질의 명령어 (ask)
async fn cmd_ask(question: &str, config: ChatConfig) -> Result<()> {
    let engine = build_engine(&config).await?;

    println!("[*] 질문: {}", question);
    println!("[*] 응답 전략: {:?}", engine.strategy());
    if engine.hyde_enabled() {
        println!("[*] HyDE 질의 변환 사용");
    }
    println!();

    let response = engine.query(question).await?;
    print_response(&response);

    Ok(())
}

/// 터미널 대화 명령어 (chat)
async fn cmd_chat(config: ChatConfig) -> Result<()> {
    let engine = build_engine(&config).await?;
    let ui = UiConfig::default();
    let mut session = ChatSession::new(ui.greeting.clone(), config.memory_token_limit);

    println!();
    println!("{}", ui.title);
    println!("{}", ui.subheader);
    println!("(/reset: 대화 초기화, /quit: 종료, 전략: {:?})", engine.strategy());
    println!();
    println!("assistant> {}", ui.greeting);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("user> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        match line.trim() {
            "/quit" => break,
            "/reset" => {
                session.reset();
                println!("assistant> {}", ui.greeting);
                continue;
            }
            _ => {}
        }

        match session.handle_user_message(&engine, &line).await? {
            TurnOutcome::Answered(response) => {
                println!("assistant> {}", response.answer);
                print_sources(&response.sources);
            }
            TurnOutcome::Failed(message) => eprintln!("[!] {}", message),
            TurnOutcome::Idle => {}
        }
    }

    Ok(())
}

/// 웹 UI 명령어 (serve)
async fn cmd_serve(addr: SocketAddr, session_ttl: Duration, config: ChatConfig) -> Result<()> {
    let (handle, model) = build_components(&config)?;

    println!("[*] 문서 디렉토리: {}", config.data_dir.display());
    println!("[*] 웹 UI: http://{}", addr);

    let state = AppState::with_session_ttl(handle, model, config, UiConfig::default(), session_ttl);
    server::serve(addr, Arc::new(state)).await
}

/// 상태 명령어 (status)
///
/// 시스템 상태를 확인합니다.
async fn cmd_status(data_dir: &Path) -> Result<()> {
    println!("rag-chat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", data_dir.display());
    println!("[*] Lance 스크래치 경로: {}", default_lance_path().display());

    // API 키 상태
    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    // 수집 대상 파일 통계
    match FileCollector::with_defaults().collect_directory(data_dir) {
        Ok(files) => {
            let stats = CollectionStats::from_files(&files);
            println!("[OK] 수집 대상: {} 파일", stats.total_files);
            println!("     {}", format_type_counts(&stats));
            println!("     총 크기: {}", format_bytes(stats.total_size as usize));
        }
        Err(e) => {
            println!("[!] 데이터 디렉토리 읽기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 세션 유휴 TTL (분 → Duration, 큰 값은 포화)
fn session_ttl(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// 파일 유형별 개수 요약 ("TXT: 2, HTML: 1, PDF: 0")
fn format_type_counts(stats: &CollectionStats) -> String {
    [
        (FileType::Text, stats.text_files),
        (FileType::Html, stats.html_files),
        (FileType::Pdf, stats.pdf_files),
    ]
    .iter()
    .map(|(file_type, count)| format!("{}: {}", file_type.label(), count))
    .collect::<Vec<_>>()
    .join(", ")
}

fn print_response(response: &EngineResponse) {
    println!("{}", response.answer);
    print_sources(&response.sources);
}

fn print_sources(sources: &[RetrievedChunk]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("[*] 출처 ({} 건):", sources.len());
    for (i, chunk) in sources.iter().enumerate() {
        println!(
            "  {}. [점수: {:.4}] {} ({})",
            i + 1,
            chunk.score,
            chunk.title,
            chunk.source.display()
        );
        println!("     {}", truncate_text(&chunk.text, 120));
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

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
