//! 교차로 실시간 스트림 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 데모 교차로 전체를 합성 데이터로 30초간 실행
//! intersection-live run --duration-secs 30
//!
//! # 8801 주변 뷰포트만 구독
//! intersection-live run --bounds=-104.887,39.594,-104.885,39.596
//!
//! # STOMP 서버에 연결 (설정 파일 또는 환경 변수)
//! LIVE__TRANSPORT__MODE=stomp intersection-live run --ids 8801,8802
//!
//! # 디렉토리 확인
//! intersection-live directory --bounds=-104.887,39.594,-104.885,39.596
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use live_cli::{load_directory, print_directory, run, RunOptions};
use live_core::{init_logging, AppConfig, IntersectionId, LogConfig, ViewBounds};

#[derive(Parser)]
#[command(name = "intersection-live")]
#[command(about = "Live intersection MAP/SPAT/BSM stream manager", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(short, long, global = true, default_value = live_core::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 로그 레벨 (설정 파일보다 우선)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 스트림 관리자 실행
    Run {
        /// 교차로 디렉토리 JSON 파일 (없으면 데모 교차로 8801~8806)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// 뷰포트 경계 (west,south,east,north)
        #[arg(short, long, allow_hyphen_values = true)]
        bounds: Option<ViewBounds>,

        /// 관심 교차로 ID (쉼표로 구분, 예: "8801,8802")
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i32>,

        /// 실행 시간(초). 없으면 Ctrl+C까지 실행
        #[arg(long)]
        duration_secs: Option<u64>,

        /// 스냅샷을 JSON으로 출력
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// 교차로 디렉토리 출력
    Directory {
        /// 교차로 디렉토리 JSON 파일
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// 뷰포트 경계 (west,south,east,north). 안에 있는 교차로를 표시
        #[arg(short, long, allow_hyphen_values = true)]
        bounds: Option<ViewBounds>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)?;

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = cli.log_level {
        log_config = log_config.with_level(level);
    }
    init_logging(log_config).map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    match cli.command {
        Commands::Run {
            directory,
            bounds,
            ids,
            duration_secs,
            json,
        } => {
            info!(mode = ?config.transport.mode, "Intersection live stream 시작");
            let options = RunOptions {
                directory,
                bounds,
                ids: ids.into_iter().map(IntersectionId).collect(),
                duration: duration_secs.map(Duration::from_secs),
                json,
            };
            run(config, options).await?;
            info!("Intersection live stream 종료");
        }
        Commands::Directory { directory, bounds } => {
            let directory = load_directory(directory.as_deref())?;
            print_directory(&directory, bounds.as_ref());
        }
    }

    Ok(())
}
