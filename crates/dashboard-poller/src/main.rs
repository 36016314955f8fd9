//! Dashboard poller CLI.

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use dashboard_core::{init_logging, DashboardStore, LogConfig, LogFormat};
use dashboard_poller::{commands, PollerConfig};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "dashboard-poller")]
#[command(about = "Market monitor dashboard poller", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). 없으면 RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact). 없으면 LOG_FORMAT
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 패널 목록 출력
    Panels,

    /// 패널 하나를 한 번 조회하여 JSON 출력
    Once {
        /// 패널 이름 (예: "scheduler-status")
        #[arg(long)]
        panel: String,
    },

    /// 패널 폴링 (Ctrl-C로 종료)
    Watch {
        /// 특정 패널만 폴링 (쉼표로 구분, 예: "data-status,sector-flow")
        #[arg(long)]
        panels: Option<String>,
    },

    /// 수집 작업 실행 후 완료까지 상태 폴링
    Collect {
        /// 작업 이름 (예: "ohlcv")
        #[arg(long)]
        job: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env를 먼저 읽어야 RUST_LOG / LOG_FORMAT도 반영됨
    let config = PollerConfig::from_env()?;

    let mut log_config = LogConfig::from_env();
    if let Some(level) = &cli.log_level {
        log_config.level = format!("dashboard_poller={0},dashboard_core={0}", level);
    }
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(log_config).map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::debug!(api = %config.api_base_url, "설정 로드 완료");

    match cli.command {
        Commands::Panels => {
            for panel in &config.panels {
                println!(
                    "{:<18} {:>4}s  {}{}",
                    panel.name,
                    panel.interval.as_secs(),
                    panel.path,
                    if panel.realtime_only { "  (realtime)" } else { "" }
                );
            }
        }
        Commands::Once { panel } => {
            let value = commands::fetch_panel(&config, &panel).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Watch { panels } => {
            let panels = config.select_panels(panels.as_deref())?;

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal.cancel();
                }
            });

            let state = commands::watch(&config, panels, shutdown).await?;
            tracing::info!(panels = state.panels().len(), "Dashboard Poller 종료");
        }
        Commands::Collect { job } => {
            let store = DashboardStore::new();
            let status = commands::collect(&config, &store, &job).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
