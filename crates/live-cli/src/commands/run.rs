//! 실시간 스트림 실행.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use live_core::{AppConfig, IntersectionId, ViewBounds};
use live_stream::{LiveIntersectionManager, ReconcileReport, SharedSnapshot};
use live_transport::build_factory;

use super::directory::load_directory;

/// 실행 옵션.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// 디렉토리 JSON 파일 (없으면 데모 교차로)
    pub directory: Option<PathBuf>,
    /// 뷰포트 경계
    pub bounds: Option<ViewBounds>,
    /// 관심 교차로 ID (뷰포트 대신)
    pub ids: Vec<IntersectionId>,
    /// 실행 시간 (없으면 Ctrl+C까지)
    pub duration: Option<Duration>,
    /// 스냅샷을 JSON으로 출력
    pub json: bool,
}

/// 관리자를 만들고 스냅샷을 출력하며 실행.
pub async fn run(config: AppConfig, options: RunOptions) -> Result<()> {
    if options.bounds.is_some() && !options.ids.is_empty() {
        bail!("--bounds와 --ids는 함께 사용할 수 없습니다");
    }

    let directory = load_directory(options.directory.as_deref())?;
    let factory = build_factory(&config);
    let manager = LiveIntersectionManager::create(&config, factory).await;
    manager.update_directory(directory).await;

    let report = if let Some(bounds) = options.bounds {
        manager.view_bounds_changed(bounds).await?
    } else if !options.ids.is_empty() {
        manager.set_interest(&options.ids).await?
    } else {
        manager.reconcile_with(|_| true).await?
    };
    log_report(&report);

    if !manager.is_publishing().await {
        manager.start_publisher().await?;
    }

    let stop = async {
        let deadline = async {
            match options.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("종료 신호 수신, 스트림 종료 중..."),
            _ = deadline => info!("실행 시간 만료"),
        }
    };
    print_until(manager.subscribe_snapshots(), stop, options.json).await?;

    manager.shutdown().await;
    Ok(())
}

/// `stop`이 끝나거나 채널이 닫힐 때까지 스냅샷 출력. 출력한 스냅샷 수를 반환합니다.
async fn print_until<F>(
    mut snapshots: broadcast::Receiver<SharedSnapshot>,
    stop: F,
    json: bool,
) -> Result<usize>
where
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut printed = 0;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            received = snapshots.recv() => {
                match received {
                    Ok(snapshot) => {
                        print_snapshot(&snapshot, json)?;
                        printed += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Snapshot consumer lagging");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    Ok(printed)
}

fn log_report(report: &ReconcileReport) {
    info!(
        added = ?report.added,
        opened = report.opened,
        closed = report.closed,
        "Interest applied"
    );
    for failure in &report.failures {
        warn!(error = %failure, "Intersection unavailable");
    }
}

fn print_snapshot(snapshot: &SharedSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&**snapshot)?);
        return Ok(());
    }

    let mut ids: Vec<&IntersectionId> = snapshot
        .maps
        .keys()
        .chain(snapshot.spats.keys())
        .chain(snapshot.bsms.keys())
        .collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        let vehicles = snapshot.bsms.get(id).map_or(0, |v| v.len());
        let phase = snapshot
            .spats
            .get(id)
            .and_then(|spat| spat.payload.event_state(2))
            .unwrap_or("-");
        info!(
            intersection_id = %id,
            map = snapshot.maps.contains_key(id),
            phase_2 = phase,
            vehicles,
            "Snapshot"
        );
    }
    Ok(())
}
