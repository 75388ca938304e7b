//! 교차로 디렉토리 로드 및 출력.

use std::path::Path;

use anyhow::{Context, Result};

use live_core::{IntersectionRef, ViewBounds};
use live_transport::sample_directory;

/// 디렉토리 로드.
///
/// 경로가 없으면 데모 교차로(8801~8806)를 사용합니다. 파일은 대시보드 API와
/// 같은 형식의 JSON 배열입니다.
pub fn load_directory(path: Option<&Path>) -> Result<Vec<IntersectionRef>> {
    let Some(path) = path else {
        return Ok(sample_directory());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("디렉토리 파일을 읽을 수 없습니다: {}", path.display()))?;
    let directory: Vec<IntersectionRef> = serde_json::from_str(&raw)
        .with_context(|| format!("디렉토리 형식 오류: {}", path.display()))?;

    tracing::info!(count = directory.len(), path = %path.display(), "Directory loaded");
    Ok(directory)
}

/// 디렉토리 출력. 뷰포트가 주어지면 안에 있는 교차로를 `*`로 표시합니다.
pub fn print_directory(directory: &[IntersectionRef], bounds: Option<&ViewBounds>) {
    println!(
        "{:<3} {:>8} {:>6} {:<16} {:>13} {:>12}  {}",
        "", "ID", "RR", "RSU IP", "LONGITUDE", "LATITUDE", "NAME"
    );
    for intersection in directory {
        let visible = bounds.is_some_and(|b| intersection.is_within(b));
        println!(
            "{:<3} {:>8} {:>6} {:<16} {:>13.7} {:>12.7}  {}",
            if visible { "*" } else { "" },
            intersection.intersection_id,
            intersection.road_regulator_id,
            intersection.ip,
            intersection.longitude,
            intersection.latitude,
            intersection.name.as_deref().unwrap_or("-"),
        );
    }
    println!("\n총 {}개 교차로", directory.len());
}
