//! Traffic Junction Pipeline - Main Entry Point

use perception::SimulatedTraffic;
use pipeline::{init_logging, Pipeline, PipelineConfig};
use std::sync::Arc;
use storage::Repository;
use tracing::info;
use violation_engine::{Zone, ZoneType};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== Traffic Junction Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting junction decision system...");

    let repository = Arc::new(Repository::new());
    let pipeline = Pipeline::new(PipelineConfig::default(), repository);

    // Demo zone on the observed approach; production zones come from the
    // admin surface
    pipeline.zones().upsert(Zone::new(
        "zone_1",
        "Main St No Parking",
        vec![(100.0, 400.0), (500.0, 400.0), (500.0, 700.0), (100.0, 700.0)],
        ZoneType::NoParking,
        8.0,
    ))?;

    let handle = pipeline.handle();
    let loop_task = tokio::spawn(pipeline.run(Box::new(SimulatedTraffic::new(42))));

    tokio::signal::ctrl_c().await?;
    handle.stop();

    let report = loop_task.await?;
    if let Ok(json) = serde_json::to_string(&*handle.latest()) {
        info!(snapshot = %json, "Final state");
    }
    info!(
        frames = report.frames_processed,
        detections = report.total_detections,
        parking = report.parking_violations,
        red_light = report.red_light_violations,
        "Shutdown complete"
    );
    Ok(())
}
