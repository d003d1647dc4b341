use anyhow::Result;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::{thread, time::Duration};

use crate::config::Profile;
use crate::driver::{SensorDriver, SimulatedPad};
use crate::engine::{Engine, FrameReport};

/// Control messages from the server thread into the pipeline.
pub enum PipelineMsg {
    ApplyProfile(Box<Profile>),
    ApplyOverrides(HashMap<String, f64>),
    Reset,
    Shutdown,
}

/// Latest report, published for the `state` and `status` ops.
pub type SharedReport = Arc<Mutex<Option<FrameReport>>>;

/// Sensor polling + frame processing loop.
///
/// Polls the driver at the profile's performance-mode interval, runs each
/// frame through the engine, steps physics once per tick, and publishes the
/// report. A tick without a frame is simply skipped.
pub fn run_pipeline(
    profile: Profile,
    rx: Receiver<PipelineMsg>,
    shared: SharedReport,
) -> Result<()> {
    let mut driver: Box<dyn SensorDriver> = Box::new(SimulatedPad::new());
    if let Err(e) = driver.connect("0") {
        warn!("sensor connect failed, pipeline idle: {e}");
        // stay alive so the daemon can still answer status requests
        loop {
            match rx.recv() {
                Ok(PipelineMsg::Shutdown) | Err(_) => return Ok(()),
                Ok(_) => {}
            }
        }
    }
    info!("pipeline: driver '{}' connected", driver.kind());

    let mut engine = Engine::from_profile(&profile);
    let mut interval = Duration::from_millis(profile.daemon.performance_mode.interval_ms());
    info!(
        "pipeline: {} mode, {} ms tick",
        profile.daemon.performance_mode.as_str(),
        interval.as_millis()
    );

    loop {
        loop {
            match rx.try_recv() {
                Ok(PipelineMsg::ApplyProfile(p)) => {
                    interval = Duration::from_millis(p.daemon.performance_mode.interval_ms());
                    engine = Engine::from_profile(&p);
                    info!("pipeline: profile applied, {} ms tick", interval.as_millis());
                }
                Ok(PipelineMsg::ApplyOverrides(map)) => {
                    engine.apply_overrides(&map);
                    info!("pipeline: {} parameter override(s) applied", map.len());
                }
                Ok(PipelineMsg::Reset) => {
                    engine.reset();
                    info!("pipeline: engine reset");
                }
                Ok(PipelineMsg::Shutdown) => {
                    driver.disconnect();
                    return Ok(());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    driver.disconnect();
                    return Ok(());
                }
            }
        }

        match driver.get() {
            Ok(Some(frame)) => {
                let report = engine.process_frame(&frame);
                engine.step_physics();
                if let Ok(mut slot) = shared.lock() {
                    *slot = Some(report);
                }
            }
            Ok(None) => {
                // no frame this tick; physics still advances
                engine.step_physics();
            }
            Err(e) => {
                warn!("driver read failed: {e}");
            }
        }

        thread::sleep(interval);
    }
}
