// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Pipeline wiring.
//!
//! One producer thread pushes feed packets through the correlator, one
//! consumer thread runs the scheduler, and the publisher end drains
//! processed trains for downstream visualization. Ctrl-C closes the feed;
//! in-flight trains finish and the channels drain.

use crate::args::{MgmtOpts, RunOpts};
use crate::feed::Feed;
use config::{MemoryStore, SharedState, SourceType, ns};
use correlator::TrainCorrelator;
use metrics_exporter_prometheus::PrometheusBuilder;
use pipeline::{Scheduler, default_pipeline};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// Channel depth between the correlator and the scheduler. Shallow on
/// purpose: with a slow consumer the correlator should drop stale trains
/// rather than queue them.
const CONVEYOR_DEPTH: usize = 4;

fn install_metrics(addr: &str) {
    if addr.is_empty() {
        return;
    }
    match addr.parse::<std::net::SocketAddr>() {
        Ok(addr) => match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => {
                stats::register();
                info!(%addr, "prometheus exporter listening");
            }
            Err(err) => warn!("metrics exporter not installed: {err}"),
        },
        Err(err) => warn!("bad metrics address '{addr}': {err}"),
    }
}

/// Seed the defaults an interactive control surface would broadcast.
fn seed_store(store: &MemoryStore) {
    store.hset(ns::GLOBAL, "xgm_device", crate::feed::SIM_XGM);
    store.hset(ns::GLOBAL, "xgm_property", "pulseEnergy");
    store.hset(ns::AZIMUTHAL_INTEG, "enabled", "True");
    store.hset(ns::AZIMUTHAL_INTEG, "integ_points", "256");
    store.hset(ns::CORRELATION, "analysis_type", "azimuthal integ");
    store.hset(ns::CORRELATION, "device_id1", crate::feed::SIM_MOTOR);
    store.hset(ns::CORRELATION, "property1", "actualPosition");
}

pub fn run(opts: &RunOpts, mut feed: impl Feed) -> Result<ExitCode, String> {
    install_metrics(&opts.metrics_addr);

    let store = Arc::new(MemoryStore::new());
    seed_store(&store);

    let catalog = crate::feed::RunDescription::endless(opts).catalog();
    let mut correlator = TrainCorrelator::with_cache_size(catalog, opts.cache_size);

    let (train_tx, train_rx) = crossbeam_channel::bounded(CONVEYOR_DEPTH);
    let (processed_tx, processed_rx) = crossbeam_channel::bounded(CONVEYOR_DEPTH);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(err) = ctrlc::set_handler(move || {
            info!("interrupt received; draining");
            running.store(false, Ordering::SeqCst);
        }) {
            warn!("no interrupt handler: {err}");
        }
    }

    let scheduler = Scheduler::new(store, default_pipeline(), train_rx, processed_tx);
    let consumer = thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || scheduler.run())
        .map_err(|e| format!("cannot spawn the scheduler thread: {e}"))?;

    let publisher = thread::Builder::new()
        .name("publisher".to_string())
        .spawn(move || {
            let mut published = 0_u64;
            for processed in &processed_rx {
                published += 1;
                debug!(
                    tid = processed.tid(),
                    n_pulses = processed.n_pulses(),
                    ai_fom = processed.ai.fom,
                    "train published"
                );
                if published.is_multiple_of(100) {
                    info!(published, "trains published");
                }
            }
            info!(published, "publisher drained");
        })
        .map_err(|e| format!("cannot spawn the publisher thread: {e}"))?;

    // the producer loop runs on this thread
    while running.load(Ordering::SeqCst) {
        let Some(packet) = feed.next_packet() else {
            info!("feed exhausted");
            break;
        };
        let (correlated, dropped) = correlator
            .correlate(&packet, SourceType::Calibrated)
            .map_err(|e| format!("inconsistent raw feed: {e}"))?;
        if !dropped.is_empty() {
            stats::trains_dropped(dropped.len());
            warn!(?dropped, "trains dropped before completion");
        }
        if let Some(correlated) = correlated {
            stats::train_correlated();
            if train_tx.send(correlated).is_err() {
                warn!("scheduler gone; stopping the feed");
                break;
            }
        }
    }

    drop(train_tx);
    consumer
        .join()
        .map_err(|_| "scheduler thread panicked".to_string())?;
    publisher
        .join()
        .map_err(|_| "publisher thread panicked".to_string())?;
    info!("pipeline stopped");
    Ok(ExitCode::SUCCESS)
}

/// Exec the shared-state management client and forward its exit code.
pub fn mgmt(opts: &MgmtOpts) -> Result<ExitCode, String> {
    let status = std::process::Command::new(&opts.client)
        .args(&opts.client_args)
        .status()
        .map_err(|e| format!("cannot launch '{}': {e}", opts.client))?;
    let code = status
        .code()
        .and_then(|c| u8::try_from(c).ok())
        .unwrap_or(1);
    Ok(ExitCode::from(code))
}
