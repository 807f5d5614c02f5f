// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Train scheduler.
//!
//! The consumer end of the conveyor: receives correlated bundles, refreshes
//! the configuration snapshot once per train, drives the processor chain and
//! hands the finished `ProcessedData` to the publisher channel. Recoverable
//! processing errors are logged with the train id and suppressed for that
//! train; unknown-parameter errors abort the train and are surfaced.

use crate::{Flow, Processor, ProcessorError, ProcessorPipeline};
use config::{ConfigError, ConfigSnapshot, SharedState};
use correlator::Correlated;
use crossbeam_channel::{Receiver, Sender};
use model::ProcessedData;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Builds the chain in its canonical order.
#[must_use]
pub fn default_pipeline() -> ProcessorPipeline {
    ProcessorPipeline::new()
        .add_stage(crate::ImageProcessor::new())
        .add_stage(crate::XgmProcessor::new())
        .add_stage(crate::PumpProbeProcessor::new())
        .add_stage(crate::roi_processor())
        .add_stage(crate::AzimuthalProcessor::new())
        .add_stage(crate::PumpProbeFomProcessor::new())
        .add_stage(crate::PulseFilterProcessor::new())
        .add_stage(crate::CorrelationProcessor::new())
        .add_stage(crate::BinProcessor::new())
        .add_stage(crate::StatisticsProcessor::new())
}

pub struct Scheduler {
    store: Arc<dyn SharedState>,
    snapshot: ConfigSnapshot,
    pipeline: ProcessorPipeline,
    input: Receiver<Correlated>,
    output: Sender<Arc<ProcessedData>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn SharedState>,
        pipeline: ProcessorPipeline,
        input: Receiver<Correlated>,
        output: Sender<Arc<ProcessedData>>,
    ) -> Self {
        Self {
            store,
            snapshot: ConfigSnapshot::default(),
            pipeline,
            input,
            output,
        }
    }

    /// Run one train through the chain. Public for tests and for embedding
    /// the scheduler without its own thread.
    pub fn process_train(&mut self, mut bundle: Correlated) -> Option<Arc<ProcessedData>> {
        let tid = bundle.tid();

        match self.snapshot.refresh(self.store.as_ref()) {
            Ok(()) => {}
            Err(ConfigError::UnknownParameter(what)) => {
                stats::unknown_parameter();
                error!(tid, "unknown parameter in configuration: {what}");
                return None;
            }
            Err(err) => {
                stats::processing_error();
                warn!(tid, "configuration rejected: {err}");
                return None;
            }
        }

        for stage in self.pipeline.stages_mut() {
            if let Err(err) = stage.update(&self.snapshot) {
                match err {
                    ProcessorError::UnknownParameter(what) => {
                        stats::unknown_parameter();
                        error!(tid, stage = stage.name(), "unknown parameter: {what}");
                        return None;
                    }
                    ProcessorError::Processing(reason) => {
                        stats::processing_error();
                        warn!(tid, stage = stage.name(), "update failed: {reason}");
                        continue;
                    }
                }
            }
            match stage.process(&mut bundle) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    debug!(tid, stage = stage.name(), "chain stopped early");
                    break;
                }
                Err(ProcessorError::Processing(reason)) => {
                    // expected, data-dependent: this stage writes nothing
                    // this train, the rest of the chain continues
                    stats::processing_error();
                    warn!(tid, stage = stage.name(), "{reason}");
                }
                Err(ProcessorError::UnknownParameter(what)) => {
                    stats::unknown_parameter();
                    error!(tid, stage = stage.name(), "unknown parameter: {what}");
                    return None;
                }
            }
        }

        Some(Arc::new(bundle.processed))
    }

    /// Consume trains until the input channel closes, then drain.
    pub fn run(mut self) {
        info!(stages = self.pipeline.len(), "scheduler started");
        while let Ok(bundle) = self.input.recv() {
            let tid = bundle.tid();
            if let Some(processed) = self.process_train(bundle) {
                stats::train_processed();
                if self.output.send(processed).is_err() {
                    warn!(tid, "publisher disconnected; scheduler exits");
                    break;
                }
            }
        }
        info!("scheduler drained");
    }
}
