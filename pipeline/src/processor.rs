// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Processor contract and composition.

use config::{ConfigError, ConfigSnapshot};
use correlator::Correlated;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// Expected, data-dependent failure. The scheduler logs it with the
    /// train id and writes no output for the affected field this train.
    #[error("{0}")]
    Processing(String),
    /// Configuration names something this build does not implement.
    /// Surfaced to the operator instead of being swallowed.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
}

impl From<ConfigError> for ProcessorError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownParameter(what) => ProcessorError::UnknownParameter(what),
            other => ProcessorError::Processing(other.to_string()),
        }
    }
}

/// Signal returned by `process`: keep going, or end the remainder of the
/// enclosing composition for this train. The halt is cooperative and is not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub type ProcessResult = Result<Flow, ProcessorError>;

/// A leaf of the processor chain.
pub trait Processor: Send {
    fn name(&self) -> &'static str;

    /// Reread configuration from the per-train snapshot. Called once per
    /// train, before `process`; must not touch the bundle.
    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError>;

    /// Derive fields on `bundle.processed` for one train.
    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult;
}

/// A processor composed of children run in declaration order.
///
/// A child returning [`Flow::Stop`] halts the remaining children; errors
/// propagate unchanged to the caller.
pub struct CompositeProcessor {
    name: &'static str,
    children: Vec<Box<dyn Processor>>,
}

impl CompositeProcessor {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn add(mut self, child: impl Processor + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }
}

impl Processor for CompositeProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        for child in &mut self.children {
            child.update(cfg)?;
        }
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        for child in &mut self.children {
            if child.process(bundle)? == Flow::Stop {
                break;
            }
        }
        Ok(Flow::Continue)
    }
}

/// The top-level chain run by the scheduler.
///
/// Unlike a composite, the chain is where per-train error suppression
/// happens: the scheduler resumes with the next processor after a
/// `Processing` error, so one failing subsystem does not starve the rest.
#[derive(Default)]
pub struct ProcessorPipeline {
    stages: Vec<Box<dyn Processor>>,
}

impl ProcessorPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_stage(mut self, stage: impl Processor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Processor>> {
        self.stages.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::ProcessedData;
    use sources::SourceCatalog;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bundle() -> Correlated {
        Correlated {
            catalog: SourceCatalog::new(),
            meta: std::collections::HashMap::new(),
            raw: std::collections::HashMap::new(),
            processed: ProcessedData::new(1),
        }
    }

    struct Recorder {
        calls: Arc<AtomicUsize>,
        outcome: ProcessResult,
    }

    impl Processor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn update(&mut self, _cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
            Ok(())
        }

        fn process(&mut self, _bundle: &mut Correlated) -> ProcessResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[test]
    fn stop_halts_the_remaining_children() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut composite = CompositeProcessor::new("test")
            .add(Recorder {
                calls: Arc::clone(&first),
                outcome: Ok(Flow::Stop),
            })
            .add(Recorder {
                calls: Arc::clone(&second),
                outcome: Ok(Flow::Continue),
            });

        // a stopped composite still reports Continue to its parent
        assert_eq!(composite.process(&mut bundle()).unwrap(), Flow::Continue);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn errors_propagate_out_of_the_composite() {
        let tail = Arc::new(AtomicUsize::new(0));
        let mut composite = CompositeProcessor::new("test")
            .add(Recorder {
                calls: Arc::new(AtomicUsize::new(0)),
                outcome: Err(ProcessorError::Processing("no data".to_string())),
            })
            .add(Recorder {
                calls: Arc::clone(&tail),
                outcome: Ok(Flow::Continue),
            });

        assert!(composite.process(&mut bundle()).is_err());
        assert_eq!(tail.load(Ordering::SeqCst), 0);
    }
}
