// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Process control surface.
//!
//! `beamline start` runs the online pipeline against the simulated feed,
//! `beamline stream <file>` replays a recorded run description through the
//! same path, and `beamline mgmt` drops into the shared-state backend's
//! management client. Exit code 0 means success; anything else is a
//! subprocess failure or an unrecoverable startup error.

#![deny(clippy::all, clippy::pedantic)]

mod args;
mod feed;
mod run;

use crate::args::{CmdArgs, Command, Parser};
use crate::feed::{RunDescription, SimulatedFeed};
use std::process::ExitCode;
use tracing::error;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = CmdArgs::parse();

    let outcome = match args.command {
        Command::Start(opts) => {
            let description = RunDescription::endless(&opts);
            run::run(&opts, SimulatedFeed::new(description))
        }
        Command::Stream(opts) => match RunDescription::from_file(&opts.file) {
            Ok(description) => run::run(&opts.run, SimulatedFeed::new(description)),
            Err(err) => Err(err),
        },
        Command::Mgmt(opts) => run::mgmt(&opts),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
