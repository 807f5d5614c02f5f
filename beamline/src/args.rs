// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Command-line arguments.

pub use clap::Parser;
use clap::{Args, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "beamline", about = "Online detector analysis pipeline")]
pub struct CmdArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline against the configured feed.
    Start(RunOpts),
    /// Replay a recorded run description through the pipeline.
    Stream(StreamOpts),
    /// Launch the shared-state backend's management client.
    Mgmt(MgmtOpts),
}

#[derive(Args, Debug, Clone)]
pub struct RunOpts {
    /// Correlator buffer size in trains.
    #[arg(long, default_value_t = 20)]
    pub cache_size: usize,

    /// Pulses per train for the simulated source.
    #[arg(long, default_value_t = 16)]
    pub pulses: usize,

    /// Simulated detector edge length in pixels.
    #[arg(long, default_value_t = 128)]
    pub det_size: usize,

    /// Prometheus exporter listen address; empty disables it.
    #[arg(long, default_value = "127.0.0.1:9091")]
    pub metrics_addr: String,

    /// Stop after this many trains (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    pub max_trains: u64,
}

#[derive(Args, Debug)]
pub struct StreamOpts {
    /// Path to the recorded run description (JSON).
    pub file: String,

    #[command(flatten)]
    pub run: RunOpts,
}

#[derive(Args, Debug)]
pub struct MgmtOpts {
    /// Management client executable.
    #[arg(long, default_value = "redis-cli")]
    pub client: String,

    /// Arguments forwarded to the client.
    #[arg(trailing_var_arg = true)]
    pub client_args: Vec<String>,
}
