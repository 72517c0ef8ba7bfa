use clap::{Args, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod caps;
pub mod decode;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the workers and the WebSocket signaling server.
    Serve(ServeArgs),
    /// Print the router RTP capabilities a configuration produces.
    Caps(CapsArgs),
    /// Decode a captured netstring stream of worker traffic.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Caps(args) => caps::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Server configuration file (JSON).
    #[arg(long, env = "SFU_SIGNAL_CONFIG", value_name = "PATH")]
    pub config: PathBuf,
    /// Listen address, overriding `https.listenIp` and `https.listenPort`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct CapsArgs {
    /// Server configuration file (JSON).
    #[arg(long, env = "SFU_SIGNAL_CONFIG", value_name = "PATH")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Maximum payload size accepted per frame.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
