use sfu_signal_rtp::generate_router_rtp_capabilities;
use sfu_signal_server::ServerConfig;

use crate::cmd::CapsArgs;
use crate::exit::{server_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_capabilities, OutputFormat};

pub fn run(args: CapsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServerConfig::load(&args.config)
        .map_err(|err| server_error("cannot load configuration", err))?;
    let caps = generate_router_rtp_capabilities(&config.mediasoup.router_options.media_codecs)
        .map_err(|err| CliError::new(DATA_INVALID, format!("router capabilities: {err}")))?;
    tracing::debug!(
        codecs = caps.codecs.len(),
        header_extensions = caps.header_extensions.len(),
        "router capabilities generated"
    );
    print_capabilities(&caps, format);
    Ok(SUCCESS)
}
