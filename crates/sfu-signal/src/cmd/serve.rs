use sfu_signal_server::{Server, ServerConfig};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, server_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut config = ServerConfig::load(&args.config)
        .map_err(|err| server_error("cannot load configuration", err))?;
    if let Some(addr) = args.listen {
        config.set_listen_addr(addr);
    }
    info!(
        config = %args.config.display(),
        workers = config.mediasoup.num_workers,
        "starting signaling server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("cannot start async runtime", err))?;
    runtime
        .block_on(Server::run(config))
        .map_err(|err| server_error("server failed", err))?;
    Ok(SUCCESS)
}
