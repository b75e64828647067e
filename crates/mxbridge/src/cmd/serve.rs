use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mxbridge_remote::{EngineServer, ServerConfig};

use crate::cmd::ServeArgs;
use crate::exit::{remote_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut config = ServerConfig::default();
    if let Some(max_payload) = args.max_payload {
        if max_payload == 0 {
            return Err(CliError::new(USAGE, "--max-payload must be greater than zero"));
        }
        config = config.with_max_payload_size(max_payload);
    }

    let server = EngineServer::bind_with_config(&args.path, config)
        .map_err(|err| remote_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    tracing::info!(path = ?server.path(), "serving matrix engine");
    server
        .serve(&running)
        .map_err(|err| remote_error("serve failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
