//! Inject command - stamp the deployment version into a script

use crate::cli::args::{InjectArgs, InjectTarget};
use crate::config::Config;
use crate::context::WorkerContext;
use crate::error::{OffcacheError, OffcacheResult};
use crate::inject::VersionStamp;
use tokio::fs;
use tracing::debug;

/// Execute the inject command
pub async fn execute(args: InjectArgs, config: &Config) -> OffcacheResult<()> {
    if !args.file.exists() {
        return Err(OffcacheError::PathNotFound(args.file));
    }

    let source = fs::read_to_string(&args.file)
        .await
        .map_err(|e| OffcacheError::io(format!("reading {}", args.file.display()), e))?;

    let stamp = VersionStamp::from_context(&WorkerContext::from_config(config)?);
    debug!("Stamping {} with {}", args.file.display(), stamp.live_name);

    let stamped = match args.target {
        InjectTarget::Worker => stamp.stamp_worker(&source),
        InjectTarget::Client => stamp.stamp_client(&source),
    };

    match args.output {
        Some(path) => fs::write(&path, stamped)
            .await
            .map_err(|e| OffcacheError::io(format!("writing {}", path.display()), e)),
        None => {
            print!("{}", stamped);
            Ok(())
        }
    }
}
