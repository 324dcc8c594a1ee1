//! Message command - deliver a client message to the worker

use super::install::report_activation;
use super::Deployment;
use crate::cli::args::{MessageArgs, MessageKind};
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::ui::{self, UiContext};
use crate::worker::ClientMessage;
use tokio::sync::oneshot;

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> OffcacheResult<()> {
    let deployment = Deployment::open(config, None).await?;
    let worker = &deployment.worker;

    match args.kind {
        MessageKind::SkipWaiting => {
            let ctx = UiContext::detect();
            let mut client = deployment.clients.register();

            if !worker.adopt_staging().await? {
                ui::step_warn(
                    &ctx,
                    &format!("Nothing staged in {}", worker.context().names.staging()),
                );
                return Ok(());
            }

            worker.on_message(ClientMessage::SkipWaiting, None).await?;
            match worker.last_activation() {
                Some(outcome) => report_activation(&ctx, worker, &outcome, &mut client),
                None => Err(OffcacheError::WorkerState {
                    action: "skip waiting".to_string(),
                    state: worker.state().to_string(),
                }),
            }
        }
        MessageKind::CacheInfo => {
            let (port, reply) = oneshot::channel();
            worker.on_message(ClientMessage::CacheInfo, Some(port)).await?;
            let info = reply
                .await
                .map_err(|_| OffcacheError::Internal("CACHE_INFO reply dropped".to_string()))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}
