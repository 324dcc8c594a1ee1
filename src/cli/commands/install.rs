//! Install command - stage the manifest and promote the generation

use super::Deployment;
use crate::cli::args::InstallArgs;
use crate::clients::ClientHandle;
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::install::{ActivationOutcome, AssetResult};
use crate::ui::{self, InstallProgress, UiContext};
use crate::worker::Worker;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let deployment = Deployment::open(config, args.origin.as_deref()).await?;
    let worker = &deployment.worker;
    let mut client = deployment.clients.register();

    ui::intro(&ctx, &format!("Installing {}", worker.context().names));
    ui::key_value(&ctx, "Origin", &worker.context().origin);
    ui::key_value(&ctx, "Assets", &worker.context().manifest.len().to_string());

    let progress = InstallProgress::new(&ctx, worker.context().manifest.len());
    let on_asset = |result: &AssetResult| progress.on_asset(result);
    let report = worker.install_with_progress(&on_asset).await?;
    progress.finish();

    // Plain output already listed each failure as it settled
    if ctx.use_fancy_output() {
        for failure in report.failures() {
            if let AssetResult::Failed { identifier, reason } = failure {
                ui::step_error(&ctx, &format!("{} ({})", identifier, reason));
            }
        }
    }

    if args.no_activate || !worker.context().skip_waiting {
        if report.is_complete() {
            ui::outro_success(&ctx, "Staged; run `offcache message skip-waiting` to activate");
        }
        return report.ensure_complete();
    }

    ui::section(&ctx, "Activating");
    let outcome = worker.activate().await?;
    report_activation(&ctx, worker, &outcome, &mut client)
}

/// Print an activation outcome; an abort is an error
pub(crate) fn report_activation(
    ctx: &UiContext,
    worker: &Worker,
    outcome: &ActivationOutcome,
    client: &mut ClientHandle,
) -> OffcacheResult<()> {
    match outcome {
        ActivationOutcome::Promoted {
            entries, removed, ..
        } => {
            ui::step_ok(ctx, &format!("Promoted {} entries", entries));
            for name in removed {
                ui::step_ok(ctx, &format!("Removed stale generation {}", name));
            }
            if let Some(notice) = client.try_recv() {
                ui::key_value(ctx, "Clients", &notice.message);
            }
            ui::outro_success(ctx, &format!("{} is live", worker.context().names.live()));
            Ok(())
        }
        ActivationOutcome::Aborted {
            expected,
            staged,
            missing,
        } => {
            ui::step_warn(
                ctx,
                &format!("Only {} of {} assets staged; live generation kept", staged, expected),
            );
            for identifier in missing {
                ui::step_error(ctx, &format!("missing {}", identifier));
            }
            ui::outro_error(ctx, "Activation aborted");
            Err(OffcacheError::User(format!(
                "{} of {} assets staged",
                staged, expected
            )))
        }
    }
}
