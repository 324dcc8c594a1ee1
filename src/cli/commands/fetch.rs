//! Fetch command - resolve one request through the arbiter

use super::Deployment;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::network::{Network, Request, Response};
use crate::worker::Disposition;
use console::style;
use std::io::{self, Write};
use tokio::fs;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> OffcacheResult<()> {
    let deployment = Deployment::open(config, args.origin.as_deref()).await?;
    if args.offline {
        deployment.network.set_online(false);
    }

    let request = if args.navigate {
        Request::navigate(&args.url)
    } else {
        Request::get(&args.url)
    };

    let (response, outcome) = match deployment.worker.fetch(&request).await {
        Disposition::Respond(resolution) => {
            let caller = resolution
                .caller
                .map(|c| c.to_string())
                .unwrap_or_else(|| "offline".to_string());
            (resolution.response, format!("{} ({})", resolution.outcome, caller))
        }
        Disposition::Passthrough => {
            let response = deployment.network.fetch(&request).await?;
            (response, "passthrough".to_string())
        }
    };

    // Let the best-effort cache refresh finish before the process exits
    deployment.worker.settle().await;

    print_status(&response, &outcome);
    write_body(&response, args.output.as_deref()).await
}

fn print_status(response: &Response, outcome: &str) {
    let status = format!("{} {}", response.status, response.status_text);
    let status = if response.is_ok() {
        style(status).green()
    } else {
        style(status).red()
    };
    eprintln!("{} {}", status, style(outcome).dim());
}

async fn write_body(response: &Response, output: Option<&std::path::Path>) -> OffcacheResult<()> {
    match output {
        Some(path) => fs::write(path, &response.body)
            .await
            .map_err(|e| OffcacheError::io(format!("writing {}", path.display()), e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| OffcacheError::io("writing response body", e))
        }
    }
}
