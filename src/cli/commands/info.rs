//! Info command - report the live generation and stored generations

use super::Deployment;
use crate::cli::args::{InfoArgs, OutputFormat};
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::needs_rescue;
use crate::store::CacheStore;
use crate::worker::{CacheInfo, ClientMessage};
use console::style;
use serde::Serialize;
use tokio::sync::oneshot;

/// Role of a stored generation relative to the current deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Live,
    Staging,
    Stale,
    Foreign,
}

#[derive(Debug, Serialize)]
struct GenerationRow {
    name: String,
    role: Role,
    entries: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoReport {
    live: String,
    #[serde(flatten)]
    cache: CacheInfo,
    generations: Vec<GenerationRow>,
    needs_rescue: bool,
}

/// Execute the info command
pub async fn execute(args: InfoArgs, config: &Config) -> OffcacheResult<()> {
    let deployment = Deployment::open(config, None).await?;
    let ctx = deployment.worker.context();

    // Ask the worker the way a page does, over a reply port
    let (port, reply) = oneshot::channel();
    deployment
        .worker
        .on_message(ClientMessage::CacheInfo, Some(port))
        .await?;
    let cache = reply
        .await
        .map_err(|_| OffcacheError::Internal("CACHE_INFO reply dropped".to_string()))?;

    let mut names: Vec<String> = deployment
        .store
        .generation_names()
        .await?
        .into_iter()
        .collect();
    names.sort();

    let mut generations = Vec::with_capacity(names.len());
    for name in &names {
        let role = if name == ctx.names.live() {
            Role::Live
        } else if name == ctx.names.staging() {
            Role::Staging
        } else if ctx.names.is_stale(name) {
            Role::Stale
        } else {
            Role::Foreign
        };
        let entries = deployment.store.keys(name).await?.len();
        generations.push(GenerationRow {
            name: name.clone(),
            role,
            entries,
        });
    }

    let report = InfoReport {
        live: ctx.names.live().to_string(),
        cache,
        generations,
        needs_rescue: needs_rescue(&names, &ctx.version),
    };

    match args.format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Plain => print_plain(&report),
    }

    Ok(())
}

fn print_table(report: &InfoReport) {
    println!(
        "{} {} ({} cached)",
        style("Live:").bold(),
        report.live,
        report.cache.cache_size
    );
    println!();

    if report.generations.is_empty() {
        println!("No generations stored.");
        return;
    }

    println!("{:<32} {:<10} {:>8}", "GENERATION", "ROLE", "ENTRIES");
    println!("{}", "-".repeat(52));
    for row in &report.generations {
        let role = match row.role {
            Role::Live => style("live").green().to_string(),
            Role::Staging => style("staging").yellow().to_string(),
            Role::Stale => style("stale").red().to_string(),
            Role::Foreign => style("foreign").dim().to_string(),
        };
        println!("{:<32} {:<10} {:>8}", row.name, role, row.entries);
    }

    if report.needs_rescue {
        println!();
        println!(
            "{} clients holding only these caches will unregister and reload",
            style("Rescue:").yellow()
        );
    }
}

fn print_json(report: &InfoReport) -> OffcacheResult<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn print_plain(report: &InfoReport) {
    for url in &report.cache.cached_urls {
        println!("{}", url);
    }
}
