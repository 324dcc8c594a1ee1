//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::OffcacheResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> OffcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> OffcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            ),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("offcache").join("config.toml"));

        init_config(&manager, false).await.unwrap();
        let written = manager.load_from_file(manager.path()).await.unwrap();
        assert_eq!(written.worker.app_name, "zmeya");

        let mut custom = Config::default();
        custom.worker.version = "v9".to_string();
        manager.save(&custom).await.unwrap();

        init_config(&manager, false).await.unwrap();
        let kept = manager.load_from_file(manager.path()).await.unwrap();
        assert_eq!(kept.worker.version, "v9");

        init_config(&manager, true).await.unwrap();
        let reset = manager.load_from_file(manager.path()).await.unwrap();
        assert_eq!(reset.worker.version, "v2");
    }
}
