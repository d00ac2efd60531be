use std::path::PathBuf;

use docmigrate::{SeedRequest, SeedRunner};
use docmigrate_core::MigrateConfig;

use super::Context;

/// The `--dir` override, or the configured seed directory
pub fn seed_dir(config: &MigrateConfig, dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| config.seeders_path())
}

pub async fn run(
    context: &Context,
    use_default: bool,
    dir: Option<PathBuf>,
    names: Vec<String>,
) -> anyhow::Result<()> {
    let seed_dir = seed_dir(&context.config, dir);
    let runner = SeedRunner::new(
        &context.store,
        &context.registry,
        context.config.default_manifest_path(),
    );

    let request = SeedRequest { use_default, names };
    runner.run(&request, &seed_dir).await?;
    Ok(())
}
