use docmigrate::{new_migration, Migrator};
use docmigrate_core::MigrateConfig;

use super::Context;

fn migrator(context: &Context) -> Migrator<'_> {
    Migrator::new(&context.store, &context.registry, context.config.migrations_path())
        .with_ledger(&context.config.database, &context.config.ledger_collection)
}

pub async fn up(context: &Context) -> anyhow::Result<()> {
    migrator(context).up().await?;
    Ok(())
}

pub async fn down(context: &Context) -> anyhow::Result<()> {
    migrator(context).down().await?;
    Ok(())
}

pub async fn status(context: &Context) -> anyhow::Result<()> {
    let statuses = migrator(context).status().await?;

    println!("Migration Status:");
    println!("================");

    if statuses.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    for status in &statuses {
        match (status.applied, status.applied_at) {
            (true, Some(applied_at)) => println!(
                "  [applied {}] {}",
                applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
                status.filename
            ),
            (true, None) => println!("  [applied] {}", status.filename),
            (false, _) => println!("  [pending] {}", status.filename),
        }
    }

    let applied = statuses.iter().filter(|status| status.is_applied()).count();
    println!("\n{} applied, {} pending", applied, statuses.len() - applied);
    Ok(())
}

pub fn create(config: &MigrateConfig, name: &str) -> anyhow::Result<()> {
    let path = new_migration(&config.migrations_path(), name)?;
    println!("Created migration: {}", path.display());
    Ok(())
}
