use docmigrate::rebuild;

use super::Context;

pub async fn run(context: &Context) -> anyhow::Result<()> {
    rebuild(&context.store, &context.config.database).await?;
    Ok(())
}
