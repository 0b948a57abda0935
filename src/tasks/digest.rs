use crate::{
    error::Result,
    report::DigestReport,
    services::NewsletterService,
    tasks::batch::BatchDriver,
};

/// Weekly digest: refresh, ingest and aggregate every user, then mail only
/// the users whose cycle succeeded. Failed users keep their previous
/// snapshot and receive nothing this week.
pub async fn run_digest_cycle(
    driver: &BatchDriver,
    newsletter: &NewsletterService,
) -> Result<DigestReport> {
    let cycle = driver.run_cycle().await?;

    if !cycle.failed.is_empty() {
        tracing::warn!(
            "{} users failed the cycle and will not receive a newsletter",
            cycle.failed.len()
        );
    }

    let delivery = newsletter.send_for_users(&cycle.succeeded).await;

    Ok(DigestReport { cycle, delivery })
}
