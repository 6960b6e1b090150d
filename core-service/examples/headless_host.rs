//! Minimal headless host.
//!
//! Reads credentials from `ANIDB_USER` / `ANIDB_PASS`, looks up one anime and
//! shuts down cleanly.
//!
//! ```sh
//! ANIDB_USER=alice ANIDB_PASS=secret cargo run -p core-service --example headless_host -- 1
//! ```

use anyhow::Context;
use core_runtime::config::{CoreConfig, QueueKind};
use core_runtime::logging::{init_logging, LoggingConfig};
use provider_anidb::Command;

#[core_async::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default())?;

    let anime_id: u64 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "1".to_string())
        .parse()
        .context("anime id must be a number")?;

    let config = CoreConfig::builder()
        .credentials(
            std::env::var("ANIDB_USER").context("ANIDB_USER is not set")?,
            std::env::var("ANIDB_PASS").context("ANIDB_PASS is not set")?,
        )
        .build()?;

    let core = core_service::bootstrap_desktop(config).await?;
    let observer = core.spawn_queue_observer();
    core.start()?;

    let ticket = core.enqueue(Command::get_anime_info(anime_id)?, QueueKind::General)?;
    match ticket.wait().await {
        Some(completion) => println!("{:#?}", completion),
        None => println!("queue stopped before the lookup ran"),
    }

    core.shutdown().await?;
    observer.await?;
    Ok(())
}
