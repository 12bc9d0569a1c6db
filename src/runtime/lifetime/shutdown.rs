use tokio::signal;
use tracing::warn;

use crate::errors::Result;

/// 等待 Ctrl+C，用于中断长时间运行的维护命令
pub async fn listen_for_shutdown() -> Result<()> {
    signal::ctrl_c().await?;
    warn!("Shutdown signal received, aborting current maintenance task...");
    Ok(())
}
