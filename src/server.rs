use std::{path::Path, process::Stdio, time::Duration};

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Time the freshly spawned server gets before we start talking to it.
const SETTLE_TIME: Duration = Duration::from_millis(300);
/// How long shutdown waits for the server to exit before giving up.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// A store server process owned by this selector.
///
/// Spawned when the configuration asks for a managed backing store instead
/// of pointing at an already running one. The child is killed on drop as a
/// backstop, but [`StoreServer::shutdown`] is the intended exit path.
pub struct StoreServer {
    child: Child,
    port: u16,
}

impl StoreServer {
    /// Spawn `redis-server` on the given port, persisting into `directory`.
    ///
    /// The directory is created if it does not exist. Fails if the server
    /// exits during its settle time (bad port, unwritable directory, ...).
    pub async fn start(port: u16, directory: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(directory).with_context(|| {
            format!("failed to create store directory {}", directory.display())
        })?;

        let mut child = Command::new("redis-server")
            .arg("--port")
            .arg(port.to_string())
            .arg("--dir")
            .arg(directory)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn redis-server, is it installed?")?;

        tokio::time::sleep(SETTLE_TIME).await;
        if let Some(status) = child.try_wait().context("failed to poll store server")? {
            anyhow::bail!("store server exited during startup with {status}");
        }

        info!("started backing store server on port {port}");
        Ok(StoreServer { child, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Terminate the server, waiting a bounded time for it to exit.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.child
            .start_kill()
            .context("failed to signal store server")?;
        match tokio::time::timeout(SHUTDOWN_WAIT, self.child.wait()).await {
            Ok(status) => {
                let status = status.context("failed to reap store server")?;
                info!("backing store server exited with {status}");
                Ok(())
            }
            Err(_) => {
                warn!("backing store server did not exit in time, killing it");
                self.child
                    .kill()
                    .await
                    .context("failed to kill store server")?;
                Ok(())
            }
        }
    }
}
