//! IPC server for renderer processes
//!
//! Listens on a unix socket, broadcasts every [`ShellEvent`] to all
//! connected renderers, and funnels incoming [`ShellCommand`]s onto the
//! main loop's update bus.

use crate::shell::ShellUpdate;
use crate::tasks::TaskManager;
use anyhow::Result;
use goblin_ipc::{socket_path, FramedMessage, ShellEvent};
use std::sync::mpsc::Sender;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Cap on a single framed message; anything larger is a protocol error.
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Start the IPC server on the background loop.
///
/// Events sent on `events` reach every connected renderer; commands from
/// renderers arrive on the update bus as [`ShellUpdate::Command`].
pub fn start(
    tasks: &TaskManager,
    events: broadcast::Sender<ShellEvent>,
    updates: Sender<ShellUpdate>,
) -> Result<()> {
    let socket = socket_path();

    // Remove a stale socket from a previous run.
    if socket.exists() {
        std::fs::remove_file(&socket)?;
    }
    if let Some(parent) = socket.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tasks
        .spawn_logged("ipc-server", async move {
            let listener = UnixListener::bind(&socket)?;
            info!("IPC server listening on {:?}", socket);

            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        info!("renderer connected");
                        let event_rx = events.subscribe();
                        let update_tx = updates.clone();
                        let _ = update_tx.send(ShellUpdate::RendererConnected);
                        tokio::spawn(handle_client(stream, event_rx, update_tx));
                    }
                    Err(e) => {
                        error!("accept error: {}", e);
                    }
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to start IPC server: {}", e))
}

/// Handle a connected renderer
async fn handle_client(
    stream: UnixStream,
    mut event_rx: broadcast::Receiver<ShellEvent>,
    update_tx: Sender<ShellUpdate>,
) {
    let (mut reader, mut writer) = stream.into_split();

    // Reader task (renderer → daemon)
    let reader_task = tokio::spawn(async move {
        let mut len_buf = [0u8; 4];
        loop {
            // Read length prefix
            if reader.read_exact(&mut len_buf).await.is_err() {
                break;
            }
            let len = u32::from_be_bytes(len_buf) as usize;

            if len > MAX_MESSAGE_BYTES {
                warn!("message too large: {} bytes", len);
                break;
            }

            // Read message
            let mut msg_buf = vec![0u8; len];
            if reader.read_exact(&mut msg_buf).await.is_err() {
                break;
            }

            // Decode command
            match FramedMessage::decode_shell_command(&msg_buf) {
                Ok(cmd) => {
                    debug!("received command: {:?}", cmd);
                    if update_tx.send(ShellUpdate::Command(cmd)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("failed to decode command: {}", e);
                }
            }
        }
        debug!("reader task ended");
    });

    // Writer task (daemon → renderer)
    let writer_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match FramedMessage::new(&event) {
                    Ok(msg) => {
                        if writer.write_all(&msg.encode()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("failed to encode event: {}", e);
                    }
                },
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("renderer lagged {} events", n);
                }
            }
        }
        debug!("writer task ended");
    });

    // Wait for either task to finish
    tokio::select! {
        _ = reader_task => {}
        _ = writer_task => {}
    }

    info!("renderer disconnected");
}
