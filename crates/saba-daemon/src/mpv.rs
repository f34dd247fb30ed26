//! mpv IPC driver used as the internet radio's stream player.
//!
//! ```text
//!   MpvPlayer ── lazily spawns `mpv --idle=yes --input-ipc-server=<sock>`
//!         │
//!         ├── writer_task   ← receives PendingRequest via mpsc, writes JSON lines
//!         └── reader_task   ← reads JSON lines from the socket
//!                                ├── response (has request_id) → matched oneshot::Sender
//!                                └── anything else            → logged and dropped
//! ```
//!
//! If mpv dies the next `start()` spawns a fresh process.
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::backend::internet_radio::StreamPlayer;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, ends with '\n'
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<()> {
        self.send(json!(["loadfile", url])).await?;
        let vol_pct = (volume * 100.0).clamp(0.0, 100.0);
        if let Err(e) = self.send(json!(["set_property", "volume", vol_pct])).await {
            warn!("mpv: setting volume failed: {}", e);
        }
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    /// ICY title of the current stream, if the station sends one.
    pub async fn icy_title(&self) -> Option<String> {
        let resp = self
            .send(json!(["get_property", "metadata/by-key/icy-title"]))
            .await
            .ok()?;
        resp["data"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending));
    MpvHandle { tx: cmd_tx }
}

// ── player ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MpvProcess {
    child: Option<tokio::process::Child>,
    handle: Option<MpvHandle>,
}

impl MpvProcess {
    fn alive(&mut self) -> bool {
        let running = self
            .child
            .as_mut()
            .map_or(false, |c| c.try_wait().ok().flatten().is_none());
        running && self.handle.as_ref().map_or(false, |h| !h.is_closed())
    }

    async fn kill(&mut self) {
        self.handle = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("mpv: kill failed: {}", e);
            }
        }
    }

    async fn spawn_and_connect(&mut self, volume: f32) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(saba_proto::platform::mpv_socket_name());
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let mpv_binary = saba_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let vol_arg = format!(
            "--volume={}",
            (volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(saba_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(vol_arg)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        let handle = start_io_tasks(read_half, write_half);
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

pub struct MpvPlayer {
    volume: f32,
    process: Mutex<MpvProcess>,
}

impl MpvPlayer {
    pub fn new(volume: f32) -> Self {
        Self {
            volume,
            process: Mutex::new(MpvProcess::default()),
        }
    }

    async fn handle(&self) -> Option<MpvHandle> {
        self.process.lock().await.handle.clone()
    }

    pub async fn shutdown(&self) {
        self.process.lock().await.kill().await;
    }
}

#[async_trait]
impl StreamPlayer for MpvPlayer {
    async fn start(&self, url: &str) -> anyhow::Result<()> {
        let handle = {
            let mut process = self.process.lock().await;
            match (process.alive(), process.handle.clone()) {
                (true, Some(handle)) => handle,
                _ => process.spawn_and_connect(self.volume).await?,
            }
        };
        handle.load_stream(url, self.volume).await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        match self.handle().await {
            Some(handle) if !handle.is_closed() => handle.stop().await,
            _ => Ok(()),
        }
    }

    async fn currently_playing(&self) -> Option<String> {
        self.handle().await?.icy_title().await
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                let Some(req_id) = val.get("request_id").and_then(Value::as_u64) else {
                    debug!("mpv reader: event {}", trimmed);
                    continue;
                };
                let mut map = pending.lock().await;
                if let Some(tx) = map.remove(&req_id) {
                    let result = if val["error"].as_str() == Some("success") {
                        Ok(val)
                    } else {
                        let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                        debug!("mpv reader: response req={} err={}", req_id, err);
                        Err(anyhow::anyhow!("mpv error: {}", err))
                    };
                    let _ = tx.send(result);
                } else {
                    debug!("mpv reader: response for unknown req={}", req_id);
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}
