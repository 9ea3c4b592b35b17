//! The single audio output device: an mpv subprocess driven over JSON IPC.
//!
//! The handle is exclusively owned by the app; every device callback is
//! mapped to a [`DeviceEvent`] and pushed into the app event channel, where
//! it is processed in order with user commands.

use super::DeviceEvent;
use crate::app::events::Event;
use anyhow::Context;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    sync::mpsc,
};

#[derive(Debug)]
pub struct DeviceHandle {
    child: Child,
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    request_id: AtomicU64,
    /// Command name per outstanding request id, so error replies can be
    /// matched to the command that caused them.
    pending: Arc<Mutex<HashMap<u64, String>>>,
}

impl DeviceHandle {
    pub async fn spawn(
        event_tx: mpsc::Sender<Event>,
        audio_device: Option<&str>,
    ) -> anyhow::Result<Self> {
        let socket_path = std::env::temp_dir().join(format!("cadence-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let mut cmd = Command::new("mpv");
        cmd.args([
            "--no-video",
            "--idle=yes",
            "--input-terminal=no",
            "--really-quiet",
        ]);
        if let Some(dev) = audio_device {
            cmd.arg(format!("--audio-device={dev}"));
        }
        let child = cmd
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("spawn mpv")?;

        // mpv creates the socket shortly after starting.
        let stream = connect_with_retry(&socket_path).await?;
        let (reader, writer) = tokio::io::split(stream);

        let pending = Arc::new(Mutex::new(HashMap::new()));

        // Pump device callbacks into the app event channel.
        tokio::spawn(read_events_loop(reader, event_tx, Arc::clone(&pending)));

        let this = Self {
            child,
            socket_path,
            writer: tokio::sync::Mutex::new(writer),
            request_id: AtomicU64::new(1),
            pending,
        };

        // Observe the properties the engine's state vector is built from.
        this.command(json!({"command":["observe_property", 1, "time-pos"]}))
            .await?;
        this.command(json!({"command":["observe_property", 2, "duration"]}))
            .await?;
        this.command(json!({"command":["observe_property", 3, "pause"]}))
            .await?;
        this.command(json!({"command":["observe_property", 4, "paused-for-cache"]}))
            .await?;

        Ok(this)
    }

    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.command(json!({"command":["loadfile", url, "replace"]}))
            .await
    }

    pub async fn pause(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", true]}))
            .await
    }

    pub async fn resume(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", false]}))
            .await
    }

    pub async fn seek_absolute(&self, seconds: f64) -> anyhow::Result<()> {
        self.command(json!({"command":["seek", seconds, "absolute"]}))
            .await
    }

    pub async fn set_volume(&self, volume_0_100: u8) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "volume", volume_0_100]}))
            .await
    }

    async fn command(&self, mut v: serde_json::Value) -> anyhow::Result<()> {
        // Tag requests so errors come back structured on the IPC stream.
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        if let serde_json::Value::Object(ref mut o) = v {
            o.insert("request_id".to_string(), serde_json::Value::from(id));
        }
        let name = v
            .get("command")
            .and_then(|c| c.get(0))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, name);
        }
        let mut w = self.writer.lock().await;
        let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
        line.push(b'\n');
        w.write_all(&line).await.context("write mpv ipc")?;
        w.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn connect_with_retry(path: &PathBuf) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e).with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_events_loop(
    reader: tokio::io::ReadHalf<UnixStream>,
    event_tx: mpsc::Sender<Event>,
    pending: Arc<Mutex<HashMap<u64, String>>>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&line) {
            // Command replies: {"request_id":..., "error":"..."}
            if let Some(rid) = v.get("request_id").and_then(|x| x.as_u64()) {
                let name = pending.lock().ok().and_then(|mut p| p.remove(&rid));
                if let Some(err) = v.get("error").and_then(|e| e.as_str())
                    && let Some(de) = map_command_reply(name.as_deref(), err)
                {
                    let _ = event_tx.send(Event::Device(de)).await;
                }
            }
            if let Some(de) = map_mpv_event(&v) {
                let _ = event_tx.send(Event::Device(de)).await;
            }
        }
    }
}

/// Only a rejected load is fatal to playback. Other command rejections are
/// transient (mpv refuses a seek before a file is bound, for instance) and
/// must not collapse the player into the Error state.
fn map_command_reply(command: Option<&str>, error: &str) -> Option<DeviceEvent> {
    if error == "success" {
        return None;
    }
    match command {
        Some("loadfile") => Some(DeviceEvent::Error(format!("mpv load rejected: {error}"))),
        _ => {
            tracing::warn!(
                "mpv rejected {} command: {error}",
                command.unwrap_or("unknown")
            );
            None
        }
    }
}

fn map_mpv_event(v: &serde_json::Value) -> Option<DeviceEvent> {
    match v.get("event")?.as_str()? {
        "property-change" => {
            let name = v.get("name")?.as_str()?;
            match name {
                "time-pos" => Some(DeviceEvent::Position {
                    seconds: v.get("data")?.as_f64()?,
                }),
                "duration" => Some(DeviceEvent::Duration {
                    seconds: v.get("data")?.as_f64()?,
                }),
                "pause" => {
                    let paused = v.get("data")?.as_bool().unwrap_or(false);
                    Some(if paused {
                        DeviceEvent::Paused
                    } else {
                        DeviceEvent::Playing
                    })
                }
                "paused-for-cache" => {
                    Some(DeviceEvent::Buffering(v.get("data")?.as_bool().unwrap_or(false)))
                }
                _ => None,
            }
        }
        // Playable metadata is available once the file is loaded.
        "file-loaded" => Some(DeviceEvent::Loaded),
        // Fires after every seek once playback resumes at the new position.
        "playback-restart" => Some(DeviceEvent::Seeked),
        "end-file" => {
            let reason = v.get("reason").and_then(|x| x.as_str()).unwrap_or("");
            match reason {
                "error" => {
                    let err = v.get("error").and_then(|x| x.as_str()).unwrap_or("unknown");
                    Some(DeviceEvent::Error(format!("mpv end-file error: {err}")))
                }
                "eof" => Some(DeviceEvent::Ended),
                // "stop"/"redirect" happen when we replace the stream ourselves.
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_position_and_duration_properties() {
        let v = json!({"event":"property-change","name":"time-pos","data":12.5});
        assert!(matches!(
            map_mpv_event(&v),
            Some(DeviceEvent::Position { seconds }) if seconds == 12.5
        ));

        let v = json!({"event":"property-change","name":"duration","data":240.0});
        assert!(matches!(
            map_mpv_event(&v),
            Some(DeviceEvent::Duration { seconds }) if seconds == 240.0
        ));
    }

    #[test]
    fn maps_pause_property_to_play_state() {
        let v = json!({"event":"property-change","name":"pause","data":true});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Paused)));
        let v = json!({"event":"property-change","name":"pause","data":false});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Playing)));
    }

    #[test]
    fn maps_end_file_reasons() {
        let v = json!({"event":"end-file","reason":"eof"});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Ended)));

        let v = json!({"event":"end-file","reason":"error","error":"unsupported"});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Error(_))));

        // Replacing the stream ourselves is not an end-of-stream signal.
        let v = json!({"event":"end-file","reason":"stop"});
        assert!(map_mpv_event(&v).is_none());
    }

    #[test]
    fn only_load_rejections_are_fatal() {
        assert!(matches!(
            map_command_reply(Some("loadfile"), "error running command"),
            Some(DeviceEvent::Error(_))
        ));
        assert!(map_command_reply(Some("seek"), "property unavailable").is_none());
        assert!(map_command_reply(None, "invalid parameter").is_none());
        assert!(map_command_reply(Some("loadfile"), "success").is_none());
    }

    #[test]
    fn maps_buffering_and_seek_confirmation() {
        let v = json!({"event":"property-change","name":"paused-for-cache","data":true});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Buffering(true))));
        let v = json!({"event":"playback-restart"});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Seeked)));
        let v = json!({"event":"file-loaded"});
        assert!(matches!(map_mpv_event(&v), Some(DeviceEvent::Loaded)));
    }
}
