use std::sync::Arc;

use anyhow::Context;
use bridge_core::{Event, InboundTx, Topic};
use bytes::Bytes;
use model::SessionOpened;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time;
use tracing::{debug, info, warn};

use crate::frame::{Response, ResponseDecoder};
use crate::{ActiveLink, ActiveSlot, LinkConfig};

enum End {
    /// The vehicle closed the stream.
    PeerClosed,
    /// `close-server` from the operator.
    Shutdown,
    /// Nobody drains the inbound channel any more.
    BridgeGone,
}

pub(crate) async fn run(id: u64, addr: String, cfg: LinkConfig, inbound: InboundTx, active: ActiveSlot) {
    let stream = match time::timeout(cfg.connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            warn!(%addr, error = %err, "connect failed");
            report(&inbound, SessionOpened::Failed { msg: err.to_string() });
            return;
        }
        Err(_) => {
            warn!(%addr, "connect timed out");
            report(&inbound, SessionOpened::Failed { msg: "timeout".into() });
            return;
        }
    };
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| addr.clone());
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "nodelay not set");
    }

    let (frames_tx, frames_rx) = mpsc::channel(cfg.effective_queue_depth());
    let shutdown = Arc::new(Notify::new());
    *active.lock() = Some(ActiveLink { id, frames: frames_tx, shutdown: Arc::clone(&shutdown) });
    info!(%peer, id, "session open");
    report(&inbound, SessionOpened::Connected { addr: peer.clone() });

    let (reader, writer) = stream.into_split();
    let end = tokio::select! {
        r = read_loop(reader, &inbound, cfg.read_buffer) => r,
        r = write_loop(writer, frames_rx) => r,
        _ = shutdown.notified() => Ok(End::Shutdown),
    };

    {
        let mut slot = active.lock();
        if slot.as_ref().map(|l| l.id) == Some(id) {
            *slot = None;
        }
    }

    match end {
        Ok(End::Shutdown) => info!(%peer, "session closed by operator"),
        Ok(End::BridgeGone) => debug!(%peer, "bridge gone, session dropped"),
        Ok(End::PeerClosed) => {
            info!(%peer, "vehicle closed the session");
            let _ = inbound.send(Event::bare(Topic::SessionClosed));
        }
        Err(err) => {
            warn!(%peer, error = %err, "session failed");
            let _ = inbound.send(Event::new(Topic::Notify, format!("{err:#}").into()));
            let _ = inbound.send(Event::bare(Topic::SessionClosed));
        }
    }
}

fn report(inbound: &InboundTx, opened: SessionOpened) {
    if inbound.send(Event::new(Topic::SessionOpened, opened.to_payload())).is_err() {
        debug!("connect result dropped, bridge gone");
    }
}

async fn read_loop(mut reader: OwnedReadHalf, inbound: &InboundTx, buf_size: usize) -> anyhow::Result<End> {
    let mut decoder = ResponseDecoder::new();
    let mut buf = vec![0u8; buf_size.max(1)];
    loop {
        let n = reader.read(&mut buf).await.context("read from vehicle")?;
        if n == 0 {
            return Ok(End::PeerClosed);
        }
        decoder.extend(&buf[..n]);
        while let Some(frame) = decoder.next_frame() {
            match frame {
                Ok(Response::Statistics(payload)) => {
                    if inbound.send(Event::new(Topic::Telemetry, payload)).is_err() {
                        return Ok(End::BridgeGone);
                    }
                }
                Ok(Response::Unknown(kind)) => debug!(kind, "unknown response frame skipped"),
                Err(err) => warn!(error = %err, "bad response frame"),
            }
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut frames: mpsc::Receiver<Bytes>) -> anyhow::Result<End> {
    while let Some(frame) = frames.recv().await {
        writer.write_all(&frame).await.context("write to vehicle")?;
    }
    // the sender lives in the active slot, so this only happens on shutdown
    Ok(End::Shutdown)
}
