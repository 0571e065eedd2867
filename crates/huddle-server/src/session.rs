//! Per-connection session driver.
//!
//! One task per connection: it registers with the relay, then alternates
//! between writing queued outbound events and dispatching inbound ones until
//! either side goes away.

use crate::metrics::{self, SessionMetricsGuard};
use huddle_core::{Dispatch, Relay, SessionId};
use huddle_protocol::ProtocolError;
use huddle_transport::{Connection, Transport, TransportError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Pause after an I/O error from `accept`, so a persistent failure such as
/// EMFILE does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Semaphore bounding concurrent sessions. A permit is taken before a
/// connection is admitted and held until its session ends.
#[must_use]
pub fn session_limiter(max_sessions: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(max_sessions.min(Semaphore::MAX_PERMITS)))
}

/// Drive one connection until it closes.
pub async fn run_session(relay: Arc<Relay>, mut conn: Box<dyn Connection>) {
    let _metrics_guard = SessionMetricsGuard::new();
    let mut session = relay.connect().await;
    let id = session.id;

    debug!(session = %id, peer = ?conn.remote_addr(), "Session started");

    loop {
        tokio::select! {
            biased;

            // Outbound first, so the snapshot always goes out before we read
            outbound = session.events.recv() => {
                let Some(event) = outbound else {
                    debug!(session = %id, "Outbound queue closed");
                    break;
                };
                if let Err(e) = conn.send(&event).await {
                    warn!(session = %id, error = %e, "Send failed");
                    metrics::record_error("send");
                    break;
                }
                metrics::record_outbound(event.kind());
            }

            inbound = conn.recv() => match inbound {
                Ok(Some(event)) => {
                    let kind = event.kind();
                    metrics::record_inbound(kind);

                    let start = Instant::now();
                    let outcome = relay.dispatch(&id, event).await;
                    metrics::record_latency(start.elapsed().as_secs_f64());

                    if outcome == Dispatch::Skipped {
                        metrics::record_error("not_found");
                    }
                    if matches!(kind, "message" | "delete") {
                        metrics::set_messages_stored(relay.stats().await.messages);
                    }
                }
                Ok(None) => {
                    debug!(session = %id, "Connection closed by peer");
                    break;
                }
                Err(TransportError::Protocol(e)) => reject(&relay, &id, e),
                Err(e) => {
                    warn!(session = %id, error = %e, "Connection error");
                    metrics::record_error("transport");
                    break;
                }
            }
        }
    }

    relay.disconnect(&id);
    if let Err(e) = conn.close().await {
        debug!(session = %id, error = %e, "Close failed");
    }
}

/// Handle a frame that could not be decoded. Other sessions never see it.
fn reject(relay: &Relay, id: &SessionId, error: ProtocolError) {
    match &error {
        ProtocolError::UnknownType(tag) => {
            warn!(session = %id, event_type = %tag, "Ignoring event of unknown type");
            metrics::record_error("unknown_event");
        }
        _ => {
            warn!(session = %id, error = %error, "Rejected malformed event");
            metrics::record_error("malformed_event");
        }
    }

    if let Some(reply) = error.reply() {
        relay.reply(id, reply);
    }
}

/// Accept connections from a transport until it shuts down.
pub async fn serve_transport(
    transport: Arc<dyn Transport>,
    relay: Arc<Relay>,
    limiter: Arc<Semaphore>,
) {
    info!(transport = transport.name(), "Accepting connections");

    loop {
        let mut conn = match transport.accept().await {
            Ok(conn) => conn,
            Err(TransportError::ConnectionClosed) => {
                info!(transport = transport.name(), "Transport closed");
                break;
            }
            Err(e) => {
                warn!(transport = transport.name(), error = %e, "Accept failed");
                metrics::record_error("accept");
                if matches!(e, TransportError::Io(_)) {
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                continue;
            }
        };

        let Ok(permit) = Arc::clone(&limiter).try_acquire_owned() else {
            warn!(peer = ?conn.remote_addr(), "Session limit reached, refusing connection");
            metrics::record_rejected();
            if let Err(e) = conn.close().await {
                debug!(peer = ?conn.remote_addr(), error = %e, "Close failed");
            }
            continue;
        };

        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            run_session(relay, conn).await;
            drop(permit);
        });
    }
}
