//! Per-connection send handle and write pump.
//!
//! Every accepted connection gets a bounded mpsc channel drained by a
//! write pump task, so the registry and the fan-out path never touch the
//! socket sink directly and never block on a slow peer.

use axum::extract::ws::Message;
use futures_util::SinkExt;
use tokio::sync::mpsc;

use devicepulse_protocol::constants::WS_PING_PERIOD;

/// Send buffer capacity per connection.
///
/// An observer that stops draining its socket fills this buffer; further
/// frames for it are dropped rather than delaying the publisher's fan-out.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Error returned when the send buffer is full or the connection closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

/// Handle for delivering frames to one connection.
///
/// Cloneable and cheap; wraps an `mpsc::Sender`.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<Message>,
}

impl Sender {
    /// Queues one frame for delivery without blocking.
    pub fn send_frame(&self, frame: Message) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|_| SendError)
    }

    /// Returns `true` while the write pump is still draining the channel.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Creates the send handle and the receiver its write pump drains.
pub(crate) fn channel() -> (Sender, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(SEND_BUFFER_SIZE);
    (Sender { tx }, rx)
}

/// Write pump: drains the send channel into the socket sink and emits
/// periodic keepalive pings. Exits when the channel closes (all senders
/// dropped) or a write fails.
pub(crate) async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<Message>)
where
    S: futures_util::Sink<Message, Error = axum::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // Skip the immediate first tick.

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            tracing::debug!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // Channel closed.
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new().into())).await {
                    tracing::debug!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;

    fn collecting_sink(
        tx: mpsc::Sender<Message>,
    ) -> impl futures_util::Sink<Message, Error = axum::Error> + Send + Unpin {
        Box::pin(sink::unfold(tx, |tx, msg: Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, axum::Error>(tx)
        }))
    }

    #[tokio::test]
    async fn sender_delivers_through_write_pump() {
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(16);
        let (sender, rx) = channel();

        let pump = tokio::spawn(write_pump(collecting_sink(out_tx), rx));

        sender
            .send_frame(Message::Text("{\"cpu_usage\":\"1%\"}".into()))
            .unwrap();

        let got = out_rx.recv().await.unwrap();
        assert_eq!(got, Message::Text("{\"cpu_usage\":\"1%\"}".into()));

        drop(sender);
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn pump_exits_when_all_senders_drop() {
        let (out_tx, _out_rx) = mpsc::channel::<Message>(16);
        let (sender, rx) = channel();
        let pump = tokio::spawn(write_pump(collecting_sink(out_tx), rx));

        let clone = sender.clone();
        drop(sender);
        assert!(clone.is_connected());
        drop(clone);

        tokio::time::timeout(std::time::Duration::from_secs(2), pump)
            .await
            .expect("pump should exit")
            .expect("no panic");
    }

    #[tokio::test]
    async fn send_frame_fails_when_buffer_full() {
        // No pump draining: the buffer fills and further sends error.
        let (sender, _rx) = channel();
        for _ in 0..SEND_BUFFER_SIZE {
            sender.send_frame(Message::Text("x".into())).unwrap();
        }
        assert!(sender.send_frame(Message::Text("x".into())).is_err());
    }
}
