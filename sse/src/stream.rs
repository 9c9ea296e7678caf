use crate::message::Envelope;
use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use log::*;
use std::convert::Infallible;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Aborts the producer task when the stream is dropped before it finished,
/// which is what happens when the client disconnects mid-request.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            debug!("SSE stream closed before its event was written, aborting producer");
            self.0.abort();
        }
    }
}

/// Runs `producer` in its own task and yields exactly one envelope: the one it
/// returns, or a 500 error envelope if the task dies without returning.
///
/// Dropping the stream at any point aborts the producer, so nothing is written
/// after a client goes away.
pub fn single_envelope<F>(producer: F) -> impl Stream<Item = Envelope> + Send
where
    F: Future<Output = Envelope> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let envelope = producer.await;
        if tx.send(envelope).is_err() {
            debug!("SSE receiver gone, discarding event");
        }
    });
    let guard = AbortOnDrop(handle);

    stream! {
        let _guard = guard;
        match rx.await {
            Ok(envelope) => yield envelope,
            Err(_) => {
                error!("SSE producer stopped without emitting an event");
                yield Envelope::error("Something went wrong", 500);
            }
        }
    }
}

/// Wraps [`single_envelope`] into an axum SSE response. The response ends right
/// after its single event.
pub fn respond<F>(producer: F) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Future<Output = Envelope> + Send + 'static,
{
    let events = single_envelope(producer).map(|envelope| Ok(envelope.into_event()));

    Sse::new(events).keep_alive(KeepAlive::default())
}
