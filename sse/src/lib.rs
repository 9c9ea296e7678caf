//! Server-Sent Events (SSE) helpers for one-shot responses.
//!
//! Count endpoints do not keep a connection open for updates. They answer a
//! single question (how many nodes, how many edges) over `text/event-stream`
//! so the browser can show progress without blocking a JSON request.
//!
//! # Lifecycle of a stream
//!
//! - **Open**: the handler calls [`stream::respond`] with the future that
//!   computes the answer. The future starts running in its own task.
//! - **Emitted**: the future returns an [`message::Envelope`], which is written
//!   as either an `event: result` or an `event: error` frame.
//! - **Closed**: the stream ends right after that one frame.
//! - **Aborted**: if the client disconnects first, axum drops the stream and
//!   the running task is aborted. Nothing else is written.
//!
//! Errors never surface as HTTP errors once the stream is open. They travel as
//! `event: error` with `{ "message": ..., "status": ... }` as data.
//!
//! # Modules
//!
//! - `message`: the `Envelope` type and its SSE framing
//! - `stream`: the single-event stream and its abort-on-drop guard

pub mod message;
pub mod stream;

pub use message::Envelope;
