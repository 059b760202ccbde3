//! The correlation engine: one reader thread, one outstanding request.
//!
//! ```text
//!  caller ──request()──► [request path] ──frame──► link writer
//!                             │ arm
//!                             ▼
//!                        [pending slot] ◄──complete── reader thread ◄── link reader
//!                                                          │
//!                                                          └──► indication dispatcher
//! ```
//!
//! Requests are serialized by the request-path lock, so at most one
//! is ever awaiting a response. The reader thread decodes every frame;
//! a response matching the armed request wakes the caller, an
//! indication goes to its observer, and anything else is dropped.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use snic_metrics::{metric_defs, MetricLabels};
use snic_protocol::{
    category_name, encode_frame, write_request_header, ByteBuffer, Decoded, Frame, FrameDecoder,
    FrameError, IndicationKind, Message,
};
use tracing::{debug, info, trace, warn};

use crate::config::DriverConfig;
use crate::correlation::{Correlation, EngineState, PendingSlot, Response};
use crate::dispatch::IndicationDispatcher;
use crate::error::{DriverError, DriverResult};
use crate::link::{Closer, Link, LinkHalves};

/// Why the link went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    /// Kind of the underlying I/O error.
    pub kind: io::ErrorKind,
    /// Error text.
    pub message: String,
}

impl From<&io::Error> for LinkFailure {
    fn from(err: &io::Error) -> Self {
        LinkFailure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

/// Callback invoked once when the link fails.
pub type DisconnectObserver = Arc<dyn Fn(&LinkFailure) + Send + Sync>;

/// State shared with the reader thread.
struct Shared {
    link_name: String,
    labels: MetricLabels,
    config: DriverConfig,
    slot: PendingSlot,
    dispatcher: IndicationDispatcher,
    closer: Mutex<Option<Closer>>,
    failure: Mutex<Option<LinkFailure>>,
    disconnect_observers: Mutex<Vec<DisconnectObserver>>,
}

impl Shared {
    /// Close the link if it has a closer. Returns whether one was run.
    fn close_link(&self) -> bool {
        let closer = self.closer.lock().take();
        match closer {
            Some(close) => {
                close();
                true
            }
            None => false,
        }
    }

    /// Transition to `Disconnected` and tell everyone. Idempotent.
    fn fail(&self, err: &io::Error) {
        if !self.slot.leave_running(EngineState::Disconnected) {
            return;
        }
        let failure = LinkFailure::from(err);
        warn!(link = %self.link_name, "link failed: {}", failure);

        let labels = self.labels.to_labels();
        metrics::counter!(metric_defs::LINK_FAILURES.name, &labels).increment(1);
        metrics::gauge!(metric_defs::LINK_UP.name, &labels).set(0.0);

        let observers = {
            let observers = self.disconnect_observers.lock();
            *self.failure.lock() = Some(failure.clone());
            observers.clone()
        };
        self.close_link();

        for observer in observers {
            observer(&failure);
        }
    }

    fn on_decoded(&self, decoded: Decoded<'_>) {
        match decoded {
            Decoded::Frame(frame) => self.on_frame(frame),
            Decoded::Invalid(err) => {
                let reason = match err {
                    FrameError::ChecksumMismatch { .. } => "checksum",
                    FrameError::MissingEndMarker { .. } => "end_marker",
                };
                debug!(link = %self.link_name, "discarded frame: {}", err);
                metrics::counter!(
                    metric_defs::FRAMES_INVALID.name,
                    &self.labels.with(&[("reason", reason.to_string())])
                )
                .increment(1);
            }
        }
    }

    fn on_frame(&self, frame: Frame<'_>) {
        let category = category_name(frame.category);
        let labels = self.labels.with_category(category);
        metrics::counter!(metric_defs::FRAMES_RX.name, &labels).increment(1);

        let message = match Message::parse(frame.category, frame.message) {
            Ok(message) => message,
            Err(err) => {
                debug!(link = %self.link_name, category, "dropping frame: {}", err);
                metrics::counter!(metric_defs::RESPONSES_UNMATCHED.name, &labels).increment(1);
                return;
            }
        };

        if self.slot.complete(&message) {
            trace!(
                link = %self.link_name,
                category,
                sub_kind = message.sub_kind(),
                seq = message.sequence(),
                "matched response"
            );
            return;
        }

        if message.header().is_request_or_indication() {
            if self.dispatcher.dispatch(&message) {
                metrics::counter!(metric_defs::INDICATIONS_DISPATCHED.name, &labels).increment(1);
            } else {
                trace!(
                    link = %self.link_name,
                    category,
                    sub_kind = message.sub_kind(),
                    "no observer for indication"
                );
                metrics::counter!(metric_defs::INDICATIONS_UNROUTED.name, &labels).increment(1);
            }
        } else {
            debug!(
                link = %self.link_name,
                category,
                sub_kind = message.sub_kind(),
                seq = message.sequence(),
                "dropping unmatched response"
            );
            metrics::counter!(metric_defs::RESPONSES_UNMATCHED.name, &labels).increment(1);
        }
    }
}

fn run_reader(shared: Arc<Shared>, mut reader: Box<dyn Read + Send>) {
    let mut decoder =
        FrameDecoder::with_buffer(ByteBuffer::with_capacity(shared.config.buffer_capacity));
    let mut chunk = vec![0u8; shared.config.read_chunk_size];
    let labels = shared.labels.to_labels();

    let outcome = loop {
        if shared.slot.state() != EngineState::Running {
            break Ok(());
        }
        match reader.read(&mut chunk) {
            Ok(0) => {
                break Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "link closed by peer",
                ))
            }
            Ok(n) => {
                // `stop()` may have run while the read was blocked.
                if shared.slot.state() != EngineState::Running {
                    break Ok(());
                }
                metrics::counter!(metric_defs::LINK_RX_BYTES.name, &labels).increment(n as u64);
                decoder.feed(&chunk[..n], |decoded| shared.on_decoded(decoded));
            }
            // Serial ports configured with a read timeout report it this way.
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                ) =>
            {
                continue
            }
            Err(err) => break Err(err),
        }
    };

    match outcome {
        Err(err) if shared.slot.state() == EngineState::Running => shared.fail(&err),
        _ => debug!(link = %shared.link_name, "reader loop exited"),
    }
}

/// Owned by the request path; the lock around it serializes requests.
struct RequestPath {
    writer: Box<dyn Write + Send>,
    send: ByteBuffer,
    frame: ByteBuffer,
    sequence: u8,
}

impl RequestPath {
    fn next_sequence(&mut self) -> u8 {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }
}

/// A running driver bound to one link.
///
/// All methods take `&self`; share the engine across threads with an
/// [`Arc`]. Dropping it stops the reader loop.
pub struct Engine {
    shared: Arc<Shared>,
    request_path: Mutex<RequestPath>,
    reader: Mutex<Option<JoinHandle<()>>>,
    interruptible: bool,
}

impl Engine {
    /// Split `link` and start the reader thread.
    pub fn start<L: Link>(link: L, config: DriverConfig) -> DriverResult<Engine> {
        config.validate()?;
        let link_name = link.name();
        let LinkHalves {
            reader,
            writer,
            closer,
        } = link.split()?;
        let interruptible = closer.is_some();

        let labels = MetricLabels::new(link_name.clone());
        let shared = Arc::new(Shared {
            link_name: link_name.clone(),
            labels,
            config: config.clone(),
            slot: PendingSlot::new(),
            dispatcher: IndicationDispatcher::new(),
            closer: Mutex::new(closer),
            failure: Mutex::new(None),
            disconnect_observers: Mutex::new(Vec::new()),
        });

        let reader_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("snic-reader".to_string())
            .spawn(move || run_reader(reader_shared, reader))?;

        metrics::gauge!(metric_defs::LINK_UP.name, &shared.labels.to_labels()).set(1.0);
        info!(link = %link_name, interruptible, "engine started");

        Ok(Engine {
            shared,
            request_path: Mutex::new(RequestPath {
                writer,
                send: ByteBuffer::with_capacity(config.buffer_capacity),
                frame: ByteBuffer::with_capacity(config.buffer_capacity),
                sequence: 0,
            }),
            reader: Mutex::new(Some(handle)),
            interruptible,
        })
    }

    /// Name of the underlying link.
    pub fn link_name(&self) -> &str {
        &self.shared.link_name
    }

    /// Configuration the engine was started with.
    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.slot.state()
    }

    /// Whether requests are still accepted.
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// The failure that disconnected the link, if any.
    pub fn failure(&self) -> Option<LinkFailure> {
        self.shared.failure.lock().clone()
    }

    /// Call `observer` when the link fails.
    ///
    /// Runs on whichever thread detected the failure. If the link has
    /// already failed, `observer` is called immediately.
    pub fn on_disconnect<F>(&self, observer: F)
    where
        F: Fn(&LinkFailure) + Send + Sync + 'static,
    {
        let failure = {
            let mut observers = self.shared.disconnect_observers.lock();
            let failure = self.shared.failure.lock().clone();
            if failure.is_none() {
                observers.push(Arc::new(observer));
                return;
            }
            failure
        };
        if let Some(failure) = failure {
            observer(&failure);
        }
    }

    /// Route indications with `(category, sub_kind)` to `observer`,
    /// replacing any earlier registration.
    ///
    /// Observers run on the reader thread. They must not block and must
    /// not call [`request`](Self::request).
    pub fn register_indication<F>(&self, category: u8, sub_kind: u8, observer: F)
    where
        F: Fn(&Message<'_>) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(category, sub_kind, observer);
    }

    /// Route a catalogued indication kind to `observer`.
    pub fn register_kind<F>(&self, kind: IndicationKind, observer: F)
    where
        F: Fn(&Message<'_>) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register_kind(kind, observer);
    }

    /// Stop routing `(category, sub_kind)`.
    pub fn unregister_indication(&self, category: u8, sub_kind: u8) -> bool {
        self.shared.dispatcher.unregister(category, sub_kind)
    }

    /// Send a request and block until its response arrives.
    ///
    /// `write_content` appends the command-specific bytes after the
    /// two-byte header. The response must echo `category`, `sub_kind`
    /// and the sequence number assigned here; anything else is ignored.
    pub fn request<F>(
        &self,
        category: u8,
        sub_kind: u8,
        write_content: F,
        timeout: Duration,
    ) -> DriverResult<Response>
    where
        F: FnOnce(&mut ByteBuffer),
    {
        let mut guard = self.request_path.lock();
        let path = &mut *guard;

        let sequence = path.next_sequence();
        let expected = Correlation::new(category, sub_kind, sequence);
        write_request_header(&mut path.send, expected.sub_kind, sequence);
        write_content(&mut path.send);
        encode_frame(expected.category, path.send.as_slice(), false, &mut path.frame)?;

        // Arm before writing; the module can answer before write_all returns.
        self.shared.slot.arm(expected)?;

        let category_label = category_name(expected.category);
        let labels = self.shared.labels.with_category(category_label);
        let written = path
            .writer
            .write_all(path.frame.as_slice())
            .and_then(|()| path.writer.flush());
        if let Err(err) = written {
            self.shared.slot.disarm();
            self.shared.fail(&err);
            return Err(DriverError::Io(err));
        }

        metrics::counter!(metric_defs::REQUESTS.name, &labels).increment(1);
        metrics::counter!(metric_defs::FRAMES_TX.name, &labels).increment(1);
        metrics::counter!(metric_defs::LINK_TX_BYTES.name, &self.shared.labels.to_labels())
            .increment(path.frame.position() as u64);
        debug!(
            link = %self.shared.link_name,
            category = category_label,
            sub_kind = expected.sub_kind,
            seq = sequence,
            len = path.send.position(),
            "request sent"
        );

        let started = Instant::now();
        match self.shared.slot.wait(expected, timeout) {
            Ok(response) => {
                metrics::histogram!(metric_defs::REQUEST_LATENCY.name, &labels)
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                Ok(response)
            }
            Err(err) => {
                if err.is_timeout() {
                    warn!(link = %self.shared.link_name, "{}", err);
                    metrics::counter!(metric_defs::REQUESTS_TIMED_OUT.name, &labels).increment(1);
                }
                Err(err)
            }
        }
    }

    /// [`request`](Self::request) with the configured timeout.
    pub fn request_default<F>(&self, category: u8, sub_kind: u8, write_content: F) -> DriverResult<Response>
    where
        F: FnOnce(&mut ByteBuffer),
    {
        let timeout = self.shared.config.request_timeout();
        self.request(category, sub_kind, write_content, timeout)
    }

    /// Stop the reader loop and close the link.
    ///
    /// A request blocked in another thread returns
    /// [`DriverError::NotRunning`]. Waits for the reader thread when the
    /// link can be interrupted; otherwise the thread is left to exit on
    /// its next read.
    pub fn stop(&self) {
        if self.shared.slot.leave_running(EngineState::Stopped) {
            info!(link = %self.shared.link_name, "engine stopped");
            metrics::gauge!(metric_defs::LINK_UP.name, &self.shared.labels.to_labels()).set(0.0);
        }
        self.shared.close_link();

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            let on_reader_thread = handle.thread().id() == thread::current().id();
            if !on_reader_thread && (self.interruptible || handle.is_finished()) {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("link", &self.shared.link_name)
            .field("state", &self.state())
            .finish()
    }
}
