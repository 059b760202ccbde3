//! Matching responses to the one outstanding request.

use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use snic_protocol::{Message, MessageHeader, MESSAGE_HEADER_LEN};

use crate::error::{DriverError, DriverResult};

/// Lifecycle of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// The reader loop is running and requests are accepted.
    Running,
    /// [`Engine::stop`](crate::Engine::stop) was called.
    Stopped,
    /// The link failed. Terminal.
    Disconnected,
}

impl EngineState {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
            EngineState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (category, sub-kind, sequence) triple a response must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Correlation {
    /// Command category (7 bits).
    pub category: u8,
    /// Sub-kind (7 bits).
    pub sub_kind: u8,
    /// Sequence number.
    pub sequence: u8,
}

impl Correlation {
    /// Correlation key for a request.
    pub fn new(category: u8, sub_kind: u8, sequence: u8) -> Self {
        Correlation {
            category: category & 0x7F,
            sub_kind: sub_kind & 0x7F,
            sequence,
        }
    }

    /// Whether `message` answers this request.
    ///
    /// Only the triple is compared. The response flag is not consulted,
    /// so a frame with the flag clear still completes a matching request.
    pub fn matches(&self, message: &Message<'_>) -> bool {
        message.category() & 0x7F == self.category
            && message.sub_kind() == self.sub_kind
            && message.sequence() == self.sequence
    }
}

/// A matched response, copied out of the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    category: u8,
    header: MessageHeader,
    bytes: Bytes,
}

impl Response {
    /// Copy a received message.
    pub fn from_message(message: &Message<'_>) -> Self {
        Response {
            category: message.category(),
            header: message.header(),
            bytes: Bytes::copy_from_slice(message.as_bytes()),
        }
    }

    /// Command category.
    pub fn category(&self) -> u8 {
        self.category
    }

    /// Parsed header.
    pub fn header(&self) -> MessageHeader {
        self.header
    }

    /// Sub-kind identifier.
    pub fn sub_kind(&self) -> u8 {
        self.header.sub_kind
    }

    /// Sequence number echoed by the module.
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Command-specific bytes after the header.
    pub fn content(&self) -> &[u8] {
        &self.bytes[MESSAGE_HEADER_LEN..]
    }

    /// All message bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the raw message bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

struct SlotState {
    state: EngineState,
    pending: Option<Correlation>,
    response: Option<Response>,
}

/// Single-slot rendezvous between a requester and the reader thread.
///
/// At most one request is armed at a time. The reader completes it with
/// [`complete`](Self::complete); the requester blocks in
/// [`wait`](Self::wait) until then, until its deadline, or until the
/// engine leaves [`EngineState::Running`].
pub(crate) struct PendingSlot {
    inner: Mutex<SlotState>,
    ready: Condvar,
}

impl PendingSlot {
    pub(crate) fn new() -> Self {
        PendingSlot {
            inner: Mutex::new(SlotState {
                state: EngineState::Running,
                pending: None,
                response: None,
            }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Move out of `Running`. Returns false if already stopped or
    /// disconnected, which leaves the earlier state in place.
    pub(crate) fn leave_running(&self, next: EngineState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != EngineState::Running {
            return false;
        }
        inner.state = next;
        self.ready.notify_all();
        true
    }

    /// Record the request about to be written.
    pub(crate) fn arm(&self, expected: Correlation) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            EngineState::Running => {}
            EngineState::Stopped => return Err(DriverError::NotRunning),
            EngineState::Disconnected => return Err(DriverError::Disconnected),
        }
        inner.pending = Some(expected);
        inner.response = None;
        Ok(())
    }

    /// Forget the armed request without waiting for it.
    pub(crate) fn disarm(&self) {
        let mut inner = self.inner.lock();
        inner.pending = None;
        inner.response = None;
    }

    /// Offer a received message. Returns true if it answered the armed
    /// request, in which case the waiter has been woken.
    pub(crate) fn complete(&self, message: &Message<'_>) -> bool {
        let mut inner = self.inner.lock();
        match inner.pending {
            Some(expected) if expected.matches(message) => {
                inner.pending = None;
                inner.response = Some(Response::from_message(message));
                self.ready.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Block until the armed request is answered or `timeout` elapses.
    ///
    /// The slot is always disarmed on return, so a response arriving
    /// after a timeout is treated as unmatched.
    pub(crate) fn wait(&self, expected: Correlation, timeout: Duration) -> DriverResult<Response> {
        // `None` when the timeout is too large to represent; wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        loop {
            if let Some(response) = inner.response.take() {
                inner.pending = None;
                return Ok(response);
            }
            match inner.state {
                EngineState::Running => {}
                EngineState::Stopped => {
                    inner.pending = None;
                    return Err(DriverError::NotRunning);
                }
                EngineState::Disconnected => {
                    inner.pending = None;
                    return Err(DriverError::Disconnected);
                }
            }
            let Some(deadline) = deadline else {
                self.ready.wait(&mut inner);
                continue;
            };
            if self.ready.wait_until(&mut inner, deadline).timed_out() {
                if let Some(response) = inner.response.take() {
                    inner.pending = None;
                    return Ok(response);
                }
                inner.pending = None;
                return Err(DriverError::TimedOut {
                    category: expected.category,
                    sub_kind: expected.sub_kind,
                    sequence: expected.sequence,
                    timeout,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn response_bytes(sub_kind: u8, sequence: u8, content: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x80 | sub_kind, sequence];
        bytes.extend_from_slice(content);
        bytes
    }

    #[test]
    fn test_correlation_requires_all_three_fields() {
        let expected = Correlation::new(0x01, 0x08, 5);
        let good = response_bytes(0x08, 5, b"x");
        assert!(expected.matches(&Message::parse(0x01, &good).unwrap()));

        let wrong_seq = response_bytes(0x08, 6, b"x");
        assert!(!expected.matches(&Message::parse(0x01, &wrong_seq).unwrap()));

        let wrong_kind = response_bytes(0x09, 5, b"x");
        assert!(!expected.matches(&Message::parse(0x01, &wrong_kind).unwrap()));

        assert!(!expected.matches(&Message::parse(0x50, &good).unwrap()));

        // Same triple with the response flag clear still answers.
        let unflagged = [0x08, 5];
        assert!(expected.matches(&Message::parse(0x01, &unflagged).unwrap()));
    }

    #[test]
    fn test_response_accessors() {
        let bytes = response_bytes(0x08, 0, b"1.2.3\0");
        let response = Response::from_message(&Message::parse(0x01, &bytes).unwrap());
        assert_eq!(response.category(), 0x01);
        assert_eq!(response.sub_kind(), 0x08);
        assert_eq!(response.sequence(), 0);
        assert!(!response.header().is_request_or_indication());
        assert_eq!(response.content(), b"1.2.3\0");
        assert_eq!(response.as_bytes(), bytes.as_slice());
        assert_eq!(response.into_bytes().len(), 8);
    }

    #[test]
    fn test_complete_wakes_waiter() {
        let slot = Arc::new(PendingSlot::new());
        let expected = Correlation::new(0x01, 0x08, 3);
        slot.arm(expected).unwrap();

        let reader = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                let bytes = response_bytes(0x08, 3, &[0xAA]);
                slot.complete(&Message::parse(0x01, &bytes).unwrap())
            })
        };

        let response = slot.wait(expected, Duration::from_secs(5)).unwrap();
        assert_eq!(response.content(), &[0xAA]);
        assert!(reader.join().unwrap());
    }

    #[test]
    fn test_timeout_disarms() {
        let slot = PendingSlot::new();
        let expected = Correlation::new(0x01, 0x08, 3);
        slot.arm(expected).unwrap();

        let err = slot.wait(expected, Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());

        // Late arrival is no longer claimed.
        let bytes = response_bytes(0x08, 3, &[]);
        assert!(!slot.complete(&Message::parse(0x01, &bytes).unwrap()));
    }

    #[test]
    fn test_unbounded_timeout_waits_for_response() {
        let slot = Arc::new(PendingSlot::new());
        let expected = Correlation::new(0x01, 0x08, 7);
        slot.arm(expected).unwrap();

        let reader = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                let bytes = response_bytes(0x08, 7, b"ok");
                slot.complete(&Message::parse(0x01, &bytes).unwrap())
            })
        };

        let response = slot.wait(expected, Duration::MAX).unwrap();
        assert_eq!(response.content(), b"ok");
        assert!(reader.join().unwrap());
    }

    #[test]
    fn test_unbounded_timeout_woken_by_stop() {
        let slot = Arc::new(PendingSlot::new());
        let expected = Correlation::new(0x01, 0x08, 7);
        slot.arm(expected).unwrap();

        let stopper = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                slot.leave_running(EngineState::Stopped)
            })
        };

        let err = slot.wait(expected, Duration::MAX).unwrap_err();
        assert!(matches!(err, DriverError::NotRunning));
        assert!(stopper.join().unwrap());
    }

    #[test]
    fn test_unarmed_slot_matches_nothing() {
        let slot = PendingSlot::new();
        let bytes = response_bytes(0x08, 0, &[]);
        assert!(!slot.complete(&Message::parse(0x01, &bytes).unwrap()));
    }

    #[test]
    fn test_leave_running_wakes_waiter() {
        let slot = Arc::new(PendingSlot::new());
        let expected = Correlation::new(0x50, 0x00, 1);
        slot.arm(expected).unwrap();

        let killer = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                slot.leave_running(EngineState::Disconnected)
            })
        };

        let err = slot.wait(expected, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, DriverError::Disconnected));
        assert!(killer.join().unwrap());

        assert!(matches!(slot.arm(expected), Err(DriverError::Disconnected)));
        assert!(!slot.leave_running(EngineState::Stopped));
        assert_eq!(slot.state(), EngineState::Disconnected);
    }

    #[test]
    fn test_stopped_slot_rejects_requests() {
        let slot = PendingSlot::new();
        assert!(slot.leave_running(EngineState::Stopped));
        let err = slot.arm(Correlation::new(1, 8, 0)).unwrap_err();
        assert!(matches!(err, DriverError::NotRunning));
    }
}
