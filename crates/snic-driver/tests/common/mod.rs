//! A scripted module on the far end of an in-memory link.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use snic_driver::{channel_link, ChannelLink, DevicePort};
use snic_protocol::{encode_frame_to_vec, Decoded, FrameDecoder};

/// A request as seen by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    pub category: u8,
    pub sub_kind: u8,
    pub sequence: u8,
    pub content: Vec<u8>,
}

pub struct FakeDevice {
    port: DevicePort,
    decoder: FrameDecoder,
    requests: VecDeque<ReceivedRequest>,
}

impl FakeDevice {
    pub fn new(port: DevicePort) -> Self {
        FakeDevice {
            port,
            decoder: FrameDecoder::new(),
            requests: VecDeque::new(),
        }
    }

    /// An in-memory link with a fake module on the other end.
    pub fn pair(name: &str) -> (ChannelLink, FakeDevice) {
        let (link, port) = channel_link(name);
        (link, FakeDevice::new(port))
    }

    /// Next request written by the host.
    pub fn next_request(&mut self, timeout: Duration) -> Option<ReceivedRequest> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(request) = self.requests.pop_front() {
                return Some(request);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let chunk = self.port.recv(remaining)?;
            let requests = &mut self.requests;
            self.decoder.feed(&chunk, |decoded| {
                if let Decoded::Frame(frame) = decoded {
                    requests.push_back(ReceivedRequest {
                        category: frame.category,
                        sub_kind: frame.message[0] & 0x7F,
                        sequence: frame.message[1],
                        content: frame.message[2..].to_vec(),
                    });
                }
            });
        }
    }

    /// Raw bytes written by the host, without decoding.
    pub fn next_raw(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.port.recv(timeout)
    }

    pub fn respond(&self, category: u8, sub_kind: u8, sequence: u8, content: &[u8]) {
        self.send_raw(&response_frame(category, sub_kind, sequence, content));
    }

    pub fn indicate(&self, category: u8, sub_kind: u8, content: &[u8]) {
        self.send_raw(&indication_frame(category, sub_kind, 0, content));
    }

    pub fn send_raw(&self, bytes: &[u8]) {
        self.port.send(bytes).expect("host end dropped");
    }

    /// Answer every request with `reply(request)` until the host goes quiet.
    pub fn spawn_responder<F>(mut self, reply: F) -> JoinHandle<usize>
    where
        F: Fn(&ReceivedRequest) -> Vec<u8> + Send + 'static,
    {
        thread::spawn(move || {
            let mut answered = 0;
            while let Some(request) = self.next_request(Duration::from_secs(2)) {
                let content = reply(&request);
                self.respond(request.category, request.sub_kind, request.sequence, &content);
                answered += 1;
            }
            answered
        })
    }
}

pub fn response_frame(category: u8, sub_kind: u8, sequence: u8, content: &[u8]) -> Vec<u8> {
    let mut message = vec![0x80 | sub_kind, sequence];
    message.extend_from_slice(content);
    encode_frame_to_vec(category, &message, false).unwrap()
}

pub fn indication_frame(category: u8, sub_kind: u8, sequence: u8, content: &[u8]) -> Vec<u8> {
    let mut message = vec![sub_kind & 0x7F, sequence];
    message.extend_from_slice(content);
    encode_frame_to_vec(category, &message, false).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
