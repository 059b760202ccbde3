//! Byte transports the engine can run over.
//!
//! A [`Link`] is split once into a reader half (owned by the reader
//! thread) and a writer half (owned by the request path). An optional
//! closer unblocks a reader that is parked in `read`; links without one
//! are left to end on their own when the engine stops.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};

/// Closes a link from outside the reader thread.
pub type Closer = Box<dyn FnOnce() + Send>;

/// The two halves of a split link.
pub struct LinkHalves {
    /// Read side, moved into the reader thread.
    pub reader: Box<dyn Read + Send>,
    /// Write side, used by requests.
    pub writer: Box<dyn Write + Send>,
    /// Unblocks the reader. `None` if the link can't be interrupted.
    pub closer: Option<Closer>,
}

/// A bidirectional byte stream to a module.
pub trait Link: Send + 'static {
    /// Name used in logs and metric labels.
    fn name(&self) -> String;

    /// Split into independently owned halves.
    fn split(self) -> io::Result<LinkHalves>;
}

impl Link for TcpStream {
    fn name(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp".to_string())
    }

    fn split(self) -> io::Result<LinkHalves> {
        self.set_nodelay(true)?;
        let reader = self.try_clone()?;
        let shutdown = self.try_clone()?;
        Ok(LinkHalves {
            reader: Box::new(reader),
            writer: Box::new(self),
            closer: Some(Box::new(move || {
                let _ = shutdown.shutdown(Shutdown::Both);
            })),
        })
    }
}

/// Adapts any reader/writer pair, such as a serial port and its clone.
pub struct StreamLink<R, W> {
    name: String,
    reader: R,
    writer: W,
    closer: Option<Closer>,
}

impl<R, W> StreamLink<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Wrap a reader and writer.
    pub fn new(name: impl Into<String>, reader: R, writer: W) -> Self {
        StreamLink {
            name: name.into(),
            reader,
            writer,
            closer: None,
        }
    }

    /// Attach a closer that makes a blocked `read` return.
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }
}

impl<R, W> Link for StreamLink<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn split(self) -> io::Result<LinkHalves> {
        Ok(LinkHalves {
            reader: Box::new(self.reader),
            writer: Box::new(self.writer),
            closer: self.closer,
        })
    }
}

/// Create an in-memory link and the device end that talks to it.
///
/// Bytes written by the engine arrive at [`DevicePort::recv`], and
/// bytes passed to [`DevicePort::send`] are read by the engine.
/// Dropping the `DevicePort` looks like a cable pull to the engine.
pub fn channel_link(name: impl Into<String>) -> (ChannelLink, DevicePort) {
    let (to_host_tx, to_host_rx) = crossbeam_channel::unbounded::<Vec<u8>>();
    let (to_device_tx, to_device_rx) = crossbeam_channel::unbounded::<Vec<u8>>();

    let link = ChannelLink {
        name: name.into(),
        rx: to_host_rx,
        tx: to_device_tx,
    };
    let device = DevicePort {
        tx: to_host_tx,
        rx: to_device_rx,
    };
    (link, device)
}

/// Host side of an in-memory link.
pub struct ChannelLink {
    name: String,
    rx: Receiver<Vec<u8>>,
    tx: Sender<Vec<u8>>,
}

impl Link for ChannelLink {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn split(self) -> io::Result<LinkHalves> {
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(0);
        Ok(LinkHalves {
            reader: Box::new(ChannelReader {
                rx: self.rx,
                close: close_rx,
                pending: Vec::new(),
                offset: 0,
            }),
            writer: Box::new(ChannelWriter { tx: self.tx }),
            closer: Some(Box::new(move || drop(close_tx))),
        })
    }
}

struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    close: Receiver<()>,
    pending: Vec<u8>,
    offset: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.offset >= self.pending.len() {
            select! {
                recv(self.rx) -> chunk => match chunk {
                    Ok(chunk) => {
                        self.pending = chunk;
                        self.offset = 0;
                    }
                    // Device end dropped.
                    Err(_) => return Ok(0),
                },
                recv(self.close) -> _ => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "link closed"));
                }
            }
        }
        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

struct ChannelWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "device end dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Device side of an in-memory link.
pub struct DevicePort {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl DevicePort {
    /// Send bytes to the host.
    pub fn send(&self, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "host end dropped"))
    }

    /// Next chunk written by the host, waiting up to `timeout`.
    ///
    /// Returns `None` on timeout or once the host end is gone.
    pub fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next chunk written by the host, if one is queued.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_link_bidirectional() {
        let (link, device) = channel_link("test");
        assert_eq!(link.name(), "test");
        let LinkHalves {
            mut reader,
            mut writer,
            closer,
        } = link.split().unwrap();
        assert!(closer.is_some());

        writer.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(device.recv(Duration::from_secs(1)), Some(vec![1, 2, 3]));
        assert_eq!(device.try_recv(), None);

        device.send(&[4, 5, 6, 7]).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [4, 5, 6]);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_device_drop_reads_eof() {
        let (link, device) = channel_link("test");
        let mut halves = link.split().unwrap();
        drop(device);

        let mut buf = [0u8; 8];
        assert_eq!(halves.reader.read(&mut buf).unwrap(), 0);
        let err = halves.writer.write_all(&[1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_closer_unblocks_reader() {
        let (link, _device) = channel_link("test");
        let LinkHalves {
            mut reader, closer, ..
        } = link.split().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.read(&mut buf)
        });
        std::thread::sleep(Duration::from_millis(20));
        (closer.unwrap())();

        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn test_stream_link() {
        let link = StreamLink::new("script", io::Cursor::new(vec![9u8, 8]), io::sink());
        assert_eq!(link.name(), "script");
        let mut halves = link.split().unwrap();
        assert!(halves.closer.is_none());

        let mut buf = [0u8; 4];
        assert_eq!(halves.reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[9, 8]);
        assert_eq!(halves.reader.read(&mut buf).unwrap(), 0);
    }
}
