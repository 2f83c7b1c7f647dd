use super::protocol::{decode_header, encode_frame, Message, FRAME_HEADER_LEN};
use crate::error::{McError, ProtocolError};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::trace;

/// Framed, blocking message channel over a Unix stream socket.
///
/// Messages can be packed and flushed together to save system calls, and a received
/// message can be pushed back to be returned by the next `receive`.
#[derive(Debug)]
pub struct Channel {
    stream: UnixStream,
    out: Vec<u8>,
    reinjected: VecDeque<Message>,
}

impl Channel {
    pub fn new(stream: UnixStream) -> Self {
        Channel {
            stream,
            out: Vec::new(),
            reinjected: VecDeque::new(),
        }
    }

    /// A connected pair, for the tests and the in-thread app.
    pub fn pair() -> Result<(Channel, Channel), McError> {
        let (a, b) = UnixStream::pair()?;
        Ok((Channel::new(a), Channel::new(b)))
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), McError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Queues `msg` until the next `flush`.
    pub fn pack(&mut self, msg: &Message) -> Result<(), McError> {
        trace!(message = msg.name(), "packing message");
        let frame = encode_frame(msg)?;
        self.out.extend_from_slice(&frame);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), McError> {
        if self.out.is_empty() {
            return Ok(());
        }
        let result = self.stream.write_all(&self.out);
        self.out.clear();
        result.map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => ProtocolError::Closed.into(),
            _ => McError::from(e),
        })
    }

    pub fn send(&mut self, msg: &Message) -> Result<(), McError> {
        self.pack(msg)?;
        self.flush()
    }

    /// Makes `msg` the next message returned by `receive`.
    pub fn reinject(&mut self, msg: Message) {
        self.reinjected.push_front(msg);
    }

    pub fn receive(&mut self) -> Result<Message, McError> {
        if let Some(msg) = self.reinjected.pop_front() {
            return Ok(msg);
        }
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.read_exact(&mut header)?;
        let len = decode_header(header)?;
        let mut payload = vec![0u8; len];
        self.read_exact(&mut payload)?;
        let msg: Message = bincode::deserialize(&payload)?;
        trace!(message = msg.name(), "received message");
        Ok(msg)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), McError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Err(ProtocolError::Closed.into()),
                Ok(0) => {
                    return Err(ProtocolError::Truncated {
                        expected: buf.len(),
                        actual: filled,
                    }
                    .into())
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(McError::Timeout("no answer from the checked program".to_string()))
                }
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(ProtocolError::Closed.into())
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
