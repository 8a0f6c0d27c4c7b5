/// Default largest single transfer, one USB high-speed bulk packet
pub const DEFAULT_MAX_TRANSFER_UNIT: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {elapsed_ms} ms waiting for the analyser")]
    Timeout { elapsed_ms: u128 },

    #[error("Short write: sent {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Short read: received {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },
}

/// Byte link to the analyser.
///
/// Both directions block until the whole transfer completed or failed;
/// partial transfers are reported as errors, never returned.
pub trait Transport {
    /// Send all of `data`
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive exactly `len` bytes
    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Largest number of bytes moved by one `send` or `receive`.
    ///
    /// Must be at least 2 so a single sample fits in one receive.
    fn max_transfer_unit(&self) -> usize {
        DEFAULT_MAX_TRANSFER_UNIT
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).receive(len)
    }

    fn max_transfer_unit(&self) -> usize {
        (**self).max_transfer_unit()
    }
}

/// Scripted transport for driver tests
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;

    use super::{Transport, TransportError};

    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub sent: Vec<Vec<u8>>,
        pub receive_requests: Vec<usize>,
        replies: VecDeque<Vec<u8>>,
        pub max_transfer_unit: usize,
        /// Fail the send with this index (0-based)
        pub fail_send_at: Option<usize>,
        /// Hand back queued replies even when their length is wrong
        pub pass_short_replies: bool,
    }

    impl MockTransport {
        pub fn new(max_transfer_unit: usize) -> Self {
            Self {
                max_transfer_unit,
                ..Self::default()
            }
        }

        pub fn reply(&mut self, bytes: &[u8]) -> &mut Self {
            self.replies.push_back(bytes.to_vec());
            self
        }

        /// Queue one status byte per state
        pub fn reply_statuses(&mut self, statuses: &[u8]) -> &mut Self {
            for status in statuses {
                self.reply(&[*status]);
            }
            self
        }

        /// All sent bytes, in order
        pub fn sent_bytes(&self) -> Vec<u8> {
            self.sent.concat()
        }

        /// Sends whose first byte is `command`
        pub fn frames_for(&self, command: u8) -> Vec<&Vec<u8>> {
            self.sent.iter().filter(|f| f.first() == Some(&command)).collect()
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
            if self.fail_send_at == Some(self.sent.len()) {
                return Err(TransportError::ShortWrite {
                    expected: data.len(),
                    actual: 0,
                });
            }
            assert!(data.len() <= self.max_transfer_unit.max(1));
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
            self.receive_requests.push(len);
            match self.replies.pop_front() {
                Some(reply) if reply.len() == len || self.pass_short_replies => Ok(reply),
                Some(reply) => Err(TransportError::ShortRead {
                    expected: len,
                    actual: reply.len(),
                }),
                None => Err(TransportError::Timeout { elapsed_ms: 0 }),
            }
        }

        fn max_transfer_unit(&self) -> usize {
            self.max_transfer_unit
        }
    }
}
