//! Bounded accumulation of a relayed response for caching.

use bytes::{Bytes, BytesMut};

/// Collects response bytes up to a limit.
///
/// Once the limit is crossed the buffer is released and the capture is
/// flagged as overflowed; later chunks are ignored.
#[derive(Debug)]
pub struct CaptureBuffer {
    data: BytesMut,
    limit: usize,
    overflowed: bool,
    seen: usize,
}

impl CaptureBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: BytesMut::new(),
            limit,
            overflowed: false,
            seen: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.seen += chunk.len();
        if self.overflowed {
            return;
        }
        if self.data.len() + chunk.len() > self.limit {
            self.overflowed = true;
            self.data = BytesMut::new();
            return;
        }
        self.data.extend_from_slice(chunk);
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Total bytes pushed, including those not retained.
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// The captured response, or None if it overflowed or is empty.
    pub fn into_payload(self) -> Option<Bytes> {
        if self.overflowed || self.data.is_empty() {
            None
        } else {
            Some(self.data.freeze())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_within_limit() {
        let mut capture = CaptureBuffer::new(10);
        capture.push(b"hello");
        capture.push(b"world");

        assert!(!capture.overflowed());
        assert_eq!(capture.seen(), 10);
        assert_eq!(&capture.into_payload().unwrap()[..], b"helloworld");
    }

    #[test]
    fn test_capture_overflow_drops_everything() {
        let mut capture = CaptureBuffer::new(10);
        capture.push(b"hello");
        capture.push(b"world!");
        capture.push(b"x");

        assert!(capture.overflowed());
        assert_eq!(capture.seen(), 12);
        assert!(capture.into_payload().is_none());
    }

    #[test]
    fn test_empty_capture_has_no_payload() {
        let capture = CaptureBuffer::new(10);
        assert!(capture.into_payload().is_none());
    }
}
