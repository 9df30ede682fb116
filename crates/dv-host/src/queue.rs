//! Length-prefixed frame queue
//!
//! Frames are stored back to back in a bounded byte ring, each behind a
//! one-byte length. Capacity is counted in bytes, prefixes included, so a
//! queue sized for the modem's own buffers behaves the same way.

use std::collections::VecDeque;

use dv_protocol::Frame;
use tracing::warn;

use crate::error::QueueError;

/// Bounded FIFO of variable-length frames
#[derive(Debug)]
pub struct FrameQueue {
    name: String,
    capacity: usize,
    bytes: VecDeque<u8>,
}

impl FrameQueue {
    /// Create an empty queue holding at most `capacity` bytes
    pub fn new(capacity: usize, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity,
            bytes: VecDeque::with_capacity(capacity),
        }
    }

    /// Queue name, used in log messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free bytes
    pub fn free_space(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// Whether a frame of `len` bytes (plus its prefix) would fit
    pub fn has_space_for(&self, len: usize) -> bool {
        self.free_space() > len
    }

    /// Whether the queue holds no frames
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append a frame
    ///
    /// Fails without modifying the queue if the frame and its prefix do not
    /// fit.
    pub fn push(&mut self, frame: &Frame) -> Result<(), QueueError> {
        let data = frame.as_bytes();
        let needed = data.len() + 1;

        if needed > self.free_space() {
            warn!("Overflow in the {} ring buffer", self.name);
            return Err(QueueError::Overflow {
                name: self.name.clone(),
                needed,
                free: self.free_space(),
            });
        }

        // MAX_FRAME_LEN fits in the prefix byte
        self.bytes.push_back(data.len() as u8);
        self.bytes.extend(data);
        Ok(())
    }

    /// Remove the oldest frame
    pub fn pop(&mut self) -> Option<Frame> {
        let len = usize::from(self.bytes.pop_front()?);
        let data: Vec<u8> = self.bytes.drain(..len.min(self.bytes.len())).collect();
        Frame::from_bytes(&data).ok()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_protocol::FrameTag;

    fn frame(tag: FrameTag, len: usize) -> Frame {
        Frame::new(tag, &vec![0x5A; len]).unwrap()
    }

    #[test]
    fn test_fifo_order_and_lengths() {
        let mut queue = FrameQueue::new(100, "Test");
        queue.push(&frame(FrameTag::Header, 10)).unwrap();
        queue.push(&frame(FrameTag::Data, 3)).unwrap();
        queue.push(&frame(FrameTag::EndOfTransmission, 0)).unwrap();

        assert_eq!(queue.free_space(), 100 - (12 + 5 + 2));

        let first = queue.pop().unwrap();
        assert_eq!(first.tag(), FrameTag::Header);
        assert_eq!(first.len(), 11);
        assert_eq!(queue.pop().unwrap().len(), 4);
        assert_eq!(queue.pop().unwrap().tag(), FrameTag::EndOfTransmission);
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_leaves_queue_intact() {
        let mut queue = FrameQueue::new(30, "Test");
        queue.push(&frame(FrameTag::Data, 20)).unwrap();

        let err = queue.push(&frame(FrameTag::Data, 20)).unwrap_err();
        assert_eq!(
            err,
            QueueError::Overflow {
                name: "Test".into(),
                needed: 22,
                free: 8
            }
        );

        assert_eq!(queue.pop().unwrap().len(), 21);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_space_check_counts_prefix() {
        let queue = FrameQueue::new(123, "Test");
        assert!(queue.has_space_for(122));
        assert!(!queue.has_space_for(123));
    }
}
