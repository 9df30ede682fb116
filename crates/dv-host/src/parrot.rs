//! Parrot (echo) recorder
//!
//! Records a whole transmission and, once the transmission has ended and a
//! short hold-off has passed, plays it back frame by frame. A recording is
//! replayed exactly once.

use std::collections::VecDeque;
use std::time::Duration;

use dv_protocol::Frame;

/// Frames per second of audio the recorder is sized for
const FRAMES_PER_SECOND: u64 = 10;

/// Bounded record-then-replay buffer
#[derive(Debug)]
pub struct ParrotRecorder {
    frames: VecDeque<Frame>,
    capacity: usize,
    hold_off: Duration,
    since_end: Option<Duration>,
}

impl ParrotRecorder {
    /// Create a recorder holding at most `capacity` frames
    pub fn new(capacity: usize, hold_off: Duration) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
            hold_off,
            since_end: None,
        }
    }

    /// Create a recorder large enough for a transmission of `timeout`
    ///
    /// A zero (disabled) timeout sizes the recorder for three minutes.
    pub fn for_timeout(timeout: Duration, hold_off: Duration) -> Self {
        let secs = match timeout.as_secs() {
            0 => 180,
            secs => secs,
        };
        Self::new((secs * FRAMES_PER_SECOND + 1) as usize, hold_off)
    }

    /// Record a frame; returns false if the recorder is full
    pub fn write(&mut self, frame: &Frame) -> bool {
        if self.frames.len() >= self.capacity {
            return false;
        }
        self.frames.push_back(frame.clone());
        true
    }

    /// Mark the end of the recorded transmission and start the hold-off
    pub fn end(&mut self) {
        if !self.frames.is_empty() && self.since_end.is_none() {
            self.since_end = Some(Duration::ZERO);
        }
    }

    /// Advance the hold-off
    pub fn clock(&mut self, elapsed: Duration) {
        if let Some(since) = self.since_end.as_mut() {
            *since = since.saturating_add(elapsed);
        }
    }

    /// Whether a frame is ready for playback
    pub fn has_data(&self) -> bool {
        !self.frames.is_empty() && self.since_end.is_some_and(|since| since >= self.hold_off)
    }

    /// Take the next frame for playback
    ///
    /// Reading the last frame resets the recorder.
    pub fn read(&mut self) -> Option<Frame> {
        if !self.has_data() {
            return None;
        }

        let frame = self.frames.pop_front();
        if self.frames.is_empty() {
            self.since_end = None;
        }
        frame
    }

    /// Number of frames held
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Discard the recording
    pub fn clear(&mut self) {
        self.frames.clear();
        self.since_end = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_protocol::FrameTag;

    fn numbered(n: u8) -> Frame {
        Frame::new(FrameTag::Data, &[n]).unwrap()
    }

    #[test]
    fn test_replay_after_hold_off() {
        let mut parrot = ParrotRecorder::new(10, Duration::from_secs(2));
        for n in 0..3 {
            assert!(parrot.write(&numbered(n)));
        }
        assert!(!parrot.has_data());

        parrot.end();
        parrot.clock(Duration::from_millis(1999));
        assert!(!parrot.has_data());
        assert!(parrot.read().is_none());

        parrot.clock(Duration::from_millis(1));
        let replayed: Vec<u8> = std::iter::from_fn(|| parrot.read())
            .map(|f| f.body()[0])
            .collect();
        assert_eq!(replayed, vec![0, 1, 2]);

        // Replayed once only
        parrot.clock(Duration::from_secs(10));
        assert!(!parrot.has_data());
        assert!(parrot.is_empty());
    }

    #[test]
    fn test_full_recorder_rejects() {
        let mut parrot = ParrotRecorder::new(2, Duration::ZERO);
        assert!(parrot.write(&numbered(0)));
        assert!(parrot.write(&numbered(1)));
        assert!(!parrot.write(&numbered(2)));
        assert_eq!(parrot.len(), 2);
    }

    #[test]
    fn test_zero_hold_off_is_immediate() {
        let mut parrot = ParrotRecorder::new(4, Duration::ZERO);
        parrot.write(&numbered(7));
        parrot.end();
        assert!(parrot.has_data());
        assert_eq!(parrot.read().unwrap().body(), &[7]);
    }

    #[test]
    fn test_end_without_recording_is_ignored() {
        let mut parrot = ParrotRecorder::new(4, Duration::ZERO);
        parrot.end();
        parrot.write(&numbered(1));
        assert!(!parrot.has_data());
    }

    #[test]
    fn test_sized_from_timeout() {
        let parrot = ParrotRecorder::for_timeout(Duration::from_secs(3), Duration::ZERO);
        assert_eq!(parrot.capacity, 31);
    }
}
