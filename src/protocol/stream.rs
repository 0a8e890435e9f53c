//! # Frame Reassembly
//!
//! Serial links deliver an unframed byte stream. The reassembler buffers
//! incoming bytes and cuts them into frames.
//!
//! Once aligned, it consumes fixed 6-byte steps and hands out every window,
//! valid or not, so the decoder sees and counts corrupted frames. After
//! [`RESYNC_AFTER_FAILURES`] consecutive bad windows it drops alignment and
//! slides one byte at a time. Alignment is only regained on two back-to-back
//! frames with valid checksums, which keeps windows straddling two real
//! frames from being accepted.

use bytes::{Buf, BytesMut};

use super::checksum::verify_trailing_checksum;
use super::frame::{FrameBytes, FRAME_LEN};

/// Maximum number of bytes held while waiting for a complete frame
pub const MAX_BUFFERED_BYTES: usize = 256;

/// Consecutive bad windows that make an aligned reassembler resynchronize
pub const RESYNC_AFTER_FAILURES: u8 = 2;

/// Valid back-to-back frames required to lock onto the stream
const LOCK_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Alignment {
    #[default]
    Searching,
    Locked {
        failures: u8,
    },
}

/// Splits a raw byte stream into 6-byte frames.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
    alignment: Alignment,
    skipped: u64,
    resyncs: u64,
}

impl FrameReassembler {
    /// Create an empty, unaligned reassembler
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_BUFFERED_BYTES),
            alignment: Alignment::Searching,
            skipped: 0,
            resyncs: 0,
        }
    }

    /// Append bytes read from the link
    ///
    /// If the buffer would exceed [`MAX_BUFFERED_BYTES`], the oldest bytes
    /// are discarded, counted as skipped, and alignment is dropped.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUFFERED_BYTES {
            let excess = self.buffer.len() - MAX_BUFFERED_BYTES;
            self.buffer.advance(excess);
            self.skipped += excess as u64;
            self.alignment = Alignment::Searching;
        }
    }

    /// Pull the next frame-sized window, if one is buffered
    ///
    /// While locked, every window is returned whether or not its checksum
    /// holds; validation is left to [`decode_frame`](super::decoder::decode_frame).
    /// While searching, nothing is returned until two consecutive valid
    /// frames are buffered.
    pub fn next_frame(&mut self) -> Option<FrameBytes> {
        loop {
            match self.alignment {
                Alignment::Locked { failures } => {
                    if self.buffer.len() < FRAME_LEN {
                        return None;
                    }

                    let frame = self.take_frame();
                    self.alignment = if verify_trailing_checksum(&frame) {
                        Alignment::Locked { failures: 0 }
                    } else if failures + 1 >= RESYNC_AFTER_FAILURES {
                        self.resyncs += 1;
                        Alignment::Searching
                    } else {
                        Alignment::Locked {
                            failures: failures + 1,
                        }
                    };
                    return Some(frame);
                }
                Alignment::Searching => {
                    if !self.search() {
                        return None;
                    }
                    self.alignment = Alignment::Locked { failures: 0 };
                }
            }
        }
    }

    /// Slide until the buffer starts with [`LOCK_FRAMES`] valid frames
    ///
    /// Returns `false` when more bytes are needed to decide.
    fn search(&mut self) -> bool {
        while self.buffer.len() >= FRAME_LEN {
            let valid = self
                .buffer
                .chunks_exact(FRAME_LEN)
                .take(LOCK_FRAMES)
                .take_while(|window| verify_trailing_checksum(window))
                .count();

            if valid == LOCK_FRAMES {
                return true;
            }
            // Every buffered window checks out so far
            if valid > 0 && valid == self.buffer.len() / FRAME_LEN {
                return false;
            }

            self.buffer.advance(1);
            self.skipped += 1;
        }

        false
    }

    fn take_frame(&mut self) -> FrameBytes {
        let chunk = self.buffer.split_to(FRAME_LEN);
        let mut frame = [0u8; FRAME_LEN];
        frame.copy_from_slice(&chunk);
        frame
    }

    /// Whether the reassembler is locked onto frame boundaries
    pub fn is_aligned(&self) -> bool {
        matches!(self.alignment, Alignment::Locked { .. })
    }

    /// Total bytes discarded while resynchronizing
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Times alignment was lost after consecutive bad windows
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered bytes and alignment (used when a link is torn down)
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.alignment = Alignment::Searching;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::protocol::decoder::decode_frame;
    use crate::protocol::encoder::encode_frame;

    fn drain(reassembler: &mut FrameReassembler) -> Vec<FrameBytes> {
        std::iter::from_fn(|| reassembler.next_frame()).collect()
    }

    #[test]
    fn test_waits_for_second_frame_before_locking() {
        let first = encode_frame(1, &[10, 20, 30, 40]);
        let second = encode_frame(2, &[11, 21, 31, 41]);
        let mut reassembler = FrameReassembler::new();

        reassembler.push(&first);
        assert_eq!(reassembler.next_frame(), None);
        assert!(!reassembler.is_aligned());
        assert_eq!(reassembler.buffered(), FRAME_LEN);

        reassembler.push(&second);
        assert_eq!(drain(&mut reassembler), vec![first, second]);
        assert!(reassembler.is_aligned());
        assert_eq!(reassembler.skipped_bytes(), 0);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let first = encode_frame(3, &[1, 2, 3, 4]);
        let second = encode_frame(4, &[5, 6, 7, 8]);
        let mut reassembler = FrameReassembler::new();

        reassembler.push(&first);
        reassembler.push(&second[..2]);
        assert_eq!(reassembler.next_frame(), None);

        reassembler.push(&second[2..]);
        assert_eq!(drain(&mut reassembler), vec![first, second]);

        let third = encode_frame(5, &[9, 9, 9, 9]);
        reassembler.push(&third[..3]);
        assert_eq!(reassembler.next_frame(), None);
        reassembler.push(&third[3..]);
        assert_eq!(reassembler.next_frame(), Some(third));
    }

    #[test]
    fn test_back_to_back_frames() {
        let first = encode_frame(1, &[5, 6, 7, 8]);
        let second = encode_frame(2, &[9, 10, 11, 12]);
        let mut reassembler = FrameReassembler::new();

        reassembler.push(&first);
        reassembler.push(&second);

        assert_eq!(reassembler.next_frame(), Some(first));
        assert_eq!(reassembler.next_frame(), Some(second));
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn test_resync_after_leading_garbage() {
        let first = encode_frame(8, &[100, 110, 120, 130]);
        let second = encode_frame(9, &[1, 1, 1, 1]);
        let mut reassembler = FrameReassembler::new();

        reassembler.push(&[0x01, 0x02]);
        reassembler.push(&first);
        assert_eq!(reassembler.next_frame(), None);

        reassembler.push(&second);
        assert_eq!(drain(&mut reassembler), vec![first, second]);
        assert_eq!(reassembler.skipped_bytes(), 2);
    }

    #[test]
    fn test_corrupted_frame_is_forwarded_not_spliced() {
        // The bad checksum makes the window starting one byte into frame 6
        // XOR-valid: [10, 20, 30, 40, 47, 7].
        let mut corrupted = encode_frame(6, &[10, 20, 30, 40]);
        corrupted[5] = 10 ^ 20 ^ 30 ^ 40 ^ 7;
        let next = encode_frame(7, &[70, 71, 72, 73]);

        let mut reassembler = FrameReassembler::new();
        reassembler.push(&encode_frame(4, &[1, 2, 3, 4]));
        reassembler.push(&encode_frame(5, &[10, 20, 30, 40]));
        reassembler.push(&corrupted);
        reassembler.push(&next);

        let decoded: Vec<_> = drain(&mut reassembler)
            .iter()
            .map(|bytes| decode_frame(bytes))
            .collect();

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].as_ref().map(|f| f.sequence), Ok(4));
        assert_eq!(decoded[1].as_ref().map(|f| f.sequence), Ok(5));
        assert!(matches!(decoded[2], Err(DecodeError::ChecksumMismatch { .. })));
        assert_eq!(decoded[3].as_ref().map(|f| f.sequence), Ok(7));
        assert!(reassembler.is_aligned());
        assert_eq!(reassembler.resyncs(), 0);
    }

    #[test]
    fn test_straddling_window_rejected_while_searching() {
        let mut corrupted = encode_frame(6, &[10, 20, 30, 40]);
        corrupted[5] = 10 ^ 20 ^ 30 ^ 40 ^ 7;
        let seventh = encode_frame(7, &[70, 71, 72, 73]);
        let eighth = encode_frame(8, &[80, 81, 82, 83]);

        let mut reassembler = FrameReassembler::new();
        reassembler.push(&encode_frame(5, &[10, 20, 30, 40]));
        reassembler.push(&corrupted);
        reassembler.push(&seventh);
        reassembler.push(&eighth);

        assert_eq!(drain(&mut reassembler), vec![seventh, eighth]);
        assert_eq!(reassembler.skipped_bytes(), 12);
    }

    #[test]
    fn test_lost_byte_triggers_resync() {
        let mut reassembler = FrameReassembler::new();
        reassembler.push(&encode_frame(1, &[10, 20, 30, 40]));
        reassembler.push(&encode_frame(2, &[100, 110, 120, 130]));
        assert_eq!(drain(&mut reassembler).len(), 2);

        // First byte of frame 3 lost on the wire
        reassembler.push(&encode_frame(3, &[50, 60, 70, 80])[1..]);
        reassembler.push(&encode_frame(4, &[9, 9, 9, 9]));
        reassembler.push(&encode_frame(5, &[1, 2, 3, 4]));
        let sixth = encode_frame(6, &[4, 3, 2, 1]);
        let seventh = encode_frame(7, &[8, 8, 8, 8]);
        reassembler.push(&sixth);
        reassembler.push(&seventh);

        // Two misaligned windows are forwarded, then the search skips the
        // remains of frame 5
        let frames = drain(&mut reassembler);
        assert_eq!(reassembler.resyncs(), 1);
        assert_eq!(frames.len(), 4);
        assert!(frames[..2].iter().all(|f| !verify_trailing_checksum(f)));
        assert_eq!(&frames[2..], &[sixth, seventh]);
        assert_eq!(reassembler.skipped_bytes(), 5);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut reassembler = FrameReassembler::new();
        reassembler.push(&[0x01; MAX_BUFFERED_BYTES + 10]);

        assert_eq!(reassembler.buffered(), MAX_BUFFERED_BYTES);
        assert_eq!(reassembler.skipped_bytes(), 10);
    }

    #[test]
    fn test_clear_drops_partial_frame() {
        let mut reassembler = FrameReassembler::new();
        reassembler.push(&encode_frame(1, &[1, 2, 3, 4]));
        reassembler.push(&encode_frame(2, &[1, 2, 3, 4]));
        assert!(reassembler.next_frame().is_some());
        reassembler.push(&[1, 2, 3]);
        reassembler.clear();

        assert_eq!(reassembler.buffered(), 0);
        assert!(!reassembler.is_aligned());
    }
}
