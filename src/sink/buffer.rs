//! Bounded byte ring between the capture thread and one device.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Outcome of a [`OutputSink::write`](crate::OutputSink::write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Bytes appended to the sink's buffer.
    pub accepted: usize,
    /// Bytes discarded because the buffer was full.
    pub dropped: usize,
}

impl WriteReport {
    /// Returns `true` if any bytes were discarded.
    pub fn overflowed(&self) -> bool {
        self.dropped > 0
    }
}

/// Producer half, fed from the capture callback.
pub(crate) struct BufferWriter {
    producer: HeapProd<u8>,
    block_align: usize,
    /// Tail of a source frame whose head was discarded.
    skip: usize,
}

impl BufferWriter {
    /// Appends every byte that fits; the rest is discarded.
    ///
    /// Blocks may split a frame across writes. The reader only pops whole
    /// frames, so the free space always ends on a frame boundary. When a
    /// write is cut short, the tail of its last partial frame is skipped at
    /// the start of the next write, keeping the ring aligned to the source.
    pub fn push(&mut self, bytes: &[u8]) -> WriteReport {
        let skip = self.skip.min(bytes.len());
        self.skip -= skip;
        let rest = &bytes[skip..];

        let free = self.producer.vacant_len();
        let accepted = if rest.len() > free {
            let phase = (self.producer.occupied_len() + rest.len()) % self.block_align;
            self.skip = (self.block_align - phase) % self.block_align;
            self.producer.push_slice(&rest[..free])
        } else {
            self.producer.push_slice(rest)
        };

        WriteReport {
            accepted,
            dropped: bytes.len() - accepted,
        }
    }

    /// Bytes currently buffered.
    pub fn occupied(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }
}

/// Consumer half, owned by the device's render callback.
pub(crate) struct BufferReader {
    consumer: HeapCons<u8>,
    block_align: usize,
}

impl BufferReader {
    /// Pops as many whole frames as fit in `out`. Returns bytes written.
    pub fn pop_frames(&mut self, out: &mut [u8]) -> usize {
        let available = self.consumer.occupied_len().min(out.len());
        let whole = available - available % self.block_align;
        self.consumer.pop_slice(&mut out[..whole])
    }

    /// Bytes waiting to be rendered.
    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }
}

/// Creates a ring of `capacity` bytes, rounded down to whole frames.
///
/// Holds at least one frame.
pub(crate) fn sink_buffer(capacity: usize, block_align: usize) -> (BufferWriter, BufferReader) {
    let block_align = block_align.max(1);
    let capacity = (capacity - capacity % block_align).max(block_align);
    let (producer, consumer) = HeapRb::<u8>::new(capacity).split();
    (
        BufferWriter {
            producer,
            block_align,
            skip: 0,
        },
        BufferReader {
            consumer,
            block_align,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_pop_whole_frames() {
        let (mut writer, mut reader) = sink_buffer(64, 8);
        let report = writer.push(&[1u8; 24]);
        assert_eq!(report, WriteReport { accepted: 24, dropped: 0 });
        assert_eq!(writer.occupied(), 24);

        // Room for 2.5 frames; only 2 come out
        let mut out = [0u8; 20];
        assert_eq!(reader.pop_frames(&mut out), 16);
        assert_eq!(reader.available(), 8);
    }

    #[test]
    fn test_overflow_discards_newest() {
        let (mut writer, mut reader) = sink_buffer(32, 4);
        assert_eq!(writer.push(&[1u8; 24]).dropped, 0);

        let report = writer.push(&[2u8; 16]);
        assert_eq!(report, WriteReport { accepted: 8, dropped: 8 });
        assert!(report.overflowed());
        assert_eq!(writer.occupied(), writer.capacity());

        let mut out = [0u8; 32];
        assert_eq!(reader.pop_frames(&mut out), 32);
        assert_eq!(&out[..24], &[1u8; 24]);
        assert_eq!(&out[24..], &[2u8; 8]);
    }

    #[test]
    fn test_frame_split_across_writes() {
        let (mut writer, mut reader) = sink_buffer(64, 8);
        let bytes: Vec<u8> = (0..24).collect();

        // One and a half frames, then the other half and one more
        assert_eq!(writer.push(&bytes[..12]), WriteReport { accepted: 12, dropped: 0 });
        assert_eq!(writer.push(&bytes[12..]), WriteReport { accepted: 12, dropped: 0 });

        let mut out = [0u8; 24];
        assert_eq!(reader.pop_frames(&mut out), 24);
        assert_eq!(out.to_vec(), bytes);
    }

    #[test]
    fn test_overflow_fills_partial_frame() {
        let (mut writer, _reader) = sink_buffer(12, 4);
        assert_eq!(writer.push(&[0u8; 10]).accepted, 10);
        // 2 bytes free complete the open frame
        let report = writer.push(&[0u8; 6]);
        assert_eq!(report, WriteReport { accepted: 2, dropped: 4 });
        assert_eq!(writer.occupied(), 12);
    }

    #[test]
    fn test_overflow_stays_frame_aligned() {
        let (mut writer, mut reader) = sink_buffer(8, 4);
        assert_eq!(writer.push(&[1, 1, 1, 1, 2, 2]).accepted, 6);
        // Completes frame 2; the head of frame 3 is dropped
        assert_eq!(writer.push(&[2, 2, 3, 3]), WriteReport { accepted: 2, dropped: 2 });

        let mut out = [0u8; 8];
        assert_eq!(reader.pop_frames(&mut out), 8);
        assert_eq!(out, [1, 1, 1, 1, 2, 2, 2, 2]);

        // The tail of frame 3 is skipped, frame 4 lands whole
        assert_eq!(writer.push(&[3, 3, 4, 4]), WriteReport { accepted: 2, dropped: 2 });
        assert_eq!(writer.push(&[4, 4, 5, 5]).accepted, 4);
        let mut out = [0u8; 8];
        assert_eq!(reader.pop_frames(&mut out), 4);
        assert_eq!(out[..4], [4, 4, 4, 4]);
    }

    #[test]
    fn test_capacity_rounds_to_frames() {
        let (writer, _reader) = sink_buffer(30, 8);
        assert_eq!(writer.capacity(), 24);
        let (writer, _reader) = sink_buffer(0, 8);
        assert_eq!(writer.capacity(), 8);
    }
}
