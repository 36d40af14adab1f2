//! Audio ring buffer: fixed pre-allocated circular buffer for PCM samples.
//! The capture callback writes; the analyser tick reads the latest window.

/// Fixed-size ring buffer for PCM i16 samples. Pre-allocated, never grows.
pub struct RingBuffer {
    buffer: Box<[i16]>,
    write_pos: usize,
    /// Samples written so far, saturating at capacity.
    filled: usize,
    capacity: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding `capacity` mono samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0i16; capacity].into_boxed_slice(),
            write_pos: 0,
            filled: 0,
            capacity,
        }
    }

    /// Write samples into the ring buffer. Overwrites oldest data if full.
    /// Called from the audio callback: no allocation.
    #[inline]
    pub fn write(&mut self, samples: &[i16]) {
        for &s in samples {
            self.buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
        self.filled = (self.filled + samples.len()).min(self.capacity);
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first.
    /// Slots not yet written are left as silence at the front.
    pub fn peek_last(&self, out: &mut [i16]) {
        let n = out.len().min(self.filled);
        let pad = out.len() - n;
        out[..pad].fill(0);
        let start = (self.write_pos + self.capacity - n) % self.capacity;
        for (i, slot) in out[pad..].iter_mut().enumerate() {
            *slot = self.buffer[(start + i) % self.capacity];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_last_before_full() {
        let mut rb = RingBuffer::new(8);
        rb.write(&[1, 2, 3]);
        let mut out = [9i16; 5];
        rb.peek_last(&mut out);
        assert_eq!(out, [0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_peek_last_after_wrap() {
        let mut rb = RingBuffer::new(4);
        rb.write(&[1, 2, 3, 4, 5, 6]);
        let mut out = [0i16; 3];
        rb.peek_last(&mut out);
        assert_eq!(out, [4, 5, 6]);

        let mut all = [0i16; 6];
        rb.peek_last(&mut all);
        assert_eq!(all, [0, 0, 3, 4, 5, 6]);
    }
}
