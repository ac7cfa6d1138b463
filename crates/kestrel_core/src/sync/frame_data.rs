//! # Double-Buffered Frame Data
//!
//! Producers write into the extraction half while the consumer reads the
//! render half (last frame's data). `end_frame` swaps the halves.
//!
//! ```text
//! Frame N:
//!   extraction -> buffer A      (draw calls land here)
//!   render     -> buffer B      (frame N-1, being consumed)
//!
//! end_frame():
//!   extraction -> buffer B      (reset before reuse)
//!   render     -> buffer A
//! ```
//!
//! Both halves sit behind one coarse lock. Every accessor holds it only for
//! the duration of its closure.

use parking_lot::Mutex;

struct FrameDataState<T> {
    buffers: [T; 2],
    extraction_index: usize,
    frame_count: u64,
}

/// Two copies of `T` flipped once per frame.
pub struct FrameDataBuffer<T> {
    state: Mutex<FrameDataState<T>>,
}

impl<T: Default> FrameDataBuffer<T> {
    /// Creates a buffer with both halves defaulted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrameDataState {
                buffers: [T::default(), T::default()],
                extraction_index: 0,
                frame_count: 0,
            }),
        }
    }
}

impl<T: Default> Default for FrameDataBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameDataBuffer<T> {
    /// Index of the half producers write to.
    #[inline]
    #[must_use]
    pub fn extraction_index(&self) -> usize {
        self.state.lock().extraction_index
    }

    /// Index of the half the consumer reads. Always the other half.
    #[inline]
    #[must_use]
    pub fn render_index(&self) -> usize {
        self.state.lock().extraction_index ^ 1
    }

    /// Number of completed `end_frame` calls.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.state.lock().frame_count
    }

    /// Runs `f` on the extraction half.
    pub fn with_extraction<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.lock();
        let index = state.extraction_index;
        f(&mut state.buffers[index])
    }

    /// Runs `f` on the render half.
    pub fn with_render<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.lock();
        let index = state.extraction_index ^ 1;
        f(&mut state.buffers[index])
    }

    /// Swaps the halves, then runs `reset` on the new extraction half
    /// (the data the consumer just finished with).
    pub fn end_frame_with(&self, reset: impl FnOnce(&mut T)) {
        let mut state = self.state.lock();
        state.extraction_index ^= 1;
        state.frame_count += 1;
        let index = state.extraction_index;
        reset(&mut state.buffers[index]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halves_are_opposite() {
        let buffer: FrameDataBuffer<Vec<u32>> = FrameDataBuffer::new();
        assert_eq!(buffer.extraction_index(), 0);
        assert_eq!(buffer.render_index(), 1);

        buffer.end_frame_with(Vec::clear);
        assert_eq!(buffer.extraction_index(), 1);
        assert_eq!(buffer.render_index(), 0);
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn test_extracted_data_renders_next_frame() {
        let buffer: FrameDataBuffer<Vec<u32>> = FrameDataBuffer::new();
        buffer.with_extraction(|data| data.push(7));
        assert!(buffer.with_render(|data| data.is_empty()));

        buffer.end_frame_with(Vec::clear);
        assert_eq!(buffer.with_render(|data| data.clone()), vec![7]);
        assert!(buffer.with_extraction(|data| data.is_empty()));
    }

    #[test]
    fn test_stale_half_is_reset() {
        let buffer: FrameDataBuffer<Vec<u32>> = FrameDataBuffer::new();
        buffer.with_extraction(|data| data.push(1));
        buffer.end_frame_with(Vec::clear);
        buffer.with_extraction(|data| data.push(2));
        buffer.end_frame_with(Vec::clear);

        // Frame 0's data was consumed and must not leak into frame 2.
        assert!(buffer.with_extraction(|data| data.is_empty()));
        assert_eq!(buffer.with_render(|data| data.clone()), vec![2]);
    }

    #[test]
    fn test_shared_across_threads() {
        let buffer: std::sync::Arc<FrameDataBuffer<Vec<u32>>> =
            std::sync::Arc::new(FrameDataBuffer::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let buffer = std::sync::Arc::clone(&buffer);
                std::thread::spawn(move || buffer.with_extraction(|data| data.push(i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.with_extraction(|data| data.len()), 4);
    }
}
