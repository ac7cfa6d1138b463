//! # Synchronization Primitives
//!
//! Hand-off between the simulation thread and the render thread.
//!
//! ## The Problem
//!
//! ```text
//! Thread 1 (Simulation):  WRITE debug geometry for frame N
//! Thread 2 (Render):      READ debug geometry of frame N-1
//! ```
//!
//! ## The Solution: Double Buffering
//!
//! Each side owns one half of a [`FrameDataBuffer`] per frame. The halves
//! flip at the end of the frame, so neither side ever sees a half-written
//! frame.

mod frame_data;

pub use frame_data::FrameDataBuffer;
