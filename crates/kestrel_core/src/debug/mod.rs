//! # Debug Rendering Extraction
//!
//! Lines, triangles and boxes drawn from gameplay code, buffered per world
//! and read by the renderer one frame later. Only the data layout lives
//! here; uploading and drawing belong to the renderer.

mod draw;

pub use draw::{
    BoundingBox, BoxData, Color, DebugDraw, DebugRenderData, Line, Transform, Triangle, Vec3,
    Vertex,
};
