//! # Debug Draw
//!
//! Immediate-mode debug geometry, collected per world and handed to the
//! renderer one frame later.
//!
//! Every draw call locks the shared buffer only long enough to append its
//! primitives. The renderer copies a world's data out of the render half
//! and uploads it however it likes; this module never touches a device.

use bytemuck::{Pod, Zeroable};
use tracing::trace;

use crate::ecs::MAX_WORLDS;
use crate::sync::FrameDataBuffer;

/// A position or direction.
pub type Vec3 = [f32; 3];

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Linear RGBA color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque red.
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    /// Opaque green.
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    /// Creates a color from its channels.
    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Channels as an array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Channels clamped to `[0, 1]` and quantized to bytes.
    #[must_use]
    pub fn to_linear_ub(self) -> [u8; 4] {
        self.to_array()
            .map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Vertex of a debug line or triangle, as uploaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Linear color, one byte per channel.
    pub color: [u8; 4],
}

/// Instance record of a line box or solid box, as uploaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BoxData {
    /// First three rows of the unit-cube-to-world matrix.
    pub transform: [[f32; 4]; 3],
    /// Linear color.
    pub color: [f32; 4],
}

/// A line segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Line {
    /// First end point.
    pub start: Vec3,
    /// Second end point.
    pub end: Vec3,
}

impl Line {
    /// Creates a segment.
    #[inline]
    #[must_use]
    pub const fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }
}

/// A triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    /// Corners in winding order.
    pub positions: [Vec3; 3],
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    /// Smallest corner.
    pub min: Vec3,
    /// Largest corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a box from its extreme corners.
    #[inline]
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        [0, 1, 2].map(|i| (self.min[i] + self.max[i]) * 0.5)
    }

    /// Half the size along each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        [0, 1, 2].map(|i| (self.max[i] - self.min[i]) * 0.5)
    }

    /// The eight corners. Bit 0 of the index selects max z, bit 1 max y and
    /// bit 2 max x.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        std::array::from_fn(|i| {
            [
                if i & 4 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 1 == 0 { min[2] } else { max[2] },
            ]
        })
    }
}

/// Position, rotation and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation.
    pub position: Vec3,
    /// Row-major rotation matrix.
    pub rotation: [[f32; 3]; 3],
    /// Scale, applied before rotation.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        scale: [1.0; 3],
    };

    /// Pure translation.
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Rotation times scale, row-major.
    fn linear(&self) -> [[f32; 3]; 3] {
        std::array::from_fn(|r| std::array::from_fn(|c| self.rotation[r][c] * self.scale[c]))
    }

    /// Maps a point into world space.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        let m = self.linear();
        std::array::from_fn(|r| {
            m[r][0] * point[0] + m[r][1] * point[1] + m[r][2] * point[2] + self.position[r]
        })
    }

    /// Rows of the matrix that maps the unit cube onto `bounds` under this
    /// transform.
    fn box_rows(&self, bounds: &BoundingBox) -> [[f32; 4]; 3] {
        let m = self.linear();
        let half = bounds.half_extents();
        let center = self.transform_point(bounds.center());
        std::array::from_fn(|r| [m[r][0] * half[0], m[r][1] * half[1], m[r][2] * half[2], center[r]])
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// PER-WORLD DATA
// ============================================================================

/// Everything drawn for one world in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugRenderData {
    /// Two vertices per line.
    pub line_vertices: Vec<Vertex>,
    /// Three vertices per triangle.
    pub triangle_vertices: Vec<Vertex>,
    /// Wireframe box instances.
    pub line_boxes: Vec<BoxData>,
    /// Filled box instances.
    pub solid_boxes: Vec<BoxData>,
}

impl DebugRenderData {
    /// Returns `true` if nothing was drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_vertices.is_empty()
            && self.triangle_vertices.is_empty()
            && self.line_boxes.is_empty()
            && self.solid_boxes.is_empty()
    }

    fn clear(&mut self) {
        self.line_vertices.clear();
        self.triangle_vertices.clear();
        self.line_boxes.clear();
        self.solid_boxes.clear();
    }
}

/// (start, end) corner indices of the twelve box edges.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (2, 0),
    (3, 2),
    (4, 5),
    (5, 7),
    (6, 4),
    (7, 6),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

type PerWorldData = Vec<Option<DebugRenderData>>;

/// `None` for indices no world can have.
fn data_for(worlds: &mut PerWorldData, world_index: u32) -> Option<&mut DebugRenderData> {
    if world_index >= MAX_WORLDS {
        trace!("Ignoring debug geometry for world index {}", world_index);
        return None;
    }
    let index = world_index as usize;
    if index >= worlds.len() {
        worlds.resize_with(index + 1, || None);
    }
    Some(worlds[index].get_or_insert_with(DebugRenderData::default))
}

// ============================================================================
// DEBUG DRAW
// ============================================================================

/// Collector of debug geometry for all worlds.
///
/// # Example
///
/// ```rust,ignore
/// let debug = DebugDraw::new();
/// debug.draw_line_box(world.index(), &bounds, Color::GREEN, &Transform::IDENTITY);
///
/// debug.end_frame();
/// let data = debug.take_render_data(world.index());
/// renderer.upload(bytemuck::cast_slice(&data.line_boxes));
/// ```
#[derive(Default)]
pub struct DebugDraw {
    data: FrameDataBuffer<PerWorldData>,
}

impl DebugDraw {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed frames.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.data.frame_count()
    }

    /// Draws line segments.
    pub fn draw_lines(&self, world_index: u32, lines: &[Line], color: Color) {
        let color = color.to_linear_ub();
        self.data.with_extraction(|worlds| {
            let Some(data) = data_for(worlds, world_index) else {
                return;
            };
            data.line_vertices.reserve(lines.len() * 2);
            for line in lines {
                for position in [line.start, line.end] {
                    data.line_vertices.push(Vertex { position, color });
                }
            }
        });
    }

    /// Draws the edges of `bounds` under `transform`.
    pub fn draw_line_box(
        &self,
        world_index: u32,
        bounds: &BoundingBox,
        color: Color,
        transform: &Transform,
    ) {
        let record = BoxData {
            transform: transform.box_rows(bounds),
            color: color.to_array(),
        };
        self.data.with_extraction(|worlds| {
            if let Some(data) = data_for(worlds, world_index) {
                data.line_boxes.push(record);
            }
        });
    }

    /// Draws only the corners of `bounds`: each edge contributes a stub of
    /// `corner_fraction / 2` of its length from both ends. The fraction is
    /// clamped to `[0, 1]`, so `1.0` draws the full box.
    pub fn draw_line_box_corners(
        &self,
        world_index: u32,
        bounds: &BoundingBox,
        corner_fraction: f32,
        color: Color,
        transform: &Transform,
    ) {
        let fraction = corner_fraction.clamp(0.0, 1.0) * 0.5;
        let corners = bounds.corners().map(|corner| transform.transform_point(corner));

        let mut lines = [Line::default(); 24];
        for (i, &(from, to)) in EDGES.iter().enumerate() {
            let (start, end) = (corners[from], corners[to]);
            let dir: Vec3 = std::array::from_fn(|k| end[k] - start[k]);
            lines[i * 2] = Line::new(start, std::array::from_fn(|k| start[k] + dir[k] * fraction));
            lines[i * 2 + 1] = Line::new(end, std::array::from_fn(|k| end[k] - dir[k] * fraction));
        }

        self.draw_lines(world_index, &lines, color);
    }

    /// Draws `bounds` filled, under `transform`.
    pub fn draw_solid_box(
        &self,
        world_index: u32,
        bounds: &BoundingBox,
        color: Color,
        transform: &Transform,
    ) {
        let record = BoxData {
            transform: transform.box_rows(bounds),
            color: color.to_array(),
        };
        self.data.with_extraction(|worlds| {
            if let Some(data) = data_for(worlds, world_index) {
                data.solid_boxes.push(record);
            }
        });
    }

    /// Draws filled triangles.
    pub fn draw_solid_triangles(&self, world_index: u32, triangles: &[Triangle], color: Color) {
        let color = color.to_linear_ub();
        self.data.with_extraction(|worlds| {
            let Some(data) = data_for(worlds, world_index) else {
                return;
            };
            data.triangle_vertices.reserve(triangles.len() * 3);
            for triangle in triangles {
                for position in triangle.positions {
                    data.triangle_vertices.push(Vertex { position, color });
                }
            }
        });
    }

    /// Finishes extraction for this frame. What was drawn becomes the render
    /// data; last frame's render data is discarded.
    pub fn end_frame(&self) {
        self.data.end_frame_with(|worlds| {
            for data in worlds.iter_mut().flatten() {
                data.clear();
            }
        });
    }

    /// Copy of the render data of one world.
    #[must_use]
    pub fn render_data(&self, world_index: u32) -> DebugRenderData {
        self.data.with_render(|worlds| {
            worlds
                .get(world_index as usize)
                .and_then(Option::as_ref)
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Moves the render data of one world out, leaving it empty.
    #[must_use]
    pub fn take_render_data(&self, world_index: u32) -> DebugRenderData {
        self.data.with_render(|worlds| {
            worlds
                .get_mut(world_index as usize)
                .and_then(Option::as_mut)
                .map(std::mem::take)
                .unwrap_or_default()
        })
    }
}
