//! Geometry the GUI library hands over every frame.
//!
//! Nothing here outlives a frame: the library rebuilds the lists on each
//! `render` and the renderer consumes them once.

use std::fmt;
use std::num::NonZeroUsize;

use crate::utils::{Position, Rectangle, Size};

/// Opaque texture handle shared with the GUI library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reserved handle for the font atlas. User textures start right above it.
pub const FONT_TEXTURE_ID: TextureId = TextureId(100);

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawVert {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub col: u32, // RGBA8, red in the lowest byte
}

impl DrawVert {
    pub fn new(pos: [f32; 2], uv: [f32; 2], rgba: [u8; 4]) -> Self {
        Self {
            pos,
            uv,
            col: u32::from_le_bytes(rgba),
        }
    }
}

pub type DrawIdx = u16;

/// One batch of indexed triangles sharing a texture and a clip rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCmd {
    /// Clip rectangle as min x, min y, max x, max y in display coordinates.
    pub clip_rect: [f32; 4],
    pub texture_id: TextureId,
    /// Added to every index of this command.
    pub vtx_offset: u32,
    /// First index of this command inside its list's index buffer.
    pub idx_offset: u32,
    pub elem_count: u32,
    /// Host-side callback pointer; rendering it is not supported.
    pub user_callback: Option<NonZeroUsize>,
}

impl DrawCmd {
    pub fn clip_rectangle(&self) -> Rectangle {
        let [x1, y1, x2, y2] = self.clip_rect;
        Rectangle::from_min_max(x1, y1, x2, y2)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub vtx_buffer: Vec<DrawVert>,
    pub idx_buffer: Vec<DrawIdx>,
    pub commands: Vec<DrawCmd>,
}

/// Everything needed to draw one viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawData {
    pub display_pos: Position,
    pub display_size: Size,
    pub framebuffer_scale: [f32; 2],
    pub draw_lists: Vec<DrawList>,
}

impl Default for DrawData {
    fn default() -> Self {
        Self {
            display_pos: Position::default(),
            display_size: Size::default(),
            framebuffer_scale: [1.0, 1.0],
            draw_lists: Vec::new(),
        }
    }
}

impl DrawData {
    pub fn total_vtx_count(&self) -> usize {
        self.draw_lists.iter().map(|l| l.vtx_buffer.len()).sum()
    }

    pub fn total_idx_count(&self) -> usize {
        self.draw_lists.iter().map(|l| l.idx_buffer.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.draw_lists.is_empty()
    }

    /// Size of the target framebuffer in pixels.
    pub fn framebuffer_size(&self) -> Size {
        Size::new(
            self.display_size.width * self.framebuffer_scale[0],
            self.display_size.height * self.framebuffer_scale[1],
        )
    }
}
