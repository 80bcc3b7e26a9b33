//! Turns per-viewport draw data into device-independent draw passes.
//!
//! Geometry of every viewport is concatenated into one vertex and one index
//! stream so the whole frame uploads with a single write per buffer. Each
//! pass keeps its own projection slot in the uniform buffer.

use std::ops::Range;

use crate::draw_data::{DrawData, DrawIdx, DrawVert, TextureId};
use crate::error::{BackendError, Result};
use crate::gui::ViewportId;
use crate::utils::{ortho_projection, Position, ProjectionUniform, Size};
use crate::viewport::WindowKey;

/// Byte stride between projection slots; the minimum uniform offset alignment.
pub const UNIFORM_STRIDE: u64 = 256;

pub trait TextureLookup {
    fn contains_texture(&self, id: TextureId) -> bool;
}

/// One viewport to draw this frame.
pub struct RenderTarget<'a> {
    pub window: WindowKey,
    pub viewport: ViewportId,
    pub draw_data: &'a DrawData,
    pub framebuffer_size: Size,
    /// Secondary viewports clear their own framebuffer inside the pass.
    pub clear: Option<[f32; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    SetTexture(TextureId),
    SetScissor {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub window: WindowKey,
    pub viewport: ViewportId,
    pub framebuffer_size: Size,
    pub projection: [[f32; 4]; 4],
    pub uniform_offset: u32,
    pub clear: Option<[f32; 4]>,
    pub ops: Vec<DrawOp>,
}

impl PassPlan {
    pub fn draw_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::DrawIndexed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePlan {
    pub passes: Vec<PassPlan>,
    pub vertices: Vec<DrawVert>,
    pub indices: Vec<DrawIdx>,
}

impl FramePlan {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data padded to a multiple of 4 bytes.
    pub fn index_bytes(&self) -> Vec<u8> {
        let mut bytes = bytemuck::cast_slice::<DrawIdx, u8>(&self.indices).to_vec();
        bytes.resize(bytes.len().next_multiple_of(4), 0);
        bytes
    }

    /// One projection per pass, each at its `uniform_offset`.
    pub fn uniform_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.passes.len() * UNIFORM_STRIDE as usize];
        for pass in &self.passes {
            let uniform = ProjectionUniform {
                projection: pass.projection,
            };
            let start = pass.uniform_offset as usize;
            let src = bytemuck::bytes_of(&uniform);
            bytes[start..start + src.len()].copy_from_slice(src);
        }
        bytes
    }

    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(PassPlan::draw_count).sum()
    }
}

pub fn plan_frame(targets: &[RenderTarget<'_>], textures: &impl TextureLookup) -> Result<FramePlan> {
    let mut plan = FramePlan::default();

    for (pass_index, target) in targets.iter().enumerate() {
        let draw_data = target.draw_data;
        let projection = if draw_data.display_size.is_empty() {
            IDENTITY_PROJECTION
        } else {
            ortho_projection(draw_data.display_pos, draw_data.display_size)
        };
        let mut pass = PassPlan {
            window: target.window,
            viewport: target.viewport,
            framebuffer_size: target.framebuffer_size,
            projection,
            uniform_offset: (pass_index as u64 * UNIFORM_STRIDE) as u32,
            clear: target.clear,
            ops: Vec::new(),
        };

        let mut bound_texture = None;
        for list in &draw_data.draw_lists {
            let vertex_base = plan.vertices.len() as i32;
            let index_base = plan.indices.len() as u32;
            plan.vertices.extend_from_slice(&list.vtx_buffer);
            plan.indices.extend_from_slice(&list.idx_buffer);

            for cmd in &list.commands {
                if cmd.user_callback.is_some() {
                    return Err(BackendError::UnsupportedCallback);
                }
                if !textures.contains_texture(cmd.texture_id) {
                    return Err(BackendError::UnknownTexture(cmd.texture_id));
                }
                if cmd.elem_count == 0 {
                    continue;
                }
                let Some(scissor) = scissor_rect(
                    cmd.clip_rect,
                    draw_data.display_pos,
                    draw_data.framebuffer_scale,
                    target.framebuffer_size,
                ) else {
                    continue;
                };

                if bound_texture != Some(cmd.texture_id) {
                    pass.ops.push(DrawOp::SetTexture(cmd.texture_id));
                    bound_texture = Some(cmd.texture_id);
                }
                pass.ops.push(scissor);
                let first = index_base + cmd.idx_offset;
                pass.ops.push(DrawOp::DrawIndexed {
                    indices: first..first + cmd.elem_count,
                    base_vertex: vertex_base + cmd.vtx_offset as i32,
                });
            }
        }
        plan.passes.push(pass);
    }

    Ok(plan)
}

/// Used for passes whose display size is empty.
pub const IDENTITY_PROJECTION: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Projects a clip rectangle into framebuffer pixels, clamped to the target.
/// Returns `None` when nothing is left to draw.
pub fn scissor_rect(
    clip: [f32; 4],
    display_pos: Position,
    scale: [f32; 2],
    framebuffer: Size,
) -> Option<DrawOp> {
    let min_x = ((clip[0] - display_pos.x) * scale[0]).max(0.0);
    let min_y = ((clip[1] - display_pos.y) * scale[1]).max(0.0);
    let max_x = ((clip[2] - display_pos.x) * scale[0]).min(framebuffer.width);
    let max_y = ((clip[3] - display_pos.y) * scale[1]).min(framebuffer.height);
    if max_x <= min_x || max_y <= min_y {
        return None;
    }

    let x = min_x as u32;
    let y = min_y as u32;
    let width = (max_x as u32).saturating_sub(x);
    let height = (max_y as u32).saturating_sub(y);
    if width == 0 || height == 0 {
        return None;
    }
    Some(DrawOp::SetScissor {
        x,
        y,
        width,
        height,
    })
}
