use log::{debug, trace, warn};

use crate::buffers::{
    GrowableBuffer, RetireQueue, INITIAL_INDEX_BUFFER_SIZE,
    INITIAL_UNIFORM_BUFFER_SIZE, INITIAL_VERTEX_BUFFER_SIZE,
};
use crate::error::Result;
use crate::gpu::{BufferKind, PassResources, RenderDevice};
use crate::render_plan::FramePlan;
use crate::texture_table::TextureTable;
use crate::viewport::ViewportRegistry;

struct FrameBuffers<D: RenderDevice> {
    vertex: GrowableBuffer<D::Buffer>,
    index: GrowableBuffer<D::Buffer>,
    uniform: GrowableBuffer<D::Buffer>,
    projection: D::BindGroup,
}

/// Uploads a [`FramePlan`] and records its passes.
///
/// Owns the shared vertex, index and projection buffers plus the texture
/// table. Resources are released through [`ImRenderer::destroy`]; after
/// that every render call is a no-op.
pub struct ImRenderer<D: RenderDevice> {
    buffers: Option<FrameBuffers<D>>,
    retired: RetireQueue<D::Buffer>,
    textures: TextureTable<D>,
}

impl<D: RenderDevice> ImRenderer<D> {
    pub fn new(device: &mut D) -> Result<Self> {
        let vertex = GrowableBuffer::new(device, BufferKind::Vertex, INITIAL_VERTEX_BUFFER_SIZE)?;
        let index = GrowableBuffer::new(device, BufferKind::Index, INITIAL_INDEX_BUFFER_SIZE)?;
        let uniform =
            GrowableBuffer::new(device, BufferKind::Uniform, INITIAL_UNIFORM_BUFFER_SIZE)?;
        let projection = device.create_projection_bind_group(uniform.buffer());
        Ok(Self {
            buffers: Some(FrameBuffers {
                vertex,
                index,
                uniform,
                projection,
            }),
            retired: RetireQueue::new(),
            textures: TextureTable::new(),
        })
    }

    pub fn textures(&self) -> &TextureTable<D> {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureTable<D> {
        &mut self.textures
    }

    pub fn vertex_capacity(&self) -> u64 {
        self.buffers.as_ref().map_or(0, |b| b.vertex.capacity())
    }

    pub fn index_capacity(&self) -> u64 {
        self.buffers.as_ref().map_or(0, |b| b.index.capacity())
    }

    pub fn retired_buffers(&self) -> usize {
        self.retired.len()
    }

    pub fn render(
        &mut self,
        device: &mut D,
        viewports: &ViewportRegistry<D>,
        plan: &FramePlan,
    ) -> Result<()> {
        let Some(buffers) = self.buffers.as_mut() else {
            return Ok(());
        };
        if plan.passes.is_empty() {
            return Ok(());
        }

        let vertex_bytes = plan.vertex_bytes();
        let index_bytes = plan.index_bytes();
        let uniform_bytes = plan.uniform_bytes();

        buffers
            .vertex
            .ensure_capacity(device, vertex_bytes.len() as u64, &mut self.retired)?;
        buffers
            .index
            .ensure_capacity(device, index_bytes.len() as u64, &mut self.retired)?;
        if buffers
            .uniform
            .ensure_capacity(device, uniform_bytes.len() as u64, &mut self.retired)?
        {
            let projection = device.create_projection_bind_group(buffers.uniform.buffer());
            let old = std::mem::replace(&mut buffers.projection, projection);
            device.destroy_bind_group(old);
        }

        // DrawVert is 20 bytes, so the vertex stream is always 4-aligned.
        if !vertex_bytes.is_empty() {
            device.write_buffer(buffers.vertex.buffer(), 0, vertex_bytes);
        }
        if !index_bytes.is_empty() {
            device.write_buffer(buffers.index.buffer(), 0, &index_bytes);
        }
        device.write_buffer(buffers.uniform.buffer(), 0, &uniform_bytes);

        let resources = PassResources {
            vertex_buffer: buffers.vertex.buffer(),
            index_buffer: buffers.index.buffer(),
            projection: &buffers.projection,
            textures: &self.textures,
        };
        for pass in &plan.passes {
            let Some(swapchain) = viewports.swapchain(pass.window) else {
                warn!("{} lost its swapchain before drawing", pass.viewport);
                continue;
            };
            trace!(
                "{}: {} draws into {}x{}",
                pass.viewport,
                pass.draw_count(),
                pass.framebuffer_size.width,
                pass.framebuffer_size.height
            );
            device.draw_pass(swapchain, pass, &resources)?;
        }
        Ok(())
    }

    /// Releases retired buffers whose last submission finished.
    pub fn collect_retired(&mut self, device: &mut D) {
        let completed = device.completed_submission();
        let released = self.retired.collect(device, completed);
        if released > 0 {
            debug!("released {released} retired buffers");
        }
    }

    pub fn destroy(&mut self, device: &mut D) {
        self.retired.drain(device);
        if let Some(buffers) = self.buffers.take() {
            device.destroy_bind_group(buffers.projection);
            buffers.vertex.destroy(device);
            buffers.index.destroy(device);
            buffers.uniform.destroy(device);
        }
        self.textures.destroy_all(device);
    }
}
