//! Maps GUI texture handles to GPU textures and their resource sets.

use std::collections::HashMap;

use log::{debug, info};

use crate::draw_data::{TextureId, FONT_TEXTURE_ID};
use crate::error::{BackendError, Result};
use crate::gpu::{RenderDevice, TextureDesc};
use crate::gui::FontAtlasData;
use crate::render_plan::TextureLookup;
use crate::texture::{mip_level_count, validate_rgba, MipChain, ScalingMode, Texture};

pub struct TextureBinding<D: RenderDevice> {
    pub texture: D::Texture,
    pub bind_group: D::BindGroup,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub scaling: ScalingMode,
}

impl<D: RenderDevice> TextureBinding<D> {
    fn upload(
        device: &mut D,
        label: &'static str,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<Self> {
        let mip_levels = mip_level_count(width, height);
        let mips = MipChain::generate(pixels, width, height, mip_levels)?;
        let texture = device.create_texture(&TextureDesc {
            label,
            width,
            height,
            mip_levels,
        })?;
        device.write_texture(&texture, &mips);
        let bind_group = device.create_texture_bind_group(&texture, scaling);
        Ok(Self {
            texture,
            bind_group,
            width,
            height,
            mip_levels,
            scaling,
        })
    }

    fn release(self, device: &mut D) {
        device.destroy_bind_group(self.bind_group);
        device.destroy_texture(self.texture);
    }
}

/// Handles are never reused: every bind takes the next integer above the
/// font handle, even after frees.
pub struct TextureTable<D: RenderDevice> {
    entries: HashMap<TextureId, TextureBinding<D>>,
    font: Option<TextureBinding<D>>,
    last_handle: u64,
}

impl<D: RenderDevice> Default for TextureTable<D> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            font: None,
            last_handle: FONT_TEXTURE_ID.0,
        }
    }
}

impl<D: RenderDevice> TextureTable<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        device: &mut D,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<TextureId> {
        let binding = TextureBinding::upload(device, "imgui texture", pixels, width, height, scaling)?;
        self.last_handle += 1;
        let id = TextureId(self.last_handle);
        debug!(
            "bound texture {id} ({width}x{height}, {} mips, {:?})",
            binding.mip_levels, scaling
        );
        self.entries.insert(id, binding);
        Ok(id)
    }

    /// Replaces the pixels behind `id`. The handle stays the same even when
    /// the size changes and the GPU texture has to be recreated.
    pub fn update(
        &mut self,
        device: &mut D,
        id: TextureId,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<()> {
        validate_rgba(pixels, width, height)?;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(BackendError::UnknownTexture(id))?;

        if entry.width == width && entry.height == height {
            let mips = MipChain::generate(pixels, width, height, entry.mip_levels)?;
            device.write_texture(&entry.texture, &mips);
            let bind_group = device.create_texture_bind_group(&entry.texture, scaling);
            let old = std::mem::replace(&mut entry.bind_group, bind_group);
            device.destroy_bind_group(old);
            entry.scaling = scaling;
            return Ok(());
        }

        let binding = TextureBinding::upload(device, "imgui texture", pixels, width, height, scaling)?;
        let old = std::mem::replace(entry, binding);
        debug!(
            "texture {id} resized {}x{} -> {width}x{height}",
            old.width, old.height
        );
        old.release(device);
        Ok(())
    }

    pub fn free(&mut self, device: &mut D, id: TextureId) -> Result<()> {
        let binding = self
            .entries
            .remove(&id)
            .ok_or(BackendError::UnknownTexture(id))?;
        binding.release(device);
        debug!("freed texture {id}");
        Ok(())
    }

    /// Uploads the font atlas under [`FONT_TEXTURE_ID`], replacing any previous one.
    pub fn rebuild_font(&mut self, device: &mut D, atlas: &FontAtlasData) -> Result<TextureId> {
        let binding = TextureBinding::upload(
            device,
            "imgui font atlas",
            &atlas.pixels,
            atlas.width,
            atlas.height,
            ScalingMode::Linear,
        )?;
        if let Some(old) = self.font.replace(binding) {
            old.release(device);
        }
        info!("font atlas rebuilt ({}x{})", atlas.width, atlas.height);
        Ok(FONT_TEXTURE_ID)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureBinding<D>> {
        if id == FONT_TEXTURE_ID {
            return self.font.as_ref();
        }
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.get(id).is_some()
    }

    pub fn resource_set(&self, id: TextureId) -> Result<&D::BindGroup> {
        self.get(id)
            .map(|binding| &binding.bind_group)
            .ok_or(BackendError::UnknownTexture(id))
    }

    /// User texture handles, ascending. The font handle is not included.
    pub fn handles(&self) -> Vec<TextureId> {
        let mut handles: Vec<_> = self.entries.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn destroy_all(&mut self, device: &mut D) {
        for (_, binding) in self.entries.drain() {
            binding.release(device);
        }
        if let Some(font) = self.font.take() {
            font.release(device);
        }
    }
}

impl<D: RenderDevice> TextureLookup for TextureTable<D> {
    fn contains_texture(&self, id: TextureId) -> bool {
        self.contains(id)
    }
}

/// Texture operations handed to frame hooks.
pub struct Textures<'a, D: RenderDevice> {
    table: &'a mut TextureTable<D>,
    device: &'a mut D,
}

impl<'a, D: RenderDevice> Textures<'a, D> {
    pub fn new(table: &'a mut TextureTable<D>, device: &'a mut D) -> Self {
        Self { table, device }
    }

    pub fn bind(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<TextureId> {
        self.table.bind(self.device, pixels, width, height, scaling)
    }

    pub fn bind_texture(&mut self, texture: &mut Texture) -> Result<TextureId> {
        texture.bind(self.table, self.device)
    }

    pub fn sync_texture(&mut self, texture: &mut Texture) -> Result<()> {
        texture.sync(self.table, self.device)
    }

    pub fn update(
        &mut self,
        id: TextureId,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<()> {
        self.table.update(self.device, id, pixels, width, height, scaling)
    }

    pub fn free(&mut self, id: TextureId) -> Result<()> {
        self.table.free(self.device, id)
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.table.contains(id)
    }
}
