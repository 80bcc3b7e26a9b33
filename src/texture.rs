use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::draw_data::TextureId;
use crate::error::{BackendError, Result};
use crate::gpu::RenderDevice;
use crate::texture_table::TextureTable;

/// Sampling used when a texture is magnified or minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Nearest-neighbour, for pixel art.
    Point,
    #[default]
    Linear,
}

/// Number of levels in a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    32 - largest.leading_zeros()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// RGBA8 pixels for every mip level, largest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MipChain {
    pub levels: Vec<MipLevel>,
}

impl MipChain {
    pub fn generate(pixels: &[u8], width: u32, height: u32, level_count: u32) -> Result<Self> {
        validate_rgba(pixels, width, height)?;
        let base = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
            BackendError::InvalidTexture(format!("{width}x{height} image buffer rejected"))
        })?;

        let mut levels = Vec::with_capacity(level_count as usize);
        let mut current = base;
        for level in 0..level_count.max(1) {
            if level > 0 {
                let w = (current.width() / 2).max(1);
                let h = (current.height() / 2).max(1);
                current = imageops::resize(&current, w, h, FilterType::Triangle);
            }
            levels.push(MipLevel {
                width: current.width(),
                height: current.height(),
                pixels: current.as_raw().clone(),
            });
        }
        Ok(Self { levels })
    }

    pub fn base(&self) -> Option<&MipLevel> {
        self.levels.first()
    }
}

pub fn validate_rgba(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(BackendError::InvalidTexture(format!(
            "zero-sized texture {width}x{height}"
        )));
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(BackendError::InvalidTexture(format!(
            "{width}x{height} needs {expected} bytes, got {}",
            pixels.len()
        )));
    }
    Ok(())
}

/// CPU-side RGBA image that can be bound for use by the GUI library.
///
/// Edits mark the texture dirty; [`Texture::sync`] pushes them to the GPU
/// under the same handle.
#[derive(Debug, Clone)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    scaling: ScalingMode,
    id: Option<TextureId>,
    dirty: bool,
}

impl Texture {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>, scaling: ScalingMode) -> Result<Self> {
        validate_rgba(&pixels, width, height)?;
        Ok(Self {
            width,
            height,
            pixels,
            scaling,
            id: None,
            dirty: false,
        })
    }

    pub fn from_file(path: impl AsRef<Path>, scaling: ScalingMode) -> Result<Self> {
        let image = image::open(path.as_ref())?.to_rgba8();
        let (width, height) = image.dimensions();
        Self::from_rgba(width, height, image.into_raw(), scaling)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn scaling(&self) -> ScalingMode {
        self.scaling
    }

    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        let Some(offset) = self.offset(x, y) else {
            return false;
        };
        self.pixels[offset..offset + 4].copy_from_slice(&rgba);
        self.dirty = true;
        true
    }

    /// Replaces the whole image, possibly at a new size.
    pub fn replace(&mut self, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
        validate_rgba(&pixels, width, height)?;
        self.width = width;
        self.height = height;
        self.pixels = pixels;
        self.dirty = true;
        Ok(())
    }

    pub fn set_scaling(&mut self, scaling: ScalingMode) {
        if self.scaling != scaling {
            self.scaling = scaling;
            self.dirty = true;
        }
    }

    /// Uploads the texture and returns its handle. Binding twice returns the
    /// existing handle after syncing pending edits.
    pub fn bind<D: RenderDevice>(
        &mut self,
        table: &mut TextureTable<D>,
        device: &mut D,
    ) -> Result<TextureId> {
        if let Some(id) = self.id {
            self.sync(table, device)?;
            return Ok(id);
        }
        let id = table.bind(device, &self.pixels, self.width, self.height, self.scaling)?;
        self.id = Some(id);
        self.dirty = false;
        Ok(id)
    }

    /// Pushes pending edits to the bound GPU texture.
    pub fn sync<D: RenderDevice>(
        &mut self,
        table: &mut TextureTable<D>,
        device: &mut D,
    ) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };
        if self.dirty {
            table.update(device, id, &self.pixels, self.width, self.height, self.scaling)?;
            self.dirty = false;
        }
        Ok(())
    }

    pub fn unbind<D: RenderDevice>(
        &mut self,
        table: &mut TextureTable<D>,
        device: &mut D,
    ) -> Result<()> {
        match self.id.take() {
            Some(id) => table.free(device, id),
            None => Ok(()),
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}
