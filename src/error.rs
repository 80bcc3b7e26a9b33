use crate::draw_data::TextureId;
use crate::gui::ViewportId;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no supported graphics backend found")]
    NoSupportedBackend,
    #[error("graphics backend index {0} is not supported on this system")]
    UnsupportedBackend(i32),
    #[error("no GPU adapter can present to the main window")]
    AdapterUnavailable,
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
    #[error("GPU allocation of {size} bytes for {label} failed")]
    Allocation { label: &'static str, size: u64 },
    #[error("draw command carries a user callback, which this renderer does not support")]
    UnsupportedCallback,
    #[error("texture {0} is not bound")]
    UnknownTexture(TextureId),
    #[error("viewport {0} has no platform window")]
    UnknownViewport(ViewportId),
    #[error("invalid texture data: {0}")]
    InvalidTexture(String),
    #[error("failed to create window: {0}")]
    WindowCreation(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
