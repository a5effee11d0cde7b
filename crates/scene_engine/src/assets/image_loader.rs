//! Image loading utilities for texture data
//!
//! Decodes PNG (and whatever else the `image` crate is built with) into RGBA8
//! pixel rows ready for upload.

use std::path::Path;

use crate::render::{RenderError, RenderResult};

/// Row order of decoded pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image, as stored in the file
    TopDown,
    /// First row is the bottom of the image, matching texture coordinates
    /// with a bottom-left origin
    BottomUp,
}

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of color channels (always 4 after decoding)
    pub channels: u8,
}

impl ImageData {
    /// Load an image from a file path
    ///
    /// # Arguments
    /// * `path` - Image file to read
    /// * `order` - Row order of the returned pixels
    ///
    /// # Returns
    /// * `Err(RenderError::Io)` - The file could not be read
    /// * `Err(RenderError::Decode)` - The bytes are not a supported image
    pub fn from_file<P: AsRef<Path>>(path: P, order: RowOrder) -> RenderResult<Self> {
        let path_ref = path.as_ref();

        log::debug!("Loading image from: {:?}", path_ref);

        let bytes = std::fs::read(path_ref).map_err(|source| RenderError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let image = Self::from_bytes(&bytes, order)
            .map_err(|e| RenderError::Decode(format!("{}: {e}", path_ref.display())))?;

        log::info!("Loaded image {}x{} from {:?}", image.width, image.height, path_ref);
        Ok(image)
    }

    /// Decode an image held in memory (e.g. embedded in a model file)
    pub fn from_bytes(bytes: &[u8], order: RowOrder) -> RenderResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| RenderError::Decode(format!("failed to decode image: {e}")))?;

        let img = match order {
            RowOrder::TopDown => img,
            RowOrder::BottomUp => img.flipv(),
        };
        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        log::debug!("Decoded image {}x{} from memory", width, height);

        Ok(Self {
            data: rgba_img.into_raw(),
            width,
            height,
            channels: 4,
        })
    }

    /// Wrap raw RGBA8 pixels, checking the size
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RenderError::Decode(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels: 4,
        })
    }

    /// Create a solid color image (useful for testing and defaults)
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let data = color.repeat(pixel_count);

        Self {
            data,
            width,
            height,
            channels: 4,
        }
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}
