//! Texture loading, upload and binding
//!
//! A [`Texture`] starts empty and is loaded exactly once, from a file, from
//! encoded bytes handed over by an importer, or from raw RGBA pixels. Loading
//! the same instance twice is a programming error and is refused.
//! [`TextureManager`] caches textures by path and mipmap flag.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::assets::{ImageData, ResourceFactory, ResourceManager, RowOrder};
use crate::core::config::AssetConfig;
use crate::render::device::{GraphicsDevice, TextureHandle};
use crate::render::{RenderError, RenderResult};

/// Texture filtering modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Nearest neighbor filtering
    Nearest,
    /// Linear filtering
    Linear,
    /// Linear filtering between linearly filtered mip levels
    Trilinear,
}

/// Texture wrapping modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Repeat the texture
    Repeat,
    /// Mirror the texture
    MirroredRepeat,
    /// Clamp to edge
    ClampToEdge,
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureParams {
    /// Minification filter
    pub min_filter: FilterMode,
    /// Magnification filter
    pub mag_filter: FilterMode,
    /// Wrapping on both axes
    pub wrap_mode: WrapMode,
    /// Generate mipmaps after upload
    pub generate_mipmaps: bool,
}

impl TextureParams {
    /// Repeat-wrapped, linearly filtered parameters
    ///
    /// With mipmaps the minification filter becomes trilinear.
    pub fn with_mipmaps(generate_mipmaps: bool) -> Self {
        Self {
            min_filter: if generate_mipmaps { FilterMode::Trilinear } else { FilterMode::Linear },
            mag_filter: FilterMode::Linear,
            wrap_mode: WrapMode::Repeat,
            generate_mipmaps,
        }
    }
}

impl Default for TextureParams {
    fn default() -> Self {
        Self::with_mipmaps(false)
    }
}

#[derive(Debug, Clone, Copy)]
struct LoadedTexture {
    handle: TextureHandle,
    width: u32,
    height: u32,
}

/// A 2D texture owned by the device
pub struct Texture {
    device: Arc<dyn GraphicsDevice>,
    name: String,
    loaded: Mutex<Option<LoadedTexture>>,
}

impl Texture {
    /// Create an empty texture
    pub fn new(device: Arc<dyn GraphicsDevice>, name: impl Into<String>) -> Self {
        Self {
            device,
            name: name.into(),
            loaded: Mutex::new(None),
        }
    }

    /// Wrap a texture created elsewhere (e.g. a framebuffer attachment)
    pub fn from_handle(device: Arc<dyn GraphicsDevice>, name: impl Into<String>, handle: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            device,
            name: name.into(),
            loaded: Mutex::new(Some(LoadedTexture { handle, width, height })),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<LoadedTexture>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Debug name, usually the source path
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upload decoded pixels
    ///
    /// # Returns
    /// * `Err(RenderError::AlreadyLoaded)` - This texture already holds data
    pub fn load_image(&self, image: &ImageData, params: &TextureParams) -> RenderResult<()> {
        let mut loaded = self.state();
        if loaded.is_some() {
            log::error!("Texture '{}' is already loaded, refusing to load it again", self.name);
            return Err(RenderError::AlreadyLoaded(self.name.clone()));
        }

        let handle = self.device.create_texture(image, params)?;
        *loaded = Some(LoadedTexture {
            handle,
            width: image.width,
            height: image.height,
        });
        log::debug!(
            "Uploaded texture '{}' ({}x{}, mipmaps: {})",
            self.name,
            image.width,
            image.height,
            params.generate_mipmaps
        );
        Ok(())
    }

    /// Decode and upload an image file
    pub fn load_file(&self, path: impl Into<PathBuf>, params: &TextureParams) -> RenderResult<()> {
        self.ensure_unloaded()?;
        let image = ImageData::from_file(path.into(), RowOrder::BottomUp)?;
        self.load_image(&image, params)
    }

    /// Decode and upload an encoded image held in memory
    pub fn load_encoded(&self, bytes: &[u8], params: &TextureParams) -> RenderResult<()> {
        self.ensure_unloaded()?;
        let image = ImageData::from_bytes(bytes, RowOrder::BottomUp)?;
        self.load_image(&image, params)
    }

    fn ensure_unloaded(&self) -> RenderResult<()> {
        if self.is_loaded() {
            log::error!("Texture '{}' is already loaded, refusing to load it again", self.name);
            return Err(RenderError::AlreadyLoaded(self.name.clone()));
        }
        Ok(())
    }

    /// Whether the texture holds data
    pub fn is_loaded(&self) -> bool {
        self.state().is_some()
    }

    /// Device handle, if loaded
    pub fn handle(&self) -> Option<TextureHandle> {
        self.state().map(|t| t.handle)
    }

    /// Width and height, if loaded
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.state().map(|t| (t.width, t.height))
    }

    /// Bind to a texture unit
    ///
    /// # Returns
    /// `false` (and nothing is bound) if the texture is not loaded
    pub fn bind(&self, unit: u32) -> bool {
        match self.handle() {
            Some(handle) => {
                self.device.bind_texture(unit, handle);
                true
            }
            None => {
                log::warn!("Binding texture '{}' before it was loaded", self.name);
                false
            }
        }
    }

    /// Delete the device texture; later calls do nothing
    pub fn release(&self) {
        if let Some(loaded) = self.state().take() {
            self.device.delete_texture(loaded.handle);
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("loaded", &*self.state())
            .finish_non_exhaustive()
    }
}

/// Identity of a cached texture
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureKey {
    /// Source path, or a unique name for embedded and raw sources
    pub path: String,
    /// Whether mipmaps are generated
    pub generate_mipmaps: bool,
}

impl TextureKey {
    /// Create a key
    pub fn new(path: impl Into<String>, generate_mipmaps: bool) -> Self {
        Self {
            path: path.into(),
            generate_mipmaps,
        }
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex path = {}, genMipMap = {}", self.path, self.generate_mipmaps)
    }
}

/// Where a texture's pixels come from
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Read the key's path, resolved against the texture directory
    File,
    /// Encoded image bytes (e.g. embedded in a model file)
    Encoded(Vec<u8>),
    /// Already decoded RGBA8 pixels
    Raw(ImageData),
}

/// Creates textures for [`TextureManager`]
pub struct TextureFactory {
    device: Arc<dyn GraphicsDevice>,
    assets: AssetConfig,
}

impl TextureFactory {
    /// Create a factory resolving relative paths with `assets`
    pub fn new(device: Arc<dyn GraphicsDevice>, assets: AssetConfig) -> Self {
        Self { device, assets }
    }
}

impl ResourceFactory for TextureFactory {
    type Key = TextureKey;
    type Data = TextureSource;
    type Resource = Texture;
    type Error = RenderError;

    fn create(&self, key: &TextureKey, source: &TextureSource) -> RenderResult<Texture> {
        let texture = Texture::new(Arc::clone(&self.device), key.path.clone());
        let params = TextureParams::with_mipmaps(key.generate_mipmaps);

        match source {
            TextureSource::File => {
                let path = self.assets.resolve_texture(std::path::Path::new(&key.path));
                texture.load_file(path, &params)?;
            }
            TextureSource::Encoded(bytes) => texture.load_encoded(bytes, &params)?,
            TextureSource::Raw(image) => texture.load_image(image, &params)?,
        }

        log::info!("Created texture {}", key);
        Ok(texture)
    }

    fn destroy(&self, _key: &TextureKey, texture: &Texture) {
        texture.release();
    }
}

/// Cache of textures keyed by path and mipmap flag
pub type TextureManager = ResourceManager<TextureFactory>;

impl ResourceManager<TextureFactory> {
    /// Load (or reuse) a texture file, with the configured mipmap default
    pub fn load_file(&self, path: impl Into<String>) -> RenderResult<Arc<Texture>> {
        let key = TextureKey::new(path, self.factory().assets.generate_mipmaps);
        self.insert(&key, &TextureSource::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{DeviceCall, HeadlessDevice};

    fn setup() -> (Arc<HeadlessDevice>, TextureManager) {
        let device = Arc::new(HeadlessDevice::new());
        let shared: Arc<dyn GraphicsDevice> = Arc::clone(&device) as Arc<dyn GraphicsDevice>;
        let manager = TextureManager::new(TextureFactory::new(shared, AssetConfig::default()));
        (device, manager)
    }

    #[test]
    fn test_double_load_is_refused() {
        let (device, _manager) = setup();
        let texture = Texture::new(device.clone() as Arc<dyn GraphicsDevice>, "white");
        let image = ImageData::solid_color(2, 2, [255; 4]);

        texture.load_image(&image, &TextureParams::default()).unwrap();
        let second = texture.load_image(&image, &TextureParams::default());
        assert!(matches!(second, Err(RenderError::AlreadyLoaded(_))));
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn test_mipmaps_select_trilinear_filtering() {
        let params = TextureParams::with_mipmaps(true);
        assert_eq!(params.min_filter, FilterMode::Trilinear);
        assert_eq!(params.wrap_mode, WrapMode::Repeat);
        assert_eq!(TextureParams::with_mipmaps(false).min_filter, FilterMode::Linear);
    }

    #[test]
    fn test_mipmap_flag_is_part_of_identity() {
        let (device, manager) = setup();
        let raw = TextureSource::Raw(ImageData::solid_color(1, 1, [0, 0, 0, 255]));

        let plain = manager.insert(&TextureKey::new("black", false), &raw).unwrap();
        let mipped = manager.insert(&TextureKey::new("black", true), &raw).unwrap();
        let again = manager.insert(&TextureKey::new("black", false), &raw).unwrap();

        assert!(!Arc::ptr_eq(&plain, &mipped));
        assert!(Arc::ptr_eq(&plain, &again));
        assert_eq!(device.live_texture_count(), 2);
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let (device, manager) = setup();
        let key = TextureKey::new("missing.png", false);

        assert!(manager.insert(&key, &TextureSource::File).is_err());
        assert!(manager.find(&key).is_none());
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_bad_encoded_bytes_report_decode_error() {
        let (_device, manager) = setup();
        let result = manager.insert(&TextureKey::new("embedded", false), &TextureSource::Encoded(vec![1, 2, 3]));
        assert!(matches!(result, Err(RenderError::Decode(_))));
    }

    #[test]
    fn test_bind_and_erase_release_the_texture() {
        let (device, manager) = setup();
        let key = TextureKey::new("white", false);
        let texture = manager
            .insert(&key, &TextureSource::Raw(ImageData::solid_color(1, 1, [255; 4])))
            .unwrap();

        assert!(texture.bind(1));
        let handle = texture.handle().unwrap();
        assert!(device.calls().contains(&DeviceCall::BindTexture { unit: 1, texture: handle }));

        assert!(manager.erase(&key));
        assert!(!texture.is_loaded());
        assert!(!texture.bind(1));
        assert_eq!(device.live_texture_count(), 0);
    }
}
