use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default allocation limit for decoding, 512 MiB.
pub const DEFAULT_MAX_ALLOC_BYTES: u64 = 512 * 1024 * 1024;

fn default_max_alloc_bytes() -> Option<u64> {
    Some(DEFAULT_MAX_ALLOC_BYTES)
}

/// PNG compression level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<PngCompression> for image::codecs::png::CompressionType {
    fn from(orig: PngCompression) -> Self {
        match orig {
            PngCompression::Fast => Self::Fast,
            PngCompression::Default => Self::Default,
            PngCompression::Best => Self::Best,
        }
    }
}

/// Settings for loading and encoding images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Refuse to decode images wider than this.
    #[serde(default)]
    pub max_image_width: Option<u32>,
    /// Refuse to decode images taller than this.
    #[serde(default)]
    pub max_image_height: Option<u32>,
    /// Upper bound on memory allocated while decoding.
    #[serde(default = "default_max_alloc_bytes")]
    pub max_alloc_bytes: Option<u64>,
    #[serde(default)]
    pub png_compression: PngCompression,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_image_width: None,
            max_image_height: None,
            max_alloc_bytes: default_max_alloc_bytes(),
            png_compression: PngCompression::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(buf: &str) -> Result<Self> {
        Ok(toml::from_str(buf)?)
    }

    /// Read a TOML configuration file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let buf = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&buf)
    }

    pub fn validate(&self) -> Result<()> {
        let zero = |name: &str| Error::InvalidConfig(format!("{name} must be greater than zero"));
        if self.max_image_width == Some(0) {
            return Err(zero("max_image_width"));
        }
        if self.max_image_height == Some(0) {
            return Err(zero("max_image_height"));
        }
        if self.max_alloc_bytes == Some(0) {
            return Err(zero("max_alloc_bytes"));
        }
        Ok(())
    }

    /// Decoder limits for the `image` crate.
    pub fn limits(&self) -> image::Limits {
        let mut limits = image::Limits::no_limits();
        limits.max_image_width = self.max_image_width;
        limits.max_image_height = self.max_image_height;
        limits.max_alloc = self.max_alloc_bytes;
        limits
    }
}

/// Handle to the initialized conversion toolkit.
///
/// Obtained from [Toolkit::init]. Initializing again with the same
/// configuration gives an equal handle; there is no global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolkit {
    config: Config,
}

fn _test_toolkit_is_send_sync() {
    fn implements<T: Send + Sync>() {}
    implements::<Toolkit>();
}

impl Toolkit {
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "mat-convert {} ready, png compression {:?}",
            env!("CARGO_PKG_VERSION"),
            config.png_compression
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
