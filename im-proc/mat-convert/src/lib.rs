//! Conversion between native pixel matrices ([Mat]) and platform bitmaps
//! ([Bitmap]), plus a set of simple image operations forwarded to the
//! `image` and `imageproc` crates.
//!
//! Conversions and operations are free functions and pure: each call
//! allocates its result and shares nothing with other calls. Loading,
//! saving and encoding need the resource limits and encoder settings of a
//! [Config], so they are methods of the [Toolkit] handle returned by
//! [Toolkit::init].

use cv_mat::MatType;

mod bitmap;
mod bridge;
mod channels;
mod config;
mod convert;
mod features;
mod geometry;
mod io;
mod ops;

pub use cv_mat::{self, Depth, Mat, MatData, MatView, Point, Point2d, Rect, Size};

pub use bitmap::{Bitmap, BitmapFormat, FormatLayout, Raster, RasterKind, UnsupportedFormat};
pub use channels::{
    ChannelSource, ColorConversion, add_alpha, cvt_color, extract_channel, remap_channels,
};
pub use config::{Config, PngCompression, Toolkit};
pub use convert::{
    BitmapToMat, MatToBitmap, bitmap_to_mat, crop, crop_points, dynamic_image_to_mat,
    mat_to_bitmap, mat_to_bitmap_with_alpha, mat_to_dynamic_image,
};
pub use features::{Color, HoughParams, canny, hough_lines_p, line};
pub use geometry::{Affine2, BorderMode, Interpolation, rotation_matrix_2d, warp_affine};
pub use io::LoadMode;
pub use ops::{Scalar, ThresholdType, bitwise_not, bitwise_or, copy, flood_fill, threshold};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported bitmap format: {0:?}")]
    UnsupportedFormat(BitmapFormat),
    #[error("raster does not match bitmap format {format:?} at {width}x{height}")]
    InvalidRaster {
        format: BitmapFormat,
        width: u32,
        height: u32,
    },
    #[error("wrong channel count for alpha: {0}, should be CV_8UC1")]
    AlphaChannelMismatch(MatType),
    #[error("wrong channel count for input matrix: {0}")]
    ColorChannelMismatch(MatType),
    #[error("conversion {conversion:?} is not available for {mat_type}")]
    UnsupportedConversion {
        conversion: ColorConversion,
        mat_type: MatType,
    },
    #[error("matrix type {0} is not supported by this operation")]
    UnsupportedType(MatType),
    #[error("matrix mismatch: {0} {1}x{2} vs {3} {4}x{5}")]
    SizeMismatch(MatType, u32, u32, MatType, u32, u32),
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },
    #[error("channel {channel} out of range for {mat_type}")]
    ChannelOutOfRange { channel: u8, mat_type: MatType },
    #[error("unsupported aperture size {0}, only 3 is available")]
    UnsupportedAperture(u32),
    #[error("unsupported border mode {0:?}")]
    UnsupportedBorderMode(BorderMode),
    #[error("affine transform is not invertible")]
    NonInvertibleTransform,
    #[error("seed point {0:?} outside of matrix")]
    SeedOutOfBounds(Point),
    #[error("pixel ({x}, {y}) outside {width}x{height} bitmap")]
    PixelOutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Mat(#[from] cv_mat::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("TOML deserialization error: {source}")]
    TomlDe {
        #[from]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail unless both matrices have the same type and size.
pub(crate) fn check_same_shape(a: &dyn MatData, b: &dyn MatData) -> Result<()> {
    if a.mat_type() != b.mat_type() || a.size() != b.size() {
        return Err(Error::SizeMismatch(
            a.mat_type(),
            a.cols(),
            a.rows(),
            b.mat_type(),
            b.cols(),
            b.rows(),
        ));
    }
    Ok(())
}
