//! 8 bit matrices as `image` buffers, for handing to `imageproc`.
//!
//! Channels are copied in matrix order; nothing is swapped. A B,G,R matrix
//! becomes an `RgbImage` whose "red" samples are blue. The operations that
//! go through here are channel-agnostic.

use cv_mat::{Depth, Mat, MatData, MatType};
use image::{GrayAlphaImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage};

use crate::{Error, Result};

pub(crate) enum AnyImage {
    Gray(GrayImage),
    GrayAlpha(GrayAlphaImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// Run `$block` with `$x` bound to the inner buffer and rewrap the result in
/// the same variant.
macro_rules! map_any_image {
    ($img:expr, $x:ident, $block:expr) => {
        match $img {
            $crate::bridge::AnyImage::Gray($x) => $crate::bridge::AnyImage::Gray($block),
            $crate::bridge::AnyImage::GrayAlpha($x) => $crate::bridge::AnyImage::GrayAlpha($block),
            $crate::bridge::AnyImage::Rgb($x) => $crate::bridge::AnyImage::Rgb($block),
            $crate::bridge::AnyImage::Rgba($x) => $crate::bridge::AnyImage::Rgba($block),
        }
    };
}

/// Run `$block` with `$x` bound to the inner buffer.
macro_rules! with_any_image {
    ($img:expr, $x:ident, $block:expr) => {
        match $img {
            $crate::bridge::AnyImage::Gray($x) => $block,
            $crate::bridge::AnyImage::GrayAlpha($x) => $block,
            $crate::bridge::AnyImage::Rgb($x) => $block,
            $crate::bridge::AnyImage::Rgba($x) => $block,
        }
    };
}

pub(crate) use {map_any_image, with_any_image};

impl AnyImage {
    /// Copy an 8 bit matrix.
    pub(crate) fn from_mat(src: &dyn MatData) -> Result<Self> {
        let mt = src.mat_type();
        if mt.depth != Depth::U8 {
            return Err(Error::UnsupportedType(mt));
        }
        let (w, h) = (src.cols(), src.rows());
        let data = src.to_mat().into();
        let img = match mt.channels {
            1 => GrayImage::from_raw(w, h, data).map(AnyImage::Gray),
            2 => GrayAlphaImage::from_raw(w, h, data).map(AnyImage::GrayAlpha),
            3 => RgbImage::from_raw(w, h, data).map(AnyImage::Rgb),
            _ => RgbaImage::from_raw(w, h, data).map(AnyImage::Rgba),
        };
        img.ok_or(Error::InvalidBufferSize {
            expected: src.total() * mt.elem_size(),
            actual: src.rows() as usize * src.row_bytes(),
        })
    }

    pub(crate) fn into_mat(self) -> Result<Mat> {
        let (w, h) = with_any_image!(&self, x, x.dimensions());
        let channels = with_any_image!(&self, x, pixel_channels(x));
        let data = with_any_image!(self, x, x.into_raw());
        Ok(Mat::new(h, w, MatType::new(Depth::U8, channels), data)?)
    }

    pub(crate) fn into_gray(self) -> Option<GrayImage> {
        match self {
            AnyImage::Gray(g) => Some(g),
            _ => None,
        }
    }
}

fn pixel_channels<P: Pixel<Subpixel = u8>>(_: &ImageBuffer<P, Vec<u8>>) -> u8 {
    P::CHANNEL_COUNT
}

/// Build a pixel of the same type as `img` from the leading `values`.
pub(crate) fn pixel_like<P: Pixel<Subpixel = u8>>(
    _img: &ImageBuffer<P, Vec<u8>>,
    values: &[u8; 4],
) -> P {
    *P::from_slice(&values[..P::CHANNEL_COUNT as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat_round_trip() {
        let m = Mat::filled(3, 2, Depth::U8, &[1, 2, 3]).unwrap();
        let img = AnyImage::from_mat(&m).unwrap();
        assert!(matches!(img, AnyImage::Rgb(_)));
        assert_eq!(img.into_mat().unwrap(), m);

        let deep = Mat::zeros(1, 1, MatType::CV_16UC1).unwrap();
        assert!(matches!(
            AnyImage::from_mat(&deep),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn pixel_from_values() {
        let img = GrayAlphaImage::new(1, 1);
        let p = pixel_like(&img, &[5, 6, 7, 8]);
        assert_eq!(p.0, [5, 6]);
    }
}
