use cv_mat::{Depth, Mat, MatData, MatType, MatView, Point, Rect};
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use itertools::izip;

use crate::{
    Bitmap, BitmapFormat, ColorConversion, Error, Raster, Result,
    channels::{ChannelSource, cvt_color, merge_alpha, remap_channels},
    io::LoadMode,
};

/// Options for [mat_to_bitmap].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatToBitmap {
    /// Drop the alpha channel of 4 channel matrices.
    pub remove_alpha: bool,
}

/// Options for [bitmap_to_mat].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapToMat {
    /// Drop the alpha channel of formats which have one.
    pub remove_alpha: bool,
}

/// Either borrowed source data or an owned, converted copy of it.
enum CowMat<'a> {
    Borrowed(&'a dyn MatData),
    Owned(Mat),
}

impl CowMat<'_> {
    fn as_data(&self) -> &dyn MatData {
        match self {
            CowMat::Borrowed(m) => *m,
            CowMat::Owned(m) => m,
        }
    }
}

/// Saturate samples to 8 bit if needed.
///
/// 16 bit samples keep their high byte. 32 bit samples are clamped.
fn narrow_to_u8(src: &dyn MatData) -> Result<CowMat<'_>> {
    let mt = src.mat_type();
    let shift = match mt.depth {
        Depth::U8 => return Ok(CowMat::Borrowed(src)),
        Depth::U16 => 8,
        Depth::S32 => 0,
    };
    tracing::warn!("narrowing {mt} matrix to 8 bit");
    let mut dest = Mat::zeros(src.rows(), src.cols(), MatType::new(Depth::U8, mt.channels))?;
    for row in 0..src.rows() {
        for (src_sample, dest_sample) in izip![
            src.row(row).chunks_exact(mt.depth.bytes()),
            dest.row_mut(row).iter_mut(),
        ] {
            let v = mt.depth.read(src_sample) >> shift;
            *dest_sample = v.clamp(0, u8::MAX as i32) as u8;
        }
    }
    Ok(CowMat::Owned(dest))
}

fn packed_bytes(src: &dyn MatData) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(src.rows() as usize * src.row_bytes());
    for row in 0..src.rows() {
        bytes.extend_from_slice(src.row(row));
    }
    bytes
}

/// Convert a matrix to a bitmap.
///
/// The format follows the channel count: one channel gives
/// [BitmapFormat::ByteGray], two or three give [BitmapFormat::ThreeByteBgr]
/// (two channel matrices are shown as gray) and four give
/// [BitmapFormat::FourByteAbgr], or [BitmapFormat::ThreeByteBgr] with
/// `remove_alpha`. Deeper samples are narrowed to 8 bit.
pub fn mat_to_bitmap(src: &dyn MatData, opts: MatToBitmap) -> Result<Bitmap> {
    tracing::debug!(
        "mat_to_bitmap {} {}x{} {opts:?}",
        src.mat_type(),
        src.cols(),
        src.rows()
    );
    let narrowed = narrow_to_u8(src)?;
    let src = narrowed.as_data();
    let (format, converted) = match src.channels() {
        1 => (BitmapFormat::ByteGray, None),
        2 => (
            BitmapFormat::ThreeByteBgr,
            Some(remap_channels(
                src,
                &[
                    ChannelSource::Src(0),
                    ChannelSource::Src(0),
                    ChannelSource::Src(0),
                ],
            )?),
        ),
        3 => (BitmapFormat::ThreeByteBgr, None),
        _ if opts.remove_alpha => (
            BitmapFormat::ThreeByteBgr,
            Some(cvt_color(src, ColorConversion::Bgra2Bgr)?),
        ),
        _ => (
            BitmapFormat::FourByteAbgr,
            Some(cvt_color(src, ColorConversion::Rgba2Abgr)?),
        ),
    };
    let bytes = match converted {
        Some(m) => m.into(),
        None => packed_bytes(src),
    };
    let channels = format.layout()?.channels as usize;
    let expected = channels * src.total();
    if bytes.len() != expected {
        return Err(Error::InvalidBufferSize {
            expected,
            actual: bytes.len(),
        });
    }
    Bitmap::new(src.cols(), src.rows(), format, Raster::Bytes(bytes))
}

/// Convert a color matrix and a separate alpha plane to a
/// [BitmapFormat::FourByteAbgr] bitmap.
///
/// `alpha` must be `CV_8UC1`. `color` must be 8 bit with one (gray) or
/// three channels.
pub fn mat_to_bitmap_with_alpha(color: &dyn MatData, alpha: &dyn MatData) -> Result<Bitmap> {
    if alpha.mat_type() != MatType::CV_8UC1 {
        return Err(Error::AlphaChannelMismatch(alpha.mat_type()));
    }
    let mt = color.mat_type();
    if mt.depth != Depth::U8 || !matches!(mt.channels, 1 | 3) {
        return Err(Error::ColorChannelMismatch(mt));
    }
    let mut bgra = if mt.channels == 1 {
        cvt_color(color, ColorConversion::Gray2Bgra)?
    } else {
        cvt_color(color, ColorConversion::Bgr2Bgra)?
    };
    merge_alpha(&mut bgra, alpha)?;
    mat_to_bitmap(&bgra, MatToBitmap::default())
}

/// Convert a bitmap to a matrix.
///
/// Byte formats become 8 bit matrices. Packed word formats become `CV_32S`
/// matrices with one component per sample. Channels are reordered to
/// B,G,R(,A).
pub fn bitmap_to_mat(bitmap: &Bitmap, opts: BitmapToMat) -> Result<Mat> {
    let format = bitmap.format();
    let layout = format.layout()?;
    tracing::debug!(
        "bitmap_to_mat {format:?} {}x{} {opts:?}",
        bitmap.width(),
        bitmap.height()
    );
    let (rows, cols) = (bitmap.height(), bitmap.width());
    let mat_type = MatType::new(layout.depth, layout.channels);
    let mat = match bitmap.raster() {
        Raster::Bytes(bytes) => {
            let raw = Mat::new(rows, cols, mat_type, bytes.clone())?;
            if layout.remap.iter().enumerate().all(|(i, r)| i == *r) {
                raw
            } else {
                let table: Vec<ChannelSource> = layout
                    .remap
                    .iter()
                    .map(|i| ChannelSource::Src(*i as u8))
                    .collect();
                remap_channels(&raw, &table)?
            }
        }
        Raster::Ints(words) => {
            let shifts = layout.shifts();
            let mut samples = Vec::with_capacity(words.len() * layout.channels as usize);
            for word in words {
                for component in layout.remap {
                    samples.push(((word >> shifts[*component]) & 0xFF) as i32);
                }
            }
            Mat::from_samples(rows, cols, mat_type, &samples)?
        }
        Raster::Shorts(_) => {
            return Err(Error::InvalidRaster {
                format,
                width: cols,
                height: rows,
            });
        }
    };
    if opts.remove_alpha && mat.channels() == 4 {
        return cvt_color(&mat, ColorConversion::Bgra2Bgr);
    }
    Ok(mat)
}

/// Borrow a region of `src`.
///
/// The region must be non-empty and lie fully inside `src`.
pub fn crop(src: &dyn MatData, region: Rect) -> Result<MatView<'_>> {
    tracing::trace!("crop {region} from {}x{}", src.cols(), src.rows());
    Ok(src.roi(region)?)
}

/// Borrow the region spanned by two corners, given in any order.
///
/// `p2` is exclusive.
pub fn crop_points(src: &dyn MatData, p1: Point, p2: Point) -> Result<MatView<'_>> {
    crop(src, Rect::from_points(p1, p2))
}

fn swap_red_blue<T>(samples: &mut [T], channels: u8) {
    if channels >= 3 {
        for px in samples.chunks_exact_mut(channels as usize) {
            px.swap(0, 2);
        }
    }
}

fn u16_samples(src: &dyn MatData) -> Vec<u16> {
    let mut samples = Vec::with_capacity(src.total() * src.channels() as usize);
    for row in 0..src.rows() {
        samples.extend(
            src.row(row)
                .chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]])),
        );
    }
    samples
}

/// Copy a matrix into an `image` crate buffer in R,G,B(,A) order.
///
/// 16 bit matrices stay 16 bit. 32 bit matrices are narrowed to 8 bit.
pub fn mat_to_dynamic_image(src: &dyn MatData) -> Result<DynamicImage> {
    let (w, h) = (src.cols(), src.rows());
    let channels = src.channels();
    let invalid = || Error::InvalidBufferSize {
        expected: src.total() * src.mat_type().elem_size(),
        actual: src.rows() as usize * src.row_bytes(),
    };
    let img = if src.depth() == Depth::U16 {
        let mut samples = u16_samples(src);
        swap_red_blue(&mut samples, channels);
        match channels {
            1 => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, samples).map(DynamicImage::ImageLuma16),
            2 => ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, samples).map(DynamicImage::ImageLumaA16),
            3 => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, samples).map(DynamicImage::ImageRgb16),
            _ => ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, samples).map(DynamicImage::ImageRgba16),
        }
    } else {
        let narrowed = narrow_to_u8(src)?;
        let mut samples = packed_bytes(narrowed.as_data());
        swap_red_blue(&mut samples, channels);
        match channels {
            1 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, samples).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, samples).map(DynamicImage::ImageLumaA8),
            3 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, samples).map(DynamicImage::ImageRgb8),
            _ => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, samples).map(DynamicImage::ImageRgba8),
        }
    };
    img.ok_or_else(invalid)
}

fn bytes_of_u16(samples: Vec<u16>) -> Vec<u8> {
    samples.into_iter().flat_map(u16::to_ne_bytes).collect()
}

/// Copy a decoded image into a matrix in B,G,R(,A) order.
///
/// With [LoadMode::Color] the result is always `CV_8UC3`. With
/// [LoadMode::Unchanged] the channel count and 8 or 16 bit depth are kept;
/// float images are narrowed to 8 bit.
pub fn dynamic_image_to_mat(img: DynamicImage, mode: LoadMode) -> Result<Mat> {
    let (w, h) = (img.width(), img.height());
    if mode == LoadMode::Color {
        let mut rgb = img.into_rgb8().into_raw();
        swap_red_blue(&mut rgb, 3);
        return Ok(Mat::new(h, w, MatType::CV_8UC3, rgb)?);
    }
    let (mat_type, data) = match img {
        DynamicImage::ImageLuma8(b) => (MatType::CV_8UC1, b.into_raw()),
        DynamicImage::ImageLumaA8(b) => (MatType::CV_8UC2, b.into_raw()),
        DynamicImage::ImageRgb8(b) => {
            let mut raw = b.into_raw();
            swap_red_blue(&mut raw, 3);
            (MatType::CV_8UC3, raw)
        }
        DynamicImage::ImageRgba8(b) => {
            let mut raw = b.into_raw();
            swap_red_blue(&mut raw, 4);
            (MatType::CV_8UC4, raw)
        }
        DynamicImage::ImageLuma16(b) => (MatType::CV_16UC1, bytes_of_u16(b.into_raw())),
        DynamicImage::ImageLumaA16(b) => (
            MatType::new(Depth::U16, 2),
            bytes_of_u16(b.into_raw()),
        ),
        DynamicImage::ImageRgb16(b) => {
            let mut raw = b.into_raw();
            swap_red_blue(&mut raw, 3);
            (MatType::CV_16UC3, bytes_of_u16(raw))
        }
        DynamicImage::ImageRgba16(b) => {
            let mut raw = b.into_raw();
            swap_red_blue(&mut raw, 4);
            (MatType::CV_16UC4, bytes_of_u16(raw))
        }
        other => {
            tracing::warn!("narrowing {:?} image to 8 bit", other.color());
            let mut raw = if other.color().has_alpha() {
                other.into_rgba8().into_raw()
            } else {
                other.into_rgb8().into_raw()
            };
            let channels = (raw.len() / (w as usize * h as usize).max(1)) as u8;
            swap_red_blue(&mut raw, channels);
            (MatType::new(Depth::U8, channels), raw)
        }
    };
    Ok(Mat::new(h, w, mat_type, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BitmapFormat, UnsupportedFormat};

    #[test]
    fn gray_and_bgr_copy_straight() {
        let gray = Mat::filled(2, 3, Depth::U8, &[7]).unwrap();
        let b = mat_to_bitmap(&gray, MatToBitmap::default()).unwrap();
        assert_eq!(b.format(), BitmapFormat::ByteGray);
        assert_eq!(b.bytes().unwrap(), &[7; 6]);

        let bgr = Mat::filled(2, 3, Depth::U8, &[1, 2, 3]).unwrap();
        let b = mat_to_bitmap(&bgr, MatToBitmap::default()).unwrap();
        assert_eq!(b.format(), BitmapFormat::ThreeByteBgr);
        assert_eq!(&b.bytes().unwrap()[..3], &[1, 2, 3]);
        assert_eq!(b.argb(2, 1).unwrap(), 0xFF03_0201);
    }

    #[test]
    fn two_channels_show_as_gray() {
        let m = Mat::filled(1, 2, Depth::U8, &[5, 200]).unwrap();
        let b = mat_to_bitmap(&m, MatToBitmap::default()).unwrap();
        assert_eq!(b.format(), BitmapFormat::ThreeByteBgr);
        assert_eq!(b.bytes().unwrap(), &[5, 5, 5, 5, 5, 5]);
    }

    #[test]
    fn four_channels() {
        let m = Mat::filled(1, 1, Depth::U8, &[1, 2, 3, 4]).unwrap();
        let b = mat_to_bitmap(&m, MatToBitmap::default()).unwrap();
        assert_eq!(b.format(), BitmapFormat::FourByteAbgr);
        assert_eq!(b.bytes().unwrap(), &[4, 1, 2, 3]);

        let b = mat_to_bitmap(&m, MatToBitmap { remove_alpha: true }).unwrap();
        assert_eq!(b.format(), BitmapFormat::ThreeByteBgr);
        assert_eq!(b.bytes().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn deep_samples_are_narrowed() {
        let m = Mat::filled(1, 1, Depth::U16, &[0x1234, 0xFFFF, 0]).unwrap();
        let b = mat_to_bitmap(&m, MatToBitmap::default()).unwrap();
        assert_eq!(b.bytes().unwrap(), &[0x12, 0xFF, 0]);

        let m = Mat::filled(1, 1, Depth::S32, &[-4, 300, 99]).unwrap();
        let b = mat_to_bitmap(&m, MatToBitmap::default()).unwrap();
        assert_eq!(b.bytes().unwrap(), &[0, 255, 99]);
    }

    #[test]
    fn views_are_repacked() {
        let m = Mat::from_samples(3, 3, MatType::CV_8UC1, &[0, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let v = crop(&m, Rect::new(1, 1, 2, 2)).unwrap();
        let b = mat_to_bitmap(&v, MatToBitmap::default()).unwrap();
        assert_eq!((b.width(), b.height()), (2, 2));
        assert_eq!(b.bytes().unwrap(), &[4, 5, 7, 8]);
    }

    #[test]
    fn byte_bitmaps_to_mat() {
        let abgr = Bitmap::new(
            1,
            1,
            BitmapFormat::FourByteAbgr,
            Raster::Bytes(vec![4, 1, 2, 3]),
        )
        .unwrap();
        let m = bitmap_to_mat(&abgr, BitmapToMat::default()).unwrap();
        assert_eq!(m.mat_type(), MatType::CV_8UC4);
        assert_eq!(m.row(0), &[1, 2, 3, 4]);

        let m = bitmap_to_mat(&abgr, BitmapToMat { remove_alpha: true }).unwrap();
        assert_eq!(m.mat_type(), MatType::CV_8UC3);
        assert_eq!(m.row(0), &[1, 2, 3]);
    }

    #[test]
    fn int_bitmaps_to_mat() {
        let argb =
            Bitmap::new(1, 1, BitmapFormat::IntArgb, Raster::Ints(vec![0x4030_2010])).unwrap();
        let m = bitmap_to_mat(&argb, BitmapToMat::default()).unwrap();
        assert_eq!(m.mat_type(), MatType::CV_32SC4);
        let px: Vec<i32> = (0..4).map(|c| m.sample(0, 0, c)).collect();
        assert_eq!(px, [0x10, 0x20, 0x30, 0x40]);

        let rgb = Bitmap::new(1, 1, BitmapFormat::IntRgb, Raster::Ints(vec![0x0030_2010])).unwrap();
        let m = bitmap_to_mat(&rgb, BitmapToMat::default()).unwrap();
        assert_eq!(m.mat_type(), MatType::CV_32SC3);
        let px: Vec<i32> = (0..3).map(|c| m.sample(0, 0, c)).collect();
        assert_eq!(px, [0x10, 0x20, 0x30]);

        let bgr = Bitmap::new(1, 1, BitmapFormat::IntBgr, Raster::Ints(vec![0x0010_2030])).unwrap();
        let m2 = bitmap_to_mat(&bgr, BitmapToMat::default()).unwrap();
        assert_eq!(m, m2);
    }

    #[test]
    fn unsupported_bitmap() {
        let fmt = BitmapFormat::Unsupported(UnsupportedFormat::ByteIndexed);
        let b = Bitmap::new(2, 2, fmt, Raster::Bytes(vec![0; 4])).unwrap();
        assert!(matches!(
            bitmap_to_mat(&b, BitmapToMat::default()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn with_alpha() {
        let bgr = Mat::filled(2, 2, Depth::U8, &[1, 2, 3]).unwrap();
        let a = Mat::filled(2, 2, Depth::U8, &[9]).unwrap();
        let b = mat_to_bitmap_with_alpha(&bgr, &a).unwrap();
        assert_eq!(b.format(), BitmapFormat::FourByteAbgr);
        assert_eq!(&b.bytes().unwrap()[..4], &[9, 1, 2, 3]);

        let gray = Mat::filled(2, 2, Depth::U8, &[6]).unwrap();
        let b = mat_to_bitmap_with_alpha(&gray, &a).unwrap();
        assert_eq!(&b.bytes().unwrap()[..4], &[9, 6, 6, 6]);

        let bgra = Mat::filled(2, 2, Depth::U8, &[1, 2, 3, 4]).unwrap();
        assert!(matches!(
            mat_to_bitmap_with_alpha(&bgra, &a),
            Err(Error::ColorChannelMismatch(_))
        ));
    }

    #[test]
    fn crop_points_any_order() {
        let m = Mat::zeros(10, 10, MatType::CV_8UC3).unwrap();
        let a = crop_points(&m, Point::new(2, 3), Point::new(6, 8)).unwrap();
        let b = crop_points(&m, Point::new(6, 8), Point::new(2, 3)).unwrap();
        assert_eq!((a.cols(), a.rows()), (4, 5));
        assert_eq!((b.cols(), b.rows()), (4, 5));
        assert!(matches!(
            crop_points(&m, Point::new(2, 3), Point::new(11, 8)),
            Err(Error::Mat(cv_mat::Error::RegionOutOfBounds { .. }))
        ));
    }

    #[test]
    fn dynamic_image_swaps_red_and_blue() {
        let bgr = Mat::filled(1, 2, Depth::U8, &[1, 2, 3]).unwrap();
        let img = mat_to_dynamic_image(&bgr).unwrap();
        assert_eq!(img.as_rgb8().unwrap().get_pixel(1, 0).0, [3, 2, 1]);
        let back = dynamic_image_to_mat(img, LoadMode::Unchanged).unwrap();
        assert_eq!(back, bgr);

        let deep = Mat::filled(1, 1, Depth::U16, &[1000, 2000, 3000, 4000]).unwrap();
        let img = mat_to_dynamic_image(&deep).unwrap();
        assert_eq!(img.as_rgba16().unwrap().get_pixel(0, 0).0, [3000, 2000, 1000, 4000]);
        let back = dynamic_image_to_mat(img.clone(), LoadMode::Unchanged).unwrap();
        assert_eq!(back, deep);

        let color = dynamic_image_to_mat(img, LoadMode::Color).unwrap();
        assert_eq!(color.mat_type(), MatType::CV_8UC3);
    }
}
