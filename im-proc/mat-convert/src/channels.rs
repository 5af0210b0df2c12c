use cv_mat::{Depth, Mat, MatData, MatType};
use itertools::izip;

use crate::{Error, Result};

/// Where one output channel of a remap comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSource {
    /// Copy this input channel.
    Src(u8),
    /// Fill with the maximum value of the depth (opaque alpha).
    Opaque,
}

use ChannelSource::{Opaque, Src};

/// Color conversion codes, numbered like the vision library's.
///
/// Matrices are B,G,R(,A) by default, so the `Rgb*` spellings are aliases
/// of the `Bgr*` conversions with the same channel movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorConversion {
    Bgr2Bgra,
    Bgra2Bgr,
    Bgr2Rgba,
    Rgba2Bgr,
    Bgr2Rgb,
    Bgra2Rgba,
    Bgr2Gray,
    Rgb2Gray,
    Gray2Bgr,
    Gray2Bgra,
    Bgra2Gray,
    Rgba2Gray,
    /// R,G,B,A to A,B,G,R. Not provided natively.
    Rgba2Abgr,
    /// A,B,G,R to B,G,R,A. Not provided natively.
    Abgr2Bgra,
    /// A,B,G,R to B,G,R. Not provided natively.
    Abgr2Bgr,
}

enum Plan {
    Remap(&'static [ChannelSource]),
    /// Luma from three color channels, with the index of the red channel.
    Gray { red: u8 },
}

impl ColorConversion {
    pub const RGB2RGBA: Self = Self::Bgr2Bgra;
    pub const RGBA2RGB: Self = Self::Bgra2Bgr;
    pub const RGB2BGRA: Self = Self::Bgr2Rgba;
    pub const BGRA2RGB: Self = Self::Rgba2Bgr;
    pub const RGB2BGR: Self = Self::Bgr2Rgb;
    pub const RGBA2BGRA: Self = Self::Bgra2Rgba;
    pub const GRAY2RGB: Self = Self::Gray2Bgr;
    pub const GRAY2RGBA: Self = Self::Gray2Bgra;

    const ALL: [Self; 15] = [
        Self::Bgr2Bgra,
        Self::Bgra2Bgr,
        Self::Bgr2Rgba,
        Self::Rgba2Bgr,
        Self::Bgr2Rgb,
        Self::Bgra2Rgba,
        Self::Bgr2Gray,
        Self::Rgb2Gray,
        Self::Gray2Bgr,
        Self::Gray2Bgra,
        Self::Bgra2Gray,
        Self::Rgba2Gray,
        Self::Rgba2Abgr,
        Self::Abgr2Bgra,
        Self::Abgr2Bgr,
    ];

    /// Integer code of this conversion.
    pub const fn code(&self) -> i32 {
        use ColorConversion::*;
        match self {
            Bgr2Bgra => 0,
            Bgra2Bgr => 1,
            Bgr2Rgba => 2,
            Rgba2Bgr => 3,
            Bgr2Rgb => 4,
            Bgra2Rgba => 5,
            Bgr2Gray => 6,
            Rgb2Gray => 7,
            Gray2Bgr => 8,
            Gray2Bgra => 9,
            Bgra2Gray => 10,
            Rgba2Gray => 11,
            Rgba2Abgr => 1000,
            Abgr2Bgra => 1001,
            Abgr2Bgr => 1002,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Number of channels the input must have.
    pub const fn input_channels(&self) -> u8 {
        use ColorConversion::*;
        match self {
            Gray2Bgr | Gray2Bgra => 1,
            Bgr2Bgra | Bgr2Rgba | Bgr2Rgb | Bgr2Gray | Rgb2Gray => 3,
            Bgra2Bgr | Rgba2Bgr | Bgra2Rgba | Bgra2Gray | Rgba2Gray | Rgba2Abgr | Abgr2Bgra
            | Abgr2Bgr => 4,
        }
    }

    fn plan(&self) -> Plan {
        use ColorConversion::*;
        match self {
            Bgr2Bgra => Plan::Remap(&[Src(0), Src(1), Src(2), Opaque]),
            Bgra2Bgr => Plan::Remap(&[Src(0), Src(1), Src(2)]),
            Bgr2Rgba => Plan::Remap(&[Src(2), Src(1), Src(0), Opaque]),
            Rgba2Bgr | Bgr2Rgb => Plan::Remap(&[Src(2), Src(1), Src(0)]),
            Bgra2Rgba => Plan::Remap(&[Src(2), Src(1), Src(0), Src(3)]),
            Gray2Bgr => Plan::Remap(&[Src(0), Src(0), Src(0)]),
            Gray2Bgra => Plan::Remap(&[Src(0), Src(0), Src(0), Opaque]),
            Rgba2Abgr => Plan::Remap(&[Src(3), Src(0), Src(1), Src(2)]),
            Abgr2Bgra => Plan::Remap(&[Src(1), Src(2), Src(3), Src(0)]),
            Abgr2Bgr => Plan::Remap(&[Src(1), Src(2), Src(3)]),
            Bgr2Gray | Bgra2Gray => Plan::Gray { red: 2 },
            Rgb2Gray | Rgba2Gray => Plan::Gray { red: 0 },
        }
    }
}

fn opaque(depth: Depth) -> i32 {
    match depth {
        Depth::U8 | Depth::S32 => u8::MAX as i32,
        Depth::U16 => u16::MAX as i32,
    }
}

/// Build a new matrix whose channel `i` is taken from `table[i]`.
///
/// Works on any depth; the result keeps the depth of `src`.
pub fn remap_channels(src: &dyn MatData, table: &[ChannelSource]) -> Result<Mat> {
    let mt = src.mat_type();
    for entry in table {
        if let Src(channel) = *entry {
            if channel >= mt.channels {
                return Err(Error::ChannelOutOfRange {
                    channel,
                    mat_type: mt,
                });
            }
        }
    }
    let out_type = MatType::new(mt.depth, table.len() as u8);
    let mut dest = Mat::zeros(src.rows(), src.cols(), out_type)?;
    let depth = mt.depth;
    let sample_bytes = depth.bytes();
    let fill = opaque(depth);

    for row in 0..src.rows() {
        let src_row = src.row(row);
        let dest_row = dest.row_mut(row);
        for (src_px, dest_px) in izip![
            src_row.chunks_exact(mt.elem_size()),
            dest_row.chunks_exact_mut(out_type.elem_size()),
        ] {
            for (entry, dest_sample) in table.iter().zip(dest_px.chunks_exact_mut(sample_bytes)) {
                match *entry {
                    Src(channel) => {
                        let start = channel as usize * sample_bytes;
                        dest_sample.copy_from_slice(&src_px[start..start + sample_bytes]);
                    }
                    Opaque => depth.write(fill, dest_sample),
                }
            }
        }
    }
    Ok(dest)
}

/// Convert between channel layouts.
pub fn cvt_color(src: &dyn MatData, conversion: ColorConversion) -> Result<Mat> {
    let mt = src.mat_type();
    tracing::trace!("cvt_color {conversion:?} on {mt} {}x{}", src.cols(), src.rows());
    if mt.channels != conversion.input_channels() {
        return Err(Error::UnsupportedConversion {
            conversion,
            mat_type: mt,
        });
    }
    match conversion.plan() {
        Plan::Remap(table) => remap_channels(src, table),
        Plan::Gray { red } => {
            if mt.depth != Depth::U8 {
                return Err(Error::UnsupportedConversion {
                    conversion,
                    mat_type: mt,
                });
            }
            let rgb = if red == 2 {
                remap_channels(src, &[Src(2), Src(1), Src(0)])?
            } else {
                remap_channels(src, &[Src(0), Src(1), Src(2)])?
            };
            let (cols, rows) = (rgb.cols(), rgb.rows());
            let rgb = image::RgbImage::from_raw(cols, rows, rgb.into()).ok_or(
                Error::InvalidBufferSize {
                    expected: cols as usize * rows as usize * 3,
                    actual: 0,
                },
            )?;
            let gray = image::imageops::grayscale(&rgb);
            Ok(Mat::new(rows, cols, MatType::CV_8UC1, gray.into_raw())?)
        }
    }
}

/// Copy one channel into a new single-channel matrix.
pub fn extract_channel(src: &dyn MatData, channel: u8) -> Result<Mat> {
    remap_channels(src, &[Src(channel)])
}

/// Combine a 3 or 4 channel 8 bit color matrix with an alpha plane.
///
/// An existing alpha channel in `color` is replaced. The result is B,G,R,A.
pub fn add_alpha(color: &dyn MatData, alpha: &dyn MatData) -> Result<Mat> {
    if alpha.mat_type() != MatType::CV_8UC1 {
        return Err(Error::AlphaChannelMismatch(alpha.mat_type()));
    }
    let mt = color.mat_type();
    if mt.depth != Depth::U8 || !(3..=4).contains(&mt.channels) {
        return Err(Error::ColorChannelMismatch(mt));
    }
    let mut dest = remap_channels(color, &[Src(0), Src(1), Src(2), Opaque])?;
    merge_alpha(&mut dest, alpha)?;
    Ok(dest)
}

/// Overwrite the last channel of an 8 bit 4 channel matrix with `alpha`.
pub(crate) fn merge_alpha(dest: &mut Mat, alpha: &dyn MatData) -> Result<()> {
    debug_assert_eq!(dest.mat_type(), MatType::CV_8UC4);
    if alpha.size() != dest.size() {
        return Err(Error::SizeMismatch(
            dest.mat_type(),
            dest.cols(),
            dest.rows(),
            alpha.mat_type(),
            alpha.cols(),
            alpha.rows(),
        ));
    }
    for row in 0..dest.rows() {
        let alpha_row = alpha.row(row);
        for (px, a) in izip![dest.row_mut(row).chunks_exact_mut(4), alpha_row] {
            px[3] = *a;
        }
    }
    Ok(())
}
