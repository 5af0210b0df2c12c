use cv_mat::Depth;
use image::DynamicImage;

use crate::{Error, Result};

/// Pixel layout of a [Bitmap].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitmapFormat {
    /// One byte of luminance per pixel.
    ByteGray,
    /// Bytes B,G,R.
    ThreeByteBgr,
    /// Bytes A,B,G,R.
    FourByteAbgr,
    /// One word per pixel, `0x00RRGGBB`.
    IntRgb,
    /// One word per pixel, `0xAARRGGBB`.
    IntArgb,
    /// One word per pixel, `0xAARRGGBB` with color premultiplied by alpha.
    IntArgbPre,
    /// One word per pixel, `0x00BBGGRR`.
    IntBgr,
    Unsupported(UnsupportedFormat),
}

/// Bitmap layouts which can be described but not converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedFormat {
    UshortGray,
    Ushort565Rgb,
    Ushort555Rgb,
    /// One bit per pixel, rows padded to whole bytes.
    ByteBinary,
    ByteIndexed,
    FourByteAbgrPre,
    Custom,
}

/// Element type of a [Raster].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterKind {
    Bytes,
    Shorts,
    Ints,
}

/// Backing storage of a [Bitmap].
#[derive(Clone, PartialEq, Eq)]
pub enum Raster {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Ints(Vec<u32>),
}

impl Raster {
    pub fn kind(&self) -> RasterKind {
        match self {
            Raster::Bytes(_) => RasterKind::Bytes,
            Raster::Shorts(_) => RasterKind::Shorts,
            Raster::Ints(_) => RasterKind::Ints,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Raster::Bytes(v) => v.len(),
            Raster::Shorts(v) => v.len(),
            Raster::Ints(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Raster::{:?}{{len: {}, ..}}", self.kind(), self.len())
    }
}

/// How a supported [BitmapFormat] maps onto matrix channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLayout {
    /// Number of color components per pixel.
    pub channels: u8,
    pub raster: RasterKind,
    /// Raster elements per pixel.
    pub elems_per_pixel: usize,
    /// Depth of the matrix this format converts to.
    pub depth: Depth,
    /// `remap[i]` is the raster component which becomes matrix channel `i`.
    ///
    /// For packed words the components are numbered from the most
    /// significant used byte down.
    pub remap: &'static [usize],
}

impl FormatLayout {
    const fn bytes(channels: u8, remap: &'static [usize]) -> Self {
        Self {
            channels,
            raster: RasterKind::Bytes,
            elems_per_pixel: channels as usize,
            depth: Depth::U8,
            remap,
        }
    }

    const fn ints(channels: u8, remap: &'static [usize]) -> Self {
        Self {
            channels,
            raster: RasterKind::Ints,
            elems_per_pixel: 1,
            depth: Depth::S32,
            remap,
        }
    }

    /// Bit shift of each packed component, most significant first.
    pub(crate) fn shifts(&self) -> &'static [u32] {
        match self.channels {
            4 => &[24, 16, 8, 0],
            _ => &[16, 8, 0],
        }
    }
}

impl BitmapFormat {
    /// Describe the layout, or fail for unsupported formats.
    pub fn layout(&self) -> Result<FormatLayout> {
        use BitmapFormat::*;
        let layout = match self {
            ByteGray => FormatLayout::bytes(1, &[0]),
            ThreeByteBgr => FormatLayout::bytes(3, &[0, 1, 2]),
            // A,B,G,R -> B,G,R,A
            FourByteAbgr => FormatLayout::bytes(4, &[1, 2, 3, 0]),
            // R,G,B -> B,G,R
            IntRgb => FormatLayout::ints(3, &[2, 1, 0]),
            IntBgr => FormatLayout::ints(3, &[0, 1, 2]),
            // A,R,G,B -> B,G,R,A
            IntArgb | IntArgbPre => FormatLayout::ints(4, &[3, 2, 1, 0]),
            Unsupported(_) => return Err(Error::UnsupportedFormat(*self)),
        };
        Ok(layout)
    }

    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            BitmapFormat::FourByteAbgr
                | BitmapFormat::IntArgb
                | BitmapFormat::IntArgbPre
                | BitmapFormat::Unsupported(UnsupportedFormat::FourByteAbgrPre)
        )
    }

    /// Expected raster kind and element count, if known.
    fn raster_shape(&self, width: u32, height: u32) -> Option<(RasterKind, usize)> {
        use UnsupportedFormat::*;
        let pixels = width as usize * height as usize;
        match self {
            BitmapFormat::Unsupported(u) => match u {
                UshortGray | Ushort565Rgb | Ushort555Rgb => Some((RasterKind::Shorts, pixels)),
                ByteBinary => Some((
                    RasterKind::Bytes,
                    (width as usize).div_ceil(8) * height as usize,
                )),
                ByteIndexed => Some((RasterKind::Bytes, pixels)),
                FourByteAbgrPre => Some((RasterKind::Bytes, pixels * 4)),
                Custom => None,
            },
            supported => {
                let layout = supported.layout().ok()?;
                Some((layout.raster, pixels * layout.elems_per_pixel))
            }
        }
    }
}

/// A platform bitmap: a pixel buffer tagged with its [BitmapFormat].
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: BitmapFormat,
    raster: Raster,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bitmap{{{:?}, {}x{}, ..}}",
            self.format, self.width, self.height
        )
    }
}

impl Bitmap {
    /// Wrap `raster`, checking its kind and length against `format`.
    pub fn new(width: u32, height: u32, format: BitmapFormat, raster: Raster) -> Result<Self> {
        if let Some((kind, len)) = format.raster_shape(width, height) {
            if raster.kind() != kind || raster.len() != len {
                return Err(Error::InvalidRaster {
                    format,
                    width,
                    height,
                });
            }
        }
        Ok(Self {
            width,
            height,
            format,
            raster,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn into_raster(self) -> Raster {
        self.raster
    }

    /// The raster as bytes, if this is a byte format.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.raster {
            Raster::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The raster as packed words, if this is an int format.
    pub fn ints(&self) -> Option<&[u32]> {
        match &self.raster {
            Raster::Ints(w) => Some(w),
            _ => None,
        }
    }

    /// Pixel at (`x`, `y`) packed as `0xAARRGGBB`, not premultiplied.
    ///
    /// Formats without alpha report the pixel as opaque.
    pub fn argb(&self, x: u32, y: u32) -> Result<u32> {
        if x >= self.width || y >= self.height {
            return Err(Error::PixelOutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let layout = self.format.layout()?;
        let idx = (y as usize * self.width as usize + x as usize) * layout.elems_per_pixel;
        let pack = |a: u32, r: u32, g: u32, b: u32| (a << 24) | (r << 16) | (g << 8) | b;
        let value = match (&self.raster, self.format) {
            (Raster::Bytes(b), BitmapFormat::ByteGray) => {
                let v = b[idx] as u32;
                pack(0xFF, v, v, v)
            }
            (Raster::Bytes(b), BitmapFormat::ThreeByteBgr) => {
                pack(0xFF, b[idx + 2] as u32, b[idx + 1] as u32, b[idx] as u32)
            }
            (Raster::Bytes(b), BitmapFormat::FourByteAbgr) => pack(
                b[idx] as u32,
                b[idx + 3] as u32,
                b[idx + 2] as u32,
                b[idx + 1] as u32,
            ),
            (Raster::Ints(w), BitmapFormat::IntRgb) => 0xFF00_0000 | (w[idx] & 0x00FF_FFFF),
            (Raster::Ints(w), BitmapFormat::IntArgb) => w[idx],
            (Raster::Ints(w), BitmapFormat::IntArgbPre) => unpremultiply(w[idx]),
            (Raster::Ints(w), BitmapFormat::IntBgr) => {
                let v = w[idx];
                pack(0xFF, v & 0xFF, (v >> 8) & 0xFF, (v >> 16) & 0xFF)
            }
            _ => {
                return Err(Error::InvalidRaster {
                    format: self.format,
                    width: self.width,
                    height: self.height,
                });
            }
        };
        Ok(value)
    }

    /// True if the pixel at (`x`, `y`) has zero alpha.
    pub fn is_transparent(&self, x: u32, y: u32) -> Result<bool> {
        Ok(self.argb(x, y)? >> 24 == 0)
    }

    /// Copy into an `image` crate buffer in R,G,B(,A) order.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let invalid = || Error::InvalidBufferSize {
            expected: w as usize * h as usize,
            actual: self.raster.len(),
        };
        let img = match (&self.raster, self.format) {
            (Raster::Bytes(b), BitmapFormat::ByteGray) => {
                DynamicImage::ImageLuma8(image::GrayImage::from_raw(w, h, b.clone()).ok_or_else(invalid)?)
            }
            (Raster::Bytes(b), BitmapFormat::ThreeByteBgr) => {
                let rgb = b.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect();
                DynamicImage::ImageRgb8(image::RgbImage::from_raw(w, h, rgb).ok_or_else(invalid)?)
            }
            (Raster::Bytes(b), BitmapFormat::FourByteAbgr) => {
                let rgba = b
                    .chunks_exact(4)
                    .flat_map(|p| [p[3], p[2], p[1], p[0]])
                    .collect();
                DynamicImage::ImageRgba8(image::RgbaImage::from_raw(w, h, rgba).ok_or_else(invalid)?)
            }
            (Raster::Ints(_), format) => {
                let layout = format.layout()?;
                let mut data = Vec::with_capacity(self.raster.len() * layout.channels as usize);
                for y in 0..h {
                    for x in 0..w {
                        let [a, r, g, b] = self.argb(x, y)?.to_be_bytes();
                        data.extend_from_slice(&[r, g, b]);
                        if layout.channels == 4 {
                            data.push(a);
                        }
                    }
                }
                if layout.channels == 4 {
                    DynamicImage::ImageRgba8(image::RgbaImage::from_raw(w, h, data).ok_or_else(invalid)?)
                } else {
                    DynamicImage::ImageRgb8(image::RgbImage::from_raw(w, h, data).ok_or_else(invalid)?)
                }
            }
            (_, format) => return Err(Error::UnsupportedFormat(format)),
        };
        Ok(img)
    }

    /// Copy from an `image` crate buffer.
    ///
    /// Gray images become [BitmapFormat::ByteGray], images with alpha
    /// [BitmapFormat::FourByteAbgr] and everything else
    /// [BitmapFormat::ThreeByteBgr]. Deeper samples are narrowed to 8 bit.
    pub fn from_dynamic_image(img: &DynamicImage) -> Result<Self> {
        let (w, h) = (img.width(), img.height());
        let color = img.color();
        let (format, bytes) = if color.channel_count() == 1 {
            (BitmapFormat::ByteGray, img.to_luma8().into_raw())
        } else if color.has_alpha() {
            let abgr = img
                .to_rgba8()
                .into_raw()
                .chunks_exact(4)
                .flat_map(|p| [p[3], p[2], p[1], p[0]])
                .collect();
            (BitmapFormat::FourByteAbgr, abgr)
        } else {
            let bgr = img
                .to_rgb8()
                .into_raw()
                .chunks_exact(3)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();
            (BitmapFormat::ThreeByteBgr, bgr)
        };
        Self::new(w, h, format, Raster::Bytes(bytes))
    }
}

fn unpremultiply(argb: u32) -> u32 {
    let a = argb >> 24;
    if a == 0 || a == 0xFF {
        return argb;
    }
    let scale = |c: u32| ((c * 255 + a / 2) / a).min(255);
    let r = scale((argb >> 16) & 0xFF);
    let g = scale((argb >> 8) & 0xFF);
    let b = scale(argb & 0xFF);
    (a << 24) | (r << 16) | (g << 8) | b
}
