//! Native pixel matrix.
//!
//! A [Mat] is a rectangular grid of interleaved samples with a channel count
//! (1 to 4) and a sample [Depth]. Color matrices store their channels in
//! B,G,R(,A) order. Multi-byte samples are stored native-endian.
//!
//! A [MatView] is a borrowed rectangular region of another matrix, with its
//! own stride. Both implement [MatData], which is what all consumers accept.

use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },
    #[error("invalid channel count {0}, must be 1 to 4")]
    InvalidChannelCount(usize),
    #[error("region {region} out of bounds for {cols}x{rows} matrix")]
    RegionOutOfBounds { region: Rect, cols: u32, rows: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Sample depth of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// 8 bit unsigned
    U8,
    /// 16 bit unsigned
    U16,
    /// 32 bit signed, used for packed-integer bitmap interop
    S32,
}

impl Depth {
    /// Number of bytes per sample.
    pub const fn bytes(&self) -> usize {
        match self {
            Depth::U8 => 1,
            Depth::U16 => 2,
            Depth::S32 => 4,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Depth::U8 => "8U",
            Depth::U16 => "16U",
            Depth::S32 => "32S",
        }
    }

    /// Read one sample from the start of `buf`.
    ///
    /// Panics if `buf` is shorter than [Self::bytes].
    #[inline]
    pub fn read(&self, buf: &[u8]) -> i32 {
        match self {
            Depth::U8 => buf[0] as i32,
            Depth::U16 => u16::from_ne_bytes([buf[0], buf[1]]) as i32,
            Depth::S32 => i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
        }
    }

    /// Write one sample to the start of `buf`, saturating to the range of
    /// this depth.
    #[inline]
    pub fn write(&self, value: i32, buf: &mut [u8]) {
        match self {
            Depth::U8 => buf[0] = value.clamp(0, u8::MAX as i32) as u8,
            Depth::U16 => {
                let v = value.clamp(0, u16::MAX as i32) as u16;
                buf[..2].copy_from_slice(&v.to_ne_bytes());
            }
            Depth::S32 => buf[..4].copy_from_slice(&value.to_ne_bytes()),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Depth and channel count of a matrix, e.g. `CV_8UC3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatType {
    pub depth: Depth,
    pub channels: u8,
}

impl MatType {
    pub const CV_8UC1: MatType = MatType::new(Depth::U8, 1);
    pub const CV_8UC2: MatType = MatType::new(Depth::U8, 2);
    pub const CV_8UC3: MatType = MatType::new(Depth::U8, 3);
    pub const CV_8UC4: MatType = MatType::new(Depth::U8, 4);
    pub const CV_16UC1: MatType = MatType::new(Depth::U16, 1);
    pub const CV_16UC3: MatType = MatType::new(Depth::U16, 3);
    pub const CV_16UC4: MatType = MatType::new(Depth::U16, 4);
    pub const CV_32SC1: MatType = MatType::new(Depth::S32, 1);
    pub const CV_32SC3: MatType = MatType::new(Depth::S32, 3);
    pub const CV_32SC4: MatType = MatType::new(Depth::S32, 4);

    pub const fn new(depth: Depth, channels: u8) -> Self {
        Self { depth, channels }
    }

    /// Number of bytes per pixel.
    pub const fn elem_size(&self) -> usize {
        self.depth.bytes() * self.channels as usize
    }

    fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.channels) {
            return Err(Error::InvalidChannelCount(self.channels as usize));
        }
        Ok(())
    }
}

impl fmt::Display for MatType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CV_{}C{}", self.depth, self.channels)
    }
}

/// Integer pixel location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Sub-pixel location.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle spanned by two corner points, in any order.
    ///
    /// `p2` is exclusive: `from_points((2, 2), (6, 6))` is 4x4.
    pub fn from_points(p1: Point, p2: Point) -> Self {
        let x = p1.x.min(p2.x);
        let y = p1.y.min(p2.y);
        Self {
            x,
            y,
            width: p1.x.max(p2.x) - x,
            height: p1.y.max(p2.y) - y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True if the rectangle is non-empty and lies fully inside a
    /// `cols` x `rows` matrix.
    pub fn is_inside(&self, cols: u32, rows: u32) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= cols as i64
            && self.y as i64 + self.height as i64 <= rows as i64
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

// ------------------------------- traits ----------------------

/// A matrix whose rows are a stride apart.
pub trait MatData {
    /// Number of pixel rows.
    fn rows(&self) -> u32;
    /// Number of pixel columns. Note: this is not the stride.
    fn cols(&self) -> u32;
    fn mat_type(&self) -> MatType;
    /// Number of bytes between the starts of successive rows.
    fn stride(&self) -> usize;
    /// Raw sample bytes, starting at the first pixel of the first row.
    fn data(&self) -> &[u8];

    fn channels(&self) -> u8 {
        self.mat_type().channels
    }

    fn depth(&self) -> Depth {
        self.mat_type().depth
    }

    fn size(&self) -> Size {
        Size::new(self.cols(), self.rows())
    }

    /// Number of pixels.
    fn total(&self) -> usize {
        self.rows() as usize * self.cols() as usize
    }

    /// Number of valid bytes in each row.
    fn row_bytes(&self) -> usize {
        self.cols() as usize * self.mat_type().elem_size()
    }

    fn is_packed(&self) -> bool {
        self.stride() == self.row_bytes()
    }

    /// The valid bytes of row `row`.
    fn row(&self, row: u32) -> &[u8] {
        let start = row as usize * self.stride();
        &self.data()[start..start + self.row_bytes()]
    }

    /// Read one sample, whatever the depth.
    fn sample(&self, row: u32, col: u32, channel: u8) -> i32 {
        let mt = self.mat_type();
        let off = col as usize * mt.elem_size() + channel as usize * mt.depth.bytes();
        mt.depth.read(&self.row(row)[off..])
    }

    /// Borrow a rectangular region.
    fn roi(&self, region: Rect) -> Result<MatView<'_>> {
        if !region.is_inside(self.cols(), self.rows()) {
            return Err(Error::RegionOutOfBounds {
                region,
                cols: self.cols(),
                rows: self.rows(),
            });
        }
        let mt = self.mat_type();
        let start = region.y as usize * self.stride() + region.x as usize * mt.elem_size();
        let end = (region.y + region.height - 1) as usize * self.stride()
            + (region.x + region.width) as usize * mt.elem_size();
        Ok(MatView {
            rows: region.height as u32,
            cols: region.width as u32,
            mat_type: mt,
            stride: self.stride(),
            data: &self.data()[start..end],
        })
    }

    /// Copy into a new packed matrix.
    fn to_mat(&self) -> Mat {
        let mut data = Vec::with_capacity(self.rows() as usize * self.row_bytes());
        for row in 0..self.rows() {
            data.extend_from_slice(self.row(row));
        }
        Mat {
            rows: self.rows(),
            cols: self.cols(),
            mat_type: self.mat_type(),
            data,
        }
    }
}

// ------------------------------- Mat ----------------------

/// An owned, packed matrix.
///
/// The sample buffer is released when the value is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Mat {
    rows: u32,
    cols: u32,
    mat_type: MatType,
    data: Vec<u8>,
}

fn _test_mat_is_send_sync() {
    // Compile-time test to ensure Mat implements Send and Sync.
    fn implements<T: Send + Sync>() {}
    implements::<Mat>();
}

impl fmt::Debug for Mat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mat{{{}, {}x{}, ..}}", self.mat_type, self.cols, self.rows)
    }
}

impl Mat {
    /// Move `data` into a new matrix.
    ///
    /// The buffer must be packed: `rows * cols * elem_size` bytes exactly.
    pub fn new(rows: u32, cols: u32, mat_type: MatType, data: Vec<u8>) -> Result<Self> {
        mat_type.validate()?;
        let expected = rows as usize * cols as usize * mat_type.elem_size();
        if data.len() != expected {
            return Err(Error::InvalidBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            mat_type,
            data,
        })
    }

    /// Allocate a matrix filled with zeros.
    pub fn zeros(rows: u32, cols: u32, mat_type: MatType) -> Result<Self> {
        mat_type.validate()?;
        let data = vec![0u8; rows as usize * cols as usize * mat_type.elem_size()];
        Ok(Self {
            rows,
            cols,
            mat_type,
            data,
        })
    }

    /// Allocate a matrix with every pixel set to `pixel`.
    ///
    /// The channel count is `pixel.len()`. Values saturate to `depth`.
    pub fn filled(rows: u32, cols: u32, depth: Depth, pixel: &[i32]) -> Result<Self> {
        let mat_type = MatType::new(depth, pixel.len() as u8);
        if pixel.len() > 4 {
            return Err(Error::InvalidChannelCount(pixel.len()));
        }
        let mut mat = Self::zeros(rows, cols, mat_type)?;
        let mut encoded = vec![0u8; mat_type.elem_size()];
        for (chunk, value) in encoded.chunks_exact_mut(depth.bytes()).zip(pixel) {
            depth.write(*value, chunk);
        }
        for dest in mat.data.chunks_exact_mut(mat_type.elem_size()) {
            dest.copy_from_slice(&encoded);
        }
        Ok(mat)
    }

    /// Build a matrix from one `i32` per sample, saturating to `mat_type`.
    pub fn from_samples(rows: u32, cols: u32, mat_type: MatType, samples: &[i32]) -> Result<Self> {
        let mut mat = Self::zeros(rows, cols, mat_type)?;
        let n = mat.total() * mat_type.channels as usize;
        if samples.len() != n {
            return Err(Error::InvalidBufferSize {
                expected: n * mat_type.depth.bytes(),
                actual: samples.len() * mat_type.depth.bytes(),
            });
        }
        let depth = mat_type.depth;
        for (dest, value) in mat.data.chunks_exact_mut(depth.bytes()).zip(samples) {
            depth.write(*value, dest);
        }
        Ok(mat)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn row_mut(&mut self, row: u32) -> &mut [u8] {
        let n = self.row_bytes();
        let start = row as usize * n;
        &mut self.data[start..start + n]
    }

    /// Write one sample, saturating to the matrix depth.
    pub fn set_sample(&mut self, row: u32, col: u32, channel: u8, value: i32) {
        let mt = self.mat_type;
        let off = col as usize * mt.elem_size() + channel as usize * mt.depth.bytes();
        mt.depth.write(value, &mut self.row_mut(row)[off..]);
    }

    /// Borrow the whole matrix as a view.
    pub fn view(&self) -> MatView<'_> {
        MatView {
            rows: self.rows,
            cols: self.cols,
            mat_type: self.mat_type,
            stride: self.row_bytes(),
            data: &self.data,
        }
    }

    /// Reinterpret the sample buffer with a different shape, without copying.
    pub fn reshape(self, rows: u32, cols: u32, mat_type: MatType) -> Result<Self> {
        Self::new(rows, cols, mat_type, self.data)
    }
}

impl MatData for Mat {
    fn rows(&self) -> u32 {
        self.rows
    }
    fn cols(&self) -> u32 {
        self.cols
    }
    fn mat_type(&self) -> MatType {
        self.mat_type
    }
    fn stride(&self) -> usize {
        self.row_bytes()
    }
    fn data(&self) -> &[u8] {
        &self.data
    }
    fn to_mat(&self) -> Mat {
        self.clone()
    }
}

impl From<Mat> for Vec<u8> {
    fn from(orig: Mat) -> Vec<u8> {
        orig.data
    }
}

// ------------------------------- MatView ----------------------

/// A borrowed rectangular region of a matrix.
#[derive(Clone, Copy)]
pub struct MatView<'a> {
    rows: u32,
    cols: u32,
    mat_type: MatType,
    stride: usize,
    data: &'a [u8],
}

impl fmt::Debug for MatView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatView{{{}, {}x{}, stride {}, ..}}",
            self.mat_type, self.cols, self.rows, self.stride
        )
    }
}

impl MatData for MatView<'_> {
    fn rows(&self) -> u32 {
        self.rows
    }
    fn cols(&self) -> u32 {
        self.cols
    }
    fn mat_type(&self) -> MatType {
        self.mat_type
    }
    fn stride(&self) -> usize {
        self.stride
    }
    fn data(&self) -> &[u8] {
        self.data
    }
}
