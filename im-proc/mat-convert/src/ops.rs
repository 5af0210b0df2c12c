use std::collections::VecDeque;

use cv_mat::{Mat, MatData, MatType, Point};
use itertools::izip;

use crate::{Error, Result, check_same_shape};

/// Up to four per-channel values, in matrix channel order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scalar(pub [f64; 4]);

impl Scalar {
    pub const fn new(v0: f64, v1: f64, v2: f64, v3: f64) -> Self {
        Self([v0, v1, v2, v3])
    }

    pub const fn all(v: f64) -> Self {
        Self([v; 4])
    }

    /// Leading `n` values, rounded to integers.
    pub(crate) fn to_i32(self, n: u8) -> Vec<i32> {
        self.0[..n as usize]
            .iter()
            .map(|v| v.round() as i32)
            .collect()
    }

    /// All four values saturated to 8 bit.
    pub(crate) fn to_u8(self) -> [u8; 4] {
        self.0.map(|v| v.round().clamp(0.0, 255.0) as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdType {
    /// `max_value` above the threshold, else zero.
    Binary,
    /// Zero above the threshold, else `max_value`.
    BinaryInv,
    /// The threshold above the threshold, else unchanged.
    Trunc,
    /// Unchanged above the threshold, else zero.
    ToZero,
    /// Zero above the threshold, else unchanged.
    ToZeroInv,
}

impl ThresholdType {
    pub const fn code(&self) -> i32 {
        match self {
            ThresholdType::Binary => 0,
            ThresholdType::BinaryInv => 1,
            ThresholdType::Trunc => 2,
            ThresholdType::ToZero => 3,
            ThresholdType::ToZeroInv => 4,
        }
    }

    fn apply(&self, value: f64, thresh: f64, max_value: f64) -> f64 {
        let above = value > thresh;
        match (self, above) {
            (ThresholdType::Binary, true) | (ThresholdType::BinaryInv, false) => max_value,
            (ThresholdType::Binary, false) | (ThresholdType::BinaryInv, true) => 0.0,
            (ThresholdType::Trunc, true) => thresh,
            (ThresholdType::ToZero, true) | (ThresholdType::ToZeroInv, false) => value,
            (ThresholdType::ToZero, false) | (ThresholdType::ToZeroInv, true) => 0.0,
            (ThresholdType::Trunc, false) => value,
        }
    }
}

/// Compare every sample against `thresh`.
pub fn threshold(
    src: &dyn MatData,
    thresh: f64,
    max_value: f64,
    kind: ThresholdType,
) -> Result<Mat> {
    let mt = src.mat_type();
    tracing::trace!("threshold {kind:?} at {thresh} on {mt}");
    let depth = mt.depth;
    let mut dest = Mat::zeros(src.rows(), src.cols(), mt)?;
    for row in 0..src.rows() {
        for (src_sample, dest_sample) in izip![
            src.row(row).chunks_exact(depth.bytes()),
            dest.row_mut(row).chunks_exact_mut(depth.bytes()),
        ] {
            let v = kind.apply(depth.read(src_sample) as f64, thresh, max_value);
            depth.write(v.round() as i32, dest_sample);
        }
    }
    Ok(dest)
}

/// Invert every bit.
pub fn bitwise_not(src: &dyn MatData) -> Result<Mat> {
    let mut dest = src.to_mat();
    for b in dest.data_mut() {
        *b = !*b;
    }
    Ok(dest)
}

/// Bitwise OR of two matrices of the same type and size.
pub fn bitwise_or(a: &dyn MatData, b: &dyn MatData) -> Result<Mat> {
    check_same_shape(a, b)?;
    let mut dest = a.to_mat();
    for row in 0..dest.rows() {
        for (d, s) in izip![dest.row_mut(row), b.row(row)] {
            *d |= *s;
        }
    }
    Ok(dest)
}

/// Deep copy into a new packed matrix.
pub fn copy(src: &dyn MatData) -> Mat {
    src.to_mat()
}

/// Fill the 4-connected region of pixels equal to the pixel at `seed`.
///
/// If `mask` is given it must be `CV_8UC1` and two pixels larger than `img`
/// in each direction; mask pixel (`x + 1`, `y + 1`) covers image pixel
/// (`x`, `y`). Non-zero mask pixels stop the fill and filled pixels are set
/// to 1 in the mask.
///
/// Returns the number of pixels filled.
pub fn flood_fill(
    img: &mut Mat,
    mut mask: Option<&mut Mat>,
    seed: Point,
    new_value: Scalar,
) -> Result<usize> {
    let (cols, rows) = (img.cols(), img.rows());
    if seed.x < 0 || seed.y < 0 || seed.x as u32 >= cols || seed.y as u32 >= rows {
        return Err(Error::SeedOutOfBounds(seed));
    }
    if let Some(m) = mask.as_deref() {
        if m.mat_type() != MatType::CV_8UC1 || m.cols() != cols + 2 || m.rows() != rows + 2 {
            return Err(Error::SizeMismatch(
                m.mat_type(),
                m.cols(),
                m.rows(),
                MatType::CV_8UC1,
                cols + 2,
                rows + 2,
            ));
        }
    }

    let mt = img.mat_type();
    let elem = mt.elem_size();
    let mut fill = vec![0u8; elem];
    for (value, dest) in izip![
        new_value.to_i32(mt.channels),
        fill.chunks_exact_mut(mt.depth.bytes())
    ] {
        mt.depth.write(value, dest);
    }
    let (sx, sy) = (seed.x as u32, seed.y as u32);
    let start = sx as usize * elem;
    let target = img.row(sy)[start..start + elem].to_vec();
    if target == fill && mask.is_none() {
        return Ok(0);
    }

    let blocked = |mask: &Option<&mut Mat>, x: u32, y: u32| match mask {
        Some(m) => m.row(y + 1)[x as usize + 1] != 0,
        None => false,
    };

    let mut visited = vec![false; cols as usize * rows as usize];
    let mut queue = VecDeque::new();
    queue.push_back((sx, sy));
    visited[sy as usize * cols as usize + sx as usize] = true;
    let mut area = 0;
    while let Some((x, y)) = queue.pop_front() {
        let off = x as usize * elem;
        if blocked(&mask, x, y) || img.row(y)[off..off + elem] != target[..] {
            continue;
        }
        img.row_mut(y)[off..off + elem].copy_from_slice(&fill);
        if let Some(m) = mask.as_deref_mut() {
            m.row_mut(y + 1)[x as usize + 1] = 1;
        }
        area += 1;

        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1).filter(|v| *v < cols), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1).filter(|v| *v < rows)),
        ];
        for (nx, ny) in neighbours {
            if let (Some(nx), Some(ny)) = (nx, ny) {
                let idx = ny as usize * cols as usize + nx as usize;
                if !visited[idx] {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }
    tracing::trace!("flood_fill from {seed:?} filled {area} pixels");
    Ok(area)
}
