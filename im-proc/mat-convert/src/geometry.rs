use cv_mat::{Mat, MatData, Point2d, Size};
use image::ImageBuffer;
use imageproc::geometric_transformations::{self as gt, Projection};

use crate::{
    Error, Result, Scalar,
    bridge::{AnyImage, map_any_image, pixel_like},
};

/// A 2x3 affine transform mapping source to destination coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2(pub [[f64; 3]; 2]);

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self([[1.0, 0.0, tx], [0.0, 1.0, ty]])
    }

    /// Map a point.
    pub fn apply(&self, p: Point2d) -> Point2d {
        let [r0, r1] = self.0;
        Point2d::new(
            r0[0] * p.x + r0[1] * p.y + r0[2],
            r1[0] * p.x + r1[1] * p.y + r1[2],
        )
    }

    fn to_projection(self) -> Result<Projection> {
        let [r0, r1] = self.0;
        let m = [
            r0[0] as f32,
            r0[1] as f32,
            r0[2] as f32,
            r1[0] as f32,
            r1[1] as f32,
            r1[2] as f32,
            0.0,
            0.0,
            1.0,
        ];
        Projection::from_matrix(m).ok_or(Error::NonInvertibleTransform)
    }
}

/// Rotation by `angle` degrees about `center`, followed by `scale`.
///
/// Positive angles rotate counter-clockwise on screen (y pointing down).
/// `scale` defaults to 1.
pub fn rotation_matrix_2d(center: Point2d, angle: f64, scale: Option<f64>) -> Affine2 {
    let scale = scale.unwrap_or(1.0);
    let (sin, cos) = angle.to_radians().sin_cos();
    let alpha = scale * cos;
    let beta = scale * sin;
    Affine2([
        [alpha, beta, (1.0 - alpha) * center.x - beta * center.y],
        [-beta, alpha, beta * center.x + (1.0 - alpha) * center.y],
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    Nearest,
    Linear,
    Cubic,
}

impl Interpolation {
    pub const fn code(&self) -> i32 {
        match self {
            Interpolation::Nearest => 0,
            Interpolation::Linear => 1,
            Interpolation::Cubic => 2,
        }
    }
}

impl From<Interpolation> for gt::Interpolation {
    fn from(orig: Interpolation) -> Self {
        match orig {
            Interpolation::Nearest => gt::Interpolation::Nearest,
            Interpolation::Linear => gt::Interpolation::Bilinear,
            Interpolation::Cubic => gt::Interpolation::Bicubic,
        }
    }
}

/// What destination pixels without a source pixel are set to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderMode {
    /// A fixed value, in matrix channel order.
    Constant(Scalar),
    /// Repeat the nearest edge pixel. Not available.
    Replicate,
    /// Leave the destination untouched. The destination is always freshly
    /// allocated, so this leaves zeros.
    Transparent,
}

impl BorderMode {
    pub const fn code(&self) -> i32 {
        match self {
            BorderMode::Constant(_) => 0,
            BorderMode::Replicate => 1,
            BorderMode::Transparent => 5,
        }
    }
}

/// Apply an affine transform to an 8 bit matrix.
///
/// The result has size `dsize`. Destination pixel `p` is sampled from the
/// source at the inverse of `m` applied to `p`.
pub fn warp_affine(
    src: &dyn MatData,
    m: &Affine2,
    dsize: Size,
    interpolation: Interpolation,
    border: BorderMode,
) -> Result<Mat> {
    let fill = match border {
        BorderMode::Constant(value) => value.to_u8(),
        BorderMode::Transparent => [0; 4],
        BorderMode::Replicate => return Err(Error::UnsupportedBorderMode(border)),
    };
    let projection = m.to_projection()?;
    tracing::trace!(
        "warp_affine {}x{} -> {}x{} {interpolation:?}",
        src.cols(),
        src.rows(),
        dsize.width,
        dsize.height
    );
    let img = AnyImage::from_mat(src)?;
    let warped = map_any_image!(img, x, {
        let default = pixel_like(&x, &fill);
        let mut out = ImageBuffer::new(dsize.width, dsize.height);
        gt::warp_into(&x, &projection, interpolation.into(), default, &mut out);
        out
    });
    warped.into_mat()
}
