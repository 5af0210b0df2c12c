use image::{
    ColorType, DynamicImage, ImageDecoder, ImageError, ImageResult,
    error::{ParameterError, ParameterErrorKind},
};
use mat_convert::{MatData, mat_to_dynamic_image};

use crate::Result;

/// A matrix as an `image` crate decoder.
///
/// Samples are delivered in R,G,B(,A) order. 16 bit matrices decode as 16
/// bit images.
pub struct MatImageDecoder {
    img: DynamicImage,
}

impl std::fmt::Debug for MatImageDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MatImageDecoder{{{:?}, {}x{}, ..}}",
            self.img.color(),
            self.img.width(),
            self.img.height()
        )
    }
}

impl MatImageDecoder {
    pub fn new(src: &dyn MatData) -> Result<Self> {
        Ok(Self {
            img: mat_to_dynamic_image(src)?,
        })
    }
}

impl ImageDecoder for MatImageDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.img.width(), self.img.height())
    }

    fn color_type(&self) -> ColorType {
        self.img.color()
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        let bytes = self.img.as_bytes();
        if buf.len() != bytes.len() {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mat_convert::{Depth, Mat};

    #[test]
    fn decodes_through_image_crate() {
        let m = Mat::filled(3, 2, Depth::U8, &[1, 2, 3]).unwrap();
        let decoder = MatImageDecoder::new(&m).unwrap();
        assert_eq!(decoder.dimensions(), (2, 3));
        assert_eq!(decoder.color_type(), ColorType::Rgb8);
        let img = DynamicImage::from_decoder(decoder).unwrap();
        assert_eq!(img.as_rgb8().unwrap().get_pixel(1, 2).0, [3, 2, 1]);
    }

    #[test]
    fn sixteen_bit() {
        let m = Mat::filled(1, 1, Depth::U16, &[500]).unwrap();
        let decoder = MatImageDecoder::new(&m).unwrap();
        assert_eq!(decoder.color_type(), ColorType::L16);
        let img = DynamicImage::from_decoder(decoder).unwrap();
        assert_eq!(img.as_luma16().unwrap().get_pixel(0, 0).0, [500]);
    }

    #[test]
    fn wrong_buffer_length() {
        let m = Mat::zeros(2, 2, mat_convert::cv_mat::MatType::CV_8UC1).unwrap();
        let decoder = MatImageDecoder::new(&m).unwrap();
        let mut buf = vec![0; 3];
        assert!(decoder.read_image(&mut buf).is_err());
    }
}
