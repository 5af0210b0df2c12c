use std::io::{BufRead, BufReader, Cursor, Read, Seek};
use std::path::Path;

use cv_mat::{Mat, MatData};
use image::{DynamicImage, codecs::png::PngEncoder};

use crate::{Result, Toolkit, convert::dynamic_image_to_mat, mat_to_dynamic_image};

/// How decoded images are turned into matrices.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Keep the decoded channel count and 8 or 16 bit depth.
    #[default]
    Unchanged,
    /// Always produce an 8 bit B,G,R matrix.
    Color,
}

impl Toolkit {
    fn decode<R: BufRead + Seek>(&self, reader: image::ImageReader<R>, mode: LoadMode) -> Result<Mat> {
        let mut reader = reader.with_guessed_format()?;
        reader.limits(self.config().limits());
        tracing::debug!("decoding {:?} image", reader.format());
        let img = reader.decode()?;
        tracing::debug!(
            "decoded {}x{} {:?}",
            img.width(),
            img.height(),
            img.color()
        );
        dynamic_image_to_mat(img, mode)
    }

    /// Decode an image file. The format is guessed from the content.
    pub fn load_image<P: AsRef<Path>>(&self, path: P, mode: LoadMode) -> Result<Mat> {
        let path = path.as_ref();
        tracing::debug!("loading {}", path.display());
        let file = std::fs::File::open(path)?;
        self.decode(image::ImageReader::new(BufReader::new(file)), mode)
    }

    /// Decode an image from a stream.
    pub fn load_image_from_reader<R: Read + Seek>(&self, reader: R, mode: LoadMode) -> Result<Mat> {
        self.decode(image::ImageReader::new(BufReader::new(reader)), mode)
    }

    /// Decode an image held in memory.
    pub fn load_image_from_memory(&self, buf: &[u8], mode: LoadMode) -> Result<Mat> {
        self.decode(image::ImageReader::new(Cursor::new(buf)), mode)
    }

    /// Encode a matrix to a file, choosing the format from the extension.
    pub fn save_image<P: AsRef<Path>>(&self, src: &dyn MatData, path: P) -> Result<()> {
        let path = path.as_ref();
        tracing::debug!(
            "saving {} {}x{} to {}",
            src.mat_type(),
            src.cols(),
            src.rows(),
            path.display()
        );
        mat_to_dynamic_image(src)?.save(path)?;
        Ok(())
    }

    /// Encode a matrix as PNG.
    pub fn encode_png(&self, src: &dyn MatData) -> Result<Vec<u8>> {
        self.encode_png_image(&mat_to_dynamic_image(src)?)
    }

    /// Encode an `image` crate buffer as PNG with the configured compression.
    pub fn encode_png_image(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buf,
            self.config().png_compression.into(),
            image::codecs::png::FilterType::Adaptive,
        );
        img.write_with_encoder(encoder)?;
        tracing::trace!("encoded {} PNG bytes", buf.len());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Error};
    use cv_mat::{Depth, MatType};
    use test_log::test;

    fn toolkit() -> Toolkit {
        Toolkit::init(Config::default()).unwrap()
    }

    #[test]
    fn png_in_memory() {
        let tk = toolkit();
        let m = Mat::filled(4, 5, Depth::U8, &[10, 20, 30, 40]).unwrap();
        let png = tk.encode_png(&m).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let back = tk.load_image_from_memory(&png, LoadMode::Unchanged).unwrap();
        assert_eq!(back, m);

        let color = tk.load_image_from_memory(&png, LoadMode::Color).unwrap();
        assert_eq!(color.mat_type(), MatType::CV_8UC3);
        assert_eq!(&color.row(0)[..3], &[10, 20, 30]);
    }

    #[test]
    fn limits_are_applied() {
        let tk = Toolkit::init(Config {
            max_image_width: Some(2),
            ..Default::default()
        })
        .unwrap();
        let m = Mat::zeros(1, 3, MatType::CV_8UC1).unwrap();
        let png = tk.encode_png(&m).unwrap();
        assert!(matches!(
            tk.load_image_from_memory(&png, LoadMode::Unchanged),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        let tk = toolkit();
        assert!(tk
            .load_image_from_memory(b"not an image", LoadMode::Unchanged)
            .is_err());
    }
}
