//! A single in-memory matrix behind a generic image reader interface.
//!
//! [MatImageReader] holds at most one image. Generic client code drives it
//! through the [ImageReader] trait, discovers it through
//! [MatImageReaderProvider], or decodes it with the `image` crate through
//! [MatImageDecoder].

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use mat_convert::{
    Bitmap, BitmapFormat, LoadMode, Mat, MatData, MatToBitmap, Rect, Toolkit, crop, mat_to_bitmap,
};

mod decoder;

pub use decoder::MatImageDecoder;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("image index {0} out of range, only index 0 is available")]
    IndexOutOfRange(usize),
    #[error("no image available")]
    NoImage,
    #[error("{0} is not supported")]
    UnsupportedOperation(&'static str),
    #[error("{0}")]
    Convert(#[from] mat_convert::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Image-level metadata entries.
pub type Metadata = BTreeMap<String, String>;

/// Options for a single [ImageReader::read] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadParam {
    /// Read only this region of the image.
    pub source_region: Option<Rect>,
    /// Drop any alpha channel.
    pub remove_alpha: bool,
}

/// Sequential access to the images of one source.
pub trait ImageReader {
    /// Number of images. `allow_search` permits scanning the whole source
    /// to find out.
    fn num_images(&self, allow_search: bool) -> Result<usize>;
    fn width(&self, index: usize) -> Result<u32>;
    fn height(&self, index: usize) -> Result<u32>;
    /// Bitmap formats image `index` can be read as.
    fn image_types(&self, index: usize) -> Result<Vec<BitmapFormat>>;
    fn stream_metadata(&self) -> Result<Metadata>;
    fn image_metadata(&self, index: usize) -> Result<Metadata>;
    fn read(&self, index: usize, param: Option<&ReadParam>) -> Result<Bitmap>;
}

/// Reader over one pre-loaded matrix.
#[derive(Debug, Default, Clone)]
pub struct MatImageReader {
    identifier: Option<String>,
    mat: Option<Mat>,
}

impl MatImageReader {
    /// A reader without an image, as created by [MatImageReaderProvider].
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(mat: Mat) -> Self {
        Self {
            identifier: None,
            mat: Some(mat),
        }
    }

    pub fn with_identifier(identifier: impl Into<String>, mat: Mat) -> Self {
        Self {
            identifier: Some(identifier.into()),
            mat: Some(mat),
        }
    }

    /// Decode an encoded image from `reader`.
    pub fn from_reader<R: Read + Seek>(
        identifier: impl Into<String>,
        reader: R,
        toolkit: &Toolkit,
    ) -> Result<Self> {
        let identifier = identifier.into();
        tracing::debug!("decoding {identifier}");
        let mat = toolkit.load_image_from_reader(reader, LoadMode::Unchanged)?;
        Ok(Self::with_identifier(identifier, mat))
    }

    /// Decode an image file. The path becomes the identifier.
    pub fn from_path<P: AsRef<Path>>(path: P, toolkit: &Toolkit) -> Result<Self> {
        let path = path.as_ref();
        let mat = toolkit.load_image(path, LoadMode::Unchanged)?;
        Ok(Self::with_identifier(path.display().to_string(), mat))
    }

    /// Replace the image.
    pub fn set_input(&mut self, mat: Mat) {
        self.mat = Some(mat);
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn mat(&self) -> Option<&Mat> {
        self.mat.as_ref()
    }

    fn image(&self, index: usize) -> Result<&Mat> {
        if index != 0 {
            return Err(Error::IndexOutOfRange(index));
        }
        self.mat.as_ref().ok_or(Error::NoImage)
    }

    /// A decoder for the `image` crate, reading the region given in `param`.
    pub fn decoder(&self, index: usize, param: Option<&ReadParam>) -> Result<MatImageDecoder> {
        let mat = self.image(index)?;
        match param.and_then(|p| p.source_region) {
            Some(region) => MatImageDecoder::new(&crop(mat, region)?),
            None => MatImageDecoder::new(mat),
        }
    }
}

impl ImageReader for MatImageReader {
    fn num_images(&self, _allow_search: bool) -> Result<usize> {
        Ok(1)
    }

    fn width(&self, index: usize) -> Result<u32> {
        Ok(self.image(index)?.cols())
    }

    fn height(&self, index: usize) -> Result<u32> {
        Ok(self.image(index)?.rows())
    }

    fn image_types(&self, _index: usize) -> Result<Vec<BitmapFormat>> {
        Err(Error::UnsupportedOperation("image_types"))
    }

    fn stream_metadata(&self) -> Result<Metadata> {
        Err(Error::UnsupportedOperation("stream_metadata"))
    }

    fn image_metadata(&self, _index: usize) -> Result<Metadata> {
        Err(Error::UnsupportedOperation("image_metadata"))
    }

    fn read(&self, index: usize, param: Option<&ReadParam>) -> Result<Bitmap> {
        let mat = self.image(index)?;
        let param = param.copied().unwrap_or_default();
        let opts = MatToBitmap {
            remove_alpha: param.remove_alpha,
        };
        let bitmap = match param.source_region {
            Some(region) => {
                tracing::debug!("reading region {region} of {mat:?}");
                mat_to_bitmap(&crop(mat, region)?, opts)?
            }
            None => mat_to_bitmap(mat, opts)?,
        };
        Ok(bitmap)
    }
}

/// What a provider is asked to decode.
#[derive(Debug, Clone, Copy)]
pub enum ReaderInput<'a> {
    Mat(&'a Mat),
    Bytes(&'a [u8]),
    Path(&'a Path),
}

/// Capability probe for one kind of reader.
pub trait ImageReaderProvider {
    type Reader: ImageReader;

    fn can_decode(&self, input: &ReaderInput<'_>) -> bool;
    fn create_reader(&self) -> Self::Reader;
    fn description(&self) -> &'static str;
}

/// Provider of [MatImageReader]. Accepts matrices only.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatImageReaderProvider;

impl ImageReaderProvider for MatImageReaderProvider {
    type Reader = MatImageReader;

    fn can_decode(&self, input: &ReaderInput<'_>) -> bool {
        matches!(input, ReaderInput::Mat(_))
    }

    fn create_reader(&self) -> MatImageReader {
        MatImageReader::empty()
    }

    fn description(&self) -> &'static str {
        "A decoder for native-matrix image objects"
    }
}

/// Read image 0 and encode it as PNG with the toolkit's settings.
pub fn reader_to_png(reader: &dyn ImageReader, toolkit: &Toolkit) -> Result<Vec<u8>> {
    let bitmap = reader.read(0, None)?;
    let img = bitmap.to_dynamic_image()?;
    Ok(toolkit.encode_png_image(&img)?)
}
