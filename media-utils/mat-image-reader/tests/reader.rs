use std::io::Cursor;
use std::path::Path;

use mat_convert::{BitmapFormat, Config, Depth, LoadMode, Mat, Rect, Toolkit};
use mat_image_reader::{
    Error, ImageReader, ImageReaderProvider, MatImageReader, MatImageReaderProvider, ReadParam,
    ReaderInput, reader_to_png,
};
use test_log::test;

fn red_10x10() -> Mat {
    Mat::filled(10, 10, Depth::U8, &[0, 0, 255, 255]).unwrap()
}

fn toolkit() -> Toolkit {
    Toolkit::init(Config::default()).unwrap()
}

#[test]
fn one_image_only() {
    let reader = MatImageReader::with_identifier("red", red_10x10());
    assert_eq!(reader.identifier(), Some("red"));
    assert_eq!(reader.num_images(false).unwrap(), 1);
    assert_eq!(reader.num_images(true).unwrap(), 1);
    assert_eq!(reader.width(0).unwrap(), 10);
    assert_eq!(reader.height(0).unwrap(), 10);

    assert!(matches!(reader.read(1, None), Err(Error::IndexOutOfRange(1))));
    assert!(matches!(reader.width(2), Err(Error::IndexOutOfRange(2))));
}

#[test]
fn empty_reader_has_no_image() {
    let reader = MatImageReader::empty();
    assert_eq!(reader.num_images(true).unwrap(), 1);
    assert!(matches!(reader.read(0, None), Err(Error::NoImage)));
    assert!(matches!(reader.height(0), Err(Error::NoImage)));
}

#[test]
fn metadata_is_unsupported() {
    let reader = MatImageReader::new(red_10x10());
    assert!(matches!(
        reader.stream_metadata(),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        reader.image_metadata(0),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        reader.image_types(0),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn read_whole_image() {
    let reader = MatImageReader::new(red_10x10());
    let bitmap = reader.read(0, None).unwrap();
    assert_eq!(bitmap.format(), BitmapFormat::FourByteAbgr);
    assert_eq!((bitmap.width(), bitmap.height()), (10, 10));
    assert!(bitmap.bytes().unwrap().chunks_exact(4).all(|px| px == [255, 0, 0, 255]));
}

#[test]
fn read_region() {
    let reader = MatImageReader::new(red_10x10());
    let param = ReadParam {
        source_region: Some(Rect::new(2, 2, 4, 4)),
        ..Default::default()
    };
    let bitmap = reader.read(0, Some(&param)).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (4, 4));
    assert_eq!(bitmap.bytes().unwrap().len(), 4 * 4 * 4);

    let outside = ReadParam {
        source_region: Some(Rect::new(8, 8, 4, 4)),
        ..Default::default()
    };
    assert!(matches!(
        reader.read(0, Some(&outside)),
        Err(Error::Convert(_))
    ));
}

#[test]
fn png_round_trip() {
    let tk = toolkit();
    let reader = MatImageReader::new(red_10x10());
    let png = reader_to_png(&reader, &tk).unwrap();

    let decoded = tk.load_image_from_memory(&png, LoadMode::Unchanged).unwrap();
    assert_eq!(decoded, red_10x10());

    let again = MatImageReader::from_reader("png", Cursor::new(png), &tk).unwrap();
    assert_eq!(again.identifier(), Some("png"));
    assert_eq!((again.width(0).unwrap(), again.height(0).unwrap()), (10, 10));
}

#[test]
fn undecodable_input() {
    let tk = toolkit();
    let err = MatImageReader::from_reader("junk", Cursor::new(b"not an image".to_vec()), &tk)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Convert(mat_convert::Error::Image(_))
    ));
}

#[test]
fn from_path() {
    let tk = toolkit();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray.png");
    let gray = Mat::filled(3, 5, Depth::U8, &[77]).unwrap();
    tk.save_image(&gray, &path).unwrap();

    let reader = MatImageReader::from_path(&path, &tk).unwrap();
    assert_eq!(reader.identifier(), Some(path.display().to_string().as_str()));
    let bitmap = reader.read(0, None).unwrap();
    assert_eq!(bitmap.format(), BitmapFormat::ByteGray);
    assert_eq!(bitmap.bytes().unwrap(), &[77; 15]);
}

#[test]
fn image_crate_decoding_of_region() {
    let reader = MatImageReader::new(red_10x10());
    let param = ReadParam {
        source_region: Some(Rect::new(1, 1, 3, 2)),
        ..Default::default()
    };
    let decoder = reader.decoder(0, Some(&param)).unwrap();
    let img = image::DynamicImage::from_decoder(decoder).unwrap();
    assert_eq!((img.width(), img.height()), (3, 2));
    assert_eq!(img.as_rgba8().unwrap().get_pixel(0, 0).0, [255, 0, 0, 255]);
}

#[test]
fn provider_probe() {
    let provider = MatImageReaderProvider;
    let mat = red_10x10();
    assert!(provider.can_decode(&ReaderInput::Mat(&mat)));
    assert!(!provider.can_decode(&ReaderInput::Bytes(b"\x89PNG")));
    assert!(!provider.can_decode(&ReaderInput::Path(Path::new("a.png"))));
    assert_eq!(
        provider.description(),
        "A decoder for native-matrix image objects"
    );

    let reader = provider.create_reader();
    assert!(reader.mat().is_none());
    assert!(matches!(reader.read(0, None), Err(Error::NoImage)));
}
