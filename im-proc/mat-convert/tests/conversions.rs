use mat_convert::{
    Bitmap, BitmapFormat, BitmapToMat, Config, Depth, Error, LoadMode, Mat, MatData, MatToBitmap,
    Point, Raster, Rect, Toolkit, UnsupportedFormat, add_alpha, bitmap_to_mat, crop,
    cv_mat::MatType, mat_to_bitmap, mat_to_bitmap_with_alpha,
};
use test_log::test;

fn sample_bitmap(format: BitmapFormat, width: u32, height: u32) -> Bitmap {
    let n = width as usize * height as usize;
    let raster = match format.layout().unwrap().raster {
        mat_convert::RasterKind::Bytes => {
            let len = n * format.layout().unwrap().elems_per_pixel;
            Raster::Bytes((0..len).map(|i| (i * 7 % 251) as u8).collect())
        }
        mat_convert::RasterKind::Ints => {
            Raster::Ints((0..n as u32).map(|i| i.wrapping_mul(0x0103_0507)).collect())
        }
        mat_convert::RasterKind::Shorts => unreachable!(),
    };
    Bitmap::new(width, height, format, raster).unwrap()
}

#[test]
fn red_rgba_matrix_becomes_abgr_bitmap() {
    // B,G,R,A
    let red = Mat::filled(10, 10, Depth::U8, &[0, 0, 255, 255]).unwrap();
    let bitmap = mat_to_bitmap(&red, MatToBitmap::default()).unwrap();
    assert_eq!(bitmap.format(), BitmapFormat::FourByteAbgr);
    assert_eq!((bitmap.width(), bitmap.height()), (10, 10));
    let bytes = bitmap.bytes().unwrap();
    assert_eq!(bytes.len(), 400);
    for px in bytes.chunks_exact(4) {
        assert_eq!(px, &[255, 0, 0, 255]);
    }
    assert_eq!(bitmap.argb(9, 9).unwrap(), 0xFFFF_0000);
}

#[test]
fn every_supported_format_round_trips() {
    let formats = [
        BitmapFormat::ByteGray,
        BitmapFormat::ThreeByteBgr,
        BitmapFormat::FourByteAbgr,
        BitmapFormat::IntRgb,
        BitmapFormat::IntArgb,
        BitmapFormat::IntArgbPre,
        BitmapFormat::IntBgr,
    ];
    for format in formats {
        let original = sample_bitmap(format, 7, 5);
        let mat = bitmap_to_mat(&original, BitmapToMat::default()).unwrap();
        let layout = format.layout().unwrap();
        assert_eq!(mat.channels(), layout.channels, "{format:?}");
        assert_eq!((mat.cols(), mat.rows()), (7, 5), "{format:?}");

        let back = mat_to_bitmap(&mat, MatToBitmap::default()).unwrap();
        assert_eq!((back.width(), back.height()), (7, 5), "{format:?}");
        assert_eq!(back.format().layout().unwrap().channels, layout.channels);

        // colors survive, premultiplied words aside
        if format != BitmapFormat::IntArgbPre {
            for (x, y) in [(0, 0), (3, 2), (6, 4)] {
                assert_eq!(
                    back.argb(x, y).unwrap(),
                    original.argb(x, y).unwrap(),
                    "{format:?} at ({x}, {y})"
                );
            }
        }
    }
}

#[test]
fn byte_length_follows_channels() {
    for channels in [1u8, 3, 4] {
        let pixel: Vec<i32> = (0..channels as i32).collect();
        let m = Mat::filled(6, 9, Depth::U8, &pixel).unwrap();
        let b = mat_to_bitmap(&m, MatToBitmap::default()).unwrap();
        assert_eq!(b.bytes().unwrap().len(), channels as usize * 6 * 9);
    }
}

#[test]
fn malformed_alpha_is_rejected() {
    let color = Mat::zeros(4, 4, MatType::CV_8UC3).unwrap();
    for alpha_type in [
        MatType::CV_8UC3,
        MatType::CV_8UC4,
        MatType::CV_16UC1,
        MatType::CV_32SC1,
        MatType::new(Depth::U8, 2),
    ] {
        let alpha = Mat::zeros(4, 4, alpha_type).unwrap();
        assert!(
            matches!(add_alpha(&color, &alpha), Err(Error::AlphaChannelMismatch(t)) if t == alpha_type),
            "{alpha_type}"
        );
        assert!(
            matches!(
                mat_to_bitmap_with_alpha(&color, &alpha),
                Err(Error::AlphaChannelMismatch(_))
            ),
            "{alpha_type}"
        );
    }
}

#[test]
fn unsupported_formats_fail() {
    for (unsupported, len) in [
        (UnsupportedFormat::ByteIndexed, 4),
        (UnsupportedFormat::FourByteAbgrPre, 16),
        (UnsupportedFormat::Custom, 1),
    ] {
        let format = BitmapFormat::Unsupported(unsupported);
        let raster = Raster::Bytes(vec![0; len]);
        let b = Bitmap::new(2, 2, format, raster).unwrap();
        assert!(matches!(
            bitmap_to_mat(&b, BitmapToMat::default()),
            Err(Error::UnsupportedFormat(f)) if f == format
        ));
    }
}

#[test]
fn crop_inside_and_outside() {
    let m = Mat::zeros(10, 10, MatType::CV_8UC4).unwrap();
    for (x, y, w, h) in [(0, 0, 10, 10), (2, 2, 4, 4), (9, 9, 1, 1), (0, 5, 10, 5)] {
        let v = crop(&m, Rect::new(x, y, w, h)).unwrap();
        assert_eq!((v.cols(), v.rows()), (w as u32, h as u32));
    }
    for r in [
        Rect::new(5, 5, 6, 1),
        Rect::new(-1, 0, 2, 2),
        Rect::new(0, 0, 0, 0),
    ] {
        assert!(crop(&m, r).is_err(), "{r}");
    }
    let v = mat_convert::crop_points(&m, Point::new(8, 1), Point::new(3, 6)).unwrap();
    assert_eq!((v.cols(), v.rows()), (5, 5));
}

#[test]
fn save_and_load_file() {
    let tk = Toolkit::init(Config::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("img.png");

    let m = Mat::filled(3, 4, Depth::U8, &[1, 2, 3]).unwrap();
    tk.save_image(&m, &path).unwrap();
    let back = tk.load_image(&path, LoadMode::Unchanged).unwrap();
    assert_eq!(back, m);

    let file = std::fs::File::open(&path).unwrap();
    let from_reader = tk.load_image_from_reader(file, LoadMode::Color).unwrap();
    assert_eq!(from_reader, m);

    assert!(matches!(
        tk.load_image(dir.path().join("missing.png"), LoadMode::Unchanged),
        Err(Error::Io(_))
    ));
}

#[test]
fn config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("convert.toml");
    std::fs::write(&path, "png_compression = \"fast\"\n").unwrap();
    let cfg = Config::load(&path).unwrap();
    let tk = Toolkit::init(cfg).unwrap();
    assert_eq!(
        tk.config().png_compression,
        mat_convert::PngCompression::Fast
    );
}
