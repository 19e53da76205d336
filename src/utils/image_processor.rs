use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Read `(width, height)` from the image header.
///
/// Never fails: unknown formats, truncated headers and empty input all
/// report `(0, 0)`.
pub fn decode_dimensions(data: &[u8]) -> (u32, u32) {
    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => {
            tracing::debug!(error = %e, "could not sniff image format");
            return (0, 0);
        }
    };

    if reader.format().is_none() {
        return (0, 0);
    }

    match reader.into_dimensions() {
        Ok(dims) => dims,
        Err(e) => {
            tracing::debug!(error = %e, "failed to decode image header");
            (0, 0)
        }
    }
}

/// Mime type for the image format sniffed from the leading bytes.
pub fn sniff_mime_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Avif) => "image/avif",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    pub(crate) fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn reads_jpeg_and_png_headers() {
        let jpeg = encode_test_image(100, 80, ImageFormat::Jpeg);
        assert_eq!(decode_dimensions(&jpeg), (100, 80));
        assert_eq!(sniff_mime_type(&jpeg), "image/jpeg");

        let png = encode_test_image(3, 7, ImageFormat::Png);
        assert_eq!(decode_dimensions(&png), (3, 7));
        assert_eq!(sniff_mime_type(&png), "image/png");
    }

    #[test]
    fn falls_back_to_zero_for_anything_else() {
        assert_eq!(decode_dimensions(&[]), (0, 0));
        assert_eq!(decode_dimensions(b"definitely not an image"), (0, 0));

        let png = encode_test_image(10, 10, ImageFormat::Png);
        assert_eq!(decode_dimensions(&png[..12]), (0, 0));

        let mut garbage = vec![0xFF, 0xD8, 0xFF];
        garbage.extend_from_slice(&[0u8; 5]);
        assert_eq!(decode_dimensions(&garbage), (0, 0));
    }

    #[test]
    fn unknown_bytes_are_octet_stream() {
        assert_eq!(sniff_mime_type(b"plain text"), "application/octet-stream");
        assert_eq!(sniff_mime_type(&[]), "application/octet-stream");
    }
}
