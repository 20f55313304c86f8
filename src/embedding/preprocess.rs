//! Decoding and MobileNetV2 input normalization.

use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array4;

use crate::error::MatchError;

/// Decode raw bytes in any format the `image` crate recognizes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, MatchError> {
    image::load_from_memory(bytes).map_err(MatchError::Decode)
}

/// Build the `[1, size, size, 3]` model input.
///
/// The image is converted to RGB, stretched to `size × size` with
/// nearest-neighbour sampling (aspect ratio is not preserved), and each
/// channel value is mapped from `[0, 255]` to `[-1, 1]`.
pub fn to_input_tensor(img: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::Nearest);

    let side = size as usize;
    let mut input = Array4::zeros((1, side, side, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, &value) in pixel.0.iter().enumerate() {
            input[[0, y, x, c]] = scale_channel(value);
        }
    }
    input
}

#[inline]
fn scale_channel(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn scale_channel_spans_unit_range() {
        assert_eq!(scale_channel(0), -1.0);
        assert_eq!(scale_channel(255), 1.0);
        assert!(scale_channel(128).abs() < 0.01);
    }

    #[test]
    fn tensor_has_nhwc_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 17, Rgb([255, 0, 0])));
        let tensor = to_input_tensor(&img, 224);
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert_eq!(tensor[[0, 100, 50, 0]], 1.0);
        assert_eq!(tensor[[0, 100, 50, 1]], -1.0);
        assert_eq!(tensor[[0, 223, 223, 2]], -1.0);
    }

    #[test]
    fn decode_round_trips_png() {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let decoded = decode(&png_bytes(&img)).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.to_rgb8().get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MatchError::Decode(_)));
    }

    #[test]
    fn identical_pixels_give_identical_tensors() {
        let img = RgbImage::from_fn(31, 29, |x, y| Rgb([x as u8 * 8, y as u8 * 8, 77]));
        let a = to_input_tensor(&decode(&png_bytes(&img)).unwrap(), 64);
        let b = to_input_tensor(&DynamicImage::ImageRgb8(img), 64);
        assert_eq!(a, b);
    }
}
