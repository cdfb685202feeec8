use image::{
    imageops::{self, FilterType},
    GrayImage, RgbImage,
};
use ndarray::ArrayView2;

use crate::util::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downsampling {
    /// Bilinear interpolation.
    Linear,
    /// Pixel area averaging, smoother for dense flow.
    Area,
}

/// Single channel copy of `image` scaled to `width` x `height`.
pub fn working_grayscale(
    image: &RgbImage,
    width: u32,
    height: u32,
    downsampling: Downsampling,
) -> GrayImage {
    let gray: GrayImage = imageops::grayscale(image);
    if gray.dimensions() == (width, height) {
        return gray;
    }
    match downsampling {
        Downsampling::Linear => imageops::resize(&gray, width, height, FilterType::Triangle),
        Downsampling::Area => imageops::thumbnail(&gray, width, height),
    }
}

/// Row-major `(height, width)` view over the pixels.
pub fn intensity_view(image: &GrayImage) -> Result<ArrayView2<'_, u8>, AppError> {
    let shape = (image.height() as usize, image.width() as usize);
    ArrayView2::from_shape(shape, image.as_raw().as_slice())
        .map_err(|error| AppError::Estimation(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn downsamples_to_working_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
        for downsampling in [Downsampling::Linear, Downsampling::Area] {
            let gray = working_grayscale(&image, 320, 240, downsampling);
            assert_eq!(gray.dimensions(), (320, 240));
            assert!(gray.pixels().all(|pixel| pixel.0[0].abs_diff(90) <= 1));
        }
    }

    #[test]
    fn view_is_row_major() {
        let mut image = GrayImage::new(4, 3);
        image.put_pixel(3, 1, image::Luma([200]));
        let view = intensity_view(&image).unwrap();
        assert_eq!(view.dim(), (3, 4));
        assert_eq!(view[[1, 3]], 200);
    }
}
