use clap::ValueEnum;
use image::{ImageBuffer, Pixel, Primitive, Rgb};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use num_traits::AsPrimitive;

/// Memory layout of a single-image input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TensorLayout {
    /// `[1, height, width, 3]`, the Keras convention.
    #[default]
    Nhwc,
    /// `[1, 3, height, width]`, the PyTorch convention.
    Nchw,
}

impl TensorLayout {
    pub fn convert<S>(self, image: &ImageBuffer<Rgb<S>, Vec<S>>) -> Array4<f32>
    where
        Rgb<S>: Pixel<Subpixel = S>,
        S: Primitive + AsPrimitive<f32> + 'static,
    {
        match self {
            Self::Nhwc => to_nhwc_tensor(image),
            Self::Nchw => to_nchw_tensor(image),
        }
    }
}

fn max_value<S: Primitive + AsPrimitive<f32>>() -> f32 {
    S::DEFAULT_MAX_VALUE.as_()
}

/// `[1, 3, h, w]` tensor with channels scaled into `[0, 1]`.
pub fn to_nchw_tensor<S>(image: &ImageBuffer<Rgb<S>, Vec<S>>) -> Array4<f32>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32> + 'static,
{
    let max = max_value::<S>();
    image
        .as_ndarray3()
        .slice_move(s![NewAxis, .., .., ..])
        .map(|v| v.as_() / max)
}

/// `[1, h, w, 3]` tensor with channels scaled into `[0, 1]`.
pub fn to_nhwc_tensor<S>(image: &ImageBuffer<Rgb<S>, Vec<S>>) -> Array4<f32>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32> + 'static,
{
    let max = max_value::<S>();
    let (width, height) = image.dimensions();
    Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| image.get_pixel(x as u32, y as u32).0[c].as_() / max,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn sample() -> RgbImage {
        let mut image = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        image.put_pixel(2, 1, Rgb([255, 51, 0]));
        image
    }

    #[test]
    fn test_nhwc_layout_and_scale() {
        let tensor = to_nhwc_tensor(&sample());
        assert_eq!(tensor.shape(), &[1, 2, 3, 3]);
        assert_eq!(tensor[[0, 1, 2, 0]], 1.0);
        assert!((tensor[[0, 1, 2, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_nchw_layout_and_scale() {
        let tensor = to_nchw_tensor(&sample());
        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        assert!((tensor[[0, 1, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_layouts_hold_the_same_values() {
        let image = sample();
        let nhwc = TensorLayout::Nhwc.convert(&image);
        let nchw = TensorLayout::Nchw.convert(&image);
        assert_eq!(nhwc.permuted_axes([0, 3, 1, 2]), nchw);
    }
}
