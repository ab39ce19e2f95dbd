use image::{imageops, imageops::FilterType, GenericImageView, ImageBuffer, Pixel, Rgb, RgbImage};

use crate::detection::BoundingBox;

/// Gray used by YOLO exporters for letterbox borders.
pub const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// Geometry of a letterboxed image: the source was scaled by `scale` and
/// placed at `(pad_x, pad_y)` inside a square canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Maps a box from canvas coordinates back onto the source image.
    pub fn restore(&self, bbox: BoundingBox) -> BoundingBox {
        let x = |v: f32| (v - self.pad_x as f32) / self.scale;
        let y = |v: f32| (v - self.pad_y as f32) / self.scale;
        BoundingBox::new(x(bbox.x1), y(bbox.y1), x(bbox.x2), y(bbox.y2))
    }
}

/// Centered offset of a `width x height` image inside a `pad_width x pad_height` canvas.
pub fn center_offset(
    width: u32,
    height: u32,
    pad_width: u32,
    pad_height: u32,
) -> Option<(u32, u32)> {
    if width > pad_width || height > pad_height {
        return None;
    }
    Some(((pad_width - width) / 2, (pad_height - height) / 2))
}

pub fn padding<I, P>(
    image: &I,
    pad_width: u32,
    pad_height: u32,
    color: P,
) -> Option<ImageBuffer<P, Vec<P::Subpixel>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel,
{
    let (width, height) = image.dimensions();

    center_offset(width, height, pad_width, pad_height).map(|(x, y)| {
        let mut canvas = ImageBuffer::from_pixel(pad_width, pad_height, color);
        imageops::overlay(&mut canvas, image, i64::from(x), i64::from(y));
        canvas
    })
}

/// Resizes `image` to fit a `size x size` square keeping its aspect ratio,
/// then pads the remainder with [`PAD_COLOR`].
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);
    let (pad_x, pad_y) = center_offset(new_width, new_height, size, size).unwrap_or((0, 0));
    let canvas = padding(&resized, size, size, PAD_COLOR)
        .unwrap_or_else(|| RgbImage::from_pixel(size, size, PAD_COLOR));

    (
        canvas,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}
