//! Display bitmap preparation and the mapping from canvas clicks back to
//! original image pixels.

use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use fast_image_resize::{self as fr, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, ImageDecoder, ImageReader};

/// Rotation applied to undo the camera's EXIF orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    /// clockwise
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Only the pure rotations are corrected, mirrored tags are left alone.
    pub fn from_exif_tag(tag: u8) -> Self {
        match tag {
            3 => Rotation::Cw180,
            6 => Rotation::Cw90,
            8 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    fn from_orientation(orientation: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation;
        match orientation {
            Orientation::Rotate180 => Self::from_exif_tag(3),
            Orientation::Rotate90 => Self::from_exif_tag(6),
            Orientation::Rotate270 => Self::from_exif_tag(8),
            _ => Rotation::None,
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Rotation::None => img,
            Rotation::Cw90 => img.rotate90(),
            Rotation::Cw180 => img.rotate180(),
            Rotation::Cw270 => img.rotate270(),
        }
    }
}

/// Largest size with the same aspect ratio that fits in `bound`.
/// Images already inside the bound are never upscaled.
pub fn fit_within((width, height): (u32, u32), (max_w, max_h): (u32, u32)) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }

    let rx = max_w as f64 / width as f64;
    let ry = max_h as f64 / height as f64;

    if rx <= ry {
        let h = (height as f64 * rx).round().max(1.) as u32;
        (max_w, h.min(max_h))
    } else {
        let w = (width as f64 * ry).round().max(1.) as u32;
        (w.min(max_w), max_h)
    }
}

/// Uniform factor between the displayed bitmap and the oriented original.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub original_size: (u32, u32),
    pub display_size: (u32, u32),
    pub scale: f64,
}

impl CoordinateMapper {
    pub fn new(original_size: (u32, u32), display_size: (u32, u32)) -> Self {
        let sx = original_size.0 as f64 / display_size.0.max(1) as f64;
        let sy = original_size.1 as f64 / display_size.1.max(1) as f64;
        Self {
            original_size,
            display_size,
            scale: sx.max(sy),
        }
    }

    pub fn for_bound(original_size: (u32, u32), bound: (u32, u32)) -> Self {
        Self::new(original_size, fit_within(original_size, bound))
    }

    /// Click on the displayed bitmap (top-left origin) to original pixels,
    /// clamped to the original image.
    pub fn to_original(&self, x: f32, y: f32) -> [u32; 2] {
        let map = |v: f32, len: u32| {
            let v = (v.max(0.) as f64 * self.scale).round() as u32;
            v.min(len.saturating_sub(1))
        };
        [map(x, self.original_size.0), map(y, self.original_size.1)]
    }
}

/// Decoded, oriented and downscaled bitmap ready to upload as a texture.
pub struct DisplayImage {
    pub rgba: image::RgbaImage,
    pub mapper: CoordinateMapper,
}

impl DisplayImage {
    pub fn size(&self) -> [usize; 2] {
        [self.rgba.width() as usize, self.rgba.height() as usize]
    }

    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied(self.size(), self.rgba.as_raw())
    }
}

pub fn load_oriented<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    let mut decoder = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?
        .into_decoder()
        .with_context(|| format!("Unsupported image {}", path.display()))?;

    let rotation = match decoder.orientation() {
        Ok(o) => Rotation::from_orientation(o),
        Err(e) => {
            debug!("No orientation for {}: {}", path.display(), e);
            Rotation::None
        }
    };

    let img = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    trace!("{}: {:?}", path.display(), rotation);
    Ok(rotation.apply(img))
}

/// Lanczos3 downscale so that neither side exceeds `bound`.
pub fn prepare_display(img: &DynamicImage, bound: (u32, u32)) -> Result<DisplayImage> {
    let original_size = (img.width(), img.height());
    ensure!(
        original_size.0 > 0 && original_size.1 > 0,
        "Image has zero size"
    );

    let mapper = CoordinateMapper::for_bound(original_size, bound);
    let (w, h) = mapper.display_size;

    let src = DynamicImage::ImageRgba8(img.to_rgba8());

    let rgba = if (w, h) == original_size {
        src.into_rgba8()
    } else {
        let mut dst = fr::images::Image::new(w, h, fr::PixelType::U8x4);
        let options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(fr::FilterType::Lanczos3));
        Resizer::new()
            .resize(&src, &mut dst, &options)
            .context("Failed to resize image")?;
        image::RgbaImage::from_raw(w, h, dst.into_vec())
            .ok_or_else(|| anyhow!("Resized buffer does not match {}x{}", w, h))?
    };

    debug!(
        "Display {}x{} -> {}x{}, scale = {:.4}",
        original_size.0, original_size.1, w, h, mapper.scale
    );

    Ok(DisplayImage { rgba, mapper })
}

pub fn load_display_image<P: AsRef<Path>>(path: P, bound: (u32, u32)) -> Result<DisplayImage> {
    let img = load_oriented(path)?;
    prepare_display(&img, bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_mapping() {
        let m = CoordinateMapper::for_bound((2000, 1500), (1000, 720));
        assert_eq!(m.display_size, (960, 720));
        assert!((m.scale - 2000. / 960.).abs() < 1e-9);
        assert_eq!(m.to_original(100., 100.), [208, 208]);
    }

    #[test]
    fn click_on_last_pixel_stays_inside() {
        let m = CoordinateMapper::for_bound((2000, 1500), (1000, 720));
        assert_eq!(m.to_original(959.8, 719.8), [1999, 1499]);
        assert_eq!(m.to_original(-3., 0.2), [0, 0]);
    }

    #[test]
    fn fit_keeps_aspect() {
        assert_eq!(fit_within((4000, 1000), (1000, 720)), (1000, 250));
        assert_eq!(fit_within((1000, 4000), (1000, 720)), (180, 720));
        assert_eq!(fit_within((640, 480), (1000, 720)), (640, 480));
    }

    #[test]
    fn small_image_maps_one_to_one() {
        let m = CoordinateMapper::for_bound((640, 480), (1000, 720));
        assert_eq!(m.scale, 1.0);
        assert_eq!(m.to_original(12.4, 12.6), [12, 13]);
    }

    #[test]
    fn exif_tags() {
        assert_eq!(Rotation::from_exif_tag(1), Rotation::None);
        assert_eq!(Rotation::from_exif_tag(3), Rotation::Cw180);
        assert_eq!(Rotation::from_exif_tag(6), Rotation::Cw90);
        assert_eq!(Rotation::from_exif_tag(8), Rotation::Cw270);
        assert_eq!(Rotation::from_exif_tag(2), Rotation::None);

        let img = DynamicImage::new_rgb8(4, 2);
        assert_eq!(Rotation::Cw90.apply(img.clone()).width(), 2);
        assert_eq!(Rotation::Cw180.apply(img).width(), 4);
    }

    #[test]
    fn downscales_large_image() {
        let img = DynamicImage::new_rgb8(2000, 1500);
        let display = prepare_display(&img, (1000, 720)).unwrap();
        assert_eq!(display.size(), [960, 720]);
        assert_eq!(display.mapper.original_size, (2000, 1500));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        crate::dataset::tests::write_image(&path, 30, 20);

        let display = load_display_image(&path, (10, 10)).unwrap();
        assert_eq!(display.size(), [10, 7]);
        assert_eq!(display.to_color_image().size, [10, 7]);
    }

    /// JPEG bytes with an APP1 Exif segment holding only the orientation tag.
    fn jpeg_with_orientation(width: u32, height: u32, tag: u8) -> Vec<u8> {
        let mut jpeg = vec![];
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]))
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        // little-endian TIFF header, one IFD entry: 0x0112 SHORT x1
        let mut tiff = vec![b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
        tiff.extend_from_slice(&[0x01, 0x00]);
        tiff.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
        tiff.extend_from_slice(&[tag, 0x00, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);
        let len = (payload.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_orientation_applied_on_load() {
        let dir = tempfile::tempdir().unwrap();

        for (tag, expected) in [(1, (40, 20)), (3, (40, 20)), (6, (20, 40)), (8, (20, 40))] {
            let path = dir.path().join(format!("o{}.jpg", tag));
            std::fs::write(&path, jpeg_with_orientation(40, 20, tag)).unwrap();

            let img = load_oriented(&path).unwrap();
            assert_eq!((img.width(), img.height()), expected, "tag {}", tag);

            let display = prepare_display(&img, (10, 10)).unwrap();
            assert_eq!(display.mapper.original_size, expected, "tag {}", tag);
        }

        let path = dir.path().join("o6.jpg");
        let display = load_display_image(&path, (10, 10)).unwrap();
        assert_eq!(display.size(), [5, 10]);
        assert_eq!(display.mapper.scale, 4.0);
        assert_eq!(display.mapper.to_original(4.9, 9.9), [19, 39]);
    }
}
