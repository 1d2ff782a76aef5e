use ndarray::ArrayView3;

use crate::shared::bounding_box::BoundingBox;

const CHANNELS: usize = 3;

/// A decoded photo or face crop: contiguous RGB bytes in row-major order.
///
/// Codec work happens at I/O boundaries only; the analysis layer only
/// crops, resizes and samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Bitmap {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height)
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height)
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Bitmap data length must match dimensions")
    }

    /// Copies the part of `rect` that lies inside the bitmap.
    ///
    /// Returns `None` when the intersection is empty.
    pub fn crop(&self, rect: &BoundingBox) -> Option<Bitmap> {
        let r = rect.clamped_to(self.width, self.height);
        if r.is_empty() {
            return None;
        }
        let row_bytes = r.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * r.height as usize);
        for row in r.y..r.y + r.height {
            let start = (row as usize * self.width as usize + r.x as usize) * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Some(Bitmap::new(data, r.width as u32, r.height as u32))
    }

    /// Resamples to exactly `width x height` with a triangle filter.
    pub fn resized(&self, width: u32, height: u32) -> Bitmap {
        if width == self.width && height == self.height {
            return self.clone();
        }
        match self.to_rgb_image() {
            Some(img) => Bitmap::from_rgb_image(image::imageops::resize(
                &img,
                width,
                height,
                image::imageops::FilterType::Triangle,
            )),
            None => Bitmap::filled(width, height, [0, 0, 0]),
        }
    }

    /// Shrinks the bitmap so neither side exceeds `max_dim`, keeping aspect.
    ///
    /// Returns the (possibly unchanged) bitmap and the applied scale factor.
    pub fn downscaled_to(&self, max_dim: u32) -> (Bitmap, f64) {
        if self.width <= max_dim && self.height <= max_dim {
            return (self.clone(), 1.0);
        }
        let scale = (max_dim as f64 / self.width as f64).min(max_dim as f64 / self.height as f64);
        let w = ((self.width as f64 * scale).round() as u32).max(1);
        let h = ((self.height as f64 * scale).round() as u32).max(1);
        (self.resized(w, h), scale)
    }

    /// Bilinear sample at a sub-pixel position; black outside the bitmap.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> [u8; 3] {
        if self.is_empty() || x < -1.0 || y < -1.0 || x > self.width as f64 || y > self.height as f64
        {
            return [0, 0, 0];
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let fetch = |px: f64, py: f64| -> [f64; 3] {
            if px < 0.0 || py < 0.0 || px >= self.width as f64 || py >= self.height as f64 {
                return [0.0; 3];
            }
            let p = self.pixel(px as u32, py as u32);
            [p[0] as f64, p[1] as f64, p[2] as f64]
        };

        let tl = fetch(x0, y0);
        let tr = fetch(x0 + 1.0, y0);
        let bl = fetch(x0, y0 + 1.0);
        let br = fetch(x0 + 1.0, y0 + 1.0);

        let mut out = [0u8; 3];
        for c in 0..CHANNELS {
            let top = tl[c] * (1.0 - fx) + tr[c] * fx;
            let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
            out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}
