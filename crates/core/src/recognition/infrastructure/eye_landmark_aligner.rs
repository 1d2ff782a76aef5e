use crate::recognition::domain::face_aligner::FaceAligner;
use crate::recognition::domain::face_detector::FaceDetection;
use crate::shared::bitmap::Bitmap;
use crate::shared::bounding_box::{BoundingBox, Point};

/// Side of the aligned face fed to the embedding model.
pub const ALIGNED_SIZE: u32 = 112;

const LEFT_EYE_X: f64 = 0.35;
const RIGHT_EYE_X: f64 = 0.65;
const EYE_Y: f64 = 0.40;

/// Padding added on every side of the box when no landmarks are available,
/// relative to the box width.
const FALLBACK_PADDING: f64 = 0.2;

/// Rotates and scales the face so the eyes land on fixed output positions.
///
/// Without both eye landmarks it falls back to a padded crop of the box.
#[derive(Clone, Copy, Debug)]
pub struct EyeLandmarkAligner {
    size: u32,
}

impl EyeLandmarkAligner {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for EyeLandmarkAligner {
    fn default() -> Self {
        Self::new(ALIGNED_SIZE)
    }
}

impl FaceAligner for EyeLandmarkAligner {
    fn align(&self, photo: &Bitmap, detection: &FaceDetection) -> Option<Bitmap> {
        if photo.is_empty() {
            return None;
        }
        match detection.eyes() {
            Some((left, right)) => warp_to_eyes(photo, left, right, self.size)
                .or_else(|| padded_crop(photo, &detection.bounding_box)),
            None => padded_crop(photo, &detection.bounding_box),
        }
    }
}

fn padded_crop(photo: &Bitmap, rect: &BoundingBox) -> Option<Bitmap> {
    let pad = (rect.width as f64 * FALLBACK_PADDING) as i32;
    photo.crop(&BoundingBox::new(
        rect.x.saturating_sub(pad),
        rect.y.saturating_sub(pad),
        rect.width.saturating_add(pad.saturating_mul(2)),
        rect.height.saturating_add(pad.saturating_mul(2)),
    ))
}

/// Similarity transform mapping the eye pair onto the canonical eye line.
///
/// Each output pixel is mapped back into the photo and bilinearly sampled.
/// Returns `None` for coincident eyes.
fn warp_to_eyes(photo: &Bitmap, left: Point, right: Point, size: u32) -> Option<Bitmap> {
    let (lx, ly) = (left.x as f64, left.y as f64);
    let (rx, ry) = (right.x as f64, right.y as f64);
    let dx = rx - lx;
    let dy = ry - ly;
    let eye_distance = dx.hypot(dy);
    if eye_distance < 1.0 {
        return None;
    }

    let out = size as f64;
    let target_distance = (RIGHT_EYE_X - LEFT_EYE_X) * out;
    let inv_scale = eye_distance / target_distance;
    let (sin, cos) = dy.atan2(dx).sin_cos();

    let src_cx = (lx + rx) / 2.0;
    let src_cy = (ly + ry) / 2.0;
    let dst_cx = out * (LEFT_EYE_X + RIGHT_EYE_X) / 2.0;
    let dst_cy = out * EYE_Y;

    let mut data = Vec::with_capacity((size * size * 3) as usize);
    for v in 0..size {
        for u in 0..size {
            let du = (u as f64 - dst_cx) * inv_scale;
            let dv = (v as f64 - dst_cy) * inv_scale;
            let sx = src_cx + cos * du - sin * dv;
            let sy = src_cy + sin * du + cos * dv;
            data.extend_from_slice(&photo.sample_bilinear(sx, sy));
        }
    }
    Some(Bitmap::new(data, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Black canvas with two white 3x3 dots at the given centers.
    fn eyes_photo(w: u32, h: u32, eyes: [(u32, u32); 2]) -> Bitmap {
        let mut data = vec![0u8; (w * h * 3) as usize];
        for (cx, cy) in eyes {
            for y in cy - 1..=cy + 1 {
                for x in cx - 1..=cx + 1 {
                    let o = ((y * w + x) * 3) as usize;
                    data[o..o + 3].copy_from_slice(&[255, 255, 255]);
                }
            }
        }
        Bitmap::new(data, w, h)
    }

    fn brightness(bmp: &Bitmap, x: u32, y: u32) -> u32 {
        bmp.pixel(x, y).iter().map(|&c| c as u32).sum()
    }

    #[test]
    fn test_level_eyes_land_on_canonical_positions() {
        let photo = eyes_photo(200, 200, [(80, 90), (120, 90)]);
        let detection = FaceDetection::new(BoundingBox::new(60, 60, 80, 80))
            .with_eyes(Point::new(80.0, 90.0), Point::new(120.0, 90.0));

        let aligned = EyeLandmarkAligner::default().align(&photo, &detection).unwrap();

        assert_eq!((aligned.width(), aligned.height()), (112, 112));
        // 0.35 * 112 = 39.2, 0.65 * 112 = 72.8, 0.40 * 112 = 44.8
        assert!(brightness(&aligned, 39, 45) > 300);
        assert!(brightness(&aligned, 73, 45) > 300);
        assert_eq!(brightness(&aligned, 56, 90), 0);
    }

    #[test]
    fn test_tilted_eyes_are_levelled() {
        let photo = eyes_photo(200, 200, [(80, 80), (120, 120)]);
        let detection = FaceDetection::new(BoundingBox::new(50, 50, 100, 100))
            .with_eyes(Point::new(80.0, 80.0), Point::new(120.0, 120.0));

        let aligned = EyeLandmarkAligner::default().align(&photo, &detection).unwrap();

        assert!(brightness(&aligned, 39, 45) > 300);
        assert!(brightness(&aligned, 73, 45) > 300);
    }

    #[test]
    fn test_without_eyes_uses_padded_box() {
        let photo = Bitmap::filled(200, 200, [9, 9, 9]);
        let detection = FaceDetection::new(BoundingBox::new(50, 50, 50, 60));

        let aligned = EyeLandmarkAligner::default().align(&photo, &detection).unwrap();

        // pad = 10 on every side
        assert_eq!((aligned.width(), aligned.height()), (70, 80));
    }

    #[test]
    fn test_padded_box_is_clamped_to_photo() {
        let photo = Bitmap::filled(100, 100, [9, 9, 9]);
        let detection = FaceDetection::new(BoundingBox::new(0, 0, 50, 50));

        let aligned = EyeLandmarkAligner::default().align(&photo, &detection).unwrap();

        assert_eq!((aligned.width(), aligned.height()), (60, 60));
    }

    #[test]
    fn test_coincident_eyes_fall_back_to_crop() {
        let photo = Bitmap::filled(100, 100, [9, 9, 9]);
        let detection = FaceDetection::new(BoundingBox::new(20, 20, 40, 40))
            .with_eyes(Point::new(40.0, 40.0), Point::new(40.2, 40.0));

        let aligned = EyeLandmarkAligner::default().align(&photo, &detection).unwrap();

        assert_eq!((aligned.width(), aligned.height()), (56, 56));
    }

    #[test]
    fn test_box_outside_photo_gives_none() {
        let photo = Bitmap::filled(50, 50, [9, 9, 9]);
        let detection = FaceDetection::new(BoundingBox::new(200, 200, 10, 10));
        assert!(EyeLandmarkAligner::default().align(&photo, &detection).is_none());
    }

    #[test]
    fn test_huge_box_does_not_overflow() {
        let photo = Bitmap::filled(50, 50, [9, 9, 9]);
        let detection =
            FaceDetection::new(BoundingBox::new(i32::MAX - 5, i32::MAX - 5, i32::MAX, i32::MAX));
        assert!(EyeLandmarkAligner::default().align(&photo, &detection).is_none());
    }
}
