//! Landmark-based face alignment.
//!
//! Warps a detected face into the canonical 112×112 crop expected by the
//! embedding model, using a 4-DOF similarity transform (scale, rotation,
//! translation) estimated from the five detected landmarks against the
//! InsightFace reference positions.

use image::{Rgb, RgbImage};
use std::cmp::Ordering;

/// InsightFace reference landmark positions in the 112×112 crop:
/// left eye, right eye, nose, left mouth corner, right mouth corner.
const REFERENCE: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `p' = [a -b; b a] p + (tx, ty)`.
#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Least-squares fit mapping `src` points onto `dst` points.
    ///
    /// Each point pair contributes two rows to the overdetermined system
    /// in the unknowns [a, b, tx, ty]:
    ///   sx·a − sy·b + tx = dx
    ///   sy·a + sx·b + ty = dy
    /// solved through the normal equations.
    fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<Similarity> {
        let mut ata = [[0.0f32; 4]; 4];
        let mut atb = [0.0f32; 4];

        for ((sx, sy), (dx, dy)) in src.iter().copied().zip(dst.iter().copied()) {
            let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
            for (row, rhs) in rows {
                for j in 0..4 {
                    for k in 0..4 {
                        ata[j][k] += row[j] * row[k];
                    }
                    atb[j] += row[j] * rhs;
                }
            }
        }

        let [a, b, tx, ty] = solve4(ata, atb)?;
        Some(Similarity { a, b, tx, ty })
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Inverse transform. None when the transform is degenerate.
    fn invert(self) -> Option<Similarity> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-10 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Similarity {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// Warp the face described by `landmarks` into the canonical 112×112 crop.
///
/// Samples the source image bilinearly through the inverse transform;
/// pixels mapping outside the frame come out black. Returns None when the
/// landmarks do not admit a usable transform.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> Option<RgbImage> {
    let inverse = Similarity::estimate(landmarks, &REFERENCE)?.invert()?;

    let mut output = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
    for y in 0..ALIGNED_SIZE {
        for x in 0..ALIGNED_SIZE {
            let (sx, sy) = inverse.apply(x as f32, y as f32);
            output.put_pixel(x, y, sample_bilinear(image, sx, sy));
        }
    }
    Some(output)
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px >= 0 && px < width && py >= 0 && py < height {
            let p = image.get_pixel(px as u32, py as u32).0;
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let value = tl[c] * (1.0 - fx) * (1.0 - fy)
            + tr[c] * fx * (1.0 - fy)
            + bl[c] * (1.0 - fx) * fy
            + br[c] * fx * fy;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Solve a 4×4 linear system via Gaussian elimination with partial
/// pivoting. None when the system is singular.
fn solve4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> Option<[f32; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&i, &j| {
            m[i][col]
                .abs()
                .partial_cmp(&m[j][col].abs())
                .unwrap_or(Ordering::Equal)
        })?;
        if m[pivot][col].abs() < 1e-10 {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in (col + 1)..4 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let mut acc = rhs[i];
        for j in (i + 1)..4 {
            acc -= m[i][j] * x[j];
        }
        x[i] = acc / m[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_of_identical_points_is_identity() {
        let m = Similarity::estimate(&REFERENCE, &REFERENCE).unwrap();
        assert!((m.a - 1.0).abs() < 1e-4, "a = {}", m.a);
        assert!(m.b.abs() < 1e-4, "b = {}", m.b);
        assert!(m.tx.abs() < 1e-3, "tx = {}", m.tx);
        assert!(m.ty.abs() < 1e-3, "ty = {}", m.ty);
    }

    #[test]
    fn estimate_recovers_scale() {
        // Source landmarks at double scale: the fitted transform halves.
        let doubled: [(f32, f32); 5] = std::array::from_fn(|i| {
            let (x, y) = REFERENCE[i];
            (x * 2.0, y * 2.0)
        });
        let m = Similarity::estimate(&doubled, &REFERENCE).unwrap();
        assert!((m.a - 0.5).abs() < 0.05, "a = {}, expected ~0.5", m.a);
    }

    #[test]
    fn invert_round_trips_points() {
        let m = Similarity {
            a: 0.8,
            b: 0.3,
            tx: 12.0,
            ty: -4.5,
        };
        let inv = m.invert().unwrap();
        for (x, y) in [(0.0, 0.0), (56.0, 71.0), (-10.0, 33.3)] {
            let (wx, wy) = m.apply(x, y);
            let (bx, by) = inv.apply(wx, wy);
            assert!((bx - x).abs() < 1e-3, "x: {bx} vs {x}");
            assert!((by - y).abs() < 1e-3, "y: {by} vs {y}");
        }
    }

    #[test]
    fn degenerate_transform_has_no_inverse() {
        let m = Similarity {
            a: 0.0,
            b: 0.0,
            tx: 1.0,
            ty: 1.0,
        };
        assert!(m.invert().is_none());
    }

    #[test]
    fn align_face_produces_canonical_crop() {
        let image = RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]));
        let landmarks: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        let aligned = align_face(&image, &landmarks).unwrap();
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
    }

    #[test]
    fn bright_patch_lands_near_reference_eye() {
        let mut image = RgbImage::new(200, 200);
        let landmarks: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];

        // Paint a patch at the left eye that survives interpolation.
        for dy in 0..5u32 {
            for dx in 0..5u32 {
                image.put_pixel(78 + dx, 58 + dy, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&image, &landmarks).unwrap();

        let (ref_x, ref_y) = (REFERENCE[0].0.round() as u32, REFERENCE[0].1.round() as u32);
        let mut brightest = 0u8;
        for dy in 0..3u32 {
            for dx in 0..3u32 {
                let (x, y) = (ref_x - 1 + dx, ref_y - 1 + dy);
                if x < ALIGNED_SIZE && y < ALIGNED_SIZE {
                    brightest = brightest.max(aligned.get_pixel(x, y).0[0]);
                }
            }
        }
        assert!(brightest > 100, "expected bright patch near ({ref_x}, {ref_y}), max = {brightest}");
    }
}
