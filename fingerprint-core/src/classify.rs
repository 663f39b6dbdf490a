//! Classifier bank over the integral chromagram.
//!
//! After streaming ends, the chromagram is converted once into a 2D
//! prefix-sum ("integral") image so rectangular energy sums cost O(1).
//! Sixteen calibrated area-contrast classifiers then summarize every row
//! window into a 32-bit sub-fingerprint.

use crate::NOTES;
use crate::error::{FingerprintError, Result};

/// Widest classifier window, in rows. A row index is only valid while it
/// keeps this much lookahead inside the image.
const WINDOW_WIDTH: usize = 16;

/// Converts the raw chromagram into its integral image, in place.
///
/// Afterwards cell `[x][y]` holds the sum of all chromagram energies
/// with row ≤ x and note ≤ y. Runs exactly once per session; row
/// appends are meaningless once this has happened.
pub fn integral_image(image: &mut [f64], rows: usize) {
    if rows == 0 {
        return;
    }
    for note in 1..NOTES {
        image[note] += image[note - 1];
    }
    for row in 1..rows {
        let base = row * NOTES;
        image[base] += image[base - NOTES];
        for note in 1..NOTES {
            image[base + note] +=
                image[base + note - 1] + image[base + note - NOTES] - image[base + note - NOTES - 1];
        }
    }
}

/// Sum over the closed rectangle `[x1..=x2] × [y1..=y2]` of the original
/// chromagram, answered from the integral image by inclusion-exclusion.
/// Empty rectangles (x2 < x1 or y2 < y1) sum to 0.
fn area(image: &[f64], x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
    if x2 < x1 || y2 < y1 {
        return 0.0;
    }
    let cell = |x: i32, y: i32| image[x as usize * NOTES + y as usize];

    let mut sum = cell(x2, y2);
    if x1 > 0 {
        sum -= cell(x1 - 1, y2);
        if y1 > 0 {
            sum += cell(x1 - 1, y1 - 1);
        }
    }
    if y1 > 0 {
        sum -= cell(x2, y1 - 1);
    }
    sum
}

/// Compressive contrast between two area sums.
fn contrast(a: f64, b: f64) -> f64 {
    (1.0 + a).ln() - (1.0 + b).ln()
}

/// Maps a contrast value onto a 2-bit symbol via three calibrated
/// thresholds. The top two bands deliberately swap labels (Gray
/// coding); fingerprints only stay comparable across implementations
/// with this exact assignment.
fn quantize(value: f64, t0: f64, t1: f64, t2: f64) -> u32 {
    if value < t1 {
        if value < t0 { 0 } else { 1 }
    } else if value < t2 {
        3
    } else {
        2
    }
}

/// The six area-contrast shapes. `x` is the row (time) axis, `y` the
/// note axis; every shape works on the `h × w` window anchored at its
/// classifier's note offset.
#[derive(Clone, Copy)]
enum Shape {
    /// Total window energy against zero.
    Whole,
    /// Upper note half against lower note half.
    NoteHalves,
    /// Later time half against earlier time half.
    TimeHalves,
    /// Checkerboard quadrant contrast.
    Quadrants,
    /// Middle note third against the outer thirds.
    NoteThirds,
    /// Middle time third against the outer thirds.
    TimeThirds,
}

#[derive(Clone, Copy)]
struct Classifier {
    shape: Shape,
    y: i32,
    h: i32,
    w: i32,
    t0: f64,
    t1: f64,
    t2: f64,
}

impl Classifier {
    const fn new(shape: Shape, y: i32, h: i32, w: i32, t0: f64, t1: f64, t2: f64) -> Self {
        Classifier { shape, y, h, w, t0, t1, t2 }
    }

    fn classify(&self, image: &[f64], x: i32) -> u32 {
        let (y, h, w) = (self.y, self.h, self.w);
        let value = match self.shape {
            Shape::Whole => contrast(area(image, x, y, x + w - 1, y + h - 1), 0.0),
            Shape::NoteHalves => {
                let h2 = h / 2;
                contrast(
                    area(image, x, y + h2, x + w - 1, y + h - 1),
                    area(image, x, y, x + w - 1, y + h2 - 1),
                )
            }
            Shape::TimeHalves => {
                let w2 = w / 2;
                contrast(
                    area(image, x + w2, y, x + w - 1, y + h - 1),
                    area(image, x, y, x + w2 - 1, y + h - 1),
                )
            }
            Shape::Quadrants => {
                let h2 = h / 2;
                let w2 = w / 2;
                let a = area(image, x, y + h2, x + w2 - 1, y + h - 1)
                    + area(image, x + w2, y, x + w - 1, y + h2 - 1);
                let b = area(image, x, y, x + w2 - 1, y + h2 - 1)
                    + area(image, x + w2, y + h2, x + w - 1, y + h - 1);
                contrast(a, b)
            }
            Shape::NoteThirds => {
                let h3 = h / 3;
                let a = area(image, x, y + h3, x + w - 1, y + 2 * h3 - 1);
                let b = area(image, x, y, x + w - 1, y + h3 - 1)
                    + area(image, x, y + 2 * h3, x + w - 1, y + h - 1);
                contrast(a, b)
            }
            Shape::TimeThirds => {
                let w3 = w / 3;
                let a = area(image, x + w3, y, x + 2 * w3 - 1, y + h - 1);
                let b = area(image, x, y, x + w3 - 1, y + h - 1)
                    + area(image, x + 2 * w3, y, x + w - 1, y + h - 1);
                contrast(a, b)
            }
        };
        quantize(value, self.t0, self.t1, self.t2)
    }
}

/// The calibrated bank. Order matters: the first classifier lands in the
/// most significant bit pair of each sub-fingerprint.
const CLASSIFIERS: [Classifier; WINDOW_WIDTH] = [
    Classifier::new(Shape::Whole, 4, 3, 15, 1.98215, 2.35817, 2.63523),
    Classifier::new(Shape::NoteThirds, 4, 6, 15, -1.03809, -0.651211, -0.282167),
    Classifier::new(Shape::NoteHalves, 0, 4, 16, -0.298702, 0.119262, 0.558497),
    Classifier::new(Shape::Quadrants, 8, 2, 12, -0.105439, 0.0153946, 0.135898),
    Classifier::new(Shape::Quadrants, 4, 4, 8, -0.142891, 0.0258736, 0.200632),
    Classifier::new(Shape::NoteThirds, 0, 3, 5, -0.826319, -0.590612, -0.368214),
    Classifier::new(Shape::NoteHalves, 2, 2, 9, -0.557409, -0.233035, 0.0534525),
    Classifier::new(Shape::TimeHalves, 7, 3, 4, -0.0646826, 0.00620476, 0.0784847),
    Classifier::new(Shape::TimeHalves, 6, 2, 16, -0.192387, -0.029699, 0.215855),
    Classifier::new(Shape::TimeHalves, 1, 3, 2, -0.0397818, -0.00568076, 0.0292026),
    Classifier::new(Shape::TimeThirds, 10, 1, 15, -0.53823, -0.369934, -0.190235),
    Classifier::new(Shape::Quadrants, 6, 2, 10, -0.124877, 0.0296483, 0.139239),
    Classifier::new(Shape::TimeHalves, 1, 1, 14, -0.101475, 0.0225617, 0.231971),
    Classifier::new(Shape::Quadrants, 5, 6, 4, -0.0799915, -0.00729616, 0.063262),
    Classifier::new(Shape::NoteHalves, 9, 2, 12, -0.272556, 0.019424, 0.302559),
    Classifier::new(Shape::Quadrants, 4, 2, 14, -0.164292, -0.0321188, 0.08463),
];

fn sub_fingerprint(image: &[f64], row: usize) -> u32 {
    CLASSIFIERS
        .iter()
        .fold(0, |value, c| (value << 2) | c.classify(image, row as i32))
}

/// Computes one 32-bit sub-fingerprint per valid row window.
///
/// # Arguments
/// * `image` - the chromagram after [`integral_image`]
/// * `rows` - number of rows in the image
///
/// # Returns
/// * `rows − 16 + 1` sub-fingerprints
/// * `Err(InsufficientLength)` when fewer than 2 windows fit
pub fn fingerprint(image: &[f64], rows: usize) -> Result<Vec<u32>> {
    let length = (rows + 1).saturating_sub(WINDOW_WIDTH);
    if length < 2 {
        return Err(FingerprintError::InsufficientLength);
    }
    Ok((0..length).map(|row| sub_fingerprint(image, row)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic non-uniform chromagram for area checks.
    fn raw_image(rows: usize) -> Vec<f64> {
        (0..rows * NOTES)
            .map(|i| ((i * 7 + 3) % 23) as f64 / 23.0)
            .collect()
    }

    fn brute_force_area(raw: &[f64], x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
        let mut sum = 0.0;
        for x in x1..=x2 {
            for y in y1..=y2 {
                sum += raw[x as usize * NOTES + y as usize];
            }
        }
        sum
    }

    #[test]
    fn area_matches_brute_force() {
        let rows = 24;
        let raw = raw_image(rows);
        let mut integral = raw.clone();
        integral_image(&mut integral, rows);

        let rects = [
            (0, 0, 0, 0),
            (0, 0, 23, 11),
            (3, 2, 17, 9),
            (5, 5, 5, 5),
            (10, 0, 20, 3),
            (1, 11, 22, 11),
        ];
        for (x1, y1, x2, y2) in rects {
            let fast = area(&integral, x1, y1, x2, y2);
            let slow = brute_force_area(&raw, x1, y1, x2, y2);
            assert!(
                (fast - slow).abs() < 1e-9,
                "rect ({x1},{y1})..({x2},{y2}): {fast} vs {slow}"
            );
        }
    }

    #[test]
    fn empty_rectangles_sum_to_zero() {
        let mut image = raw_image(20);
        integral_image(&mut image, 20);
        assert_eq!(area(&image, 5, 3, 4, 3), 0.0);
        assert_eq!(area(&image, 5, 3, 5, 2), 0.0);
    }

    #[test]
    fn quantizer_gray_codes_top_bands() {
        // Bands below t0, t0..t1, t1..t2, above t2 in order.
        assert_eq!(quantize(-1.0, 0.0, 1.0, 2.0), 0);
        assert_eq!(quantize(0.5, 0.0, 1.0, 2.0), 1);
        assert_eq!(quantize(1.5, 0.0, 1.0, 2.0), 3);
        assert_eq!(quantize(2.5, 0.0, 1.0, 2.0), 2);
    }

    #[test]
    fn fingerprint_needs_two_windows() {
        let rows = WINDOW_WIDTH;
        let mut image = raw_image(rows);
        integral_image(&mut image, rows);
        assert_eq!(
            fingerprint(&image, rows),
            Err(FingerprintError::InsufficientLength)
        );

        let rows = WINDOW_WIDTH + 1;
        let mut image = raw_image(rows);
        integral_image(&mut image, rows);
        assert_eq!(fingerprint(&image, rows).unwrap().len(), 2);
    }

    #[test]
    fn sub_fingerprints_are_deterministic() {
        let rows = 40;
        let mut image = raw_image(rows);
        integral_image(&mut image, rows);
        let a = fingerprint(&image, rows).unwrap();
        let b = fingerprint(&image, rows).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), rows - WINDOW_WIDTH + 1);
    }
}
