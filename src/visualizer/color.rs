// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors and the box palette.

use image::Rgb;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{DetectError, Result};

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// White color.
    pub const WHITE: Self = Self(255, 255, 255);

    /// Create a new color from RGB values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Pixel value for `image`/`imageproc` drawing.
    #[must_use]
    pub const fn to_rgb(self) -> Rgb<u8> {
        Rgb([self.0, self.1, self.2])
    }

    /// Pack as `0x00RRGGBB`.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }
}

impl From<[u8; 3]> for Color {
    fn from(c: [u8; 3]) -> Self {
        Self(c[0], c[1], c[2])
    }
}

/// The 20-colour `tab20b` qualitative palette.
pub const TAB20B: [[u8; 3]; 20] = [
    [57, 59, 121],   // #393b79
    [82, 84, 163],   // #5254a3
    [107, 110, 207], // #6b6ecf
    [156, 158, 222], // #9c9ede
    [99, 121, 57],   // #637939
    [140, 162, 82],  // #8ca252
    [181, 207, 107], // #b5cf6b
    [206, 219, 156], // #cedb9c
    [140, 109, 49],  // #8c6d31
    [189, 158, 57],  // #bd9e39
    [231, 186, 82],  // #e7ba52
    [231, 203, 148], // #e7cb94
    [132, 60, 57],   // #843c39
    [173, 73, 74],   // #ad494a
    [214, 97, 107],  // #d6616b
    [231, 150, 156], // #e7969c
    [123, 65, 115],  // #7b4173
    [165, 81, 148],  // #a55194
    [206, 109, 189], // #ce6dbd
    [222, 158, 214], // #de9ed6
];

/// Draw `count` distinct colours from [`TAB20B`] without replacement.
///
/// # Errors
///
/// Returns [`DetectError::PaletteExhausted`] when `count` exceeds the palette.
pub fn sample_colors<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Vec<Color>> {
    if count > TAB20B.len() {
        return Err(DetectError::PaletteExhausted {
            classes: count,
            palette: TAB20B.len(),
        });
    }
    Ok(TAB20B
        .choose_multiple(rng, count)
        .map(|&c| Color::from(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn test_samples_are_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let colors = sample_colors(20, &mut rng).unwrap();
        let unique: HashSet<_> = colors.iter().collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn test_palette_exhausted() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            sample_colors(21, &mut rng),
            Err(DetectError::PaletteExhausted {
                classes: 21,
                palette: 20
            })
        ));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = sample_colors(5, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sample_colors(5, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_packing() {
        assert_eq!(Color::new(0x12, 0x34, 0x56).to_u32(), 0x0012_3456);
        assert_eq!(Color::WHITE.to_rgb(), Rgb([255, 255, 255]));
    }
}
