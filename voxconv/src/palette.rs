//! [`Palette`]: the color table that solid [`Voxel`](crate::Voxel)s index into.

use std::sync::LazyLock;

use crate::math::Rgba8;

/// An ordered table of at most [`Palette::MAX_COLORS`] colors.
///
/// Solid voxels refer to colors by their `u8` index in the palette of the node that owns
/// the voxels.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Palette {
    colors: Vec<Rgba8>,
}

impl Palette {
    /// Maximum number of colors a palette can hold.
    pub const MAX_COLORS: usize = 256;

    /// Constructs an empty palette.
    pub const fn new() -> Self {
        Self { colors: Vec::new() }
    }

    /// Constructs a palette from a sequence of colors.
    ///
    /// Returns an error if there are more than [`Palette::MAX_COLORS`] colors.
    pub fn from_colors(colors: impl IntoIterator<Item = Rgba8>) -> Result<Self, PaletteFullError> {
        let colors: Vec<Rgba8> = colors.into_iter().collect();
        if colors.len() > Self::MAX_COLORS {
            return Err(PaletteFullError);
        }
        Ok(Self { colors })
    }

    /// The built-in palette used when a file provides no colors of its own.
    ///
    /// It contains all 216 combinations of six evenly spaced levels of red, green and blue,
    /// followed by a 40-step gray ramp. Every entry is opaque.
    pub fn default_palette() -> &'static Palette {
        static DEFAULT: LazyLock<Palette> = LazyLock::new(|| {
            const LEVELS: [u8; 6] = [0, 51, 102, 153, 204, 255];
            let cube = LEVELS.into_iter().flat_map(|r| {
                LEVELS
                    .into_iter()
                    .flat_map(move |g| LEVELS.into_iter().map(move |b| Rgba8::opaque(r, g, b)))
            });
            // 1, 7, 13, ..., 235: never a multiple of 51, so distinct from the cube's grays.
            let grays = (0..40u8).map(|i| {
                let v = 1 + i * 6;
                Rgba8::opaque(v, v, v)
            });
            Palette {
                colors: cube.chain(grays).collect(),
            }
        });
        &DEFAULT
    }

    /// Number of colors in the palette.
    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns whether the palette has no colors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Returns the color at `index`, if there is one.
    #[inline]
    pub fn get(&self, index: u8) -> Option<Rgba8> {
        self.colors.get(usize::from(index)).copied()
    }

    /// All colors, in index order.
    #[inline]
    pub fn colors(&self) -> &[Rgba8] {
        &self.colors
    }

    /// Iterates over `(index, color)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Rgba8)> + '_ {
        // Indices fit in u8 because len <= MAX_COLORS.
        (0..=u8::MAX).zip(self.colors.iter().copied())
    }

    /// Replaces the color at `index`. Returns [`false`] if `index` is past the end.
    pub fn set(&mut self, index: u8, color: Rgba8) -> bool {
        match self.colors.get_mut(usize::from(index)) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    /// Appends a color and returns its index.
    pub fn push(&mut self, color: Rgba8) -> Result<u8, PaletteFullError> {
        let index = u8::try_from(self.colors.len()).map_err(|_| PaletteFullError)?;
        self.colors.push(color);
        Ok(index)
    }

    /// Returns the index of the first entry exactly equal to `color`.
    pub fn index_of(&self, color: Rgba8) -> Option<u8> {
        self.iter().find(|&(_, c)| c == color).map(|(i, _)| i)
    }

    /// Returns the index of an entry exactly equal to `color`, appending it if there is none.
    pub fn find_or_push(&mut self, color: Rgba8) -> Result<u8, PaletteFullError> {
        match self.index_of(color) {
            Some(index) => Ok(index),
            None => self.push(color),
        }
    }

    /// Returns the index of the entry nearest to `color`, or [`None`] if the palette is empty.
    ///
    /// Distance is measured by [`Rgba8::distance_squared()`]; ties go to the lowest index.
    ///
    /// ```
    /// use voxconv::Palette;
    /// use voxconv::math::Rgba8;
    ///
    /// let palette = Palette::from_colors([Rgba8::BLACK, Rgba8::WHITE]).unwrap();
    /// assert_eq!(palette.closest_match(Rgba8::opaque(200, 210, 220)), Some(1));
    /// ```
    pub fn closest_match(&self, color: Rgba8) -> Option<u8> {
        self.iter()
            .min_by_key(|&(_, c)| c.distance_squared(color))
            .map(|(i, _)| i)
    }
}

/// Error returned when a [`Palette`] would exceed [`Palette::MAX_COLORS`] entries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("palette cannot hold more than {} colors", Palette::MAX_COLORS)]
#[non_exhaustive]
pub struct PaletteFullError;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn default_palette_is_full_and_distinct() {
        let p = Palette::default_palette();
        assert_eq!(p.len(), Palette::MAX_COLORS);
        let distinct: HashSet<Rgba8> = p.colors().iter().copied().collect();
        assert_eq!(distinct.len(), Palette::MAX_COLORS);
        assert!(p.colors().iter().all(|c| c.a == 255));
    }

    #[test]
    fn push_until_full() {
        let mut p = Palette::new();
        for i in 0..=255u8 {
            assert_eq!(p.push(Rgba8::opaque(i, 0, 0)), Ok(i));
        }
        assert_eq!(p.push(Rgba8::WHITE), Err(PaletteFullError));
        assert_eq!(p.len(), 256);
    }

    #[test]
    fn from_colors_too_many() {
        let colors = (0..257u32).map(|i| Rgba8::from_packed((i << 8) | 0xFF));
        assert_eq!(Palette::from_colors(colors), Err(PaletteFullError));
    }

    #[test]
    fn find_or_push_reuses() {
        let mut p = Palette::new();
        assert_eq!(p.find_or_push(Rgba8::WHITE), Ok(0));
        assert_eq!(p.find_or_push(Rgba8::BLACK), Ok(1));
        assert_eq!(p.find_or_push(Rgba8::WHITE), Ok(0));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn closest_match_empty() {
        assert_eq!(Palette::new().closest_match(Rgba8::WHITE), None);
    }

    #[test]
    fn closest_match_tie_goes_low() {
        let p = Palette::from_colors([Rgba8::opaque(10, 0, 0), Rgba8::opaque(30, 0, 0)]).unwrap();
        assert_eq!(p.closest_match(Rgba8::opaque(20, 0, 0)), Some(0));
    }

    #[test]
    fn set() {
        let mut p = Palette::from_colors([Rgba8::BLACK]).unwrap();
        assert!(p.set(0, Rgba8::WHITE));
        assert!(!p.set(1, Rgba8::WHITE));
        assert_eq!(p.get(0), Some(Rgba8::WHITE));
    }
}
