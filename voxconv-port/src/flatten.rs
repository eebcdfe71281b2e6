//! Reducing color precision so that similar colors share a palette entry.

use std::collections::HashMap;

use voxconv::Palette;
use voxconv::math::Rgba8;

/// Rounds each of the red, green and blue channels of `color` down to a multiple of `factor`.
///
/// Colors that differ only slightly, as produced by lossy sources, land in the same bucket and
/// therefore map to the same palette entry. Alpha is unchanged. A `factor` of 0 or 1 returns
/// `color` unchanged.
///
/// ```
/// use voxconv::math::Rgba8;
/// use voxconv_port::flatten_rgb;
///
/// assert_eq!(
///     flatten_rgb(Rgba8::new(17, 200, 255, 128), 8),
///     Rgba8::new(16, 200, 248, 128),
/// );
/// ```
#[must_use]
pub fn flatten_rgb(color: Rgba8, factor: u8) -> Rgba8 {
    if factor <= 1 {
        return color;
    }
    let bucket = |c: u8| c / factor * factor;
    Rgba8::new(bucket(color.r), bucket(color.g), bucket(color.b), color.a)
}

/// Maps colors to indices of one [`Palette`], flattening them first.
///
/// A flattened color is matched exactly if the palette contains it, and otherwise to the
/// entry with the smallest distance. Results are cached, since a volume typically uses few
/// distinct colors.
#[derive(Debug)]
pub struct PaletteLookup<'p> {
    palette: &'p Palette,
    factor: u8,
    cache: HashMap<Rgba8, Option<u8>>,
}

impl<'p> PaletteLookup<'p> {
    /// Constructs a lookup into `palette` using the given flatten factor.
    pub fn new(palette: &'p Palette, factor: u8) -> Self {
        Self {
            palette,
            factor,
            cache: HashMap::new(),
        }
    }

    /// The palette colors are looked up in.
    pub fn palette(&self) -> &'p Palette {
        self.palette
    }

    /// The flatten factor applied before lookup.
    pub fn factor(&self) -> u8 {
        self.factor
    }

    /// Returns the index of the palette entry used for `color`, or [`None`] if the palette is
    /// empty.
    pub fn index_for(&mut self, color: Rgba8) -> Option<u8> {
        let palette = self.palette;
        let factor = self.factor;
        *self.cache.entry(color).or_insert_with(|| {
            let flat = flatten_rgb(color, factor);
            palette
                .index_of(flat)
                .or_else(|| palette.closest_match(flat))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn flatten_is_idempotent(#[values(0, 1, 2, 3, 7, 16, 100, 255)] factor: u8) {
        for value in [0u8, 1, 2, 15, 16, 17, 127, 128, 200, 254, 255] {
            let color = Rgba8::new(value, value.wrapping_mul(3), 255 - value, value);
            let once = flatten_rgb(color, factor);
            assert_eq!(flatten_rgb(once, factor), once, "{color:?}");
            assert_eq!(once.a, color.a);
        }
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn small_factor_is_identity(#[case] factor: u8) {
        let color = Rgba8::new(3, 77, 251, 9);
        assert_eq!(flatten_rgb(color, factor), color);
    }

    #[test]
    fn flatten_buckets() {
        assert_eq!(
            flatten_rgb(Rgba8::opaque(255, 254, 1), 255),
            Rgba8::opaque(255, 0, 0)
        );
        assert_eq!(
            flatten_rgb(Rgba8::opaque(31, 32, 33), 16),
            Rgba8::opaque(16, 32, 32)
        );
    }

    #[test]
    fn lookup_exact_then_nearest() {
        let palette = Palette::from_colors([
            Rgba8::opaque(0, 0, 0),
            Rgba8::opaque(16, 32, 48),
            Rgba8::opaque(250, 250, 250),
        ])
        .unwrap();
        let mut lookup = PaletteLookup::new(&palette, 16);
        // Flattens onto entry 1 exactly.
        assert_eq!(lookup.index_for(Rgba8::opaque(20, 40, 60)), Some(1));
        // No exact match after flattening to (240, 240, 240); nearest is entry 2.
        assert_eq!(lookup.index_for(Rgba8::opaque(241, 242, 243)), Some(2));
        assert_eq!(lookup.index_for(Rgba8::opaque(1, 2, 3)), Some(0));
        assert_eq!(lookup.factor(), 16);
    }

    #[test]
    fn lookup_in_empty_palette() {
        let palette = Palette::new();
        let mut lookup = PaletteLookup::new(&palette, 1);
        assert_eq!(lookup.index_for(Rgba8::WHITE), None);
    }
}
