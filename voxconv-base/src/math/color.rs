//! Color data types.

use core::fmt;

/// A color with 8-bit sRGB channels and 8-bit alpha, as stored in voxel file palettes.
///
/// The packed [`u32`] form used by [`Rgba8::from_packed()`] and [`Rgba8::to_packed()`] is
/// `0xRRGGBBAA`.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[expect(clippy::exhaustive_structs)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel; 255 is fully opaque.
    pub a: u8,
}

impl Rgba8 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    /// Constructs a color from its channels.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs an opaque color.
    #[inline]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Unpacks a `0xRRGGBBAA` value.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::Rgba8;
    ///
    /// assert_eq!(Rgba8::from_packed(0x11223344), Rgba8::new(0x11, 0x22, 0x33, 0x44));
    /// ```
    #[inline]
    pub const fn from_packed(value: u32) -> Self {
        let [r, g, b, a] = value.to_be_bytes();
        Self { r, g, b, a }
    }

    /// Packs the color as `0xRRGGBBAA`.
    #[inline]
    pub const fn to_packed(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    /// Returns whether the alpha channel is zero.
    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Squared Euclidean distance between the two colors, treating all four channels
    /// as equally weighted.
    #[inline]
    pub fn distance_squared(self, other: Self) -> u32 {
        let d = |a: u8, b: u8| u32::from(a.abs_diff(b)).pow(2);
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b) + d(self.a, other.a)
    }
}

impl From<[u8; 4]> for Rgba8 {
    #[inline]
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba8> for [u8; 4] {
    #[inline]
    fn from(Rgba8 { r, g, b, a }: Rgba8) -> Self {
        [r, g, b, a]
    }
}

impl fmt::Debug for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgba8(#{:08x})", self.to_packed())
    }
}
