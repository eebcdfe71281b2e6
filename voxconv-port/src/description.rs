//! Describing file formats by name, extensions and magic bytes, and building file-dialog
//! filter patterns from those descriptions.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::LazyLock;

use arrayvec::ArrayVec;
use itertools::Itertools as _;

// -------------------------------------------------------------------------------------------------

/// Maximum number of extensions a [`FormatDescription`] may list.
pub const MAX_EXTENSIONS: usize = 8;

/// A function which reports whether the first four bytes of a file, read as a big-endian
/// [`u32`], identify a particular format.
pub type MagicPredicate = fn(u32) -> bool;

bitflags::bitflags! {
    /// Classification and capability bits of a [`FormatDescription`].
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct FormatFlags: u32 {
        /// The description is the “all supported formats” filter entry.
        const ALL = 1 << 0;
        /// The description was synthesized by [`create_group_patterns()`] to stand for
        /// several related formats.
        const GROUP = 1 << 1;
        /// Files may contain a preview image, readable with
        /// [`Format::load_screenshot()`](crate::Format::load_screenshot).
        const EMBEDDED_SCREENSHOT = 1 << 8;
        /// Files may contain their own palette.
        const EMBEDDED_PALETTE = 1 << 9;
        /// The format stores polygon meshes rather than voxels.
        const MESH = 1 << 10;
    }
}

/// Identifies a file format for display and detection purposes.
///
/// A description with an empty name is *invalid*; such a value is used as a placeholder
/// and as the terminator of description lists (see [`convert_to_all_file_pattern()`]).
///
/// # Equality
///
/// Two descriptions with non-empty names are equal if their names are equal.
/// If either name is empty, `a == b` instead tests whether `b`'s first extension is one of
/// `a`'s extensions. This makes equality asymmetric for invalid descriptions, which is
/// relied upon to look up a format from an extension-only placeholder. For the same reason,
/// [`FormatDescription`] does not implement [`Eq`] or [`Hash`].
#[derive(Clone, Debug, Default)]
pub struct FormatDescription {
    name: Cow<'static, str>,
    extensions: ArrayVec<Cow<'static, str>, MAX_EXTENSIONS>,
    is_a: Option<MagicPredicate>,
    flags: FormatFlags,
}

impl FormatDescription {
    /// Constructs a description. Extensions are converted to lower case.
    ///
    /// Panics if more than [`MAX_EXTENSIONS`] extensions are given.
    /// Use [`FormatDescription::checked_new()`] to avoid panics.
    #[track_caller]
    pub fn new<E>(
        name: impl Into<Cow<'static, str>>,
        extensions: impl IntoIterator<Item = E>,
        is_a: Option<MagicPredicate>,
        flags: FormatFlags,
    ) -> Self
    where
        E: Into<Cow<'static, str>>,
    {
        match Self::checked_new(name, extensions, is_a, flags) {
            Ok(desc) => desc,
            Err(error) => panic!("FormatDescription::new: {error}"),
        }
    }

    /// Constructs a description. Extensions are converted to lower case.
    ///
    /// Returns an error if more than [`MAX_EXTENSIONS`] extensions are given.
    pub fn checked_new<E>(
        name: impl Into<Cow<'static, str>>,
        extensions: impl IntoIterator<Item = E>,
        is_a: Option<MagicPredicate>,
        flags: FormatFlags,
    ) -> Result<Self, TooManyExtensions>
    where
        E: Into<Cow<'static, str>>,
    {
        let name = name.into();
        let all: Vec<Cow<'static, str>> = extensions
            .into_iter()
            .map(|e| lower_case(e.into()))
            .collect();
        if all.len() > MAX_EXTENSIONS {
            return Err(TooManyExtensions {
                name: name.into_owned(),
                count: all.len(),
            });
        }
        let extensions = all.into_iter().collect();
        Ok(Self {
            name,
            extensions,
            is_a,
            flags,
        })
    }

    /// The display name of the format. Empty for an invalid description.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file extensions of the format, in lower case and without a leading dot.
    pub fn extensions(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.extensions.iter().map(|e| &**e)
    }

    /// The format's classification and capability bits.
    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    /// Returns whether this description has a name.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    /// Returns whether `magic` is recognized by this format's magic-byte predicate.
    ///
    /// Always false for formats without a predicate.
    pub fn matches_magic(&self, magic: u32) -> bool {
        self.is_a.is_some_and(|is_a| is_a(magic))
    }

    /// Returns whether the format has a magic-byte predicate.
    pub fn has_magic(&self) -> bool {
        self.is_a.is_some()
    }

    /// Returns whether `extension` (without a leading dot) is one of this format's extensions,
    /// ignoring case.
    ///
    /// ```
    /// use voxconv_port::{FormatDescription, FormatFlags};
    ///
    /// let desc = FormatDescription::new("MagicaVoxel", ["vox"], None, FormatFlags::empty());
    /// assert!(desc.matches_extension("VOX"));
    /// assert!(!desc.matches_extension("qb"));
    /// ```
    pub fn matches_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.extensions.iter().any(|e| **e == extension)
    }

    /// Returns the comma-separated wildcards for this format's extensions, such as
    /// `"*.vox,*.qb"`, or an empty string if there are none.
    pub fn wild_card(&self) -> String {
        self.extensions.iter().map(|e| format!("*.{e}")).join(",")
    }
}

impl PartialEq for FormatDescription {
    fn eq(&self, rhs: &Self) -> bool {
        if self.name.is_empty() || rhs.name.is_empty() {
            return rhs
                .extensions
                .first()
                .is_some_and(|ext| self.matches_extension(ext));
        }
        self.name == rhs.name
    }
}

impl PartialOrd for FormatDescription {
    /// Orders descriptions by name. Invalid descriptions are unordered.
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        if self.name.is_empty() || rhs.name.is_empty() {
            return None;
        }
        Some(self.name.cmp(&rhs.name))
    }
}

fn lower_case(s: Cow<'static, str>) -> Cow<'static, str> {
    if s.chars().any(char::is_uppercase) {
        Cow::Owned(s.to_lowercase())
    } else {
        s
    }
}

/// Error returned by [`FormatDescription::checked_new()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error(
    "format “{name}” has {count} extensions; at most {max} are allowed",
    max = MAX_EXTENSIONS
)]
#[non_exhaustive]
pub struct TooManyExtensions {
    /// Name of the format being described.
    pub name: String,
    /// Number of extensions given.
    pub count: usize,
}

// -------------------------------------------------------------------------------------------------

/// A file name paired with the format the user chose for it, as produced by a file dialog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileDescription {
    name: String,
    desc: FormatDescription,
}

impl FileDescription {
    /// Replaces the file name and format. [`None`] resets the format to the invalid
    /// description.
    pub fn set(&mut self, name: impl Into<String>, desc: Option<&FormatDescription>) {
        self.name = name.into();
        self.desc = desc.cloned().unwrap_or_default();
    }

    /// Resets to an empty name and an invalid format.
    pub fn clear(&mut self) {
        self.name.clear();
        self.desc = FormatDescription::default();
    }

    /// Returns whether no file name is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// The file name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The chosen format; invalid if none was chosen.
    pub fn description(&self) -> &FormatDescription {
        &self.desc
    }
}

// -------------------------------------------------------------------------------------------------

/// The “all supported formats” filter entry.
pub const ALL_SUPPORTED: FormatDescription = FormatDescription {
    name: Cow::Borrowed("All supported"),
    extensions: ArrayVec::new_const(),
    is_a: None,
    flags: FormatFlags::ALL,
};

/// Returns `"<name> (<wildcards>)"`, e.g. `"MagicaVoxel (*.vox)"`.
pub fn convert_to_file_pattern(desc: &FormatDescription) -> String {
    format!("{} ({})", desc.name(), desc.wild_card())
}

/// Returns the comma-separated wildcards of every extension of every description in `descs`,
/// without duplicates.
///
/// Processing stops at the first invalid description.
///
/// ```
/// use voxconv_port::{FormatDescription, FormatFlags, convert_to_all_file_pattern};
///
/// let descs = [
///     FormatDescription::new("A", ["a", "x"], None, FormatFlags::empty()),
///     FormatDescription::new("B", ["b", "x"], None, FormatFlags::empty()),
/// ];
/// assert_eq!(convert_to_all_file_pattern(&descs), "*.a,*.x,*.b");
/// ```
pub fn convert_to_all_file_pattern(descs: &[FormatDescription]) -> String {
    valid_prefix(descs)
        .flat_map(FormatDescription::extensions)
        .unique()
        .map(|e| format!("*.{e}"))
        .join(",")
}

/// Returns whether the extension of `file` matches any description in `descs`.
///
/// Processing stops at the first invalid description.
pub fn is_a(file: &str, descs: &[FormatDescription]) -> bool {
    let Some(extension) = file_extension(file) else {
        return false;
    };
    valid_prefix(descs).any(|desc| desc.matches_extension(extension))
}

/// Appends to `groups` one description per run of at least two consecutive descriptions in
/// `descs` that belong to the same family, such as “Qubicle Binary” and “Qubicle Exchange”.
///
/// The family of a description is the first word of its name, without a trailing `:`.
/// Each group is named after the family, has the [`FormatFlags::GROUP`] flag, and lists the
/// distinct extensions of its members (up to [`MAX_EXTENSIONS`]).
///
/// Processing stops at the first invalid description.
pub fn create_group_patterns(descs: &[FormatDescription], groups: &mut Vec<FormatDescription>) {
    for (family, members) in &valid_prefix(descs).chunk_by(|desc| family_of(desc.name()).to_owned())
    {
        let members: Vec<&FormatDescription> = members.collect();
        if members.len() < 2 || family.is_empty() {
            continue;
        }
        let mut extensions: ArrayVec<Cow<'static, str>, MAX_EXTENSIONS> = ArrayVec::new();
        for ext in members.iter().flat_map(|d| d.extensions.iter()).unique() {
            if extensions.try_push(ext.clone()).is_err() {
                log::debug!("group “{family}” has more than {MAX_EXTENSIONS} extensions");
                break;
            }
        }
        groups.push(FormatDescription {
            name: Cow::Owned(family),
            extensions,
            is_a: None,
            flags: FormatFlags::GROUP,
        });
    }
}

fn family_of(name: &str) -> &str {
    name.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(':')
}

fn valid_prefix(descs: &[FormatDescription]) -> impl Iterator<Item = &FormatDescription> {
    descs.iter().take_while(|desc| desc.is_valid())
}

/// Returns the extension of `file`, without the dot.
pub(crate) fn file_extension(file: &str) -> Option<&str> {
    Path::new(file).extension().and_then(|e| e.to_str())
}

// -------------------------------------------------------------------------------------------------

/// Image formats that may appear alongside voxel files, e.g. as palettes or thumbnails.
pub fn images() -> &'static [FormatDescription] {
    static IMAGES: LazyLock<Vec<FormatDescription>> = LazyLock::new(|| {
        let none = FormatFlags::empty();
        vec![
            FormatDescription::new("Portable Network Graphics", ["png"], Some(is_png), none),
            FormatDescription::new("JPEG", ["jpeg", "jpg"], None, none),
            FormatDescription::new("Targa image file", ["tga"], None, none),
            FormatDescription::new("Bitmap", ["bmp"], None, none),
            FormatDescription::new("Graphics Interchange Format", ["gif"], None, none),
            FormatDescription::new("Photoshop", ["psd"], None, none),
            FormatDescription::new("Radiance rgbE", ["hdr"], None, none),
            FormatDescription::new("Softimage PIC", ["pic"], None, none),
            FormatDescription::new("Portable Anymap", ["pnm"], None, none),
        ]
    });
    &IMAGES
}

/// Palette file formats.
pub fn palettes() -> &'static [FormatDescription] {
    static PALETTES: LazyLock<Vec<FormatDescription>> = LazyLock::new(|| {
        let none = FormatFlags::empty();
        vec![
            FormatDescription::new("Gimp Palette", ["gpl"], None, none),
            FormatDescription::new("Adobe Swatch Exchange", ["ase"], None, none),
            FormatDescription::new("Aseprite Image", ["aseprite"], None, none),
            FormatDescription::new("Photoshop Palette", ["aco"], None, none),
            FormatDescription::new("RGB Palette", ["pal"], None, none),
            FormatDescription::new("CSV Palette", ["csv"], None, none),
            FormatDescription::new("Paint.NET Palette", ["txt"], None, none),
            FormatDescription::new("Portable Network Graphics", ["png"], Some(is_png), none),
        ]
    });
    &PALETTES
}

/// Returns whether `file` has the extension of one of the [`images()`] formats.
pub fn is_image(file: &str) -> bool {
    is_a(file, images())
}

fn is_png(magic: u32) -> bool {
    magic == u32::from_be_bytes(*b"\x89PNG")
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn desc(name: &'static str, exts: &[&'static str]) -> FormatDescription {
        FormatDescription::new(name, exts.iter().copied(), None, FormatFlags::empty())
    }

    #[test]
    fn extensions_are_lower_cased() {
        let d = desc("Qubicle", &["QB", "qbt"]);
        assert_eq!(d.extensions().collect::<Vec<_>>(), ["qb", "qbt"]);
    }

    #[test]
    fn too_many_extensions() {
        let error = FormatDescription::checked_new(
            "Many",
            ["a", "b", "c", "d", "e", "f", "g", "h", "i"],
            None,
            FormatFlags::empty(),
        )
        .unwrap_err();
        assert_eq!(
            error,
            TooManyExtensions {
                name: "Many".into(),
                count: 9
            }
        );
    }

    #[rstest]
    #[case("vox")]
    #[case("VOX")]
    #[case("Vox")]
    #[case("vOx")]
    #[case("voX")]
    fn matches_extension_ignores_case(#[case] ext: &str) {
        assert!(desc("MagicaVoxel", &["vox"]).matches_extension(ext));
    }

    #[rstest]
    #[case(&[], "")]
    #[case(&["vox"], "*.vox")]
    #[case(&["vox", "qb"], "*.vox,*.qb")]
    fn wild_card(#[case] exts: &[&'static str], #[case] expected: &str) {
        assert_eq!(desc("X", exts).wild_card(), expected);
    }

    #[test]
    fn equality_by_name() {
        assert_eq!(desc("A", &["vox"]), desc("A", &["qb"]));
        assert_ne!(desc("A", &["vox"]), desc("B", &["vox"]));
    }

    #[test]
    fn equality_with_invalid_is_asymmetric() {
        let named = desc("MagicaVoxel", &["vox"]);
        let placeholder = desc("", &["vox", "zzz"]);
        let other = desc("", &["zzz"]);
        // Each side tests whether the right-hand side's first extension is its own.
        assert_eq!(named, placeholder);
        assert_eq!(placeholder, named);
        assert_ne!(named, other);
        assert_eq!(placeholder, other);
        assert_ne!(other, placeholder);
        assert_ne!(named, desc("", &[]));
    }

    #[test]
    fn ordering_by_name() {
        let mut list = vec![desc("b", &[]), desc("a", &[]), desc("c", &[])];
        list.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            list.iter().map(FormatDescription::name).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
        assert_eq!(desc("", &[]).partial_cmp(&desc("a", &[])), None);
    }

    #[test]
    fn file_pattern() {
        assert_eq!(
            convert_to_file_pattern(&desc("Qubicle Binary", &["qb"])),
            "Qubicle Binary (*.qb)"
        );
        assert_eq!(convert_to_file_pattern(&ALL_SUPPORTED), "All supported ()");
    }

    #[test]
    fn all_file_pattern_stops_at_invalid() {
        let descs = [
            desc("A", &["a"]),
            desc("B", &["b", "a"]),
            FormatDescription::default(),
            desc("C", &["c"]),
        ];
        assert_eq!(convert_to_all_file_pattern(&descs), "*.a,*.b");
        assert_eq!(convert_to_all_file_pattern(&[]), "");
    }

    #[test]
    fn is_a_checks_extension() {
        let descs = [desc("A", &["vox"]), FormatDescription::default(), desc("B", &["qb"])];
        assert!(is_a("dir/model.VOX", &descs));
        assert!(!is_a("model.qb", &descs));
        assert!(!is_a("model", &descs));
    }

    #[test]
    fn group_patterns() {
        let descs = [
            desc("Qubicle Binary", &["qb"]),
            desc("Qubicle Binary Tree", &["qbt"]),
            desc("Qubicle Exchange", &["qef", "qb"]),
            desc("MagicaVoxel", &["vox"]),
            desc("Minecraft: region", &["mca"]),
            desc("Minecraft schematic", &["schematic", "schem"]),
            FormatDescription::default(),
            desc("Minecraft level", &["dat"]),
        ];
        let mut groups = Vec::new();
        create_group_patterns(&descs, &mut groups);

        assert_eq!(
            groups
                .iter()
                .map(|g| (g.name(), g.wild_card(), g.flags()))
                .collect::<Vec<_>>(),
            [
                ("Qubicle", "*.qb,*.qbt,*.qef".to_owned(), FormatFlags::GROUP),
                ("Minecraft", "*.mca,*.schematic,*.schem".to_owned(), FormatFlags::GROUP),
            ]
        );
    }

    #[test]
    fn file_description_lifecycle() {
        let vox = desc("MagicaVoxel", &["vox"]);
        let mut file = FileDescription::default();
        assert!(file.is_empty());
        assert!(!file.description().is_valid());

        file.set("a.vox", Some(&vox));
        assert_eq!(file.as_str(), "a.vox");
        assert_eq!(file.description().name(), "MagicaVoxel");

        file.set("b.vox", None);
        assert!(!file.description().is_valid());

        file.clear();
        assert!(file.is_empty());
    }

    #[test]
    fn builtin_lists() {
        assert!(is_image("photo.JPG"));
        assert!(!is_image("model.vox"));
        assert!(palettes().iter().any(|d| d.matches_extension("gpl")));
        assert!(images()[0].matches_magic(u32::from_be_bytes(*b"\x89PNG")));
        assert_eq!(ALL_SUPPORTED.flags(), FormatFlags::ALL);
    }
}
