use std::fmt;
use std::io::{self, Read as _, Seek as _, SeekFrom};

use crate::{Format, FormatConfig, FormatDescription, ReadStream, file_extension};

/// Function that constructs a [`Format`] from its configuration.
pub type FormatConstructor = fn(&FormatConfig) -> Format;

/// One format known to a [`FormatRegistry`].
#[derive(Clone)]
pub struct RegistryEntry {
    description: FormatDescription,
    constructor: FormatConstructor,
}

impl RegistryEntry {
    /// The description used to find this entry.
    pub fn description(&self) -> &FormatDescription {
        &self.description
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegistryEntry")
            .field(&self.description.name())
            .finish()
    }
}

/// The set of formats that files may be loaded from and saved to, and the means to pick one
/// for a given file.
#[derive(Clone, Debug, Default)]
pub struct FormatRegistry {
    entries: Vec<RegistryEntry>,
}

impl FormatRegistry {
    /// Constructs a registry with no formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a registry containing every format compiled into this library.
    pub fn with_builtin_formats() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        cfg_if::cfg_if! {
            if #[cfg(feature = "dot-vox")] {
                registry.register(crate::mv::description(), crate::mv::format);
            }
        }
        cfg_if::cfg_if! {
            if #[cfg(feature = "native")] {
                registry.register(crate::native::description(), crate::native::format);
            }
        }
        registry
    }

    /// Adds a format. Formats registered earlier take precedence during detection.
    pub fn register(&mut self, description: FormatDescription, constructor: FormatConstructor) {
        log::trace!("registering format {}", description.name());
        self.entries.push(RegistryEntry {
            description,
            constructor,
        });
    }

    /// The registered entries, in registration order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// The descriptions of the registered formats, in registration order.
    pub fn descriptions(&self) -> impl ExactSizeIterator<Item = &FormatDescription> + '_ {
        self.entries.iter().map(|entry| &entry.description)
    }

    /// Finds the first format that lists `extension`, ignoring letter case.
    pub fn find_by_extension(&self, extension: &str) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.description.matches_extension(extension))
    }

    /// Finds the first format whose magic predicate accepts `magic`.
    pub fn find_by_magic(&self, magic: u32) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.description.matches_magic(magic))
    }

    /// Picks the format for a file: by its magic bytes if they are known and identify a
    /// format, otherwise by the extension of `filename`.
    pub fn detect(&self, filename: &str, magic: Option<u32>) -> Option<&RegistryEntry> {
        let by_magic = magic.and_then(|magic| self.find_by_magic(magic));
        let found = by_magic.or_else(|| self.find_by_extension(file_extension(filename)?));
        match found {
            Some(entry) => log::debug!(
                "detected {name} for {filename} by {method}",
                name = entry.description.name(),
                method = if by_magic.is_some() { "magic" } else { "extension" },
            ),
            None => log::debug!("no format detected for {filename}"),
        }
        found
    }

    /// Constructs the [`Format`] of `entry` with the given configuration.
    pub fn create(&self, entry: &RegistryEntry, config: &FormatConfig) -> Format {
        (entry.constructor)(config)
    }
}

/// Reads the first four bytes at the current position as a big-endian [`u32`], then returns
/// the stream to that position.
///
/// Returns [`None`] if fewer than four bytes remain or the stream cannot be read.
pub fn read_magic(stream: &mut dyn ReadStream) -> Option<u32> {
    let start = stream.stream_position().ok()?;
    let mut stream = scopeguard::guard(stream, |stream| {
        if let Err(error) = stream.seek(SeekFrom::Start(start)) {
            log::warn!("failed to restore stream position after reading magic: {error}");
        }
    });
    let mut bytes = [0; 4];
    match stream.read_exact(&mut bytes) {
        Ok(()) => Some(u32::from_be_bytes(bytes)),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            log::debug!("could not read magic bytes: {error}");
            None
        }
    }
}
