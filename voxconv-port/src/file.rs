//! File system abstraction, for loading and saving scenes that do not necessarily
//! live on the file system that [`std::fs`] accesses.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::file_extension;

/// A “file” that scenes can be loaded from and saved to, and which has a name,
/// without being tied to the current OS file system.
pub trait Fileish: fmt::Debug + Send + Sync {
    /// Name of the file, for display purposes such as in a window title.
    fn document_name(&self) -> String;

    /// Path of the file, for display purposes such as in an error, not a path that can
    /// necessarily be opened. Its extension is used for format detection.
    fn display_full_path(&self) -> String;

    /// Obtains the file contents.
    fn read(&self) -> Result<Vec<u8>, io::Error>;

    /// Replaces the file contents.
    fn write(&self, data: &[u8]) -> Result<(), io::Error>;

    /// The extension of [`Fileish::display_full_path()`], without the dot.
    fn extension(&self) -> Option<String> {
        file_extension(&self.display_full_path()).map(str::to_owned)
    }
}

impl Fileish for PathBuf {
    fn document_name(&self) -> String {
        match self.file_stem() {
            Some(n) => n.to_string_lossy(),
            None => self.to_string_lossy(),
        }
        .into_owned()
    }

    fn display_full_path(&self) -> String {
        self.display().to_string()
    }

    fn read(&self) -> Result<Vec<u8>, io::Error> {
        std::fs::read(self)
    }

    fn write(&self, data: &[u8]) -> Result<(), io::Error> {
        std::fs::write(self, data)
    }
}

/// A [`Fileish`] kept in memory, e.g. for data received from a browser or a network.
pub struct MemoryFile {
    name: String,
    data: Mutex<Vec<u8>>,
}

impl fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { name, data: _ } = self;
        f.debug_struct("MemoryFile")
            .field("name", name)
            .finish_non_exhaustive()
    }
}

impl MemoryFile {
    /// Constructs a [`MemoryFile`] with the given name and contents.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: Mutex::new(data),
        }
    }

    /// Returns a copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        // The data is always left consistent, so a poisoned lock is still usable.
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Fileish for MemoryFile {
    fn document_name(&self) -> String {
        self.name.clone()
    }

    fn display_full_path(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> Result<Vec<u8>, io::Error> {
        Ok(self.contents())
    }

    fn write(&self, data: &[u8]) -> Result<(), io::Error> {
        let mut contents = self.lock();
        contents.clear();
        contents.extend_from_slice(data);
        Ok(())
    }
}
