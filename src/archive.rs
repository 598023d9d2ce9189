//! Manages the zip component part of the epub doc.
//!
//! Provides easy methods to look up entries of the epub archive and to get
//! their content as bytes or as string.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// Path of the container pointer inside every epub.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Zip Error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid UTF-8 in entry name: {0}")]
    NameUtf8(#[from] std::str::Utf8Error),
    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Epub archive struct. Here it's stored the file path and the list of
/// files in the zip archive.
#[derive(Debug)]
pub struct EpubArchive<R: Read + Seek> {
    zip: zip::ZipArchive<R>,
    pub path: PathBuf,
    pub files: Vec<String>,
}

impl EpubArchive<BufReader<File>> {
    /// Opens the epub file in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the zip is broken or if the file doesn't
    /// exists.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut archive = Self::from_reader(BufReader::new(file))?;
        archive.path = path.to_path_buf();
        Ok(archive)
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Opens the epub contained in `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the zip is broken.
    pub fn from_reader(reader: R) -> Result<Self, ArchiveError> {
        let zip = zip::ZipArchive::new(reader)?;
        let files = zip.file_names().map(String::from).collect();

        Ok(Self {
            zip,
            path: PathBuf::new(),
            files,
        })
    }

    /// Returns the content of the file by the `name` as `Vec<u8>`.
    ///
    /// Names are tried verbatim first, then percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't exists in the zip archive.
    pub fn get_entry<P: AsRef<Path>>(&mut self, name: P) -> Result<Vec<u8>, ArchiveError> {
        // zip entries always use unix separators
        let mut name = name.as_ref().to_string_lossy().to_string();
        if cfg!(windows) {
            name = name.replace('\\', "/");
        }
        let mut entry = Vec::new();

        match self.zip.by_name(&name) {
            Ok(mut zipfile) => {
                zipfile.read_to_end(&mut entry)?;
                return Ok(entry);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let decoded = percent_encoding::percent_decode(name.as_bytes()).decode_utf8()?;
        match self.zip.by_name(&decoded) {
            Ok(mut zipfile) => {
                zipfile.read_to_end(&mut entry)?;
                Ok(entry)
            }
            Err(zip::result::ZipError::FileNotFound) => Err(ArchiveError::FileNotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the content of the file by the `name` as `String`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't exists in the zip archive or
    /// if the content isn't valid UTF-8.
    pub fn get_entry_as_str<P: AsRef<Path>>(&mut self, name: P) -> Result<String, ArchiveError> {
        let content = self.get_entry(name)?;
        String::from_utf8(content).map_err(ArchiveError::from)
    }

    /// Returns `true` if an entry named exactly `name` exists.
    pub fn has_entry(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }

    /// Looks up `name` ignoring ASCII case and returns the entry name as it
    /// is spelled inside the archive.
    pub fn find_entry(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Returns the content of container file "META-INF/container.xml".
    ///
    /// # Errors
    ///
    /// Returns an error if the epub doesn't have the container file.
    pub fn get_container_file(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let name = self
            .find_entry(CONTAINER_PATH)
            .map(String::from)
            .ok_or_else(|| ArchiveError::FileNotFound(CONTAINER_PATH.into()))?;
        self.get_entry(name)
    }
}
