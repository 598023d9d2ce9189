//! Manages the epub doc.
//!
//! Provides easy methods to resolve the book structure and to get chapters,
//! images and any other resource of the epub.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::archive::{ArchiveError, EpubArchive};
use crate::package::{self, GuideReference, Manifest, ManifestItem, Metadata, Spine};
use crate::render::{self, ChapterRenderer};
use crate::toc::{self, TocElement};
use crate::xmlutils::XMLError;

/// Entry whose presence marks the book as encrypted.
pub const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("Archive Error: {0}")]
    ArchiveError(#[from] ArchiveError),
    #[error("No files in archive")]
    EmptyArchive,
    #[error("No mimetype file in archive")]
    MissingMimetype,
    #[error("Unsupported mime type: {0}")]
    UnsupportedMimetype(String),
    #[error("No container file in archive")]
    MissingContainer,
    #[error("Parsing container XML failed: {0}")]
    ContainerXml(#[source] XMLError),
    #[error("No rootfiles found")]
    NoRootfiles,
    #[error("Empty rootfile")]
    EmptyRootfile,
    #[error("Rootfile not found from archive: {0}")]
    RootfileNotFound(String),
    #[error("Parsing package XML failed: {0}")]
    PackageXml(#[source] XMLError),
    #[error("Parsing container XML failed in TOC: {0}")]
    TocXml(#[source] XMLError),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid mime type for chapter: {0}")]
    InvalidChapterMime(String),
    #[error("Invalid mime type for image: {0}")]
    InvalidImageMime(String),
}

/// Url prefixes used when rewriting chapter references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpubOptions {
    /// prefix for `src` attributes, `/images/` by default
    pub image_root: String,
    /// prefix for `href` attributes, `/links/` by default
    pub link_root: String,
}

impl Default for EpubOptions {
    fn default() -> Self {
        Self {
            image_root: String::from("/images/"),
            link_root: String::from("/links/"),
        }
    }
}

impl EpubOptions {
    /// Sets the image prefix, a trailing `/` is added if missing.
    #[must_use]
    pub fn with_image_root(mut self, root: &str) -> Self {
        self.image_root = with_trailing_slash(root);
        self
    }

    /// Sets the link prefix, a trailing `/` is added if missing.
    #[must_use]
    pub fn with_link_root(mut self, root: &str) -> Self {
        self.link_root = with_trailing_slash(root);
        self
    }
}

fn with_trailing_slash(root: &str) -> String {
    let root = root.trim();
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{}/", root)
    }
}

/// Everything resolved from one epub, built at once by [`EpubDoc::parse`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Book {
    /// package version, `2.0` if not declared
    pub version: String,
    /// root file full path
    pub root_file: String,
    /// root file base path
    pub root_base: String,
    pub metadata: Metadata,
    /// resource id -> item
    pub manifest: Manifest,
    pub guide: Vec<GuideReference>,
    pub spine: Spine,
    /// flattened table of contents from the ncx
    pub toc: Vec<TocElement>,
}

impl Book {
    /// The reading order, same as `spine.contents`.
    pub fn flow(&self) -> &[ManifestItem] {
        &self.spine.contents
    }
}

/// Struct to control the epub document
///
/// The archive is kept behind a mutex so chapters and images can be read
/// from several threads once the book is parsed.
#[derive(Debug)]
pub struct EpubDoc<R: Read + Seek> {
    archive: Mutex<EpubArchive<R>>,
    options: EpubOptions,
    book: Arc<Book>,
}

impl EpubDoc<BufReader<File>> {
    /// Opens and parses the epub file in `path`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use epub_web::doc::EpubDoc;
    ///
    /// let doc = EpubDoc::new("alice.epub").unwrap();
    /// println!("{}", doc.metadata().title);
    /// for entry in doc.toc() {
    ///     println!("{}{}", "  ".repeat(entry.level), entry.title);
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the epub is broken or if the file doesn't
    /// exists.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DocError> {
        Self::with_options(path, EpubOptions::default())
    }

    /// Same as [`Self::new`] with custom url prefixes.
    ///
    /// # Errors
    ///
    /// Returns an error if the epub is broken or if the file doesn't
    /// exists.
    pub fn with_options<P: AsRef<Path>>(path: P, options: EpubOptions) -> Result<Self, DocError> {
        let archive = EpubArchive::new(path)?;
        let mut doc = Self::from_archive(archive, options);
        doc.parse()?;
        Ok(doc)
    }
}

impl<R: Read + Seek> EpubDoc<R> {
    /// Opens and parses the epub contained in `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the epub is broken.
    pub fn from_reader(reader: R) -> Result<Self, DocError> {
        Self::from_reader_with_options(reader, EpubOptions::default())
    }

    /// Same as [`Self::from_reader`] with custom url prefixes.
    ///
    /// # Errors
    ///
    /// Returns an error if the epub is broken.
    pub fn from_reader_with_options(reader: R, options: EpubOptions) -> Result<Self, DocError> {
        let mut doc = Self::open(reader, options)?;
        doc.parse()?;
        Ok(doc)
    }

    /// Opens the archive in `reader` without parsing it, everything stays
    /// empty until [`Self::parse`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if `reader` isn't a zip archive.
    pub fn open(reader: R, options: EpubOptions) -> Result<Self, DocError> {
        let archive = EpubArchive::from_reader(reader)?;
        Ok(Self::from_archive(archive, options))
    }

    fn from_archive(archive: EpubArchive<R>, options: EpubOptions) -> Self {
        Self {
            archive: Mutex::new(archive),
            options,
            book: Arc::default(),
        }
    }

    fn archive(&self) -> MutexGuard<'_, EpubArchive<R>> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves the package and the navigation documents.
    ///
    /// The result replaces the previous one as a whole. On error the book is
    /// left empty.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that fails, see [`DocError`].
    pub fn parse(&mut self) -> Result<(), DocError> {
        match self.resolve() {
            Ok(book) => {
                info!(
                    title = %book.metadata.title,
                    resources = book.manifest.len(),
                    chapters = book.spine.contents.len(),
                    toc = book.toc.len(),
                    "epub parsed"
                );
                self.book = Arc::new(book);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "epub parse failed");
                self.book = Arc::default();
                Err(e)
            }
        }
    }

    /// Parses the epub and hands the outcome to `on_complete`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use epub_web::doc::{EpubDoc, EpubOptions};
    ///
    /// let file = File::open("alice.epub").unwrap();
    /// let mut doc = EpubDoc::open(file, EpubOptions::default()).unwrap();
    /// let chapters = doc.parse_then(|result| match result {
    ///     Ok(book) => book.flow().len(),
    ///     Err(e) => {
    ///         eprintln!("{}", e);
    ///         0
    ///     }
    /// });
    /// ```
    pub fn parse_then<T, F>(&mut self, on_complete: F) -> T
    where
        F: FnOnce(Result<&Book, &DocError>) -> T,
    {
        match self.parse() {
            Ok(()) => on_complete(Ok(&*self.book)),
            Err(e) => on_complete(Err(&e)),
        }
    }

    fn resolve(&self) -> Result<Book, DocError> {
        let mut archive = self.archive();
        let package = package::resolve_package(&mut *archive)?;

        let toc = match &package.spine.toc {
            Some(item) => toc::resolve_toc(&mut *archive, item, &package.manifest)?,
            None => vec![],
        };

        Ok(Book {
            version: package.version,
            root_file: package.root_file,
            root_base: package.root_base,
            metadata: package.metadata,
            manifest: package.manifest,
            guide: package.guide,
            spine: package.spine,
            toc,
        })
    }

    /// The current book.
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// A handle to the current book that outlives a later [`Self::parse`].
    pub fn snapshot(&self) -> Arc<Book> {
        Arc::clone(&self.book)
    }

    pub fn options(&self) -> &EpubOptions {
        &self.options
    }

    pub fn metadata(&self) -> &Metadata {
        &self.book.metadata
    }

    pub fn manifest(&self) -> &Manifest {
        &self.book.manifest
    }

    pub fn guide(&self) -> &[GuideReference] {
        &self.book.guide
    }

    pub fn spine(&self) -> &Spine {
        &self.book.spine
    }

    pub fn flow(&self) -> &[ManifestItem] {
        self.book.flow()
    }

    pub fn toc(&self) -> &[TocElement] {
        &self.book.toc
    }

    pub fn version(&self) -> &str {
        &self.book.version
    }

    pub fn root_file(&self) -> &str {
        &self.book.root_file
    }

    pub fn root_base(&self) -> &str {
        &self.book.root_base
    }

    /// Names of every entry in the archive.
    pub fn files(&self) -> Vec<String> {
        self.archive().files.clone()
    }

    fn item(&self, id: &str) -> Result<&ManifestItem, DocError> {
        self.book
            .manifest
            .get(id)
            .ok_or_else(|| DocError::FileNotFound(id.to_string()))
    }

    /// Returns the chapter `id` as it is stored in the epub.
    ///
    /// # Errors
    ///
    /// Returns [`DocError::FileNotFound`] if `id` isn't in the manifest and
    /// [`DocError::InvalidChapterMime`] if it isn't xhtml or svg.
    pub fn get_chapter_raw(&self, id: &str) -> Result<String, DocError> {
        let item = self.item(id)?;
        if !render::is_chapter_mime(&item.media_type) {
            return Err(DocError::InvalidChapterMime(item.media_type.clone()));
        }
        let content = self.archive().get_entry_as_str(&item.href)?;
        Ok(content)
    }

    /// Returns the chapter `id` ready to be embedded in a web page.
    ///
    /// Only the body is kept, scripts, styles and event handlers are removed
    /// and references to other resources of the epub are rewritten with the
    /// image and link roots of [`EpubOptions`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use epub_web::doc::EpubDoc;
    /// let doc = EpubDoc::new("alice.epub").unwrap();
    /// let first = doc.flow()[0].id.clone();
    /// let html = doc.get_chapter(&first).unwrap();
    /// assert!(!html.contains("<script"));
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_chapter_raw`].
    pub fn get_chapter(&self, id: &str) -> Result<String, DocError> {
        let raw = self.get_chapter_raw(id)?;
        let renderer = ChapterRenderer::new(
            &self.book.manifest,
            &self.book.root_base,
            &self.options.image_root,
            &self.options.link_root,
        );
        Ok(renderer.render(&raw))
    }

    /// Returns the image content and mime-type by its manifest id.
    ///
    /// # Errors
    ///
    /// Returns [`DocError::FileNotFound`] if `id` isn't in the manifest and
    /// [`DocError::InvalidImageMime`] if it isn't an image.
    pub fn get_image(&self, id: &str) -> Result<(Vec<u8>, String), DocError> {
        let item = self.item(id)?;
        let is_image = item
            .media_type
            .trim()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"));
        if !is_image {
            return Err(DocError::InvalidImageMime(item.media_type.clone()));
        }
        self.get_file(id)
    }

    /// Returns any resource content and mime-type by its manifest id.
    ///
    /// # Errors
    ///
    /// Returns [`DocError::FileNotFound`] if `id` isn't in the manifest.
    pub fn get_file(&self, id: &str) -> Result<(Vec<u8>, String), DocError> {
        let item = self.item(id)?;
        let content = self.archive().get_entry(&item.href)?;
        Ok((content, item.media_type.clone()))
    }

    /// Returns the content of the archive entry `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry doesn't exist.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, DocError> {
        Ok(self.archive().get_entry(name)?)
    }

    /// Returns the content of the archive entry `name` as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry doesn't exist or isn't UTF-8.
    pub fn read_file_str(&self, name: &str) -> Result<String, DocError> {
        Ok(self.archive().get_entry_as_str(name)?)
    }

    /// Returns `true` if the epub has an encryption declaration.
    pub fn has_drm(&self) -> bool {
        self.archive().has_entry(ENCRYPTION_PATH)
    }

    /// Returns the id of the epub cover.
    ///
    /// The cover is searched in the doc metadata, by the tag
    /// `<meta name="cover" content="..">`, then in the manifest by the
    /// `cover-image` property. The id is not guaranteed to be valid.
    pub fn get_cover_id(&self) -> Option<String> {
        if let Some(id) = self.book.metadata.get("cover") {
            return Some(id.to_string());
        }
        self.book
            .manifest
            .values()
            .find(|item| {
                item.properties()
                    .is_some_and(|p| p.split_whitespace().any(|p| p == "cover-image"))
            })
            .map(|item| item.id.clone())
    }

    /// Returns the cover's content and mime-type
    ///
    /// Returns [`None`] if the cover can't be found.
    pub fn get_cover(&self) -> Option<(Vec<u8>, String)> {
        let id = self.get_cover_id()?;
        self.get_image(&id).ok()
    }

    /// Function to convert a resource id to a chapter number in the flow.
    /// If the resource isn't in the flow, None will be returned
    pub fn resource_id_to_chapter(&self, id: &str) -> Option<usize> {
        self.flow().iter().position(|item| item.id == id)
    }
}
