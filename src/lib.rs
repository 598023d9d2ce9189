#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::let_underscore_drop,
    clippy::uninlined_format_args,
    clippy::missing_const_for_fn,
)]

//! EPUB library
//! lib to read an epub file and serve its chapters as html
//!
//! # Examples
//!
//! ## Opening
//!
//! ```no_run
//! use epub_web::doc::EpubDoc;
//! let doc = EpubDoc::new("alice.epub");
//! assert!(doc.is_ok());
//! ```
//!
//! ## Getting doc metadata
//!
//! ```no_run
//! # use epub_web::doc::EpubDoc;
//! # let doc = EpubDoc::new("alice.epub").unwrap();
//! let metadata = doc.metadata();
//! println!("{} by {} ({})", metadata.title, metadata.creator, metadata.language);
//! println!("ISBN: {:?}", metadata.get("ISBN"));
//! ```
//!
//! ## Accessing resources
//!
//! The manifest maps each resource id to its path from the archive root and
//! its media type. The flow is the reading order.
//!
//! ```no_run
//! # use epub_web::doc::EpubDoc;
//! # let doc = EpubDoc::new("alice.epub").unwrap();
//! for item in doc.flow() {
//!     println!("{} -> {} ({})", item.id, item.href, item.media_type);
//! }
//! ```
//!
//! ## Serving chapters
//!
//! Chapters come back as the inner html of their body. Images point to
//! `{image_root}{id}/{path}` and links to `{link_root}{id}/{path}`, so a
//! web server only has to route both prefixes back to [`doc::EpubDoc::get_image`]
//! and [`doc::EpubDoc::get_chapter`].
//!
//! ```no_run
//! use epub_web::doc::{EpubDoc, EpubOptions};
//!
//! let options = EpubOptions::default()
//!     .with_image_root("/book/1/img")
//!     .with_link_root("/book/1/chapter");
//! let doc = EpubDoc::with_options("alice.epub", options).unwrap();
//!
//! let html = doc.get_chapter("chapter_001").unwrap();
//! let (image, mime) = doc.get_image("img1").unwrap();
//! ```

mod uri;
mod xmlutils;

pub mod archive;
pub mod doc;
pub mod package;
pub mod render;
pub mod toc;

pub use doc::{Book, DocError, EpubDoc, EpubOptions};
pub use xmlutils::XMLError;
