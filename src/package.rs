//! Resolution of the package document.
//!
//! Checks the mimetype, follows the container pointer to the opf file and
//! reads its metadata, manifest, spine and guide into plain structs. Every
//! href stored here is relative to the archive root.

use std::collections::HashMap;
use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::archive::{ArchiveError, EpubArchive};
use crate::doc::DocError;
use crate::uri;
use crate::xmlutils::{XMLNode, XMLReader};

/// Content expected in the `mimetype` entry.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";
/// Media type of the rootfile declared in the container.
pub const OEBPS_MIMETYPE: &str = "application/oebps-package+xml";
/// Version assumed when the package doesn't declare one.
pub const DEFAULT_VERSION: &str = "2.0";

/// Book level descriptive fields read from the opf `<metadata>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub creator: String,
    /// sortable form of the creator, same as `creator` if not declared
    pub creator_file_as: String,
    pub title: String,
    /// always lower-cased
    pub language: String,
    /// first declared subject, empty if none
    pub subject: String,
    pub subjects: Vec<String>,
    pub date: String,
    pub description: String,
    pub publisher: String,
    pub source: String,
    /// identifier without a scheme whose id mentions `uuid`, with the
    /// `urn:uuid:` prefix stripped and upper-cased
    pub uuid: String,
    /// identifiers keyed by their scheme and `<meta>` values keyed by their
    /// `name` or `property`
    pub fields: HashMap<String, String>,
}

impl Metadata {
    /// Returns a custom field, e.g. `"ISBN"` or `"cover"`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// One resource declared in the manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// path from the archive root
    pub href: String,
    pub media_type: String,
    /// any other declared attribute, like `properties` or `fallback`
    pub attributes: HashMap<String, String>,
}

impl ManifestItem {
    pub fn properties(&self) -> Option<&str> {
        self.attributes.get("properties").map(String::as_str)
    }
}

/// resource id -> item
pub type Manifest = HashMap<String, ManifestItem>;

/// Entry of the opf `<guide>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuideReference {
    /// the `type` attribute, e.g. `cover` or `toc`
    pub kind: String,
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spine {
    /// the navigation document, if the spine points to a valid one
    pub toc: Option<ManifestItem>,
    /// reading order
    pub contents: Vec<ManifestItem>,
}

/// Everything resolved from the package document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    pub version: String,
    /// package document path in the archive
    pub root_file: String,
    /// package document directory
    pub root_base: String,
    pub metadata: Metadata,
    pub manifest: Manifest,
    pub guide: Vec<GuideReference>,
    pub spine: Spine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Metadata,
    Manifest,
    Spine,
    Guide,
    Ignored,
}

impl Section {
    fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "metadata" => Self::Metadata,
            "manifest" => Self::Manifest,
            "spine" => Self::Spine,
            "guide" => Self::Guide,
            _ => Self::Ignored,
        }
    }
}

/// Runs the whole package resolution against `archive`.
pub(crate) fn resolve_package<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
) -> Result<Package, DocError> {
    if archive.files.is_empty() {
        return Err(DocError::EmptyArchive);
    }

    check_mimetype(archive)?;
    let root_file = find_root_file(archive)?;
    debug!(root_file = %root_file, "package document found");

    let content = archive.get_entry(&root_file)?;
    let root = XMLReader::parse(&content).map_err(DocError::PackageXml)?;
    let package = parse_package(&root.borrow(), &root_file);
    Ok(package)
}

fn check_mimetype<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<(), DocError> {
    let name = archive
        .find_entry("mimetype")
        .map(String::from)
        .ok_or(DocError::MissingMimetype)?;
    let mime = archive.get_entry_as_str(name)?.trim().to_lowercase();

    if mime != EPUB_MIMETYPE {
        return Err(DocError::UnsupportedMimetype(mime));
    }
    Ok(())
}

fn find_root_file<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<String, DocError> {
    let container = archive.get_container_file().map_err(|e| match e {
        ArchiveError::FileNotFound(_) => DocError::MissingContainer,
        e => DocError::from(e),
    })?;
    let root = XMLReader::parse(&container).map_err(DocError::ContainerXml)?;
    let root = root.borrow();

    let rootfiles = root
        .find("rootfiles")
        .map(|r| r.borrow().children_named("rootfile"))
        .filter(|r| !r.is_empty())
        .ok_or(DocError::NoRootfiles)?;

    let full_path = rootfiles
        .iter()
        .find_map(|r| {
            let r = r.borrow();
            match (r.get_attr("media-type"), r.get_attr("full-path")) {
                (Some(mime), Some(path)) if mime == OEBPS_MIMETYPE && !path.trim().is_empty() => {
                    Some(path.trim().to_string())
                }
                _ => None,
            }
        })
        .ok_or(DocError::EmptyRootfile)?;

    archive
        .find_entry(&full_path)
        .map(String::from)
        .ok_or(DocError::RootfileNotFound(full_path))
}

/// Reads the `<package>` element. The manifest goes first because the spine
/// refers to it, whatever the declared order is.
pub(crate) fn parse_package(root: &XMLNode, root_file: &str) -> Package {
    let root_base = uri::parent(root_file).to_string();
    let mut package = Package {
        version: root
            .get_attr("version")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        root_file: root_file.to_string(),
        ..Package::default()
    };

    for child in &root.children {
        let node = child.borrow();
        if Section::from_tag(&node.name) == Section::Manifest {
            package.manifest = parse_manifest(&node, &root_base);
        }
    }

    for child in &root.children {
        let node = child.borrow();
        match Section::from_tag(&node.name) {
            Section::Metadata => package.metadata = parse_metadata(&node),
            Section::Spine => package.spine = parse_spine(&node, &package.manifest),
            Section::Guide => package.guide = parse_guide(&node, &root_base),
            Section::Manifest | Section::Ignored => {}
        }
    }

    package.root_base = root_base;
    package
}

fn first_text(node: &XMLNode, tag: &str) -> String {
    node.child(tag).map(|c| c.borrow().text()).unwrap_or_default()
}

fn normalize_uuid(value: &str) -> String {
    let value = value.trim();
    let value = match value.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("urn:uuid:") => &value[9..],
        _ => value,
    };
    value.to_uppercase().trim().to_string()
}

fn parse_metadata(node: &XMLNode) -> Metadata {
    let mut metadata = Metadata {
        publisher: first_text(node, "publisher"),
        title: first_text(node, "title"),
        description: first_text(node, "description"),
        date: first_text(node, "date"),
        language: first_text(node, "language").to_lowercase(),
        source: first_text(node, "source"),
        ..Metadata::default()
    };

    metadata.subjects = node
        .children_named("subject")
        .iter()
        .map(|s| s.borrow().text())
        .collect();
    metadata.subject = metadata.subjects.first().cloned().unwrap_or_default();

    if let Some(creator) = node.child("creator") {
        let creator = creator.borrow();
        metadata.creator = creator.text();
        metadata.creator_file_as = creator
            .get_attr("file-as")
            .map(|f| f.trim().to_string())
            .unwrap_or_else(|| metadata.creator.clone());
    }

    for identifier in node.children_named("identifier") {
        let identifier = identifier.borrow();
        let value = identifier.text();
        if let Some(scheme) = identifier.get_attr("scheme") {
            metadata
                .fields
                .entry(scheme.trim().to_string())
                .or_insert(value);
        } else {
            let is_uuid = identifier
                .get_attr("id")
                .is_some_and(|id| id.to_lowercase().contains("uuid"));
            if is_uuid && metadata.uuid.is_empty() {
                metadata.uuid = normalize_uuid(&value);
            }
        }
    }

    for meta in node.children_named("meta") {
        let meta = meta.borrow();
        if let Some(name) = meta.get_attr("name") {
            let value = meta.get_attr("content").unwrap_or_else(|| meta.text());
            metadata.fields.insert(name, value);
        } else if let Some(property) = meta.get_attr("property") {
            metadata.fields.insert(property, meta.text());
        }
    }

    metadata
}

fn parse_manifest(node: &XMLNode, base: &str) -> Manifest {
    let mut manifest = Manifest::new();

    for item in node.children_named("item") {
        let item = item.borrow();
        let (Some(id), Some(href)) = (item.get_attr("id"), item.get_attr("href")) else {
            warn!(attrs = ?item.attrs, "manifest item without id or href skipped");
            continue;
        };

        let attributes = item
            .attrs
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "href" | "media-type"))
            .cloned()
            .collect();

        manifest.insert(
            id.clone(),
            ManifestItem {
                id,
                href: uri::resolve(base, &href),
                media_type: item.get_attr("media-type").unwrap_or_default(),
                attributes,
            },
        );
    }

    manifest
}

fn parse_guide(node: &XMLNode, base: &str) -> Vec<GuideReference> {
    node.children_named("reference")
        .iter()
        .map(|r| {
            let r = r.borrow();
            GuideReference {
                kind: r.get_attr("type").unwrap_or_default(),
                title: r.get_attr("title").unwrap_or_default(),
                href: r
                    .get_attr("href")
                    .map(|h| uri::resolve(base, &h))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn parse_spine(node: &XMLNode, manifest: &Manifest) -> Spine {
    let toc = node.get_attr("toc").and_then(|id| {
        let item = manifest.get(&id).cloned();
        if item.is_none() {
            warn!(toc = %id, "spine toc points to an unknown manifest id");
        }
        item
    });

    let mut contents = vec![];
    for itemref in node.children_named("itemref") {
        let Some(idref) = itemref.borrow().get_attr("idref") else {
            continue;
        };
        match manifest.get(&idref) {
            Some(item) => contents.push(item.clone()),
            None => debug!(idref = %idref, "spine itemref skipped, not in manifest"),
        }
    }

    Spine { toc, contents }
}
