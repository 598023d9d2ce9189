//! Table of contents from the ncx navigation document.

use std::collections::HashMap;
use std::io::{Read, Seek};

use tracing::debug;

use crate::archive::EpubArchive;
use crate::doc::DocError;
use crate::package::{Manifest, ManifestItem};
use crate::uri;
use crate::xmlutils::{ChildNodeRef, XMLReader};

/// Nav points nested deeper than this are dropped.
pub const MAX_DEPTH: usize = 8;

/// One entry of the flattened table of contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocElement {
    /// nesting level, 0 for the top
    pub level: usize,
    /// the `playOrder`, 0 if missing or not a number
    pub order: usize,
    pub title: String,
    /// path from the archive root
    pub href: String,
    /// manifest id when the entry points to a manifest item, the nav point
    /// id otherwise
    pub id: String,
    /// the manifest item this entry points to, if any
    pub item: Option<ManifestItem>,
}

impl TocElement {
    /// Returns `true` if this entry is backed by a manifest item.
    pub fn in_manifest(&self) -> bool {
        self.item.is_some()
    }
}

/// Reads the navigation document `toc` and flattens its nav map.
pub(crate) fn resolve_toc<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    toc: &ManifestItem,
    manifest: &Manifest,
) -> Result<Vec<TocElement>, DocError> {
    let content = archive.get_entry(&toc.href)?;
    parse_toc(&content, &toc.href, manifest)
}

/// Flattens the ncx `content`, stored at `toc_path`, depth first.
pub(crate) fn parse_toc(
    content: &[u8],
    toc_path: &str,
    manifest: &Manifest,
) -> Result<Vec<TocElement>, DocError> {
    let root = XMLReader::parse(content).map_err(DocError::TocXml)?;

    let ids: HashMap<&str, &str> = manifest
        .values()
        .map(|item| (item.href.as_str(), item.id.as_str()))
        .collect();

    let Some(navmap) = root.borrow().find("navMap") else {
        debug!(toc = %toc_path, "navigation document without navMap");
        return Ok(vec![]);
    };
    let navpoints = navmap.borrow().children_named("navPoint");

    let walker = NavWalker {
        dir: uri::parent(toc_path),
        ids,
        manifest,
    };
    Ok(walker.walk(&navpoints, 0))
}

struct NavWalker<'a> {
    dir: &'a str,
    ids: HashMap<&'a str, &'a str>,
    manifest: &'a Manifest,
}

impl NavWalker<'_> {
    fn walk(&self, branch: &[ChildNodeRef], level: usize) -> Vec<TocElement> {
        if level >= MAX_DEPTH {
            return vec![];
        }

        let mut output = vec![];
        for navpoint in branch {
            let nav = navpoint.borrow();

            if let Some(label) = nav.child("navLabel") {
                let title = label
                    .borrow()
                    .child("text")
                    .map(|t| t.borrow().text())
                    .unwrap_or_default();
                let order = nav
                    .get_attr("playOrder")
                    .and_then(|o| o.trim().parse().ok())
                    .unwrap_or(0);
                let src = nav
                    .child("content")
                    .and_then(|c| c.borrow().get_attr("src"))
                    .filter(|s| !s.trim().is_empty());

                if let Some(src) = src {
                    let href = uri::join(self.dir, &src);
                    let item = self
                        .ids
                        .get(href.as_str())
                        .and_then(|id| self.manifest.get(*id));

                    let element = match item {
                        Some(item) => TocElement {
                            level,
                            order,
                            title,
                            href: item.href.clone(),
                            id: item.id.clone(),
                            item: Some(item.clone()),
                        },
                        None => TocElement {
                            level,
                            order,
                            title,
                            href,
                            id: nav
                                .get_attr("id")
                                .map(|id| id.trim().to_string())
                                .unwrap_or_default(),
                            item: None,
                        },
                    };
                    output.push(element);
                }
            }

            output.append(&mut self.walk(&nav.children_named("navPoint"), level + 1));
        }

        output
    }
}
