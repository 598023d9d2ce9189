//! Turns a chapter document into html that can be embedded in a web page.
//!
//! The chapter body is kept, scripts and styles are removed, event handlers
//! are disabled and every reference to a manifest resource is rewritten to
//! `{root}{id}/{path}` so a web server can serve it by id.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::package::{Manifest, ManifestItem};
use crate::uri;

/// Media types [`ChapterRenderer`] accepts as chapters.
pub const CHAPTER_MIMETYPES: [&str; 2] = ["application/xhtml+xml", "image/svg+xml"];

// Stands for a line break while the patterns below run, so they can match
// across lines.
const LINE_SENTINEL: &str = "\u{0}";

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("valid regex"));

static BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body[^>]*?>(.*)</body[^>]*?>").expect("valid regex"));

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<script[^>]*?/>|<script[^>]*?>.*?</script[^>]*?>|</?script[^>]*>?")
        .expect("valid regex")
});

static STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<style[^>]*?/>|<style[^>]*?>.*?</style[^>]*?>|</?style[^>]*>?")
        .expect("valid regex")
});

static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)([\s\x00/"'])(on\w+)(\s*=)"#).expect("valid regex"));

static SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\s\x00]src\s*=\s*["']?)([^"'\s>]*?)(["'\s>])"#).expect("valid regex")
});

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\s\x00]href\s*=\s*["']?)([^"'\s>]*?)(["'\s>])"#).expect("valid regex")
});

/// Returns `true` if `media_type` can be rendered as a chapter.
pub fn is_chapter_mime(media_type: &str) -> bool {
    CHAPTER_MIMETYPES.contains(&media_type)
}

/// Rewrites chapters of one book.
///
/// `base` is the package document directory, relative references found in
/// chapters are resolved against it.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use epub_web::package::ManifestItem;
/// use epub_web::render::ChapterRenderer;
///
/// let mut manifest = HashMap::new();
/// manifest.insert("img1".to_string(), ManifestItem {
///     id: "img1".into(),
///     href: "OEBPS/pic.jpg".into(),
///     media_type: "image/jpeg".into(),
///     ..ManifestItem::default()
/// });
///
/// let renderer = ChapterRenderer::new(&manifest, "OEBPS", "/images/", "/links/");
/// let html = renderer.render(r#"<html><body><img src="pic.jpg"/></body></html>"#);
/// assert_eq!(r#"<img src="/images/img1/OEBPS/pic.jpg"/>"#, html);
/// ```
pub struct ChapterRenderer<'a> {
    base: &'a str,
    image_root: &'a str,
    link_root: &'a str,
    by_href: HashMap<&'a str, &'a ManifestItem>,
}

impl<'a> ChapterRenderer<'a> {
    pub fn new(
        manifest: &'a Manifest,
        base: &'a str,
        image_root: &'a str,
        link_root: &'a str,
    ) -> Self {
        let by_href = manifest
            .values()
            .map(|item| (item.href.as_str(), item))
            .collect();

        Self {
            base,
            image_root,
            link_root,
            by_href,
        }
    }

    /// Runs every rewrite over `raw`, in order.
    pub fn render(&self, raw: &str) -> String {
        let text = LINE_BREAK.replace_all(raw, LINE_SENTINEL);
        let text = body(&text);
        let text = strip(&SCRIPT, text);
        let text = strip(&STYLE, text);
        let text = EVENT_HANDLER.replace_all(&text, "${1}skip-${2}${3}");
        let text = self.rewrite_images(&text);
        let text = self.rewrite_links(&text);

        text.replace(LINE_SENTINEL, "\n").trim().to_string()
    }

    /// Points `src` attributes to `{image_root}{id}/{path}`. Sources not
    /// found in the manifest are emptied.
    fn rewrite_images(&self, text: &str) -> String {
        SRC.replace_all(text, |caps: &Captures| {
            let path = uri::join(self.base, &caps[2]);
            match self.by_href.get(path.as_str()) {
                Some(item) => format!(
                    "{}{}{}/{}{}",
                    &caps[1], self.image_root, item.id, path, &caps[3]
                ),
                None => format!("{}{}", &caps[1], &caps[3]),
            }
        })
        .into_owned()
    }

    /// Points `href` attributes to `{link_root}{id}/{path}[#fragment]`.
    /// Links not found in the manifest are kept as they are.
    fn rewrite_links(&self, text: &str) -> String {
        HREF.replace_all(text, |caps: &Captures| {
            let value = &caps[2];
            let (link, fragment) = match value.split_once('#') {
                Some((link, fragment)) => (link, Some(fragment)),
                None => (value, None),
            };
            let path = uri::join(self.base, link);

            let item = self.by_href.get(path.as_str()).copied().or_else(|| {
                self.by_href
                    .iter()
                    .find(|(href, _)| href.split('#').next() == Some(path.as_str()))
                    .map(|(_, item)| *item)
            });

            match item {
                Some(item) => {
                    let mut target = format!("{}{}/{}", self.link_root, item.id, path);
                    if let Some(fragment) = fragment {
                        target.push('#');
                        target.push_str(fragment);
                    }
                    format!("{}{}{}", &caps[1], target, &caps[3])
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
    }
}

/// Removes every match of `pattern` until none is left, so tags split by
/// a nested tag can't join back together.
fn strip(pattern: &Regex, mut text: String) -> String {
    while pattern.is_match(&text) {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text
}

fn body(text: &str) -> String {
    match BODY.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.to_string(),
    }
}
