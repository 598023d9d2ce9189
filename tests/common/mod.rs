#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Builds an epub in memory, entry by entry.
#[derive(Default)]
pub struct EpubBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// mimetype and container pointing to `OEBPS/content.opf`
    pub fn standard() -> Self {
        Self::new()
            .file("mimetype", "application/epub+zip")
            .file("META-INF/container.xml", CONTAINER)
    }

    pub fn file(mut self, name: &str, content: &str) -> Self {
        self.entries.push((name.to_string(), content.as_bytes().to_vec()));
        self
    }

    pub fn bytes(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in self.entries {
            zip.start_file(name, options).unwrap();
            zip.write_all(&content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn cursor(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.build())
    }
}

pub fn chapter(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{}</title></head>
<body>
{}
</body>
</html>"#,
        title, body
    )
}

pub fn navpoint(id: &str, order: usize, label: &str, src: &str, children: &str) -> String {
    format!(
        r#"<navPoint id="{}" playOrder="{}"><navLabel><text>{}</text></navLabel><content src="{}"/>{}</navPoint>"#,
        id, order, label, src, children
    )
}

pub fn ncx(navpoints: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="x"/></head>
  <docTitle><text>Book</text></docTitle>
  <navMap>{}</navMap>
</ncx>"#,
        navpoints
    )
}

pub const ALICE_TITLE: &str = "Alice's Adventures in Wonderland";

/// Twelve chapters with a nested toc of fourteen entries.
pub fn alice() -> EpubBuilder {
    let mut manifest = String::new();
    let mut spine = String::new();
    let mut builder = EpubBuilder::standard();

    for n in 1..=12 {
        manifest.push_str(&format!(
            r#"<item id="chapter_{n:03}" href="Text/chapter_{n:03}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="chapter_{n:03}"/>"#));
        builder = builder.file(
            &format!("OEBPS/Text/chapter_{n:03}.xhtml"),
            &chapter(
                &format!("Chapter {n}"),
                &format!(r#"<h1>Chapter {n}</h1><p><img src="Images/tenniel.png" alt=""/></p>"#),
            ),
        );
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uuid_id" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{ALICE_TITLE}</dc:title>
    <dc:creator opf:file-as="Carroll, Lewis" opf:role="aut">Lewis Carroll</dc:creator>
    <dc:language>EN</dc:language>
    <dc:subject>Fantasy</dc:subject>
    <dc:subject>Children</dc:subject>
    <dc:date>1865-11-26</dc:date>
    <dc:description> A girl falls down a rabbit hole. </dc:description>
    <dc:publisher>Macmillan</dc:publisher>
    <dc:source>http://www.gutenberg.org/ebooks/11</dc:source>
    <dc:identifier id="uuid_id">urn:uuid:8e9cd4a3-29b2-4c2f-a6b4-0c4ef4d0d1a1</dc:identifier>
    <dc:identifier opf:scheme="ISBN">9780000000001</dc:identifier>
    <meta name="cover" content="cover"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="Images/cover.jpg" media-type="image/jpeg"/>
    <item id="tenniel" href="Images/tenniel.png" media-type="image/png"/>
    <item id="css" href="Styles/style.css" media-type="text/css"/>
    {manifest}
  </manifest>
  <spine toc="ncx">
    {spine}
    <itemref idref="missing"/>
  </spine>
  <guide>
    <reference type="cover" title="Cover" href="Images/cover.jpg"/>
    <reference type="text" title="Start" href="Text/chapter_001.xhtml"/>
  </guide>
</package>"#
    );

    // chapters 3 and 7 have one section each
    let mut navpoints = String::new();
    let mut order = 1;
    for n in 1..=12 {
        let chapter_order = order;
        order += 1;
        let mut children = String::new();
        let sections = match n {
            3 | 7 => 1,
            _ => 0,
        };
        for s in 1..=sections {
            children.push_str(&navpoint(
                &format!("np-{n}-{s}"),
                order,
                &format!("Section {n}.{s}"),
                &format!("Text/chapter_{n:03}.xhtml#s{s}"),
                "",
            ));
            order += 1;
        }
        navpoints.push_str(&navpoint(
            &format!("np-{n}"),
            chapter_order,
            &format!("Chapter {n}"),
            &format!("Text/chapter_{n:03}.xhtml"),
            &children,
        ));
    }

    builder
        .file("OEBPS/content.opf", &opf)
        .file("OEBPS/toc.ncx", &ncx(&navpoints))
        .bytes("OEBPS/Images/cover.jpg", &[0xff, 0xd8, 0xff, 0xe0])
        .bytes("OEBPS/Images/tenniel.png", &[0x89, b'P', b'N', b'G'])
        .file("OEBPS/Styles/style.css", "body { margin: 0 }")
}

/// Minimal package with the given manifest items, spine itemrefs and ncx.
pub fn book(manifest: &str, spine: &str, ncx: Option<&str>) -> EpubBuilder {
    let toc = if ncx.is_some() { r#" toc="ncx""# } else { "" };
    let ncx_item = if ncx.is_some() {
        r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#
    } else {
        ""
    };
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Test</dc:title></metadata>
  <manifest>{ncx_item}{manifest}</manifest>
  <spine{toc}>{spine}</spine>
</package>"#
    );

    let builder = EpubBuilder::standard().file("OEBPS/content.opf", &opf);
    match ncx {
        Some(ncx) => builder.file("OEBPS/toc.ncx", ncx),
        None => builder,
    }
}
