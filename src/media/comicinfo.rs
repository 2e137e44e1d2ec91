//! ComicInfo.xml metadata sidecar parsing.

use crate::error::Result;
use roxmltree::Document;

/// Canonical sidecar entry name inside comic archives.
pub const COMIC_INFO: &str = "ComicInfo.xml";

/// Fields harvested from a ComicInfo.xml sidecar.
#[derive(Debug, Default, Clone)]
pub struct ComicInfo {
    /// Issue/volume title.
    pub title: Option<String>,
    /// Series name.
    pub series: Option<String>,
    /// Issue number, kept as text (can be "4.5" or "Annual 1").
    pub number: Option<String>,
    /// Summary or description text.
    pub summary: Option<String>,
    /// Writer credit.
    pub writer: Option<String>,
}

/// Check whether an auxiliary file list contains a ComicInfo sidecar and
/// return its entry name (the sidecar may sit inside a subdirectory).
pub fn find_sidecar(files: &[String]) -> Option<&str> {
    files
        .iter()
        .find(|f| {
            f.rsplit('/')
                .next()
                .is_some_and(|name| name.eq_ignore_ascii_case(COMIC_INFO))
        })
        .map(String::as_str)
}

/// Parse a ComicInfo.xml document.
pub fn parse(xml: &str) -> Result<ComicInfo> {
    let doc = Document::parse(xml)?;
    let mut info = ComicInfo::default();

    for node in doc.descendants() {
        let text = || node.text().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        match node.tag_name().name() {
            "Title" => info.title = text(),
            "Series" => info.series = text(),
            "Number" => info.number = text(),
            "Summary" => info.summary = text(),
            "Writer" => info.writer = text(),
            _ => {}
        }
    }

    Ok(info)
}
