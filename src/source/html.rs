// HTML snapshot source built on scraper
//
// Each frame is one recorded state of the page. Scrolling a container to the
// start of history advances to the next frame, the way the live UI renders
// older messages after a scroll reset.

use super::{DomSource, ScrollMetrics};
use crate::utils::ResultExt;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;

/// Estimated extent per element when a frame carries no layout attributes
const ESTIMATED_ROW_EXTENT: f64 = 24.0;

/// Element handle: child-element indices from the root element
///
/// Paths are re-resolved against the current frame, so a container handle
/// found in one frame still addresses the same position after a scroll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementPath(Vec<usize>);

/// Ordered set of recorded page states
pub struct HtmlFrames {
    frames: Vec<Html>,
    current: usize,
    scrolled: bool,
}

impl HtmlFrames {
    /// Create a source from parsed documents; an empty list yields one empty page
    pub fn new(mut frames: Vec<Html>) -> Self {
        if frames.is_empty() {
            frames.push(Html::parse_document(""));
        }
        Self {
            frames,
            current: 0,
            scrolled: false,
        }
    }

    pub fn from_strings<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            pages
                .into_iter()
                .map(|page| Html::parse_document(page.as_ref()))
                .collect(),
        )
    }

    /// Load every `.html`/`.htm` file in `dir`, ordered by file name
    pub fn load_dir(dir: &Path) -> Result<Self, String> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context("Failed to read frames directory")?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(format!("No HTML frames found in {}", dir.display()));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read frame {}: {}", path.display(), e))?;
            frames.push(Html::parse_document(&content));
        }

        log::debug!("Loaded {} HTML frames from {}", frames.len(), dir.display());
        Ok(Self::new(frames))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame currently rendered
    pub fn current_frame(&self) -> usize {
        self.current
    }

    fn document(&self) -> &Html {
        &self.frames[self.current]
    }

    fn resolve(&self, path: &ElementPath) -> Option<ElementRef<'_>> {
        let mut current = self.document().root_element();
        for &index in &path.0 {
            current = current.children().filter_map(ElementRef::wrap).nth(index)?;
        }
        Some(current)
    }

    fn parse_selector(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::debug!("Ignoring invalid selector '{}': {:?}", selector, e);
                None
            }
        }
    }
}

fn path_of(element: ElementRef<'_>) -> ElementPath {
    let mut indices = Vec::new();
    let mut current = element;
    while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
        let index = parent
            .children()
            .filter_map(ElementRef::wrap)
            .position(|child| child.id() == current.id())
            .unwrap_or(0);
        indices.push(index);
        current = parent;
    }
    indices.reverse();
    ElementPath(indices)
}

/// Elements rendered on their own line
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements whose content is never rendered as text
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Rendered text in the manner of `innerText`: text nodes concatenated as-is,
/// line breaks only at `br` and block boundaries
fn inner_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if name == "br" {
            out.push('\n');
        } else if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        } else if BLOCK_ELEMENTS.contains(&name) {
            out.push('\n');
            inner_text(child, out);
            out.push('\n');
        } else {
            inner_text(child, out);
        }
    }
}

fn numeric_attr(element: ElementRef<'_>, name: &str) -> Option<f64> {
    element
        .value()
        .attr(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
}

impl DomSource for HtmlFrames {
    type Node = ElementPath;

    fn query_document(&self, selector: &str) -> Option<ElementPath> {
        let selector = Self::parse_selector(selector)?;
        self.document().select(&selector).next().map(path_of)
    }

    fn list_candidate_items(&self, scope: &ElementPath, selector: &str) -> Vec<ElementPath> {
        let (Some(scope), Some(selector)) = (self.resolve(scope), Self::parse_selector(selector))
        else {
            return Vec::new();
        };
        scope.select(&selector).map(path_of).collect()
    }

    fn query_descendant(&self, node: &ElementPath, selector: &str) -> Option<ElementPath> {
        let element = self.resolve(node)?;
        let selector = Self::parse_selector(selector)?;
        element
            .select(&selector)
            .find(|found| found.id() != element.id())
            .map(path_of)
    }

    fn matches(&self, node: &ElementPath, selector: &str) -> bool {
        match (self.resolve(node), Self::parse_selector(selector)) {
            (Some(element), Some(selector)) => selector.matches(&element),
            _ => false,
        }
    }

    fn parent(&self, node: &ElementPath) -> Option<ElementPath> {
        if node.0.is_empty() {
            return None;
        }
        Some(ElementPath(node.0[..node.0.len() - 1].to_vec()))
    }

    fn read_attribute(&self, node: &ElementPath, name: &str) -> Option<String> {
        // HTML attribute names are case-insensitive and stored lowercased
        let element = self.resolve(node)?;
        element
            .value()
            .attr(&name.to_ascii_lowercase())
            .map(String::from)
    }

    fn read_text(&self, node: &ElementPath) -> String {
        self.resolve(node)
            .map(|element| {
                let mut text = String::new();
                inner_text(element, &mut text);
                text
            })
            .unwrap_or_default()
    }

    fn scrolling_element(&self) -> Option<ElementPath> {
        Some(ElementPath::default())
    }

    fn title(&self) -> Option<String> {
        let title = self.query_document("title")?;
        let text = self.read_text(&title);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn metrics(&self, node: &ElementPath) -> ScrollMetrics {
        let Some(element) = self.resolve(node) else {
            return ScrollMetrics::default();
        };

        let extent = numeric_attr(element, "data-scroll-height").unwrap_or_else(|| {
            let elements = element
                .descendants()
                .skip(1)
                .filter(|n| n.value().is_element())
                .count();
            elements as f64 * ESTIMATED_ROW_EXTENT
        });
        let viewport = numeric_attr(element, "data-client-height").unwrap_or(0.0);
        let offset = numeric_attr(element, "data-scroll-top")
            .unwrap_or(if self.scrolled { 0.0 } else { extent });

        ScrollMetrics {
            extent,
            viewport,
            offset,
        }
    }

    fn scroll_to_start(&mut self, _node: &ElementPath) {
        self.scrolled = true;
        if self.current + 1 < self.frames.len() {
            self.current += 1;
            log::trace!("Advanced to frame {}", self.current);
        }
    }
}
