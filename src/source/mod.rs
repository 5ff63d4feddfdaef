//! Windowed message sources
//!
//! A chat UI only materializes a moving window of its history. The harvester
//! sees it through [`DomSource`]: a queryable element tree whose contents
//! change when the caller scrolls a container towards older messages.

mod html;

pub use html::{ElementPath, HtmlFrames};

/// Minimum overflow (extent beyond the viewport) for a node to count as scrollable
pub const SCROLLABLE_OVERFLOW: f64 = 20.0;

/// Scroll geometry of a container
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    /// Total content extent (scroll height)
    pub extent: f64,
    /// Visible size (client height)
    pub viewport: f64,
    /// Current scroll offset from the top
    pub offset: f64,
}

impl ScrollMetrics {
    pub fn is_scrollable(&self) -> bool {
        self.extent - self.viewport > SCROLLABLE_OVERFLOW
    }
}

/// Queryable element tree backed by a live (or recorded) chat UI
///
/// Selectors are CSS selector strings. Implementations should treat an
/// unparseable selector as matching nothing.
pub trait DomSource {
    /// Opaque element handle
    type Node: Clone;

    /// First element in the whole document matching `selector`
    fn query_document(&self, selector: &str) -> Option<Self::Node>;

    /// All descendants of `scope` matching `selector`, in document order
    fn list_candidate_items(&self, scope: &Self::Node, selector: &str) -> Vec<Self::Node>;

    /// First strict descendant of `node` matching `selector`
    fn query_descendant(&self, node: &Self::Node, selector: &str) -> Option<Self::Node>;

    fn matches(&self, node: &Self::Node, selector: &str) -> bool;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn read_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Rendered text content of `node`
    fn read_text(&self, node: &Self::Node) -> String;

    /// The document's own scrolling surface
    fn scrolling_element(&self) -> Option<Self::Node>;

    /// Document title
    fn title(&self) -> Option<String>;

    fn metrics(&self, node: &Self::Node) -> ScrollMetrics;

    /// Scroll `node` to the start of history, letting the UI load older items
    fn scroll_to_start(&mut self, node: &Self::Node);

    fn is_scrollable(&self, node: &Self::Node) -> bool {
        self.metrics(node).is_scrollable()
    }

    /// Nearest ancestor (or self) matching `selector`
    fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.matches(&candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(&candidate);
        }
        None
    }
}
