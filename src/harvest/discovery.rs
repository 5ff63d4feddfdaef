// Scrollable container discovery
//
// The message list is not always where the markup says it is, so discovery
// walks an ordered chain of locators and accepts only scrollable candidates.

use crate::config::{SelectorConfig, TimingConfig};
use crate::source::DomSource;
use tokio::time::{sleep, Instant};

type Locator<S> = fn(&S, &SelectorConfig) -> Option<<S as DomSource>::Node>;

/// Single discovery attempt over the current UI state
pub fn find_container<S: DomSource>(source: &S, selectors: &SelectorConfig) -> Option<S::Node> {
    let chain: [Locator<S>; 4] = [
        known_container,
        center_pane,
        scrollable_message_ancestor,
        document_surface,
    ];
    chain.iter().find_map(|locate| locate(source, selectors))
}

/// Poll [`find_container`] until it succeeds or the discovery timeout passes
pub async fn wait_for_container<S: DomSource>(
    source: &S,
    selectors: &SelectorConfig,
    timing: &TimingConfig,
) -> Option<S::Node> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(container) = find_container(source, selectors) {
            log::debug!("[Harvest] Found scrollable container after {} attempt(s)", attempts);
            return Some(container);
        }
        if start.elapsed() >= timing.discovery_timeout() {
            log::warn!(
                "[Harvest] No scrollable container after {} attempts ({} ms)",
                attempts,
                timing.discovery_timeout_ms
            );
            return None;
        }
        sleep(timing.discovery_poll()).await;
    }
}

fn first_scrollable<S: DomSource>(source: &S, selectors: &[String]) -> Option<S::Node> {
    selectors.iter().find_map(|selector| {
        source
            .query_document(selector)
            .filter(|node| source.is_scrollable(node))
    })
}

fn known_container<S: DomSource>(source: &S, selectors: &SelectorConfig) -> Option<S::Node> {
    first_scrollable(source, &selectors.containers)
}

fn center_pane<S: DomSource>(source: &S, selectors: &SelectorConfig) -> Option<S::Node> {
    first_scrollable(source, &selectors.center_panes)
}

fn scrollable_message_ancestor<S: DomSource>(
    source: &S,
    selectors: &SelectorConfig,
) -> Option<S::Node> {
    let message = source.query_document(&selectors.first_message)?;
    let mut current = source.parent(&message);
    while let Some(node) = current {
        // Stop below the body; the document surface is the last link of the chain
        let parent = source.parent(&node)?;
        if source.parent(&parent).is_none() {
            return None;
        }
        if source.is_scrollable(&node) {
            return Some(node);
        }
        current = source.parent(&node);
    }
    None
}

fn document_surface<S: DomSource>(source: &S, _selectors: &SelectorConfig) -> Option<S::Node> {
    source
        .scrolling_element()
        .filter(|node| source.is_scrollable(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HtmlFrames;

    fn find(page: &str) -> Option<String> {
        let source = HtmlFrames::from_strings([page]);
        let selectors = SelectorConfig::default();
        find_container(&source, &selectors).and_then(|node| source.read_attribute(&node, "id"))
    }

    #[test]
    fn test_known_container_wins() {
        let page = r#"<html><body data-scroll-height="0">
            <main id="pane" data-testid="channelView" data-scroll-height="900" data-client-height="300">
              <div id="list" data-testid="postListContent" data-scroll-height="800" data-client-height="300">
                <div id="post_a"></div>
              </div>
            </main></body></html>"#;
        assert_eq!(find(page).as_deref(), Some("list"));
    }

    #[test]
    fn test_unscrollable_known_container_is_skipped() {
        let page = r#"<html><body data-scroll-height="0">
            <main id="pane" data-testid="channelView" data-scroll-height="900" data-client-height="300">
              <div id="list" data-testid="postListContent" data-scroll-height="300" data-client-height="300">
                <div id="post_a"></div>
              </div>
            </main></body></html>"#;
        assert_eq!(find(page).as_deref(), Some("pane"));
    }

    #[test]
    fn test_scrollable_ancestor_of_message() {
        let page = r#"<html data-scroll-height="0"><body data-scroll-height="0">
            <div id="scroller" data-scroll-height="2000" data-client-height="400">
              <div data-scroll-height="10"><div id="post_a"></div></div>
            </div></body></html>"#;
        assert_eq!(find(page).as_deref(), Some("scroller"));
    }

    #[test]
    fn test_document_surface_last() {
        let page = r#"<html id="doc" data-scroll-height="5000" data-client-height="800">
            <body data-scroll-height="0"><p>no posts</p></body></html>"#;
        assert_eq!(find(page).as_deref(), Some("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let page = r#"<html data-scroll-height="0"><body></body></html>"#;
        let source = HtmlFrames::from_strings([page]);
        let timing = TimingConfig::default();

        let start = Instant::now();
        let found = wait_for_container(&source, &SelectorConfig::default(), &timing).await;

        assert!(found.is_none());
        assert!(start.elapsed() >= timing.discovery_timeout());
        assert!(start.elapsed() < timing.discovery_timeout() + timing.discovery_poll() * 2);
    }
}
