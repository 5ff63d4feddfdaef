//! Field resolution for rendered message nodes
//!
//! Message markup is inconsistent across UI versions, so every field is
//! resolved through an ordered list of extractors. The first extractor that
//! yields a non-empty value wins; later ones are never consulted.

mod timestamp;

pub use timestamp::{parse_datetime, parse_epoch_millis};

use crate::config::SelectorConfig;
use crate::models::Record;
use crate::source::DomSource;
use crate::utils::{collapse_whitespace, non_empty};
use chrono::{DateTime, Utc};

/// One step of a field's fallback chain
type Extractor<S, T> = fn(&FieldResolver, &S, &<S as DomSource>::Node) -> Option<T>;

/// Resolves a [`Record`] from one rendered message node
#[derive(Debug, Clone)]
pub struct FieldResolver {
    selectors: SelectorConfig,
    epoch_threshold_ms: i64,
}

impl FieldResolver {
    pub fn new(selectors: SelectorConfig, epoch_threshold_ms: i64) -> Self {
        Self {
            selectors,
            epoch_threshold_ms,
        }
    }

    pub fn selectors(&self) -> &SelectorConfig {
        &self.selectors
    }

    /// Resolve a record, or None when the node has neither id nor text
    pub fn resolve<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<Record> {
        let id = self.resolve_id(source, node);
        let text = self.resolve_text(source, node);

        if id.is_none() && text.is_empty() {
            log::debug!("[Resolver] Skipping node without id or text");
            return None;
        }

        let thread_id = self.resolve_thread_id(source, node).or_else(|| id.clone());

        Some(Record {
            thread_id,
            timestamp: self.resolve_timestamp(source, node),
            author_id: self.resolve_author_id(source, node),
            author_name: self.resolve_author_name(source, node),
            text,
            id,
        })
    }

    pub fn resolve_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        let raw = first_attribute(source, node, &self.selectors.id_attributes)?;
        let id = raw.strip_prefix(self.selectors.id_prefix.as_str()).unwrap_or(&raw);
        non_empty(Some(id.to_string()))
    }

    pub fn resolve_author_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        let chain: [Extractor<S, String>; 3] = [
            Self::direct_author_id,
            Self::marked_author_id,
            Self::ancestor_author_id,
        ];
        first_success(self, source, node, &chain)
    }

    pub fn resolve_author_name<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        let chain: [Extractor<S, String>; 3] = [
            Self::direct_author_name,
            Self::marked_author_name,
            Self::author_name_text,
        ];
        first_success(self, source, node, &chain)
    }

    pub fn resolve_timestamp<S: DomSource>(
        &self,
        source: &S,
        node: &S::Node,
    ) -> Option<DateTime<Utc>> {
        let chain: [Extractor<S, DateTime<Utc>>; 3] = [
            Self::epoch_attribute,
            Self::nested_time_element,
            Self::post_view_time_element,
        ];
        first_success(self, source, node, &chain)
    }

    pub fn resolve_thread_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        first_attribute(source, node, &self.selectors.thread_attributes)
    }

    pub fn resolve_text<S: DomSource>(&self, source: &S, node: &S::Node) -> String {
        let chain: [Extractor<S, String>; 2] = [Self::body_text, Self::label_text];
        first_success(self, source, node, &chain).unwrap_or_default()
    }

    fn direct_author_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        first_attribute(source, node, &self.selectors.author_id_attributes)
    }

    fn marked_author_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        self.selectors.author_id_markers.iter().find_map(|marker| {
            let found = source.query_descendant(node, marker)?;
            first_attribute(source, &found, &self.selectors.author_id_attributes)
        })
    }

    fn ancestor_author_id<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        let mut current = source.parent(node);
        for _ in 0..self.selectors.ancestor_hops {
            let ancestor = current?;
            if let Some(id) = first_attribute(source, &ancestor, &self.selectors.author_id_attributes) {
                return Some(id);
            }
            current = source.parent(&ancestor);
        }
        None
    }

    fn direct_author_name<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        first_attribute(source, node, &self.selectors.author_name_attributes)
            .and_then(|name| clean_display_name(&name))
    }

    fn marked_author_name<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        self.selectors.author_name_markers.iter().find_map(|marker| {
            let found = source.query_descendant(node, marker)?;
            first_attribute(source, &found, &self.selectors.author_name_attributes)
                .and_then(|name| clean_display_name(&name))
        })
    }

    fn author_name_text<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        self.selectors.author_name_text.iter().find_map(|selector| {
            let found = source.query_descendant(node, selector)?;
            clean_display_name(&source.read_text(&found))
        })
    }

    fn epoch_attribute<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<DateTime<Utc>> {
        self.selectors.timestamp_attributes.iter().find_map(|name| {
            let value = source.read_attribute(node, name)?;
            parse_epoch_millis(&value, self.epoch_threshold_ms)
        })
    }

    fn nested_time_element<S: DomSource>(
        &self,
        source: &S,
        node: &S::Node,
    ) -> Option<DateTime<Utc>> {
        self.selectors.time_elements.iter().find_map(|selector| {
            let time = source.query_descendant(node, selector)?;
            parse_time_element(source, &time)
        })
    }

    fn post_view_time_element<S: DomSource>(
        &self,
        source: &S,
        node: &S::Node,
    ) -> Option<DateTime<Utc>> {
        let post_view = source.closest(node, &self.selectors.post_view)?;
        let selector = self.selectors.time_elements.first()?;
        let time = source.query_descendant(&post_view, selector)?;
        parse_time_element(source, &time)
    }

    fn body_text<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        self.selectors.text.iter().find_map(|selector| {
            let body = source.query_descendant(node, selector)?;
            let text = collapse_whitespace(&source.read_text(&body));
            (!text.is_empty()).then_some(text)
        })
    }

    fn label_text<S: DomSource>(&self, source: &S, node: &S::Node) -> Option<String> {
        let label = source.read_attribute(node, &self.selectors.text_label_attribute)?;
        let text = collapse_whitespace(&label);
        (!text.is_empty()).then_some(text)
    }
}

fn first_success<S: DomSource, T>(
    resolver: &FieldResolver,
    source: &S,
    node: &S::Node,
    chain: &[Extractor<S, T>],
) -> Option<T> {
    chain.iter().find_map(|extract| extract(resolver, source, node))
}

/// First non-empty (trimmed) attribute among `names`
fn first_attribute<S: DomSource>(source: &S, node: &S::Node, names: &[String]) -> Option<String> {
    names
        .iter()
        .find_map(|name| non_empty(source.read_attribute(node, name)))
}

fn clean_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Machine-readable `datetime` first, then the element's text
fn parse_time_element<S: DomSource>(source: &S, time: &S::Node) -> Option<DateTime<Utc>> {
    source
        .read_attribute(time, "datetime")
        .and_then(|value| parse_datetime(&value))
        .or_else(|| parse_datetime(&collapse_whitespace(&source.read_text(time))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HtmlFrames;
    use chrono::TimeZone;

    fn resolver() -> FieldResolver {
        FieldResolver::new(SelectorConfig::default(), 1_000_000_000)
    }

    /// Resolve every candidate item in a single-frame page
    fn resolve_all(body: &str) -> Vec<Option<Record>> {
        let page = format!("<html><head></head><body>{}</body></html>", body);
        let source = HtmlFrames::from_strings([page]);
        let root = source.scrolling_element().unwrap();
        let resolver = resolver();
        source
            .list_candidate_items(&root, &resolver.selectors().candidate_items)
            .iter()
            .map(|node| resolver.resolve(&source, node))
            .collect()
    }

    fn resolve_one(body: &str) -> Option<Record> {
        resolve_all(body).into_iter().next().flatten()
    }

    #[test]
    fn test_fully_attributed_node() {
        let record = resolve_one(
            r#"<div id="post_abc" data-userid="U1" data-username="@alice"
                    data-create-at="1709287200000" data-root-id="root1">
                 <div data-testid="postMessageText">  Hello
                   world  </div>
               </div>"#,
        )
        .unwrap();

        assert_eq!(record.id.as_deref(), Some("abc"));
        assert_eq!(record.author_id.as_deref(), Some("U1"));
        assert_eq!(record.author_name.as_deref(), Some("alice"));
        assert_eq!(record.thread_id.as_deref(), Some("root1"));
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(record.text, "Hello world");
    }

    #[test]
    fn test_id_from_data_attribute_when_no_id() {
        let record = resolve_one(r#"<div data-post-id="p9"><p class="post-message">x</p></div>"#)
            .unwrap();
        assert_eq!(record.id.as_deref(), Some("p9"));
    }

    #[test]
    fn test_thread_falls_back_to_own_id() {
        let record = resolve_one(r#"<div id="post_p1"><p class="post-message">x</p></div>"#)
            .unwrap();
        assert_eq!(record.thread_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_author_id_from_descendant_then_ancestor() {
        let from_descendant = resolve_one(
            r#"<div id="post_p1"><img data-user-id="U2"><p class="post-message">x</p></div>"#,
        )
        .unwrap();
        assert_eq!(from_descendant.author_id.as_deref(), Some("U2"));

        let from_ancestor = resolve_one(
            r#"<section data-userid="U3"><div><div id="post_p2">
                 <p class="post-message">x</p></div></div></section>"#,
        )
        .unwrap();
        assert_eq!(from_ancestor.author_id.as_deref(), Some("U3"));
    }

    #[test]
    fn test_ancestor_walk_is_bounded() {
        let record = resolve_one(
            r#"<section data-userid="U9"><div><div><div><div>
                 <div id="post_p1"><p class="post-message">x</p></div>
               </div></div></div></div></section>"#,
        )
        .unwrap();
        assert_eq!(record.author_id, None);
    }

    #[test]
    fn test_direct_author_id_short_circuits() {
        let record = resolve_one(
            r#"<div id="post_p1" data-user-id="U1"><span data-userid="U2"></span>
                 <p class="post-message">x</p></div>"#,
        )
        .unwrap();
        assert_eq!(record.author_id.as_deref(), Some("U1"));
    }

    #[test]
    fn test_author_name_from_username_text() {
        let record = resolve_one(
            r#"<div id="post_p1">
                 <div data-testid="postProfilePicture"></div>
                 <div><button class="user-popover"> @bob </button></div>
                 <p class="post-message">x</p>
               </div>"#,
        )
        .unwrap();
        assert_eq!(record.author_name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_author_name_from_marked_descendant() {
        let record = resolve_one(
            r#"<div id="post_p1">
                 <span class="avatar" data-username="@carol"></span>
                 <p class="post-message">x</p>
               </div>"#,
        )
        .unwrap();
        assert_eq!(record.author_name.as_deref(), Some("carol"));
    }

    #[test]
    fn test_author_name_from_user_popover_attribute() {
        let record = resolve_one(
            r#"<div id="post_p1">
                 <button class="user-popover" data-user-name="dave">Dave D.</button>
                 <p class="post-message">x</p>
               </div>"#,
        )
        .unwrap();
        assert_eq!(record.author_name.as_deref(), Some("dave"));
    }

    #[test]
    fn test_timestamp_from_time_element() {
        let record = resolve_one(
            r#"<div id="post_p1" data-timestamp="17">
                 <time datetime="2024-03-01T10:00:00.000Z">10:00 AM</time>
                 <p class="post-message">x</p>
               </div>"#,
        )
        .unwrap();
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_timestamp_from_time_text() {
        let record = resolve_one(
            r#"<div id="post_p1"><time>2024-03-01 10:00</time><p class="post-message">x</p></div>"#,
        )
        .unwrap();
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_timestamp_from_enclosing_post_view() {
        let records = resolve_all(
            r#"<div data-testid="postView">
                 <div class="post__header"><time datetime="2024-03-01T10:00:00.000Z">10:00</time></div>
                 <div id="post_p1"><p class="post-message">x</p></div>
               </div>"#,
        );
        let record = records
            .into_iter()
            .flatten()
            .find(|r| r.id.as_deref() == Some("p1"))
            .unwrap();
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unresolvable_timestamp() {
        let record = resolve_one(
            r#"<div id="post_p1"><time>just now</time><p class="post-message">x</p></div>"#,
        )
        .unwrap();
        assert_eq!(record.timestamp, None);
    }

    #[test]
    fn test_text_prefers_specific_selector_then_label() {
        let specific = resolve_one(
            r#"<div id="post_p1"><div class="post-message">
                 <span class="post-message__text">inner</span><em>edited</em></div></div>"#,
        )
        .unwrap();
        assert_eq!(specific.text, "inner");

        let labelled = resolve_one(r#"<div data-post-id="p2" aria-label="  from   label "></div>"#)
            .unwrap();
        assert_eq!(labelled.text, "from label");
    }

    #[test]
    fn test_text_over_inline_markup() {
        let record = resolve_one(
            r#"<div id="post_p1"><p data-testid="postMessageText">Hello <b>wor</b>ld, see <a href="x">docs</a>. cc <span class="mention">@alice</span>!</p></div>"#,
        )
        .unwrap();
        assert_eq!(record.text, "Hello world, see docs. cc @alice!");
    }

    #[test]
    fn test_node_without_id_or_text_is_rejected() {
        let records = resolve_all(
            r#"<div data-testid="postView"><p class="post-message">   </p></div>
               <div data-testid="postView"><p class="post-message">kept</p></div>"#,
        );
        assert_eq!(records.len(), 2);
        assert!(records[0].is_none());
        let kept = records[1].as_ref().unwrap();
        assert_eq!(kept.id, None);
        assert_eq!(kept.thread_id, None);
        assert_eq!(kept.text, "kept");
    }

    #[test]
    fn test_id_only_node_is_kept() {
        let record = resolve_one(r#"<div id="post_p1"></div>"#).unwrap();
        assert_eq!(record.id.as_deref(), Some("p1"));
        assert!(record.text.is_empty());
    }
}
