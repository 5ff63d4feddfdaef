//! Convergence loop
//!
//! The message list only renders a window of history. The harvester keeps
//! resetting the scroll position towards older messages, re-reads everything
//! rendered, and stops once three consecutive resets change nothing:
//! - same content extent before and after the reset
//! - same number of collected records
//! - scroll offset still at the top
//!
//! A hard time cap ends the loop early with whatever was collected.

mod discovery;

pub use discovery::{find_container, wait_for_container};

use crate::collector::DedupCollector;
use crate::config::{HarvestConfig, TimingConfig};
use crate::models::Record;
use crate::resolver::FieldResolver;
use crate::source::DomSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// State of the convergence loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Initial pass over the rendered items
    Scanning,
    /// The last reset loaded something new
    Growing,
    /// The last reset changed nothing
    Stable,
    /// End of history reached
    Converged,
    /// Duration cap hit; records are partial
    TimeCapped,
    /// No scrollable container found
    Failed,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Converged | LoopState::TimeCapped | LoopState::Failed
        )
    }

    /// Terminal states that still produce a snapshot
    pub fn is_success(&self) -> bool {
        matches!(self, LoopState::Converged | LoopState::TimeCapped)
    }
}

/// Result of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub state: LoopState,
    /// Scroll resets performed
    pub iterations: u32,
    /// Collected records in first-seen order
    pub records: Vec<Record>,
    pub elapsed: Duration,
}

/// Drives the resolver and collector over a windowed source until convergence
pub struct Harvester {
    resolver: FieldResolver,
    timing: TimingConfig,
}

impl Harvester {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            resolver: FieldResolver::new(
                config.selectors.clone(),
                config.timing.epoch_threshold_ms,
            ),
            timing: config.timing.clone(),
        }
    }

    pub fn resolver(&self) -> &FieldResolver {
        &self.resolver
    }

    /// Resolve every rendered candidate item into the collector; returns new records
    pub fn collect<S: DomSource>(
        &self,
        source: &S,
        container: &S::Node,
        collector: &mut DedupCollector,
    ) -> usize {
        let items = source.list_candidate_items(container, &self.resolver.selectors().candidate_items);
        let rendered = items.len();
        let added = collector.extend(
            items
                .iter()
                .filter_map(|item| self.resolver.resolve(source, item)),
        );
        log::trace!(
            "[Harvest] {} rendered items, {} new records",
            rendered,
            added
        );
        added
    }

    /// Locate the container and scroll until the history stops growing
    pub async fn run<S: DomSource>(&self, source: &mut S) -> HarvestOutcome {
        let discovery_start = Instant::now();
        let Some(container) =
            wait_for_container(source, self.resolver.selectors(), &self.timing).await
        else {
            return HarvestOutcome {
                state: LoopState::Failed,
                iterations: 0,
                records: Vec::new(),
                elapsed: discovery_start.elapsed(),
            };
        };

        let start = Instant::now();
        let max_duration = self.timing.max_duration();
        let threshold = self.timing.stability_threshold;

        let mut collector = DedupCollector::new();
        let mut state = LoopState::Scanning;
        self.collect(source, &container, &mut collector);
        let mut baseline = collector.len();
        let mut stable_iterations = 0u32;
        let mut iterations = 0u32;

        log::info!(
            "[Harvest] Initial pass collected {} records",
            collector.len()
        );

        while !state.is_terminal() {
            if stable_iterations >= threshold {
                state = LoopState::Converged;
                continue;
            }
            if start.elapsed() >= max_duration {
                log::warn!(
                    "[Harvest] Duration cap of {} ms reached after {} iterations, keeping {} records",
                    self.timing.max_duration_ms,
                    iterations,
                    collector.len()
                );
                state = LoopState::TimeCapped;
                continue;
            }

            iterations += 1;
            let before = source.metrics(&container);
            source.scroll_to_start(&container);
            sleep(self.timing.settle_delay()).await;

            self.collect(source, &container, &mut collector);
            let after = source.metrics(&container);

            let unchanged = after.extent == before.extent
                && collector.len() == baseline
                && after.offset.floor() == 0.0;

            if unchanged {
                stable_iterations += 1;
                state = LoopState::Stable;
            } else {
                stable_iterations = 0;
                baseline = collector.len();
                state = LoopState::Growing;
            }

            log::debug!(
                "[Harvest] Iteration {}: {:?}, extent {} -> {}, {} records, stable {}/{}",
                iterations,
                state,
                before.extent,
                after.extent,
                collector.len(),
                stable_iterations,
                threshold
            );
        }

        log::info!(
            "[Harvest] Finished in state {:?} after {} iterations with {} records",
            state,
            iterations,
            collector.len()
        );

        HarvestOutcome {
            state,
            iterations,
            records: collector.into_records(),
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::ScrollMetrics;

    /// Fake virtualized list: newest-first history loaded `step` items per reset,
    /// showing a fixed window at the bottom before any reset and at the top after
    pub(crate) struct ScriptedFeed {
        pub history: usize,
        pub initial: usize,
        pub step: usize,
        pub window: usize,
        pub resets: usize,
        pub scrollable: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum FeedNode {
        Document,
        Container,
        Item(usize),
    }

    impl ScriptedFeed {
        pub fn new(history: usize, initial: usize, step: usize, window: usize) -> Self {
            Self {
                history,
                initial,
                step,
                window,
                resets: 0,
                scrollable: true,
            }
        }

        fn loaded(&self) -> usize {
            self.history
                .min(self.initial.saturating_add(self.resets.saturating_mul(self.step)))
        }

        fn rendered(&self) -> Vec<usize> {
            let loaded = self.loaded();
            let window = self.window.min(loaded);
            if self.resets == 0 {
                (0..window).collect()
            } else {
                (loaded - window..loaded).collect()
            }
        }
    }

    impl DomSource for ScriptedFeed {
        type Node = FeedNode;

        fn query_document(&self, selector: &str) -> Option<FeedNode> {
            (selector == "[data-testid='postListContent']").then_some(FeedNode::Container)
        }

        fn list_candidate_items(&self, scope: &FeedNode, _selector: &str) -> Vec<FeedNode> {
            match scope {
                FeedNode::Container => self.rendered().into_iter().map(FeedNode::Item).collect(),
                _ => Vec::new(),
            }
        }

        fn query_descendant(&self, _node: &FeedNode, _selector: &str) -> Option<FeedNode> {
            None
        }

        fn matches(&self, _node: &FeedNode, _selector: &str) -> bool {
            false
        }

        fn parent(&self, node: &FeedNode) -> Option<FeedNode> {
            match node {
                FeedNode::Document => None,
                FeedNode::Container => Some(FeedNode::Document),
                FeedNode::Item(_) => Some(FeedNode::Container),
            }
        }

        fn read_attribute(&self, node: &FeedNode, name: &str) -> Option<String> {
            match (node, name) {
                (FeedNode::Item(age), "id") => Some(format!("post_m{}", age)),
                _ => None,
            }
        }

        fn read_text(&self, _node: &FeedNode) -> String {
            String::new()
        }

        fn scrolling_element(&self) -> Option<FeedNode> {
            Some(FeedNode::Document)
        }

        fn title(&self) -> Option<String> {
            Some("feed".to_string())
        }

        fn metrics(&self, node: &FeedNode) -> ScrollMetrics {
            match node {
                FeedNode::Container if self.scrollable => {
                    let extent = self.loaded() as f64 * 50.0;
                    ScrollMetrics {
                        extent,
                        viewport: 100.0,
                        offset: if self.resets == 0 { extent - 100.0 } else { 0.0 },
                    }
                }
                _ => ScrollMetrics::default(),
            }
        }

        fn scroll_to_start(&mut self, _node: &FeedNode) {
            self.resets += 1;
        }
    }

    fn harvester() -> Harvester {
        Harvester::new(&HarvestConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_records_over_two_growing_resets() {
        let mut feed = ScriptedFeed::new(5, 2, 2, 2);
        let outcome = harvester().run(&mut feed).await;

        assert_eq!(outcome.state, LoopState::Converged);
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(outcome.iterations, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminates_after_n_plus_threshold_iterations() {
        for growing_resets in 0..6usize {
            let history = 3 + growing_resets * 3;
            let mut feed = ScriptedFeed::new(history, 3, 3, 3);
            let outcome = harvester().run(&mut feed).await;

            assert_eq!(outcome.state, LoopState::Converged);
            assert_eq!(outcome.iterations, growing_resets as u32 + 3);
            assert_eq!(outcome.records.len(), history);
            assert!(outcome.elapsed <= HarvestConfig::default().timing.max_duration());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_cap_returns_partial_records() {
        let mut feed = ScriptedFeed::new(usize::MAX, 2, 1, 2);
        let outcome = harvester().run(&mut feed).await;

        assert_eq!(outcome.state, LoopState::TimeCapped);
        assert!(outcome.state.is_success());
        // 120 s cap / 1.2 s settle delay
        assert!((99..=100).contains(&outcome.iterations));
        assert!(!outcome.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container_fails() {
        let mut feed = ScriptedFeed::new(5, 2, 2, 2);
        feed.scrollable = false;
        let outcome = harvester().run(&mut feed).await;

        assert_eq!(outcome.state, LoopState::Failed);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_collect_is_idempotent() {
        let feed = ScriptedFeed::new(5, 3, 1, 3);
        let harvester = harvester();
        let mut collector = DedupCollector::new();

        assert_eq!(harvester.collect(&feed, &FeedNode::Container, &mut collector), 3);
        assert_eq!(harvester.collect(&feed, &FeedNode::Container, &mut collector), 0);
        assert_eq!(collector.len(), 3);
    }

    #[test]
    fn test_loop_state_classification() {
        assert!(LoopState::Converged.is_terminal());
        assert!(LoopState::Failed.is_terminal());
        assert!(!LoopState::Failed.is_success());
        assert!(!LoopState::Growing.is_terminal());
    }
}
