//! Topic resolution
//!
//! Some markers are shared by a family of messages whose logical channel can
//! only be determined from the payload. A resolver registered against such a
//! raw topic rewrites it into the final dispatch topic. Resolvers may chain;
//! the chain is bounded by `max_resolver_depth` and by a visited set, so a
//! misconfigured cycle fails with `UnresolvableTopic` instead of spinning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;

use crate::topic::{Marker, Topic};

use super::error::RegistryError;

/// Content-dependent topic rewrite
///
/// Returning the input topic unchanged ends the chain at that topic.
pub trait TopicResolver: Send + Sync {
    fn resolve(&self, topic: &Topic, frames: &[Bytes]) -> Topic;

    /// Markers the resolved topic can carry; `None` if any marker is possible
    ///
    /// The emitter uses this to decide which raw topics it must subscribe
    /// upstream for a channel fed through resolvers.
    fn target_markers(&self) -> Option<&[Marker]> {
        None
    }
}

struct FnResolver<F> {
    f: F,
    targets: Option<Vec<Marker>>,
}

impl<F> TopicResolver for FnResolver<F>
where
    F: Fn(&Topic, &[Bytes]) -> Topic + Send + Sync,
{
    fn resolve(&self, topic: &Topic, frames: &[Bytes]) -> Topic {
        (self.f)(topic, frames)
    }

    fn target_markers(&self) -> Option<&[Marker]> {
        self.targets.as_deref()
    }
}

/// Wrap a closure as a topic resolver that may produce any marker
pub fn resolver_fn<F>(f: F) -> Arc<dyn TopicResolver>
where
    F: Fn(&Topic, &[Bytes]) -> Topic + Send + Sync + 'static,
{
    Arc::new(FnResolver { f, targets: None })
}

/// Wrap a closure as a topic resolver whose output carries one of `targets`
pub fn resolver_fn_targeting<F>(targets: &[Marker], f: F) -> Arc<dyn TopicResolver>
where
    F: Fn(&Topic, &[Bytes]) -> Topic + Send + Sync + 'static,
{
    Arc::new(FnResolver {
        f,
        targets: Some(targets.to_vec()),
    })
}

/// Resolver for receipt-style families published under a bare marker
///
/// The first two payload bytes carry the little-endian entity type; the
/// resolved topic is `marker ++ type`, which matches subscriptions made with
/// an entity type parameter. Payloads too short to carry a type resolve to
/// the bare marker.
pub fn entity_type_resolver(marker: Marker) -> Arc<dyn TopicResolver> {
    resolver_fn_targeting(&[marker], move |topic, frames| match frames.first() {
        Some(payload) if payload.len() >= 2 => Topic::with_param(marker, &payload[..2]),
        _ => topic.clone(),
    })
}

/// Snapshot of registered resolvers keyed by raw topic
#[derive(Clone, Default)]
pub struct ResolverTable {
    resolvers: Arc<HashMap<Topic, Arc<dyn TopicResolver>>>,
    max_depth: usize,
}

impl ResolverTable {
    pub(super) fn new(resolvers: HashMap<Topic, Arc<dyn TopicResolver>>, max_depth: usize) -> Self {
        Self {
            resolvers: Arc::new(resolvers),
            max_depth,
        }
    }

    pub fn get(&self, topic: &Topic) -> Option<&Arc<dyn TopicResolver>> {
        self.resolvers.get(topic)
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.resolvers.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Apply resolvers until no entry matches the current topic
    pub fn resolve(&self, topic: Topic, frames: &[Bytes]) -> Result<Topic, RegistryError> {
        let mut current = topic;
        let mut visited: HashSet<Topic> = HashSet::new();
        let mut steps = 0;

        while let Some(resolver) = self.resolvers.get(&current) {
            if steps >= self.max_depth || !visited.insert(current.clone()) {
                return Err(RegistryError::UnresolvableTopic {
                    topic: current,
                    steps,
                });
            }

            let next = resolver.resolve(&current, frames);
            steps += 1;
            if next == current {
                break;
            }
            current = next;
        }

        Ok(current)
    }

    /// Raw topics whose resolver chain can end on a topic with `marker`
    ///
    /// A prefix-filtering transport only delivers these raw topics if they are
    /// subscribed themselves, so a channel with `marker` needs them upstream
    /// in addition to its own topic. Sorted for stable subscription order.
    pub fn source_topics(&self, marker: Marker) -> Vec<Topic> {
        let mut sources: Vec<Topic> = self
            .resolvers
            .keys()
            .filter(|raw| self.can_reach(raw, marker))
            .cloned()
            .collect();
        sources.sort();
        sources
    }

    fn can_reach(&self, raw: &Topic, marker: Marker) -> bool {
        let mut pending = vec![raw.clone()];
        let mut seen: HashSet<Topic> = HashSet::new();

        while let Some(topic) = pending.pop() {
            if !seen.insert(topic.clone()) {
                continue;
            }
            let Some(resolver) = self.resolvers.get(&topic) else {
                continue;
            };
            let Some(targets) = resolver.target_markers() else {
                return true;
            };
            if targets.contains(&marker) {
                return true;
            }

            // The rewritten topic may be picked up by another resolver
            pending.extend(
                self.resolvers
                    .keys()
                    .filter(|key| key.marker().is_some_and(|m| targets.contains(&m)))
                    .cloned(),
            );
        }
        false
    }
}

impl std::fmt::Debug for ResolverTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverTable")
            .field("topics", &self.resolvers.keys().collect::<Vec<_>>())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: Vec<(Topic, Arc<dyn TopicResolver>)>, max_depth: usize) -> ResolverTable {
        ResolverTable::new(entries.into_iter().collect(), max_depth)
    }

    fn rewrite_to(target: &'static [u8]) -> Arc<dyn TopicResolver> {
        resolver_fn(move |_, _| Topic::from(target))
    }

    #[test]
    fn test_no_resolver_returns_input() {
        let resolvers = table(vec![], 8);

        let topic = resolvers.resolve(Topic::from_marker(b'a'), &[]).unwrap();

        assert_eq!(topic, Topic::from_marker(b'a'));
    }

    #[test]
    fn test_single_rewrite() {
        let resolvers = table(vec![(Topic::from_marker(b'c'), rewrite_to(b"b"))], 8);

        let topic = resolvers.resolve(Topic::from_marker(b'c'), &[]).unwrap();

        assert_eq!(topic, Topic::from_marker(b'b'));
    }

    #[test]
    fn test_chained_rewrites() {
        let resolvers = table(
            vec![
                (Topic::from_marker(b'x'), rewrite_to(b"y")),
                (Topic::from_marker(b'y'), rewrite_to(b"z")),
            ],
            8,
        );

        let topic = resolvers.resolve(Topic::from_marker(b'x'), &[]).unwrap();

        assert_eq!(topic, Topic::from_marker(b'z'));
    }

    #[test]
    fn test_cycle_is_unresolvable() {
        let resolvers = table(
            vec![
                (Topic::from_marker(b'x'), rewrite_to(b"y")),
                (Topic::from_marker(b'y'), rewrite_to(b"x")),
            ],
            8,
        );

        let err = resolvers.resolve(Topic::from_marker(b'x'), &[]).unwrap_err();

        assert!(matches!(err, RegistryError::UnresolvableTopic { steps: 2, .. }));
    }

    #[test]
    fn test_depth_bound() {
        let resolvers = table(
            vec![
                (Topic::from_marker(b'1'), rewrite_to(b"2")),
                (Topic::from_marker(b'2'), rewrite_to(b"3")),
                (Topic::from_marker(b'3'), rewrite_to(b"4")),
            ],
            2,
        );

        let err = resolvers.resolve(Topic::from_marker(b'1'), &[]).unwrap_err();

        assert_eq!(
            err,
            RegistryError::UnresolvableTopic {
                topic: Topic::from_marker(b'3'),
                steps: 2
            }
        );
    }

    #[test]
    fn test_fixed_point_terminates() {
        let resolvers = table(
            vec![(Topic::from_marker(b'e'), entity_type_resolver(b'e'))],
            8,
        );

        let topic = resolvers
            .resolve(Topic::from_marker(b'e'), &[Bytes::from_static(&[0x01])])
            .unwrap();

        assert_eq!(topic, Topic::from_marker(b'e'));
    }

    #[test]
    fn test_source_topics_follow_declared_targets() {
        let resolvers = table(
            vec![
                (Topic::from_marker(b'e'), entity_type_resolver(b'e')),
                (
                    Topic::from_marker(b'x'),
                    resolver_fn_targeting(&[b'y'], |_, _| Topic::from_marker(b'y')),
                ),
                (
                    Topic::from_marker(b'y'),
                    resolver_fn_targeting(&[b'z'], |_, _| Topic::from_marker(b'z')),
                ),
            ],
            8,
        );

        assert_eq!(resolvers.source_topics(b'e'), vec![Topic::from_marker(b'e')]);
        assert_eq!(
            resolvers.source_topics(b'z'),
            vec![Topic::from_marker(b'x'), Topic::from_marker(b'y')]
        );
        assert!(resolvers.source_topics(b'b').is_empty());
    }

    #[test]
    fn test_undeclared_targets_feed_every_marker() {
        let resolvers = table(vec![(Topic::from_marker(b'c'), rewrite_to(b"b"))], 8);

        assert_eq!(resolvers.source_topics(b'b'), vec![Topic::from_marker(b'c')]);
        assert_eq!(resolvers.source_topics(b'q'), vec![Topic::from_marker(b'c')]);
    }

    #[test]
    fn test_entity_type_resolver_reads_payload() {
        let resolvers = table(
            vec![(Topic::from_marker(b'e'), entity_type_resolver(b'e'))],
            8,
        );
        let payload = Bytes::from_static(&[0x43, 0x21, 0xFF, 0xFF]);

        let topic = resolvers.resolve(Topic::from_marker(b'e'), &[payload]).unwrap();

        assert_eq!(topic.as_bytes(), &[b'e', 0x43, 0x21]);
    }
}
