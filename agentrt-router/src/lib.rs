#![deny(missing_docs)]
//! Signal router (C4) — a compile-once, lookup-many trie matching dotted
//! signal types (`"user.123.created"`) to an ordered list of handlers.
//!
//! An ordered-pipeline dispatch, `Arc<dyn T>` handler storage, generalized
//! with a trie keyed by dotted segment and wildcard expansion (`*`, `**`),
//! plus named `RouterError` variants for precise rejection reporting.

use agentrt_core::RoutingError;
use std::sync::Arc;

/// A single-level wildcard matching exactly one segment.
const SINGLE_WILDCARD: &str = "*";
/// A multi-level wildcard matching one or more trailing segments.
const MULTI_WILDCARD: &str = "**";

/// Minimum priority a route may declare.
pub const MIN_PRIORITY: i32 = -100;
/// Maximum priority a route may declare.
pub const MAX_PRIORITY: i32 = 100;

/// An extra predicate attached to a route alongside its pattern. Evaluated
/// against the signal type string being routed; returning `false` means
/// "no match" for this route, the same as a pattern miss.
pub type Predicate<H> = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One registered route: a dotted pattern, a handler, a priority, and an
/// optional extra predicate.
#[derive(Clone)]
pub struct Route<H: Clone> {
    /// The dotted pattern this route was registered under.
    pub pattern: String,
    /// The handler to run when this route matches.
    pub handler: H,
    /// Priority in `[-100, 100]`; higher runs first.
    pub priority: i32,
    /// Optional extra predicate narrowing this route's matches further.
    pub predicate: Option<Predicate<H>>,
    /// Registration order, used to break priority ties stably.
    seq: u64,
}

enum Segment {
    Literal(String),
    Single,
    Multi,
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RoutingError> {
    if pattern.is_empty() {
        return Err(RoutingError::InvalidPattern(
            pattern.to_string(),
            "pattern must not be empty".to_string(),
        ));
    }
    let raw_segments: Vec<&str> = pattern.split('.').collect();
    if raw_segments.iter().any(|s| s.is_empty()) {
        return Err(RoutingError::InvalidPattern(
            pattern.to_string(),
            "empty segment".to_string(),
        ));
    }
    let mut segments = Vec::with_capacity(raw_segments.len());
    let mut prev_was_multi = false;
    for raw in raw_segments {
        let segment = match raw {
            MULTI_WILDCARD => {
                if prev_was_multi {
                    return Err(RoutingError::InvalidPattern(
                        pattern.to_string(),
                        "consecutive ** segments are not allowed".to_string(),
                    ));
                }
                Segment::Multi
            }
            SINGLE_WILDCARD => Segment::Single,
            literal => {
                if !literal
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(RoutingError::InvalidPattern(
                        pattern.to_string(),
                        format!("invalid characters in segment {raw:?}"),
                    ));
                }
                Segment::Literal(literal.to_string())
            }
        };
        prev_was_multi = matches!(segment, Segment::Multi);
        segments.push(segment);
    }
    Ok(segments)
}

#[derive(Default)]
struct Node<H: Clone> {
    literal: std::collections::HashMap<String, Node<H>>,
    single: Option<Box<Node<H>>>,
    multi: Option<Box<Node<H>>>,
    routes: Vec<Route<H>>,
}

impl<H: Clone> Node<H> {
    fn new() -> Self {
        Self {
            literal: std::collections::HashMap::new(),
            single: None,
            multi: None,
            routes: Vec::new(),
        }
    }
}

/// A priority-ordered trie matching dotted signal types to handlers.
///
/// Routes are registered once at startup and looked up many times per
/// incoming signal. Each lookup walks every matching path (literal, `*`,
/// and `**` expansions), evaluates any attached predicate, then sorts hits
/// by priority descending with registration order breaking ties.
pub struct Router<H: Clone> {
    root: Node<H>,
    next_seq: u64,
}

impl<H: Clone> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> Router<H> {
    /// An empty router.
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            next_seq: 0,
        }
    }

    /// Register `handler` under `pattern` with the given `priority`.
    ///
    /// Rejects empty patterns, empty segments, consecutive `**` segments,
    /// non-alphanumeric-underscore literal segments, and out-of-range
    /// priorities at registration time (never at lookup time).
    pub fn register(
        &mut self,
        pattern: &str,
        handler: H,
        priority: i32,
    ) -> Result<(), RoutingError> {
        self.register_with_predicate(pattern, handler, priority, None)
    }

    /// Register `handler` under `pattern`, plus an extra boolean predicate
    /// evaluated against the signal type at lookup time.
    pub fn register_with_predicate(
        &mut self,
        pattern: &str,
        handler: H,
        priority: i32,
        predicate: Option<Predicate<H>>,
    ) -> Result<(), RoutingError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(RoutingError::InvalidPriority(priority));
        }
        let segments = parse_pattern(pattern)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        let mut node = &mut self.root;
        for segment in &segments {
            node = match segment {
                Segment::Literal(lit) => node.literal.entry(lit.clone()).or_insert_with(Node::new),
                Segment::Single => node.single.get_or_insert_with(|| Box::new(Node::new())),
                Segment::Multi => node.multi.get_or_insert_with(|| Box::new(Node::new())),
            };
        }
        node.routes.push(Route {
            pattern: pattern.to_string(),
            handler,
            priority,
            predicate,
            seq,
        });
        Ok(())
    }

    /// Remove the route registered under the exact `pattern` whose handler
    /// is `eq`-equal (by pointer identity for `Arc`-wrapped handlers, or
    /// value equality otherwise, as determined by `matches`). Leaves any
    /// child nodes intact even if this was the last route at this path.
    pub fn remove(&mut self, pattern: &str, matches: impl Fn(&H) -> bool) -> Result<bool, RoutingError> {
        let segments = parse_pattern(pattern)?;
        let mut node = &mut self.root;
        for segment in &segments {
            node = match segment {
                Segment::Literal(lit) => match node.literal.get_mut(lit) {
                    Some(n) => n,
                    None => return Ok(false),
                },
                Segment::Single => match node.single.as_deref_mut() {
                    Some(n) => n,
                    None => return Ok(false),
                },
                Segment::Multi => match node.multi.as_deref_mut() {
                    Some(n) => n,
                    None => return Ok(false),
                },
            };
        }
        let before = node.routes.len();
        node.routes.retain(|r| !(r.pattern == pattern && matches(&r.handler)));
        Ok(node.routes.len() != before)
    }

    /// Match `signal_type` against every registered route, returning
    /// handlers sorted by priority descending (ties by registration order).
    ///
    /// Empty types, invalid characters, empty segments, or types beyond
    /// [`MAX_SIGNAL_TYPE_LEN`](agentrt_core::signal::MAX_SIGNAL_TYPE_LEN)
    /// are rejected. An empty match list is reported as `NoHandler`. A
    /// predicate that panics is treated as a non-match for its own route
    /// (other routes still match normally) but its failure is dropped — use
    /// [`Router::route_with_diagnostics`] to observe it.
    pub fn route(&self, signal_type: &str) -> Result<Vec<H>, RoutingError> {
        self.route_with_diagnostics(signal_type).map(|(hits, _)| hits)
    }

    /// Like [`Router::route`], but also returns one
    /// [`RoutingError::PredicateFailed`] per route whose predicate panicked
    /// instead of returning a boolean (§4.1 step 2: "predicate exceptions
    /// ... are treated as 'no match' and reported as a routing error for
    /// that route"). A panicking predicate never promotes its route into
    /// the match list, but it also never suppresses other routes' hits.
    pub fn route_with_diagnostics(&self, signal_type: &str) -> Result<(Vec<H>, Vec<RoutingError>), RoutingError> {
        agentrt_core::validate_signal_type(signal_type)
            .map_err(|e| RoutingError::InvalidPattern(signal_type.to_string(), e.to_string()))?;
        let segments: Vec<&str> = signal_type.split('.').collect();
        let mut hits: Vec<&Route<H>> = Vec::new();
        collect(&self.root, &segments, &mut hits);

        let mut matched: Vec<&Route<H>> = Vec::new();
        let mut diagnostics: Vec<RoutingError> = Vec::new();
        for route in hits {
            match &route.predicate {
                None => matched.push(route),
                Some(pred) => {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pred(signal_type))) {
                        Ok(true) => matched.push(route),
                        Ok(false) => {}
                        Err(payload) => diagnostics.push(RoutingError::PredicateFailed(
                            route.pattern.clone(),
                            panic_message(&payload),
                        )),
                    }
                }
            }
        }
        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        if matched.is_empty() {
            return Err(RoutingError::NoHandler(signal_type.to_string()));
        }
        Ok((matched.into_iter().map(|r| r.handler.clone()).collect(), diagnostics))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "predicate panicked with a non-string payload".to_string()
    }
}

fn collect<'a, H: Clone>(node: &'a Node<H>, remaining: &[&str], out: &mut Vec<&'a Route<H>>) {
    if let Some(multi) = &node.multi {
        // `**` matches one or more trailing segments — any non-empty
        // remaining suffix satisfies it, and a `**` node is always terminal.
        if !remaining.is_empty() {
            out.extend(multi.routes.iter());
        }
    }
    match remaining.split_first() {
        None => out.extend(node.routes.iter()),
        Some((head, rest)) => {
            if let Some(child) = node.literal.get(*head) {
                collect(child, rest, out);
            }
            if let Some(child) = &node.single {
                collect(child, rest, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_priority_ordering() {
        let mut router: Router<&'static str> = Router::new();
        router.register("user.123.created", "exact", 1).unwrap();
        router.register("user.*.created", "single", 10).unwrap();
        router.register("**", "multi", -100).unwrap();

        let hits = router.route("user.123.created").unwrap();
        assert_eq!(hits, vec!["single", "exact", "multi"]);
    }

    #[test]
    fn ties_broken_by_registration_order() {
        let mut router: Router<&'static str> = Router::new();
        router.register("a.b", "first", 5).unwrap();
        router.register("a.*", "second", 5).unwrap();
        let hits = router.route("a.b").unwrap();
        assert_eq!(hits, vec!["first", "second"]);
    }

    #[test]
    fn no_handler_errors() {
        let router: Router<&'static str> = Router::new();
        let err = router.route("a.b").unwrap_err();
        assert!(matches!(err, RoutingError::NoHandler(_)));
    }

    #[test]
    fn empty_type_is_rejected() {
        let router: Router<&'static str> = Router::new();
        let err = router.route("").unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPattern(_, _)));
    }

    #[test]
    fn invalid_priority_rejected_at_registration() {
        let mut router: Router<&'static str> = Router::new();
        let err = router.register("a.b", "h", 101).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPriority(101)));
    }

    #[test]
    fn empty_segment_rejected() {
        let mut router: Router<&'static str> = Router::new();
        let err = router.register("a..b", "h", 0).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPattern(_, _)));
    }

    #[test]
    fn consecutive_multi_wildcards_rejected() {
        let mut router: Router<&'static str> = Router::new();
        let err = router.register("a.**.**", "h", 0).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPattern(_, _)));
    }

    #[test]
    fn multi_wildcard_matches_one_or_more_segments() {
        let mut router: Router<&'static str> = Router::new();
        router.register("user.**", "h", 0).unwrap();
        assert_eq!(router.route("user.created").unwrap(), vec!["h"]);
        assert_eq!(router.route("user.123.created").unwrap(), vec!["h"]);
        assert!(router.route("user").is_err());
    }

    #[test]
    fn predicate_narrows_matches() {
        let mut router: Router<&'static str> = Router::new();
        router
            .register_with_predicate(
                "user.*",
                "only-created",
                0,
                Some(Arc::new(|t: &str| t.ends_with("created"))),
            )
            .unwrap();
        assert_eq!(router.route("user.created").unwrap(), vec!["only-created"]);
        assert!(router.route("user.deleted").is_err());
    }

    #[test]
    fn panicking_predicate_is_reported_not_matched() {
        let mut router: Router<&'static str> = Router::new();
        router
            .register_with_predicate(
                "user.*",
                "flaky",
                0,
                Some(Arc::new(|_: &str| panic!("boom"))),
            )
            .unwrap();
        router.register("user.*", "stable", -1).unwrap();

        let (handlers, diagnostics) = router.route_with_diagnostics("user.created").unwrap();
        assert_eq!(handlers, vec!["stable"]);
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            RoutingError::PredicateFailed(pattern, reason) => {
                assert_eq!(pattern, "user.*");
                assert_eq!(reason, "boom");
            }
            other => panic!("expected PredicateFailed, got {other:?}"),
        }
    }

    #[test]
    fn remove_exact_route_leaves_children_intact() {
        let mut router: Router<&'static str> = Router::new();
        router.register("user.created", "h1", 0).unwrap();
        router.register("user.created.extra", "h2", 0).unwrap();
        let removed = router.remove("user.created", |h| *h == "h1").unwrap();
        assert!(removed);
        assert!(router.route("user.created").is_err());
        assert_eq!(router.route("user.created.extra").unwrap(), vec!["h2"]);
    }

    #[test]
    fn single_wildcard_matches_exactly_one_segment() {
        let mut router: Router<&'static str> = Router::new();
        router.register("user.*.created", "h", 0).unwrap();
        assert_eq!(router.route("user.123.created").unwrap(), vec!["h"]);
        assert!(router.route("user.123.456.created").is_err());
    }
}
