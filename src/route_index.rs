//! The route index: a wildcard-aware, priority-ordered matcher from URL path
//! to worker index. See `RouteIndex::add` and `RouteIndex::find` for the
//! public contract; specificity ordering is maintained at insertion time so
//! matching itself is a plain linear scan with no priority logic in the hot
//! path.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pattern: String,
    worker_index: usize,
    is_wildcard: bool,
    prefix_len: usize,
}

impl Route {
    fn new(pattern: impl Into<String>, worker_index: usize) -> Self {
        let pattern = pattern.into();
        let is_wildcard = pattern.ends_with('*');
        let prefix_len = if is_wildcard {
            pattern.len() - 1
        } else {
            pattern.len()
        };
        Self {
            pattern,
            worker_index,
            is_wildcard,
            prefix_len,
        }
    }

    fn is_match(&self, path: &str) -> bool {
        if self.is_wildcard {
            path.as_bytes().starts_with(&self.pattern.as_bytes()[..self.prefix_len])
        } else {
            self.pattern == path
        }
    }

    /// True if `self` must sort no later than `other` under the specificity
    /// ordering: non-wildcard before wildcard, then longer prefix first.
    fn at_least_as_specific_as(&self, other: &Route) -> bool {
        match (self.is_wildcard, other.is_wildcard) {
            (false, true) => true,
            (true, false) => false,
            _ => self.prefix_len >= other.prefix_len,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RouteIndex {
    routes: Vec<Route>,
}

impl RouteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a route for `worker_index`. Duplicate patterns are allowed;
    /// under the stable specificity sort, the earlier-inserted route wins
    /// any tie.
    pub fn add(&mut self, pattern: impl Into<String>, worker_index: usize) {
        let route = Route::new(pattern, worker_index);
        let insert_at = self
            .routes
            .iter()
            .position(|existing| !route.at_least_as_specific_as(existing))
            .unwrap_or(self.routes.len());
        self.routes.insert(insert_at, route);
    }

    /// Returns the worker index for the first route (in priority order)
    /// whose pattern matches `path`, or `None` if nothing matches.
    pub fn find(&self, path: &str) -> Option<usize> {
        self.routes
            .iter()
            .find(|route| route.is_match(path))
            .map(|route| route.worker_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_prefers_exact_then_longest_wildcard() {
        let mut index = RouteIndex::new();
        index.add("*", 0);
        index.add("/api/*", 1);
        index.add("/api/users", 2);

        assert_eq!(index.find("/api/users"), Some(2));
        assert_eq!(index.find("/api/posts"), Some(1));
        assert_eq!(index.find("/other"), Some(0));
    }

    #[test]
    fn priority_is_independent_of_insertion_order() {
        let mut index = RouteIndex::new();
        index.add("/api/users", 2);
        index.add("*", 0);
        index.add("/api/*", 1);

        assert_eq!(index.find("/api/users"), Some(2));
        assert_eq!(index.find("/api/posts"), Some(1));
        assert_eq!(index.find("/other"), Some(0));
    }

    #[test]
    fn stable_sort_means_earlier_insert_wins_ties() {
        let mut index = RouteIndex::new();
        index.add("/same", 10);
        index.add("/same", 20);

        assert_eq!(index.find("/same"), Some(10));
    }

    #[test]
    fn bare_wildcard_matches_empty_path_and_root() {
        let mut index = RouteIndex::new();
        index.add("*", 0);

        assert_eq!(index.find(""), Some(0));
        assert_eq!(index.find("/"), Some(0));
    }

    #[test]
    fn miss_with_only_non_wildcards() {
        let mut index = RouteIndex::new();
        index.add("/a", 0);
        index.add("/b", 1);

        assert_eq!(index.find("/c"), None);
    }

    #[test]
    fn empty_pattern_matches_only_empty_path() {
        let mut index = RouteIndex::new();
        index.add("", 0);

        assert_eq!(index.find(""), Some(0));
        assert_eq!(index.find("/"), None);
    }

    #[test]
    fn duplicate_pattern_different_workers_earlier_wins() {
        let mut index = RouteIndex::new();
        index.add("/dup", 1);
        index.add("/other", 2);
        index.add("/dup", 3);

        assert_eq!(index.find("/dup"), Some(1));
    }
}
