use std::collections::HashMap;

/// Per-host bookkeeping for one crawl session
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Pages fetched from this host
    pub pages_visited: u32,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_visit(&self, max_pages: u32) -> bool {
        self.pages_visited < max_pages
    }

    pub fn record_visit(&mut self) {
        self.pages_visited += 1;
    }
}

/// Page counters for every host seen in a session
#[derive(Debug, Clone)]
pub struct DomainTable {
    domains: HashMap<String, DomainState>,
    max_pages_per_domain: u32,
}

impl DomainTable {
    pub fn new(max_pages_per_domain: u32) -> Self {
        Self {
            domains: HashMap::new(),
            max_pages_per_domain,
        }
    }

    /// True while `domain` is below the per-domain page cap
    pub fn has_capacity(&self, domain: &str) -> bool {
        self.domains
            .get(domain)
            .map_or(self.max_pages_per_domain > 0, |d| {
                d.can_visit(self.max_pages_per_domain)
            })
    }

    pub fn record_visit(&mut self, domain: &str) {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .record_visit();
    }

    pub fn pages_visited(&self, domain: &str) -> u32 {
        self.domains.get(domain).map_or(0, |d| d.pages_visited)
    }

    /// Hosts and their page counts, busiest first
    pub fn counts(&self) -> Vec<(String, u32)> {
        let mut counts: Vec<(String, u32)> = self
            .domains
            .iter()
            .map(|(domain, state)| (domain.clone(), state.pages_visited))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}
