//! robots.txt rules
//!
//! Matching is delegated to the `robotstxt` crate; `Crawl-delay` is read
//! separately since the matcher ignores it.

use robotstxt::DefaultMatcher;

/// Rules parsed from one host's robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// `None` allows everything
    content: Option<String>,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        let content = (!content.trim().is_empty()).then(|| content.to_string());
        Self { content }
    }

    /// Rules used when robots.txt is missing or unreadable
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.content.is_none()
    }

    /// Checks a full URL for the given product token (e.g. `DocShop`)
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
        }
    }

    /// `Crawl-delay` in seconds for `agent`, preferring its own group over `*`
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        let content = self.content.as_deref()?;
        let agent = agent.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut wildcard = None;
        let mut specific = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if in_rules {
                    group.clear();
                    in_rules = false;
                }
                group.push(value.to_lowercase());
                continue;
            }

            in_rules = true;
            if key != "crawl-delay" {
                continue;
            }
            let Ok(delay) = value.parse::<f64>() else {
                continue;
            };
            if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                specific = Some(delay);
            } else if group.iter().any(|ua| ua == "*") {
                wildcard = Some(delay);
            }
        }

        specific.or(wildcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: *
Disallow: /private/
Crawl-delay: 2

User-agent: DocShop
Disallow: /drafts/
Crawl-delay: 0.5
";

    #[test]
    fn test_allow_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allow_all());
        assert!(rules.is_allowed("https://example.com/anything", "DocShop"));
        assert_eq!(rules.crawl_delay("DocShop"), None);
    }

    #[test]
    fn test_blank_content_allows_all() {
        assert!(RobotsRules::from_content("  \n").is_allow_all());
    }

    #[test]
    fn test_agent_specific_group() {
        let rules = RobotsRules::from_content(ROBOTS);
        assert!(!rules.is_allowed("https://example.com/drafts/x", "DocShop"));
        assert!(rules.is_allowed("https://example.com/private/x", "DocShop"));
        assert!(!rules.is_allowed("https://example.com/private/x", "OtherBot"));
        assert!(rules.is_allowed("https://example.com/docs/", "OtherBot"));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_group() {
        let rules = RobotsRules::from_content(ROBOTS);
        assert_eq!(rules.crawl_delay("DocShop"), Some(0.5));
        assert_eq!(rules.crawl_delay("OtherBot"), Some(2.0));
    }
}
