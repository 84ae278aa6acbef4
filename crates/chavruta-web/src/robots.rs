//! Minimal robots.txt compliance
//!
//! One fetch per origin, cached. The parser understands user-agent
//! groups with Allow/Disallow rules; matching follows the usual
//! longest-path-wins convention with Allow breaking ties.

use std::sync::Arc;
use std::time::Duration;

use mini_moka::sync::Cache;
use url::Url;

use crate::error::WebError;

/// How long a parsed robots.txt is trusted
const ROBOTS_TTL: Duration = Duration::from_secs(3_600);
/// Origins whose robots.txt we keep parsed
const ROBOTS_CACHE_CAPACITY: u64 = 500;
/// robots.txt fetch budget
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest robots.txt body we will parse
const ROBOTS_MAX_BYTES: usize = 128 * 1024;

/// Parsed rules for one origin
#[derive(Debug, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct Rule {
    allow: bool,
    path: String,
}

impl RobotsRules {
    /// Parse a robots.txt body
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_rules {
                        if !current.agents.is_empty() {
                            groups.push(std::mem::take(&mut current));
                        }
                        in_rules = false;
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    if current.agents.is_empty() {
                        continue;
                    }
                    in_rules = true;
                    // An empty Disallow value allows everything
                    if !value.is_empty() {
                        current.rules.push(Rule {
                            allow: field == "allow",
                            path: value.to_owned(),
                        });
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// Whether `user_agent` may fetch `path`
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let folded = user_agent.to_ascii_lowercase();

        // Most specific matching group: longest agent token contained
        // in our user agent, with "*" as the fallback
        let group = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && folded.contains(a.as_str())))
            .max_by_key(|g| g.agents.iter().map(String::len).max().unwrap_or(0))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        // Longest matching path wins; Allow beats Disallow on ties
        let mut verdict = true;
        let mut best_len = 0;
        let mut best_allow = false;
        for rule in &group.rules {
            if path.starts_with(&rule.path) {
                let len = rule.path.len();
                if len > best_len || (len == best_len && rule.allow && !best_allow) {
                    best_len = len;
                    best_allow = rule.allow;
                    verdict = rule.allow;
                }
            }
        }
        verdict
    }
}

/// Per-origin robots.txt cache
pub struct RobotsCache {
    cache: Cache<String, Arc<RobotsRules>>,
    http: reqwest::Client,
    user_agent: String,
}

impl RobotsCache {
    pub fn new(user_agent: &str) -> Result<Self, WebError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_owned())
            .timeout(ROBOTS_TIMEOUT)
            .build()
            .map_err(|e| WebError::Request(e.to_string()))?;
        Ok(Self {
            cache: Cache::builder()
                .max_capacity(ROBOTS_CACHE_CAPACITY)
                .time_to_live(ROBOTS_TTL)
                .build(),
            http,
            user_agent: user_agent.to_owned(),
        })
    }

    /// Check whether the configured user agent may fetch `url`
    ///
    /// Missing or unfetchable robots.txt allows everything.
    pub async fn allows(&self, url: &Url) -> Result<bool, WebError> {
        let origin = url.origin().ascii_serialization();
        let rules = if let Some(cached) = self.cache.get(&origin) {
            cached
        } else {
            let rules = Arc::new(self.load(&origin).await);
            self.cache.insert(origin.clone(), Arc::clone(&rules));
            rules
        };

        Ok(rules.is_allowed(&self.user_agent, url.path()))
    }

    async fn load(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        match self.http.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    let body: String = body.chars().take(ROBOTS_MAX_BYTES).collect();
                    RobotsRules::parse(&body)
                }
                Err(e) => {
                    tracing::debug!(origin, error = %e, "robots.txt body unreadable");
                    RobotsRules::default()
                }
            },
            Ok(response) => {
                tracing::debug!(origin, status = %response.status(), "no usable robots.txt");
                RobotsRules::default()
            }
            Err(e) => {
                tracing::debug!(origin, error = %e, "robots.txt fetch failed");
                RobotsRules::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "\
# comments are ignored
User-agent: *
Disallow: /private/
Allow: /private/public.html

User-agent: ChavrutaBot
Disallow: /bot-trap/
";

    #[test]
    fn wildcard_group_rules() {
        let rules = RobotsRules::parse(BODY);
        assert!(rules.is_allowed("SomeOtherBot/1.0", "/open/page.html"));
        assert!(!rules.is_allowed("SomeOtherBot/1.0", "/private/secret.html"));
        // Longest match: the Allow rule is more specific
        assert!(rules.is_allowed("SomeOtherBot/1.0", "/private/public.html"));
    }

    #[test]
    fn named_group_beats_wildcard() {
        let rules = RobotsRules::parse(BODY);
        assert!(!rules.is_allowed("ChavrutaBot/0.4", "/bot-trap/x"));
        // The named group has no /private/ rule
        assert!(rules.is_allowed("ChavrutaBot/0.4", "/private/secret.html"));
    }

    #[test]
    fn empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("AnyBot", "/anything"));
    }

    #[test]
    fn missing_robots_allows_everything() {
        let rules = RobotsRules::default();
        assert!(rules.is_allowed("AnyBot", "/anything"));
    }

    #[test]
    fn stacked_agent_lines_share_rules() {
        let rules = RobotsRules::parse("User-agent: a\nUser-agent: b\nDisallow: /x/\n");
        assert!(!rules.is_allowed("a", "/x/1"));
        assert!(!rules.is_allowed("b", "/x/1"));
        assert!(rules.is_allowed("c", "/x/1"));
    }
}
