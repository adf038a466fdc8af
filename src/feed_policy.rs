//! FeedPolicy: pure include/exclude predicate over newsgroup names.

use regex::Regex;

use crate::config::FeedPolicyConfig;
use crate::{DaemonError, Result};

/// Compiles newsgroup glob-style patterns (`overchan.*`, `ctl`, `*`) to
/// anchored regexes once at load time. Immutable after construction, so it's
/// `Send + Sync` for free and safe to share across every outbound session.
#[derive(Debug, Clone)]
pub struct FeedPolicy {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    anchored.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => anchored.push_str(".*"),
            '.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                anchored.push('\\');
                anchored.push(ch);
            }
            c => anchored.push(c),
        }
    }
    anchored.push('$');
    Regex::new(&anchored)
        .map_err(|e| DaemonError::Config(format!("invalid feed policy pattern {pattern:?}: {e}")))
}

impl FeedPolicy {
    /// An empty policy that allows nothing.
    pub fn empty() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Compiles include/exclude patterns from a config section.
    pub fn from_config(config: &FeedPolicyConfig) -> Result<Self> {
        let include = config
            .include
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>>>()?;
        let exclude = config
            .exclude
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { include, exclude })
    }

    /// True iff `newsgroup` matches some include pattern and no exclude
    /// pattern.
    pub fn allows_newsgroup(&self, newsgroup: &str) -> bool {
        self.include.iter().any(|re| re.is_match(newsgroup))
            && !self.exclude.iter().any(|re| re.is_match(newsgroup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(include: &[&str], exclude: &[&str]) -> FeedPolicy {
        FeedPolicy::from_config(&FeedPolicyConfig {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_wildcard_include() {
        let p = policy(&["overchan.*"], &[]);
        assert!(p.allows_newsgroup("overchan.random"));
        assert!(p.allows_newsgroup("overchan.test"));
        assert!(!p.allows_newsgroup("ctl"));
    }

    #[test]
    fn test_exclude_overrides_include() {
        let p = policy(&["overchan.*"], &["overchan.test"]);
        assert!(p.allows_newsgroup("overchan.random"));
        assert!(!p.allows_newsgroup("overchan.test"));
    }

    #[test]
    fn test_exact_match_only() {
        let p = policy(&["ctl"], &[]);
        assert!(p.allows_newsgroup("ctl"));
        assert!(!p.allows_newsgroup("ctl.sub"));
    }

    #[test]
    fn test_empty_policy_allows_nothing() {
        let p = FeedPolicy::empty();
        assert!(!p.allows_newsgroup("overchan.random"));
    }

    #[test]
    fn test_global_wildcard() {
        let p = policy(&["*"], &[]);
        assert!(p.allows_newsgroup("anything.at.all"));
    }

    #[test]
    fn test_s4_fan_out_scenario() {
        let p1 = policy(&["overchan.*"], &[]);
        let p2 = policy(&["ctl"], &[]);
        assert!(p1.allows_newsgroup("overchan.random"));
        assert!(!p2.allows_newsgroup("overchan.random"));
    }
}
