//! Domain-authority classification of candidate sources.

use serde::Serialize;
use url::{Host, Url};

/// Authority tier of a source, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Government and military domains.
    Official,
    /// Accredited academic institutions.
    Academic,
    /// Recognized news outlets.
    News,
    /// Generic commercial or nonprofit sites; need manual scrutiny.
    Commercial,
    /// Blogs, forums and social platforms.
    Personal,
    /// Missing, malformed or non-web URLs.
    Unknown,
}

impl TrustTier {
    pub fn as_str(self) -> &'static str {
        match self {
            TrustTier::Official => "official",
            TrustTier::Academic => "academic",
            TrustTier::News => "news",
            TrustTier::Commercial => "commercial",
            TrustTier::Personal => "personal",
            TrustTier::Unknown => "unknown",
        }
    }

    /// Sources in this tier can never be approved.
    pub fn is_unacceptable(self) -> bool {
        matches!(self, TrustTier::Personal | TrustTier::Unknown)
    }
}

/// Tier plus flags derived from a source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceProfile {
    pub host: Option<String>,
    pub tier: TrustTier,
    /// News piece published in an opinion or editorial section.
    pub opinion: bool,
}

const NEWS_HOSTS: &[&str] = &[
    "apnews.com",
    "reuters.com",
    "bbc.com",
    "bbc.co.uk",
    "npr.org",
    "pbs.org",
    "nytimes.com",
    "washingtonpost.com",
    "wsj.com",
    "latimes.com",
    "usatoday.com",
    "theguardian.com",
    "bloomberg.com",
    "politico.com",
    "axios.com",
    "cnn.com",
    "nbcnews.com",
    "cbsnews.com",
    "abcnews.go.com",
];

const PERSONAL_HOSTS: &[&str] = &[
    "medium.com",
    "substack.com",
    "blogspot.com",
    "wordpress.com",
    "tumblr.com",
    "reddit.com",
    "quora.com",
    "facebook.com",
    "x.com",
    "twitter.com",
    "tiktok.com",
    "pinterest.com",
    "stackexchange.com",
];

const OPINION_SEGMENTS: &[&str] = &["opinion", "opinions", "editorial", "editorials", "commentisfree"];

/// Classify a source URL into a trust tier.
pub fn classify_url(raw: &str) -> SourceProfile {
    let unknown = SourceProfile {
        host: None,
        tier: TrustTier::Unknown,
        opinion: false,
    };
    let Ok(url) = Url::parse(raw.trim()) else {
        return unknown;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return unknown;
    }
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.trim_end_matches('.').to_ascii_lowercase(),
        _ => return unknown,
    };
    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| segments.map(str::to_ascii_lowercase).collect())
        .unwrap_or_default();

    let tier = tier_for_host(&host, &segments);
    let opinion = tier == TrustTier::News
        && segments
            .iter()
            .any(|segment| OPINION_SEGMENTS.contains(&segment.as_str()));
    SourceProfile {
        host: Some(host),
        tier,
        opinion,
    }
}

fn tier_for_host(host: &str, segments: &[String]) -> TrustTier {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return TrustTier::Unknown;
    }
    // Hosted platforms first: a `gov` or `edu` subdomain there is still a user page.
    if matches_any(host, PERSONAL_HOSTS) {
        return TrustTier::Personal;
    }
    let suffix = registry_suffix(&labels);

    if matches!(suffix, "gov" | "mil") || host.ends_with(".europa.eu") || is_us_locality(&labels)
    {
        return TrustTier::Official;
    }
    if matches!(suffix, "edu" | "ac") {
        return TrustTier::Academic;
    }
    if labels[0] == "blog"
        || labels[0] == "forum"
        || labels[0] == "forums"
        || segments.first().is_some_and(|s| s == "blog" || s == "forum")
    {
        return TrustTier::Personal;
    }
    if matches_any(host, NEWS_HOSTS) {
        return TrustTier::News;
    }
    TrustTier::Commercial
}

/// Label that names the registry a host sits under: the TLD itself, or the
/// second-level label under a country code (`gov` in `gov.uk`, `ac` in `ox.ac.uk`).
fn registry_suffix<'a>(labels: &[&'a str]) -> &'a str {
    let tld = labels[labels.len() - 1];
    if tld.len() == 2 && labels.len() >= 3 {
        let second = labels[labels.len() - 2];
        if matches!(second, "gov" | "mil" | "edu" | "ac") {
            return second;
        }
    }
    tld
}

/// State and local government hosts under the `.us` locality namespace
/// (e.g. `co.marin.ca.us`, `www.state.nj.us`).
fn is_us_locality(labels: &[&str]) -> bool {
    labels.last() == Some(&"us")
        && labels.len() >= 3
        && labels
            .iter()
            .any(|l| matches!(*l, "state" | "co" | "ci" | "city" | "county" | "k12"))
}

fn matches_any(host: &str, known: &[&str]) -> bool {
    known
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(url: &str) -> TrustTier {
        classify_url(url).tier
    }

    #[test]
    fn government_domains_are_official() {
        assert_eq!(tier("https://www.countyx.gov/permits/trees"), TrustTier::Official);
        assert_eq!(tier("https://www.army.mil/"), TrustTier::Official);
        assert_eq!(tier("https://www.gov.uk/planning-permission"), TrustTier::Official);
        assert_eq!(tier("https://www.co.marin.ca.us/parks"), TrustTier::Official);
    }

    #[test]
    fn universities_are_academic() {
        assert_eq!(tier("https://extension.umn.edu/trees"), TrustTier::Academic);
        assert_eq!(tier("https://www.ox.ac.uk/research"), TrustTier::Academic);
    }

    #[test]
    fn blogs_and_forums_are_personal() {
        assert_eq!(tier("https://gardenguy.blogspot.com/2019/trees"), TrustTier::Personal);
        assert_eq!(tier("https://www.reddit.com/r/arborists"), TrustTier::Personal);
        assert_eq!(tier("https://blog.example.com/post"), TrustTier::Personal);
        assert_eq!(tier("https://example.com/blog/post"), TrustTier::Personal);
    }

    #[test]
    fn registry_labels_only_count_at_the_suffix() {
        let cases = [
            ("https://gov.wordpress.com/2019/plant-anything", TrustTier::Personal),
            ("https://gov.blogspot.com/trees", TrustTier::Personal),
            ("https://ac.medium.com/post", TrustTier::Personal),
            ("https://edu.substack.com/p/trees", TrustTier::Personal),
            ("https://gov.example.com/trees", TrustTier::Commercial),
            ("https://edu.example.org/courses", TrustTier::Commercial),
            ("https://www.gov.uk/planning-permission", TrustTier::Official),
            ("https://www.legislation.gov.au/", TrustTier::Official),
            ("https://www.sydney.edu.au/", TrustTier::Academic),
            ("https://www.ox.ac.uk/research", TrustTier::Academic),
        ];
        for (url, expected) in cases {
            assert_eq!(tier(url), expected, "{url}");
        }
    }

    #[test]
    fn news_opinion_pages_are_flagged() {
        let profile = classify_url("https://www.nytimes.com/2024/05/01/opinion/trees.html");
        assert_eq!(profile.tier, TrustTier::News);
        assert!(profile.opinion);
        assert!(!classify_url("https://apnews.com/article/trees").opinion);
    }

    #[test]
    fn generic_domains_are_commercial() {
        assert_eq!(tier("https://www.arborday.org/trees"), TrustTier::Commercial);
        assert_eq!(tier("https://treeservice.net"), TrustTier::Commercial);
    }

    #[test]
    fn malformed_or_missing_urls_are_unknown() {
        assert_eq!(tier(""), TrustTier::Unknown);
        assert_eq!(tier("not a url"), TrustTier::Unknown);
        assert_eq!(tier("ftp://files.countyx.gov/"), TrustTier::Unknown);
        assert_eq!(tier("http://192.168.0.1/"), TrustTier::Unknown);
        assert!(TrustTier::Unknown.is_unacceptable());
    }
}
