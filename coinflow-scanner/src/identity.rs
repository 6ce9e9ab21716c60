//! Simulated client identities used to vary request headers between sessions.

use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36 OPR/94.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7",
    "en-US,en;q=0.9,it-IT;q=0.8,it;q=0.7",
    "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7",
];

const SEC_CH_UA: &[&str] = &[
    "\"Chromium\";v=\"122\", \"Not(A:Brand\";v=\"24\", \"Google Chrome\";v=\"122\"",
    "\"Opera\";v=\"80\", \"Chromium\";v=\"94\", \"Not(A:Brand\";v=\"24\"",
    "\"Microsoft Edge\";v=\"90\", \"Chromium\";v=\"90\", \"Not(A:Brand\";v=\"24\"",
];

const SEC_CH_UA_PLATFORMS: &[&str] = &["\"macOS\"", "\"Windows\"", "\"Linux\""];

const SEARCH_REFERRERS: &[&str] = &[
    "https://www.google.com",
    "https://www.bing.com",
    "https://search.yahoo.com",
    "https://www.duckduckgo.com",
    "https://news.ycombinator.com",
    "https://www.reddit.com",
    "https://www.wikipedia.org",
];

/// Paths on the explorer itself used as referers once a request has been refused.
const EXPLORER_REFERRER_PATHS: &[&str] = &[
    "",
    "/?q=",
    "/info",
    "/privacy",
    "/wallet/DeepBit.net",
    "/wallet/DeepBit.net/addresses",
    "/wallet/BTCCPool",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub accept_language: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_platform: String,
    pub referer: String,
}

impl ClientIdentity {
    /// Random identity with an external search engine as referer.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let referer = pick(&mut rng, SEARCH_REFERRERS).to_string();
        Self::with_referer(&mut rng, referer)
    }

    /// Random identity that appears to navigate from within the explorer.
    pub fn random_on_site(base_url: &str) -> Self {
        let mut rng = rand::thread_rng();
        let path = pick(&mut rng, EXPLORER_REFERRER_PATHS);
        let referer = format!("{}{}", base_url.trim_end_matches('/'), path);
        Self::with_referer(&mut rng, referer)
    }

    fn with_referer<R: Rng>(rng: &mut R, referer: String) -> Self {
        Self {
            user_agent: pick(rng, USER_AGENTS).to_string(),
            accept_language: pick(rng, ACCEPT_LANGUAGES).to_string(),
            sec_ch_ua: pick(rng, SEC_CH_UA).to_string(),
            sec_ch_ua_platform: pick(rng, SEC_CH_UA_PLATFORMS).to_string(),
            referer,
        }
    }

    /// Browser navigation headers for this identity. The user agent is set on
    /// the client builder and is not part of the map.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs: [(&'static str, &str); 11] = [
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("cache-control", "max-age=0"),
            ("accept-language", &self.accept_language),
            ("sec-ch-ua", &self.sec_ch_ua),
            ("sec-ch-ua-platform", &self.sec_ch_ua_platform),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "same-origin"),
            ("sec-fetch-user", "?1"),
            ("upgrade-insecure-requests", "1"),
            ("referer", &self.referer),
        ];

        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        headers
    }
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}
