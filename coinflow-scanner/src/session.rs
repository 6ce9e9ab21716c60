use crate::error::{Result, ScanError};
use crate::identity::ClientIdentity;
use crate::parse::parse_search_form;
use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status_code: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }
}

/// One isolated browsing session: its own client, cookie jar and identity.
///
/// Sessions are cheap enough to create per resolved transaction, which keeps
/// cookies and rate-limit state from leaking between concurrent workers.
pub struct ExplorerSession {
    client: Client,
}

impl ExplorerSession {
    pub fn new(identity: ClientIdentity, timeout: Duration, proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(identity.user_agent.clone())
            .default_headers(identity.headers())
            .cookie_store(true)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Page> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(Page {
            url: final_url,
            status_code,
            body,
        })
    }

    /// Fetch a page and fail on a non-2xx status.
    pub async fn fetch_ok(&self, url: &str) -> Result<Page> {
        let page = self.fetch(url).await?;
        if !page.is_success() {
            return Err(ScanError::UnexpectedStatus(page.status_code));
        }
        Ok(page)
    }

    /// Load the home page and submit `query` through its search form.
    pub async fn submit_search(&self, home: &str, query: &str) -> Result<Page> {
        let home_page = self.fetch_ok(home).await?;
        let form = parse_search_form(&home_page.body)
            .ok_or_else(|| ScanError::ParseError(format!("no search form on {}", home)))?;

        let mut target = Url::parse(&home_page.url)?.join(&form.action)?;
        target.query_pairs_mut().append_pair(&form.field, query);

        debug!("Submitting search for {} to {}", query, target);
        self.fetch_ok(target.as_str()).await
    }
}
