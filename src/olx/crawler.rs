use crate::extract::{extract, extract_attr_list, extract_list, Locator};
use crate::olx::{Listing, OlxAd};
use crate::AdStorage;
use lazy_static::lazy_static;
use reqwest::{header, Client, StatusCode};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{error, info};

const E: &str = "Invalid selector";
lazy_static! {
    static ref L_CARD: Selector = Selector::parse(r#"[data-testid="l-card"]"#).expect(E);
    static ref A: Selector = Selector::parse("a").expect(E);
}

// The data-cy/data-testid attributes are the stable anchors of the ad
// markup; the wrapper tags in between change with site redesigns.
const POSTED_AT: Locator = Locator {
    attrs: &[("data-cy", "ad-posted-at")],
    path: &[],
};
const TITLE: Locator = Locator {
    attrs: &[("data-cy", "ad_title")],
    path: &["h4"],
};
const PRICE: Locator = Locator {
    attrs: &[("data-testid", "ad-price-container")],
    path: &["h3"],
};
const DESCRIPTION: Locator = Locator {
    attrs: &[("data-cy", "ad_description")],
    path: &["div"],
};
const SELLER_NAME: Locator = Locator {
    attrs: &[("data-testid", "user-profile-link")],
    path: &["div", "h4"],
};
const SELLER_REGISTERED: Locator = Locator {
    attrs: &[("data-testid", "user-profile-link")],
    path: &["div", "p", "span"],
};
const SELLER_LAST_SEEN: Locator = Locator {
    attrs: &[("data-testid", "lastSeenBox")],
    path: &["span"],
};
const PHONE: Locator = Locator {
    attrs: &[("data-testid", "phones-container")],
    path: &["div", "p"],
};
const MAIN_CONTENT: Locator = Locator {
    attrs: &[("data-testid", "main")],
    path: &[],
};
const AD_PHOTO: Locator = Locator {
    attrs: &[("data-testid", "ad-photo")],
    path: &[],
};

// Rendered in place of the digits until a visitor asks to reveal them.
const MASKED_PHONE: &str = "xxx xxx xxx";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const PAGE_VIEWS_QUERY: &str = "query PageViews($adId: String!) {\n  myAds {\n    \
                                pageViews(adId: $adId) {\n      pageViews\n    }\n  }\n}";

#[derive(Debug, Clone)]
pub struct OlxConfig {
    pub base_url: String,
    pub graphql_url: String,
    pub targeting_url: String,
}

impl Default for OlxConfig {
    fn default() -> Self {
        OlxConfig {
            base_url: "https://www.olx.ua".to_string(),
            graphql_url: "https://production-graphql.eu-sharedservices.olxcdn.com/graphql"
                .to_string(),
            targeting_url: "https://www.olx.ua/api/v1/targeting/data/".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct OlxCrawler {
    http: Client,
    config: OlxConfig,
}

impl OlxCrawler {
    pub fn new(config: OlxConfig) -> Result<OlxCrawler, crate::CrawlerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_static("ANONYMOUS"),
        );
        headers.insert("site", header::HeaderValue::from_static("olxua"));

        let http = Client::builder().default_headers(headers).build()?;
        Ok(OlxCrawler { http, config })
    }

    /// Visits listing pages 1..=pages, then fetches and stores every
    /// advertisement not already known. A failed page or a failed detail
    /// fetch only reduces the yield of the run.
    pub async fn crawl<S: AdStorage>(&self, pages: u32, storage: &S) {
        let mut listings: Vec<Listing> = Vec::new();
        for page in 1..=pages {
            if let Some(found) = self.list_page(page, storage).await {
                listings.extend(found);
            }
        }

        let mut saved = 0u32;
        for listing in listings {
            let url = format!("{}{}", self.config.base_url, listing.href);
            let Some(ad) = self.advertisement(&url, listing.ad_id).await else {
                continue;
            };
            match storage.save_ad(&ad).await {
                Ok(()) => saved += 1,
                Err(e) => error!("Failed to save advertisement {}: {}", ad.ad_id, e),
            }
        }
        info!("Crawl finished, {} new advertisements stored", saved);
    }

    /// Links of one listing page, minus advertisements already in storage.
    /// `None` means the page itself could not be fetched.
    pub async fn list_page<S: AdStorage>(&self, page: u32, storage: &S) -> Option<Vec<Listing>> {
        let url = format!("{}/uk/list/?page={}", self.config.base_url, page);
        let body = self.fetch_page(&url).await?;

        let candidates: Vec<Listing> = {
            let doc = Html::parse_document(&body);
            doc.select(&L_CARD)
                .filter_map(|card| {
                    let ad_id = card.value().attr("id")?.parse::<i64>().ok()?;
                    let href = card.select(&A).next()?.value().attr("href")?;
                    // Sponsored cards carry absolute off-site links.
                    href.starts_with('/').then(|| Listing {
                        href: href.to_string(),
                        ad_id,
                    })
                })
                .collect()
        };

        let mut listings = Vec::new();
        for candidate in candidates {
            if self.is_known(candidate.ad_id, storage).await {
                info!(
                    "Advertisement {} skipped, it already exists in DB",
                    candidate.ad_id
                );
            } else {
                listings.push(candidate);
            }
        }
        Some(listings)
    }

    async fn is_known<S: AdStorage>(&self, ad_id: i64, storage: &S) -> bool {
        match storage.ad_exists(ad_id).await {
            Ok(exists) => exists,
            Err(e) => {
                // Better to fetch a known ad twice than to lose an unknown one.
                error!("Failed to check advertisement {}: {}", ad_id, e);
                false
            }
        }
    }

    /// Fetches a detail page and assembles the record. Each field is
    /// extracted independently; only an unreachable page yields `None`.
    pub async fn advertisement(&self, url: &str, ad_id: i64) -> Option<OlxAd> {
        let body = self.fetch_page(url).await?;
        let mut ad = {
            let doc = Html::parse_document(&body);
            ad_from_document(&doc, url, ad_id)
        };
        ad.page_views = self.page_views(ad_id).await;
        ad.city = self.city(ad_id).await;
        Some(ad)
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        info!("Fetching URL {}", url);
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch {}: {}", url, e);
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            error!(
                "Failed to fetch {}: {} ({})",
                url,
                status.as_u16(),
                reason(status)
            );
            return None;
        }
        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                error!("Failed to read {}: {}", url, e);
                None
            }
        }
    }

    async fn page_views(&self, ad_id: i64) -> Option<i64> {
        let body = serde_json::json!({
            "operationName": "PageViews",
            "variables": { "adId": ad_id.to_string() },
            "query": PAGE_VIEWS_QUERY,
        });
        let response = match self
            .http
            .post(&self.config.graphql_url)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to receive pageViews for {}: {}", ad_id, e);
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            error!(
                "Failed to receive pageViews for {}: {} ({})",
                ad_id,
                status.as_u16(),
                reason(status)
            );
            return None;
        }
        // An ad with no recorded views comes back with nulls partway down
        // the nesting, not with a zero.
        let parsed: PageViewsResponse = response.json().await.ok()?;
        parsed.data?.my_ads?.page_views?.page_views
    }

    async fn city(&self, ad_id: i64) -> Option<String> {
        let response = match self
            .http
            .get(&self.config.targeting_url)
            .query(&[("page", "ad"), ("params[ad_id]", ad_id.to_string().as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to receive city for {}: {}", ad_id, e);
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            error!(
                "Failed to receive city for {}: {} ({})",
                ad_id,
                status.as_u16(),
                reason(status)
            );
            return None;
        }
        let parsed: TargetingResponse = response.json().await.ok()?;
        parsed.data?.targeting?.city
    }
}

pub(crate) fn ad_from_document(doc: &Html, url: &str, ad_id: i64) -> OlxAd {
    OlxAd {
        ad_id,
        url: url.to_string(),
        publication_date: extract(doc, &POSTED_AT),
        title: extract(doc, &TITLE),
        price: extract(doc, &PRICE),
        tags: extract_list(doc, &MAIN_CONTENT),
        images: extract_attr_list(doc, &AD_PHOTO, "img", "src"),
        description: extract(doc, &DESCRIPTION),
        seller_name: extract(doc, &SELLER_NAME),
        seller_registration_date: extract(doc, &SELLER_REGISTERED),
        seller_last_seen: extract(doc, &SELLER_LAST_SEEN),
        phone_number: phone_number(doc),
        page_views: None,
        city: None,
    }
}

fn phone_number(doc: &Html) -> Option<String> {
    extract(doc, &PHONE).filter(|number| number.as_str() != MASKED_PHONE)
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("unknown")
}

#[derive(Debug, Deserialize)]
struct PageViewsResponse {
    data: Option<PageViewsData>,
}

#[derive(Debug, Deserialize)]
struct PageViewsData {
    #[serde(rename = "myAds")]
    my_ads: Option<MyAds>,
}

#[derive(Debug, Deserialize)]
struct MyAds {
    #[serde(rename = "pageViews")]
    page_views: Option<PageViewsCounter>,
}

#[derive(Debug, Deserialize)]
struct PageViewsCounter {
    #[serde(rename = "pageViews")]
    page_views: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TargetingResponse {
    data: Option<TargetingData>,
}

#[derive(Debug, Deserialize)]
struct TargetingData {
    targeting: Option<TargetingParams>,
}

#[derive(Debug, Deserialize)]
struct TargetingParams {
    city: Option<String>,
}
