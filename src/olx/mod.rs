mod crawler;
mod data;

pub use crawler::{OlxConfig, OlxCrawler};
pub use data::OlxAdsDb;

use std::fmt;

/// One advertisement as persisted. `ad_id` is assigned by the site and is
/// the only field guaranteed to be present; every extraction behind the
/// other fields can miss independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlxAd {
    pub ad_id: i64,
    pub url: String,
    pub publication_date: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    pub seller_name: Option<String>,
    pub seller_registration_date: Option<String>,
    pub seller_last_seen: Option<String>,
    pub phone_number: Option<String>,
    pub page_views: Option<i64>,
    pub city: Option<String>,
}

/// A link discovered on a listing page, alive for one crawl pass only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub href: String,
    pub ad_id: i64,
}

impl fmt::Display for OlxAd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(field: &Option<String>) -> &str {
            field.as_deref().unwrap_or("None")
        }

        writeln!(f, "Ad id           : {}", self.ad_id)?;
        writeln!(f, "Url             : {}", self.url)?;
        writeln!(f, "Title           : {}", opt(&self.title))?;
        writeln!(f, "Price           : {}", opt(&self.price))?;
        writeln!(f, "Published       : {}", opt(&self.publication_date))?;
        writeln!(f, "City            : {}", opt(&self.city))?;
        if let Some(views) = self.page_views {
            writeln!(f, "Page views      : {}", views)?;
        } else {
            writeln!(f, "Page views      : None")?;
        }
        if let Some(tags) = self.tags.as_ref() {
            writeln!(f, "Tags            : {}", tags.join(", "))?;
        } else {
            writeln!(f, "Tags            : None")?;
        }
        if let Some(images) = self.images.as_ref() {
            writeln!(f, "Images          : {}", images.join(", "))?;
        } else {
            writeln!(f, "Images          : None")?;
        }
        writeln!(f, "Seller          : {}", opt(&self.seller_name))?;
        writeln!(f, "Registered      : {}", opt(&self.seller_registration_date))?;
        writeln!(f, "Last seen       : {}", opt(&self.seller_last_seen))?;
        writeln!(f, "Phone           : {}", opt(&self.phone_number))?;
        writeln!(f, "Description     : {}", opt(&self.description))?;
        Ok(())
    }
}
