use crate::olx::OlxAd;
use crate::{utils, AdStorage, CrawlerError};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::debug;

const TABLE: &str = "olx_advertisements";

pub struct OlxAdsDb {
    pool: SqlitePool,
}

impl OlxAdsDb {
    pub async fn connect(path: &str) -> Result<OlxAdsDb, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let db = OlxAdsDb { pool };

        if !utils::is_table_exists(&db.pool, TABLE).await? {
            debug!("Create table {}", TABLE);
            db.create_table().await?;
        } else {
            debug!("Use table {}", TABLE);
        }
        Ok(db)
    }

    async fn create_table(&self) -> Result<(), CrawlerError> {
        let query = format!(
            r#"
                CREATE TABLE {} (
                    ad_id INTEGER PRIMARY KEY,
                    url TEXT,
                    publication_date TEXT,
                    title TEXT,
                    price TEXT,
                    tags TEXT,
                    images TEXT,
                    description TEXT,
                    seller_name TEXT,
                    seller_registration_date TEXT,
                    seller_last_seen TEXT,
                    phone_number TEXT,
                    page_views INTEGER,
                    city TEXT,
                    created_at DATETIME
                )
            "#,
            TABLE
        );
        sqlx::query(query.as_str()).execute(&self.pool).await?;
        Ok(())
    }

    /// Snapshot of the whole database into `dir`, named by creation time.
    pub async fn create_dump(&self, dir: &Path) -> Result<PathBuf, CrawlerError> {
        tokio::fs::create_dir_all(dir).await?;
        let file = dir.join(format!(
            "dump_{}.sqlite3",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        let target = file.to_string_lossy().replace('\'', "''");
        sqlx::query(&format!("VACUUM INTO '{}'", target))
            .execute(&self.pool)
            .await?;
        Ok(file)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl AdStorage for OlxAdsDb {
    async fn ad_exists(&self, ad_id: i64) -> Result<bool, CrawlerError> {
        let query = format!("SELECT ad_id FROM {} WHERE ad_id = ?", TABLE);
        Ok(sqlx::query(&query)
            .bind(ad_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some())
    }

    async fn save_ad(&self, ad: &OlxAd) -> Result<(), CrawlerError> {
        let query = format!(
            r#"INSERT OR IGNORE INTO {} (
                ad_id,
                url,
                publication_date,
                title,
                price,
                tags,
                images,
                description,
                seller_name,
                seller_registration_date,
                seller_last_seen,
                phone_number,
                page_views,
                city,
                created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            TABLE
        );
        sqlx::query(&query)
            .bind(ad.ad_id)
            .bind(ad.url.as_str())
            .bind(ad.publication_date.as_deref())
            .bind(ad.title.as_deref())
            .bind(ad.price.as_deref())
            .bind(ad.tags.as_ref().map(|tags| tags.join("|")))
            .bind(ad.images.as_ref().map(|images| images.join("|")))
            .bind(ad.description.as_deref())
            .bind(ad.seller_name.as_deref())
            .bind(ad.seller_registration_date.as_deref())
            .bind(ad.seller_last_seen.as_deref())
            .bind(ad.phone_number.as_deref())
            .bind(ad.page_views)
            .bind(ad.city.as_deref())
            .bind(utils::get_now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlx::Row;
    use std::path::Path;
    use tokio::fs;

    fn sample_ad(ad_id: i64) -> OlxAd {
        OlxAd {
            ad_id,
            url: format!("https://www.olx.ua/d/uk/o/{ad_id}"),
            publication_date: Some("Опубліковано сьогодні".to_string()),
            title: Some("Велосипед".to_string()),
            price: Some("3 200 грн.".to_string()),
            tags: Some(vec!["Приватна особа".to_string(), "Стан: Вживане".to_string()]),
            images: None,
            description: Some("Майже новий".to_string()),
            seller_name: Some("Ігор".to_string()),
            seller_registration_date: Some("на OLX з 2017 р.".to_string()),
            seller_last_seen: None,
            phone_number: None,
            page_views: Some(12),
            city: Some("Одеса".to_string()),
        }
    }

    #[tokio::test]
    async fn create_new_file() {
        if Path::new("test_ads1.db").is_file() {
            fs::remove_file("test_ads1.db").await.unwrap();
        }

        assert!(!Path::new("test_ads1.db").is_file());
        OlxAdsDb::connect("test_ads1.db").await.unwrap();
        assert!(Path::new("test_ads1.db").is_file());

        fs::remove_file("test_ads1.db").await.unwrap();
    }

    #[tokio::test]
    async fn exists_after_save() {
        if Path::new("test_ads2.db").is_file() {
            fs::remove_file("test_ads2.db").await.unwrap();
        }
        let db = OlxAdsDb::connect("test_ads2.db").await.unwrap();

        assert!(!db.ad_exists(815).await.unwrap());
        db.save_ad(&sample_ad(815)).await.unwrap();
        assert!(db.ad_exists(815).await.unwrap());
        assert!(!db.ad_exists(816).await.unwrap());

        fs::remove_file("test_ads2.db").await.unwrap();
    }

    #[tokio::test]
    async fn saving_twice_keeps_first_values() {
        if Path::new("test_ads3.db").is_file() {
            fs::remove_file("test_ads3.db").await.unwrap();
        }
        let db = OlxAdsDb::connect("test_ads3.db").await.unwrap();

        db.save_ad(&sample_ad(77)).await.unwrap();
        let mut changed = sample_ad(77);
        changed.title = Some("Інша назва".to_string());
        changed.price = None;
        db.save_ad(&changed).await.unwrap();

        let rows = sqlx::query(&format!("SELECT title, price FROM {}", TABLE))
            .fetch_all(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].try_get::<String, _>("title").unwrap(), "Велосипед");
        assert_eq!(rows[0].try_get::<String, _>("price").unwrap(), "3 200 грн.");

        fs::remove_file("test_ads3.db").await.unwrap();
    }

    #[tokio::test]
    async fn dump_creates_snapshot_file() {
        if Path::new("test_ads4.db").is_file() {
            fs::remove_file("test_ads4.db").await.unwrap();
        }
        let db = OlxAdsDb::connect("test_ads4.db").await.unwrap();
        db.save_ad(&sample_ad(5)).await.unwrap();

        let dump = db.create_dump(Path::new("test_dumps")).await.unwrap();
        assert!(dump.is_file());

        fs::remove_dir_all("test_dumps").await.unwrap();
        fs::remove_file("test_ads4.db").await.unwrap();
    }
}
