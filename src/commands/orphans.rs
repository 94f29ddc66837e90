//! Orphans command implementation

use crate::error::Result;
use crate::store::SqliteStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanPage {
    pub url: String,
    pub title: String,
    pub depth: i64,
}

/// Crawled pages of a site that no other page links to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanReport {
    pub site_id: String,
    pub orphans: Vec<OrphanPage>,
}

pub async fn cmd_orphans(store: &SqliteStore, site_id: &str) -> Result<OrphanReport> {
    store.require_site(site_id).await?;

    let orphans = store
        .list_orphans(site_id)
        .await?
        .into_iter()
        .map(|page| OrphanPage {
            url: page.url,
            title: page.title,
            depth: page.depth,
        })
        .collect();

    Ok(OrphanReport {
        site_id: site_id.to_string(),
        orphans,
    })
}

pub fn print_orphans(report: &OrphanReport) {
    println!("\n🔗 Orphan pages of '{}'\n", report.site_id);

    if report.orphans.is_empty() {
        println!("No orphan pages.");
        return;
    }

    for page in &report.orphans {
        if page.title.is_empty() {
            println!("• {}", page.url);
        } else {
            println!("• {} ({})", page.url, page.title);
        }
    }
    println!("\n{} orphan pages", report.orphans.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parse::ExtractedPage;
    use crate::store::{GraphStore, LinkRecord, PageRecord, Site};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_orphans_lists_unlinked_pages() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("orphans.db");
        let store = SqliteStore::connect(&config).await.unwrap();
        store.init_schema().await.unwrap();
        store
            .upsert_site(&Site::new("x", "https://x.test/"))
            .await
            .unwrap();

        for url in ["https://x.test/", "https://x.test/linked", "https://x.test/lonely"] {
            let page = ExtractedPage::default();
            store
                .upsert_page(&PageRecord::crawled("x", url, 0, 200, &page))
                .await
                .unwrap();
        }
        let link = LinkRecord {
            from_url: "https://x.test/".to_string(),
            to_url: "https://x.test/linked".to_string(),
            anchor_text: "Linked".to_string(),
        };
        store.upsert_link("x", &link).await.unwrap();
        store.refresh_orphans("x").await.unwrap();

        let report = cmd_orphans(&store, "x").await.unwrap();
        let urls: Vec<&str> = report.orphans.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.test/", "https://x.test/lonely"]);
    }
}
