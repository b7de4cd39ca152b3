use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, SnapshotRow};
use crate::github::GitHubClient;

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub missing: usize,
}

/// Fetch README and repository info for each repo in order, saving a snapshot
/// per repo. Fetch failures are stored, never raised.
pub async fn fetch_all(
    conn: &Connection,
    client: &GitHubClient,
    repos: &[String],
) -> Result<FetchStats> {
    let total = repos.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut ok = 0usize;
    let mut missing = 0usize;

    for repo in repos {
        let row = fetch_one(client, repo).await;
        if row.readme.is_some() {
            ok += 1;
        } else {
            missing += 1;
        }
        db::save_snapshot(conn, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} repos ({} ok, {} without README)", total, ok, missing);

    Ok(FetchStats { total, ok, missing })
}

async fn fetch_one(client: &GitHubClient, repo: &str) -> SnapshotRow {
    let start = Instant::now();
    let readme = client.fetch_readme(repo).await;
    let latency_ms = start.elapsed().as_millis() as i64;

    match readme {
        Ok(text) => {
            let provenance = client.fetch_provenance(repo).await.unwrap_or_else(|e| {
                warn!("Error fetching repo info for {}: {}", repo, e);
                Default::default()
            });
            SnapshotRow {
                repo: repo.to_string(),
                readme: Some(text),
                provenance,
                error: None,
                latency_ms: Some(latency_ms),
            }
        }
        Err(e) => {
            warn!("Error fetching README for {}: {}", repo, e);
            SnapshotRow {
                repo: repo.to_string(),
                readme: None,
                provenance: Default::default(),
                error: Some(e.to_string()),
                latency_ms: Some(latency_ms),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::entry::ProvenanceFields;
    use crate::settings::Settings;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn failures_are_stored_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/me/a/readme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download_url": format!("{}/raw/a.md", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/a.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("readme a"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/me/a"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/me/gone/readme"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        // no README, so repo info is never requested
        Mock::given(method("GET"))
            .and(path("/repos/me/gone"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let settings = Settings {
            github_token: None,
            api_base: server.uri(),
            projects_list: PathBuf::from("projects-list.txt"),
            output_path: PathBuf::from("projects.json"),
            db_path: PathBuf::from(":memory:"),
            max_retries: 0,
            request_timeout_secs: 5,
            user_agent: "project_catalog/test".into(),
        };
        let client = GitHubClient::new(&settings).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let repos = vec!["me/a".to_string(), "me/gone".to_string()];
        let stats = fetch_all(&conn, &client, &repos).await.unwrap();
        assert_eq!((stats.total, stats.ok, stats.missing), (2, 1, 1));

        let a = db::latest_snapshot(&conn, "me/a").unwrap().unwrap();
        assert_eq!(a.readme.as_deref(), Some("readme a"));
        assert_eq!(a.provenance, ProvenanceFields::default());

        let gone = db::latest_snapshot(&conn, "me/gone").unwrap().unwrap();
        assert!(gone.readme.is_none());
    }
}
