use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use nebula_api_rust::auth::Auth;

// This suite runs against a server seeded from disk: two collections, a
// known user and a rules.json exercising collection rules, field redaction
// and per-record overrides.

static SERVER: OnceLock<SeededServer> = OnceLock::new();

struct SeededServer {
    base_url: String,
    #[allow(dead_code)]
    child: Child,
}

fn write_seed_dir() -> Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("nebula-rules-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    // password is "123456", hashed with the server's default secret
    let auth = Auth::new("email", "This is not a production server");
    let users = json!({
        "u-peter": { "email": "peter@abv.bg", "hashedPassword": auth.hash("123456") }
    });
    std::fs::write(dir.join("users.json"), serde_json::to_string(&users)?)?;

    let planets = json!({
        "p-mars": { "_ownerId": "u-peter", "title": "Mars", "secret": "classified note" },
        "p-venus": { "_ownerId": "u-peter", "title": "Venus", "secret": "another note" }
    });
    std::fs::write(dir.join("planets.json"), serde_json::to_string(&planets)?)?;

    let archives = json!({
        "a-open": { "title": "Public record" },
        "a-sealed": { "title": "Sealed record" }
    });
    std::fs::write(dir.join("archives.json"), serde_json::to_string(&archives)?)?;

    let rules = json!({
        "planets": {
            "*": { "secret": { ".read": false } }
        },
        "archives": {
            ".read": false,
            "a-open": { ".read": ["Guest"] }
        }
    });
    std::fs::write(dir.join("rules.json"), serde_json::to_string(&rules)?)?;

    Ok(dir)
}

fn spawn() -> Result<SeededServer> {
    let seed_dir = write_seed_dir()?;
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nebula-api-rust"));
    cmd.env("NEBULA_PORT", port.to_string())
        .env("NEBULA_SEED_DIR", &seed_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let child = cmd.spawn().context("failed to spawn server binary")?;
    Ok(SeededServer { base_url, child })
}

async fn ensure_server() -> Result<&'static SeededServer> {
    let server = SERVER.get_or_init(|| spawn().expect("failed to spawn seeded server"));
    let client = reqwest::Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if Instant::now() > deadline {
            anyhow::bail!("seeded server did not become ready");
        }
        if let Ok(resp) = client.get(format!("{}/", server.base_url)).send().await {
            if resp.status().is_success() {
                return Ok(server);
            }
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

#[tokio::test]
async fn seeded_user_can_log_in() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/users/login", server.base_url))
        .json(&json!({ "email": "peter@abv.bg", "password": "123456" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["_id"], "u-peter");
    assert!(body["accessToken"].as_str().is_some());

    Ok(())
}

#[tokio::test]
async fn denied_fields_never_reach_the_response() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    // single record
    let res = client
        .get(format!("{}/data/planets/p-mars", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let record = res.json::<Value>().await?;
    assert_eq!(record["title"], "Mars");
    assert!(record.get("secret").is_none());

    // and list elements
    let res = client
        .get(format!("{}/data/planets", server.base_url))
        .send()
        .await?;
    let records = res.json::<Vec<Value>>().await?;
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.get("secret").is_none());
    }

    Ok(())
}

#[tokio::test]
async fn collection_read_denial_is_forbidden_not_empty() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/data/archives", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["code"], 403);

    Ok(())
}

#[tokio::test]
async fn record_override_opens_a_single_record() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/data/archives/a-open", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/data/archives/a-sealed", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn admin_header_reads_denied_collections() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/data/archives", server.base_url))
        .header("X-Admin", "1")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let records = res.json::<Vec<Value>>().await?;
    assert_eq!(records.len(), 2);

    Ok(())
}

#[tokio::test]
async fn owner_updates_seeded_record() -> Result<()> {
    let server = ensure_server().await?;
    let client = reqwest::Client::new();

    let login = client
        .post(format!("{}/users/login", server.base_url))
        .json(&json!({ "email": "peter@abv.bg", "password": "123456" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let token = login["accessToken"].as_str().unwrap();

    let res = client
        .patch(format!("{}/data/planets/p-venus", server.base_url))
        .header("X-Authorization", token)
        .json(&json!({ "title": "Venus (updated)" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["title"], "Venus (updated)");
    assert_eq!(updated["_ownerId"], "u-peter");

    Ok(())
}
