mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn post_then_get_round_trips() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/jsonstore/todos", server.base_url))
        .json(&json!({ "text": "water the plants", "done": false }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let created = res.json::<Value>().await?;
    let id = created["_id"].as_str().unwrap();
    assert_eq!(created["text"], "water the plants");

    let res = client
        .get(format!("{}/jsonstore/todos/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched = res.json::<Value>().await?;
    assert_eq!(fetched, created);

    // nested field access by path tokens
    let res = client
        .get(format!("{}/jsonstore/todos/{}/text", server.base_url, id))
        .send()
        .await?;
    let text = res.json::<Value>().await?;
    assert_eq!(text, "water the plants");

    Ok(())
}

#[tokio::test]
async fn missing_node_is_no_content() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/jsonstore/ghosts/none", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn put_replaces_existing_nodes_only() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/jsonstore/settings", server.base_url))
        .json(&json!({ "theme": "dark" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .put(format!("{}/jsonstore/settings/{}", server.base_url, id))
        .json(&json!({ "theme": "light" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let fetched = client
        .get(format!("{}/jsonstore/settings/{}", server.base_url, id))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(fetched, json!({ "theme": "light" }));

    // replacing something that is not there does nothing
    let res = client
        .put(format!("{}/jsonstore/settings/absent", server.base_url))
        .json(&json!({ "theme": "light" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn patch_merges_into_a_node() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/jsonstore/profiles", server.base_url))
        .json(&json!({ "name": "Ada", "role": "pilot" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .patch(format!("{}/jsonstore/profiles/{}", server.base_url, id))
        .json(&json!({ "role": "commander" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let merged = res.json::<Value>().await?;
    assert_eq!(merged["name"], "Ada");
    assert_eq!(merged["role"], "commander");

    Ok(())
}

#[tokio::test]
async fn delete_returns_the_removed_value() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/jsonstore/scratch", server.base_url))
        .json(&json!({ "keep": false }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .delete(format!("{}/jsonstore/scratch/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let removed = res.json::<Value>().await?;
    assert_eq!(removed["keep"], false);

    let res = client
        .get(format!("{}/jsonstore/scratch/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // deleting a missing node answers a JSON null
    let res = client
        .delete(format!("{}/jsonstore/scratch/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert!(body.is_null());

    Ok(())
}

#[tokio::test]
async fn util_toggles_the_throttle_flag() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/util/throttle", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, Value::from(false));

    let res = client
        .post(format!("{}/util", server.base_url))
        .json(&json!({ "throttle": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/util/throttle", server.base_url))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?, Value::from(true));

    // switch it back off so other tests stay fast
    client
        .post(format!("{}/util", server.base_url))
        .json(&json!({ "throttle": false }))
        .send()
        .await?;

    Ok(())
}
