mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn create_requires_a_signed_in_user() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/data/celestialbodies", server.base_url))
        .json(&json!({ "title": "Pluto" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["code"], 401);

    // and nothing was created
    let res = client
        .get(format!("{}/data/celestialbodies", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn create_stamps_owner_and_system_fields() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, user_id) = common::register_user(&server.base_url, "owner@test.com").await?;

    let res = client
        .post(format!("{}/data/planets", server.base_url))
        .header("X-Authorization", &token)
        .json(&json!({ "title": "Pluto", "_id": "forged", "_createdOn": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let created = res.json::<Value>().await?;
    assert_eq!(created["title"], "Pluto");
    assert_eq!(created["_ownerId"], Value::from(user_id));
    assert_ne!(created["_id"], "forged");
    assert_ne!(created["_createdOn"], 1);

    // round trip
    let id = created["_id"].as_str().unwrap();
    let res = client
        .get(format!("{}/data/planets/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched = res.json::<Value>().await?;
    assert_eq!(fetched, created);

    Ok(())
}

#[tokio::test]
async fn put_replaces_but_keeps_system_fields() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, user_id) = common::register_user(&server.base_url, "replacer@test.com").await?;

    let created = client
        .post(format!("{}/data/moons", server.base_url))
        .header("X-Authorization", &token)
        .json(&json!({ "title": "Io", "temp": -163 }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .put(format!("{}/data/moons/{}", server.base_url, id))
        .header("X-Authorization", &token)
        .json(&json!({ "title": "Europa", "_ownerId": "intruder" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let replaced = res.json::<Value>().await?;
    assert_eq!(replaced["title"], "Europa");
    assert!(replaced.get("temp").is_none());
    assert_eq!(replaced["_ownerId"], Value::from(user_id));
    assert_eq!(replaced["_id"], created["_id"]);
    assert_eq!(replaced["_createdOn"], created["_createdOn"]);
    assert!(replaced.get("_updatedOn").is_some());

    Ok(())
}

#[tokio::test]
async fn patch_merges_fields() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _) = common::register_user(&server.base_url, "merger@test.com").await?;

    let created = client
        .post(format!("{}/data/asteroids", server.base_url))
        .header("X-Authorization", &token)
        .json(&json!({ "title": "Ceres", "size": 1 }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .patch(format!("{}/data/asteroids/{}", server.base_url, id))
        .header("X-Authorization", &token)
        .json(&json!({ "size": 2 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let merged = res.json::<Value>().await?;
    assert_eq!(merged["title"], "Ceres");
    assert_eq!(merged["size"], 2);

    Ok(())
}

#[tokio::test]
async fn only_the_owner_may_delete() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (owner_token, _) = common::register_user(&server.base_url, "keeper@test.com").await?;
    let (other_token, _) = common::register_user(&server.base_url, "thief@test.com").await?;

    let created = client
        .post(format!("{}/data/artifacts", server.base_url))
        .header("X-Authorization", &owner_token)
        .json(&json!({ "title": "Voyager" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .delete(format!("{}/data/artifacts/{}", server.base_url, id))
        .header("X-Authorization", &other_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(format!("{}/data/artifacts/{}", server.base_url, id))
        .header("X-Authorization", &owner_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert!(body["_deletedOn"].as_i64().is_some());

    // the record is gone
    let res = client
        .get(format!("{}/data/artifacts/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn admin_header_bypasses_ownership() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (owner_token, _) = common::register_user(&server.base_url, "admin-owner@test.com").await?;
    let (other_token, _) = common::register_user(&server.base_url, "admin-other@test.com").await?;

    let created = client
        .post(format!("{}/data/relics", server.base_url))
        .header("X-Authorization", &owner_token)
        .json(&json!({ "title": "Sputnik" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["_id"].as_str().unwrap();

    let res = client
        .delete(format!("{}/data/relics/{}", server.base_url, id))
        .header("X-Authorization", &other_token)
        .header("X-Admin", "1")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn nonexistent_collection_is_not_found() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/data/doesnotexist", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["code"], 404);

    Ok(())
}

#[tokio::test]
async fn data_root_lists_collection_names() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _) = common::register_user(&server.base_url, "lister@test.com").await?;

    client
        .post(format!("{}/data/comets", server.base_url))
        .header("X-Authorization", &token)
        .json(&json!({ "title": "Halley" }))
        .send()
        .await?;

    let res = client.get(format!("{}/data", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let names = res.json::<Vec<String>>().await?;
    assert!(names.contains(&"comets".to_string()));

    Ok(())
}

#[tokio::test]
async fn unknown_service_is_a_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/nosuchservice/xyz", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["code"], 400);
    assert_eq!(payload["message"], "Service \"nosuchservice\" is not supported");

    Ok(())
}

#[tokio::test]
async fn extra_path_tokens_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/data/a/b/c", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(format!("{}/data/a", server.base_url))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["message"], "Missing entry ID");

    Ok(())
}
