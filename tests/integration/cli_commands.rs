//! Integration tests for the CLI route table

use super::test_utils::FIXTURE;
use convoguard::cli::{Commands, RequestArgs, RunContext};
use tempfile::TempDir;

fn context(temp: &TempDir) -> RunContext {
    let fixture = temp.path().join("seed.toml");
    std::fs::write(&fixture, FIXTURE).unwrap();
    let ctx = RunContext::new(
        temp.path().to_path_buf(),
        None,
        Some(temp.path().join("store")),
    )
    .unwrap();
    ctx.execute(&Commands::Seed {
        fixture: Some(fixture),
    })
    .unwrap();
    ctx
}

fn request(path: &str, user: Option<&str>) -> RequestArgs {
    RequestArgs {
        path: path.to_string(),
        user: user.map(str::to_string),
        filters: vec![],
        order_by: vec![],
        top: None,
        skip: None,
        method: "get".to_string(),
    }
}

#[test]
fn test_query_json_output() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let out = ctx
        .execute(&Commands::Query {
            request: request("Conversations", Some("bob")),
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["context"], "SELECT");
    let keys: Vec<&str> = parsed["value"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["C1", "C3"]);
}

#[test]
fn test_anonymous_count_is_zero() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let out = ctx
        .execute(&Commands::Query {
            request: request("Users('bob')/conversations/$count", None),
            format: "text".to_string(),
        })
        .unwrap();
    assert_eq!(out, "0");
}

#[test]
fn test_explain_text() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let mut args = request("Conversations", Some("alice"));
    args.filters = vec!["status=active".to_string()];
    let out = ctx
        .execute(&Commands::Explain {
            request: args,
            format: "text".to_string(),
        })
        .unwrap();
    assert!(out.contains("Principal:   alice"));
    assert!(out.contains(
        "WHERE E0.username = :username AND E1.status = 'active' ORDER BY E1.conversationId"
    ));
}

#[test]
fn test_users_listing() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let out = ctx
        .execute(&Commands::Users {
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["total"], 3);
    assert_eq!(parsed["users"][1]["username"], "bob");
    assert_eq!(parsed["users"][1]["conversations"][1], "C3");
}

#[test]
fn test_delete_method_is_rejected() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let mut args = request("Conversations('C1')", Some("alice"));
    args.method = "delete".to_string();
    let err = ctx
        .execute(&Commands::Query {
            request: args,
            format: "text".to_string(),
        })
        .unwrap_err();
    assert!(convoguard::cli::map_error(&err).starts_with("error[unsupported]"));
}
