//! Integration tests for configuration driving the query service

use super::test_utils::memory_store;
use convoguard::config::{ConfigLoader, GuardConfig};
use convoguard::execute::QueryResult;
use convoguard::request::{EntityPath, OperationKind, RequestShape};
use convoguard::service::ConversationQueryService;
use tempfile::TempDir;

#[test]
fn test_page_size_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("convoguard.toml");
    std::fs::write(&config_file, "[query]\npage_size = 1\n").unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let service = ConversationQueryService::from_config(memory_store(), &config);
    assert_eq!(service.page_size(), 1);

    let shape = RequestShape::new(EntityPath::new("Conversations"), OperationKind::List);
    match service.handle(&shape, Some("bob")).unwrap().result {
        QueryResult::List { rows, next_skip } => {
            assert_eq!(rows.len(), 1);
            assert_eq!(next_skip, Some(1));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_zero_page_size_disables_paging() {
    let mut config = GuardConfig::default();
    config.query.page_size = 0;
    let service = ConversationQueryService::from_config(memory_store(), &config);
    let shape = RequestShape::new(EntityPath::new("Conversations"), OperationKind::List);
    match service.handle(&shape, Some("bob")).unwrap().result {
        QueryResult::List { rows, next_skip } => {
            assert_eq!(rows.len(), 2);
            assert_eq!(next_skip, None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_policy_section_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("convoguard.toml");
    std::fs::write(&config_file, "[policy]\nalias = \"M0\"\nparameter = \"member\"\n").unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.policy.alias, "M0");
    assert_eq!(config.policy.relation, "messageUsers");

    let service = ConversationQueryService::from_config(memory_store(), &config);
    let shape = RequestShape::new(EntityPath::new("Conversations"), OperationKind::List);
    let explain = service.explain(&shape, Some("alice")).unwrap();
    assert_eq!(
        explain.filtered.as_deref(),
        Some(
            "SELECT DISTINCT E1 FROM Conversation E1 JOIN E1.messageUsers M0 \
             WHERE M0.username = :member ORDER BY E1.conversationId"
        )
    );
    let response = service.handle(&shape, Some("alice")).unwrap();
    assert_eq!(response.result.keys().len(), 1);
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("convoguard.toml");
    std::fs::write(&config_file, "[policy]\nalias = \"R1\"\n").unwrap();
    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let err = config.validated().unwrap_err();
    assert!(err.to_string().contains("collides"));
}
