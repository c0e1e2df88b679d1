//! Integration tests for the sled-backed store behind the query service

use super::test_utils::seed;
use convoguard::execute::QueryResult;
use convoguard::model::{Value, CONVERSATION, MESSAGE, MESSAGE_USER};
use convoguard::query::MembershipPolicy;
use convoguard::request::{EntityPath, NavigationSegment, OperationKind, RequestShape};
use convoguard::service::ConversationQueryService;
use convoguard::store::{ConversationStore, SledStore};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_seeded_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = SledStore::new(temp_dir.path()).unwrap();
        seed(&store);
        store.flush().unwrap();
    }

    let store = SledStore::new(temp_dir.path()).unwrap();
    assert_eq!(store.scan(MESSAGE_USER).unwrap().len(), 3);
    let c1 = store.get(CONVERSATION, &Value::from("C1")).unwrap().unwrap();
    assert_eq!(
        c1.linked("messageUsers"),
        &[Value::from("alice"), Value::from("bob")]
    );
    let message = store.get(MESSAGE, &Value::Int(1)).unwrap().unwrap();
    assert_eq!(message.linked("conversation"), &[Value::from("C1")]);
}

#[test]
fn test_service_over_sled_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SledStore::new(temp_dir.path()).unwrap());
    seed(store.as_ref());
    let service = ConversationQueryService::new(store, MembershipPolicy::default(), 50);

    let shape = RequestShape::new(EntityPath::new("Conversations"), OperationKind::List);
    let response = service.handle(&shape, Some("carol")).unwrap();
    assert_eq!(response.result.keys(), vec![Value::from("C2")]);

    let shape = RequestShape::new(EntityPath::keyed("Users", "bob"), OperationKind::Single)
        .navigate(NavigationSegment::keyed("conversations", "C3"));
    let response = service.handle(&shape, Some("bob")).unwrap();
    match response.result {
        QueryResult::Single(Some(record)) => {
            assert_eq!(record.fields.get("status"), Some(&Value::from("archived")));
        }
        other => panic!("unexpected {:?}", other),
    }
}
