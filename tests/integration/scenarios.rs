//! End-to-end scenarios through the query service

use super::test_utils::{memory_store, RecordingExecutor};
use convoguard::error::{ApiError, ClassificationError};
use convoguard::execute::{QueryResult, StoreExecutor};
use convoguard::identity::Principal;
use convoguard::model::{EntityModel, Value};
use convoguard::query::{
    classify_request, BaseQueryBuilder, ContextKind, FieldRef, MembershipPolicy,
    ModelQueryGenerator, Predicate, SecurityPredicateInjector,
};
use convoguard::request::{
    EntityPath, MutationKind, NavigationSegment, OperationKind, RequestShape,
};
use convoguard::service::{ConversationQueryService, QueryResponse};
use convoguard::store::ConversationStore;
use std::sync::Arc;

fn service_with_recorder() -> (
    ConversationQueryService,
    Arc<RecordingExecutor<StoreExecutor>>,
) {
    let store = memory_store();
    let recorder = Arc::new(RecordingExecutor::new(StoreExecutor::new(
        store.clone(),
        EntityModel::conversations(),
    )));
    let service = ConversationQueryService::new(store, MembershipPolicy::default(), 50)
        .with_executor(recorder.clone());
    (service, recorder)
}

fn conversations(op: OperationKind) -> RequestShape {
    RequestShape::new(EntityPath::new("Conversations"), op)
}

/// Scenario A: alice lists conversations and only sees C1
#[test]
fn test_member_sees_only_own_conversations() {
    let (service, _) = service_with_recorder();
    let response = service
        .handle(&conversations(OperationKind::List), Some("alice"))
        .unwrap();
    assert_eq!(response.context_kind, ContextKind::Select);
    assert_eq!(response.result.keys(), vec![Value::from("C1")]);
}

/// Scenario B: no principal yields empty results and nothing reaches the store
#[test]
fn test_missing_identity_returns_empty_and_never_executes() {
    let (service, recorder) = service_with_recorder();
    for op in [OperationKind::List, OperationKind::Count] {
        let shape = conversations(op);
        let kind = classify_request(&shape).unwrap();
        assert_eq!(
            service.handle(&shape, None).unwrap(),
            QueryResponse::empty_for(kind)
        );
    }
    let single = RequestShape::new(EntityPath::keyed("Conversations", "C1"), OperationKind::Single);
    assert_eq!(
        service.handle(&single, Some("mallory")).unwrap().result,
        QueryResult::Single(None)
    );
    assert!(recorder.seen().is_empty());
}

/// Every query the executor receives carries the membership join and predicate
#[test]
fn test_executor_only_sees_filtered_queries() {
    let (service, recorder) = service_with_recorder();
    let shapes = vec![
        conversations(OperationKind::List),
        conversations(OperationKind::Count),
        RequestShape::new(EntityPath::keyed("Conversations", "C1"), OperationKind::Single),
        RequestShape::new(EntityPath::keyed("Users", "bob"), OperationKind::List)
            .navigate(NavigationSegment::new("conversations")),
    ];
    for shape in &shapes {
        service.handle(shape, Some("bob")).unwrap();
    }

    let seen = recorder.seen();
    assert_eq!(seen.len(), shapes.len());
    let membership = Predicate::eq_param(FieldRef::new("E0", "username"), "username");
    for (query, _) in seen {
        let q = query.query();
        assert!(q.distinct);
        let joins: Vec<_> = q
            .joins
            .iter()
            .filter(|j| j.relation == "messageUsers")
            .collect();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].source, q.selection.alias);
        match q.where_predicate.as_ref().unwrap() {
            Predicate::And(left, _) => assert_eq!(left.as_ref(), &membership),
            other => assert_eq!(other, &membership),
        }
        assert_eq!(
            query.bindings().get("username"),
            Some(&Value::from("bob"))
        );
    }
}

/// Scenario C: navigation count is the number of distinct conversations
#[test]
fn test_join_count_counts_distinct_conversations() {
    let (service, _) = service_with_recorder();
    let shape = RequestShape::new(EntityPath::keyed("Users", "bob"), OperationKind::Count)
        .navigate(NavigationSegment::new("conversations"));
    let response = service.handle(&shape, Some("bob")).unwrap();
    assert_eq!(response.context_kind, ContextKind::JoinCount);
    assert_eq!(response.result, QueryResult::Count(2));

    // alice only shares C1 with bob
    let response = service.handle(&shape, Some("alice")).unwrap();
    assert_eq!(response.result, QueryResult::Count(1));
}

/// Scenario C over a real fan-out: C1 is reached once per message
#[test]
fn test_count_through_messages_collapses_repeated_conversations() {
    let (service, recorder) = service_with_recorder();
    let via_messages = |operation| {
        RequestShape::new(EntityPath::new("Conversations"), operation)
            .navigate(NavigationSegment::new("messages"))
            .navigate(NavigationSegment::new("conversation"))
    };

    let response = service
        .handle(&via_messages(OperationKind::Count), Some("alice"))
        .unwrap();
    assert_eq!(response.context_kind, ContextKind::JoinCount);
    assert_eq!(response.result, QueryResult::Count(1));

    let response = service
        .handle(&via_messages(OperationKind::List), Some("bob"))
        .unwrap();
    assert_eq!(response.result.keys(), vec![Value::from("C1")]);

    let (query, _) = recorder.seen().pop().unwrap();
    assert!(query.query().distinct);
    assert!(query.to_string().contains("JOIN R2.messageUsers E0"));
}

/// Scenario D: delete requests are rejected before any query exists
#[test]
fn test_delete_is_rejected() {
    let (service, recorder) = service_with_recorder();
    let shape = RequestShape::new(EntityPath::keyed("Conversations", "C1"), OperationKind::Single)
        .with_mutation(MutationKind::Delete);
    match service.handle(&shape, Some("alice")) {
        Err(ApiError::Classification(ClassificationError::UnsupportedMutation(_))) => {}
        other => panic!("expected classification error, got {:?}", other),
    }
    assert!(recorder.seen().is_empty());
}

/// Scenario E: membership predicate first, client predicate second
#[test]
fn test_existing_predicate_order_is_fixed() {
    let shape = conversations(OperationKind::List)
        .with_filter(Predicate::eq_value(FieldRef::unqualified("status"), "active"));
    let kind = classify_request(&shape).unwrap();
    let base = BaseQueryBuilder::new(ModelQueryGenerator::default())
        .build(&shape, kind, 50)
        .unwrap();
    let status = base.where_predicate.clone().unwrap();

    let filtered = SecurityPredicateInjector::default()
        .inject(base, Some(&Principal::new("alice").unwrap()))
        .unwrap();
    let expected = Predicate::and(
        Predicate::eq_param(FieldRef::new("E0", "username"), "username"),
        status,
    );
    assert_eq!(filtered.query().where_predicate, Some(expected));
    assert_eq!(
        filtered.query().where_predicate.as_ref().unwrap().to_string(),
        "E0.username = :username AND E1.status = 'active'"
    );
}

#[test]
fn test_single_without_access_is_indistinguishable_from_missing() {
    let (service, _) = service_with_recorder();
    let hidden = RequestShape::new(EntityPath::keyed("Conversations", "C2"), OperationKind::Single);
    let missing =
        RequestShape::new(EntityPath::keyed("Conversations", "C404"), OperationKind::Single);
    let a = service.handle(&hidden, Some("alice")).unwrap();
    let b = service.handle(&missing, Some("alice")).unwrap();
    assert_eq!(a.result, QueryResult::Single(None));
    assert_eq!(a.result, b.result);
}

#[test]
fn test_filter_and_order_apply_within_memberships() {
    let (service, _) = service_with_recorder();
    let shape = conversations(OperationKind::List)
        .order_by(convoguard::query::OrderTerm::desc(FieldRef::unqualified("title")));
    let response = service.handle(&shape, Some("bob")).unwrap();
    assert_eq!(
        response.result.keys(),
        vec![Value::from("C3"), Value::from("C1")]
    );

    let shape = conversations(OperationKind::List)
        .with_filter(Predicate::eq_value(FieldRef::unqualified("status"), "active"));
    let response = service.handle(&shape, Some("bob")).unwrap();
    assert_eq!(response.result.keys(), vec![Value::from("C1")]);
}

#[test]
fn test_server_paging_for_lists() {
    let store = memory_store();
    let service = ConversationQueryService::new(store, MembershipPolicy::default(), 1);
    let response = service
        .handle(&conversations(OperationKind::List), Some("bob"))
        .unwrap();
    match response.result {
        QueryResult::List { rows, next_skip } => {
            assert_eq!(rows.len(), 1);
            assert_eq!(next_skip, Some(1));
        }
        other => panic!("unexpected {:?}", other),
    }

    // Counts are never paged
    let response = service
        .handle(&conversations(OperationKind::Count), Some("bob"))
        .unwrap();
    assert_eq!(response.result, QueryResult::Count(2));
}

#[test]
fn test_unprotected_entity_is_refused() {
    let (service, recorder) = service_with_recorder();
    let shape = RequestShape::new(EntityPath::new("Messages"), OperationKind::List);
    assert!(matches!(
        service.handle(&shape, Some("alice")),
        Err(ApiError::Injection(_))
    ));
    assert!(recorder.seen().is_empty());
}

#[test]
fn test_navigation_through_membership_relation_is_refused() {
    let (service, _) = service_with_recorder();
    // Selecting MessageUser through messageUsers is not a Conversation read
    let shape = RequestShape::new(EntityPath::keyed("Conversations", "C1"), OperationKind::List)
        .navigate(NavigationSegment::new("messageUsers"));
    assert!(service.handle(&shape, Some("alice")).is_err());
}

#[test]
fn test_store_is_shared_with_resolver() {
    let store = memory_store();
    store
        .put(convoguard::store::EntityRecord::new("MessageUser", "dave"))
        .unwrap();
    let service = ConversationQueryService::new(store, MembershipPolicy::default(), 50);
    // dave exists but belongs to nothing
    let response = service
        .handle(&conversations(OperationKind::Count), Some("dave"))
        .unwrap();
    assert_eq!(response.result, QueryResult::Count(0));
    assert!(response.fingerprint.is_some());
}
