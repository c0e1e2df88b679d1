//! Property-based tests for rewrite invariants

use convoguard::error::InjectionError;
use convoguard::execute::{QueryExecutionAdapter, QueryResult, StoreExecutor};
use convoguard::identity::Principal;
use convoguard::model::{EntityModel, Value, CONVERSATION, MESSAGE, MESSAGE_USER};
use convoguard::query::{
    classify, ContextKind, FieldRef, GeneratedQuery, Join, OrderTerm, PagingHint, Predicate, SelectKind,
    SecurityPredicateInjector,
};
use convoguard::request::{MutationKind, OperationKind};
use convoguard::store::{link_records, ConversationStore, EntityRecord, MemoryStore};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn membership() -> Predicate {
    Predicate::eq_param(FieldRef::new("E0", "username"), "username")
}

fn field_strategy() -> impl Strategy<Value = FieldRef> {
    prop_oneof![
        Just("conversationId"),
        Just("title"),
        Just("status"),
    ]
    .prop_map(|f| FieldRef::new("E1", f))
}

fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    let leaf = (field_strategy(), "[a-z]{0,6}")
        .prop_map(|(field, value)| Predicate::eq_value(field, value.as_str()));
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Predicate::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Predicate::or(l, r)),
            inner.prop_map(Predicate::not),
        ]
    })
}

fn order_strategy() -> impl Strategy<Value = Option<Vec<OrderTerm>>> {
    proptest::option::of(proptest::collection::vec(
        (field_strategy(), any::<bool>()).prop_map(|(field, desc)| {
            if desc {
                OrderTerm::desc(field)
            } else {
                OrderTerm::asc(field)
            }
        }),
        0..4,
    ))
}

prop_compose! {
    fn base_strategy()(
        predicate in proptest::option::of(predicate_strategy()),
        order_by in order_strategy(),
        paging in proptest::option::of(1usize..200),
        top in proptest::option::of(0usize..20),
        skip in proptest::option::of(0usize..20),
        extra_join in any::<bool>(),
    ) -> GeneratedQuery {
        let mut q = GeneratedQuery::select(CONVERSATION, "E1");
        q.where_predicate = predicate;
        q.order_by = order_by;
        q.paging = paging.map(|page_size| PagingHint { page_size });
        q.top = top;
        q.skip = skip;
        if extra_join {
            q.joins.push(Join::new("E1", "messages", "R1"));
        }
        q
    }
}

proptest! {
    #[test]
    fn prop_rewrite_wraps_predicate_and_keeps_everything_else(base in base_strategy()) {
        let before = base.clone();
        let filtered = SecurityPredicateInjector::default()
            .inject(base, Some(&Principal::new("alice").unwrap()))
            .unwrap();
        let after = filtered.query();

        let expected = match before.where_predicate.clone() {
            Some(p) => Predicate::and(membership(), p),
            None => membership(),
        };
        prop_assert_eq!(after.where_predicate.clone(), Some(expected));
        prop_assert!(after.distinct);
        prop_assert_eq!(&after.order_by, &before.order_by);
        prop_assert_eq!(after.paging, before.paging);
        prop_assert_eq!(after.top, before.top);
        prop_assert_eq!(after.skip, before.skip);
        prop_assert_eq!(&after.selection, &before.selection);

        // Existing joins are a prefix; exactly one membership join is appended
        prop_assert_eq!(&after.joins[..before.joins.len()], &before.joins[..]);
        prop_assert_eq!(after.joins.len(), before.joins.len() + 1);
        prop_assert_eq!(
            after.joins.last().cloned(),
            Some(Join::new("E1", "messageUsers", "E0"))
        );
        prop_assert!(after.check_structure().is_ok());
    }

    #[test]
    fn prop_missing_principal_never_yields_query(base in base_strategy()) {
        let result = SecurityPredicateInjector::default().inject(base, None);
        prop_assert_eq!(result, Err(InjectionError::NoIdentity));
    }

    #[test]
    fn prop_second_rewrite_is_rejected(base in base_strategy()) {
        let injector = SecurityPredicateInjector::default();
        let principal = Principal::new("bob").unwrap();
        let once = injector.inject(base, Some(&principal)).unwrap();
        let twice = injector.inject(once.query().clone(), Some(&principal));
        let rejected = matches!(twice, Err(InjectionError::AlreadyFiltered { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn prop_classifier_rejects_every_mutation(
        navigation in any::<bool>(),
        op in prop_oneof![
            Just(OperationKind::List),
            Just(OperationKind::Single),
            Just(OperationKind::Count),
        ],
        mutation in prop_oneof![Just(MutationKind::Delete), Just(MutationKind::Update)],
    ) {
        prop_assert!(classify(navigation, op, mutation).is_err());
        let kind = classify(navigation, op, MutationKind::None).unwrap();
        prop_assert_eq!(kind.is_navigation(), navigation);
        prop_assert_eq!(kind.operation(), op);
    }
}

/// Conversations reached again through their own messages: `E1.messages R1`,
/// `R1.conversation R2`, selecting `R2`
fn via_messages(kind: SelectKind) -> GeneratedQuery {
    let mut q = GeneratedQuery::select(CONVERSATION, "E1");
    q.joins.push(Join::new("E1", "messages", "R1"));
    q.joins.push(Join::new("R1", "conversation", "R2"));
    q.selection.alias = "R2".to_string();
    q.selection.kind = kind;
    q
}

/// Random membership graphs with random message counts: the filtered list
/// equals the principal's memberships and the count equals their number,
/// never the fan-out row count.
#[test]
fn test_filtered_results_match_membership_graph() {
    let users = ["u0", "u1", "u2", "u3"];
    let strategy = proptest::collection::vec(
        (proptest::collection::btree_set(0usize..4, 0..4), 0usize..4),
        1..12,
    );
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&strategy, |conversations| {
            let store = Arc::new(MemoryStore::new());
            for user in users {
                store.put(EntityRecord::new(MESSAGE_USER, user)).unwrap();
            }
            let mut next_message = 0i64;
            for (i, (members, messages)) in conversations.iter().enumerate() {
                let key = Value::from(format!("c{:02}", i));
                store.put(EntityRecord::new(CONVERSATION, key.clone())).unwrap();
                for m in members {
                    link_records(
                        store.as_ref(),
                        (CONVERSATION, &key),
                        "messageUsers",
                        (MESSAGE_USER, &Value::from(users[*m])),
                        "conversations",
                    )
                    .unwrap();
                }
                for _ in 0..*messages {
                    next_message += 1;
                    let message = Value::Int(next_message);
                    store.put(EntityRecord::new(MESSAGE, message.clone())).unwrap();
                    link_records(
                        store.as_ref(),
                        (MESSAGE, &message),
                        "conversation",
                        (CONVERSATION, &key),
                        "messages",
                    )
                    .unwrap();
                }
            }
            let executor = StoreExecutor::new(store, EntityModel::conversations());
            let injector = SecurityPredicateInjector::default();

            for (u, user) in users.iter().enumerate() {
                let member_of = |with_messages: bool| -> BTreeSet<Value> {
                    conversations
                        .iter()
                        .enumerate()
                        .filter(|(_, (members, messages))| {
                            members.contains(&u) && (!with_messages || *messages > 0)
                        })
                        .map(|(i, _)| Value::from(format!("c{:02}", i)))
                        .collect()
                };
                let expected = member_of(false);
                let principal = Principal::new(*user).unwrap();

                let list = injector
                    .inject(GeneratedQuery::select(CONVERSATION, "E1"), Some(&principal))
                    .unwrap();
                let keys: Vec<Value> = executor
                    .execute(&list, ContextKind::Select)
                    .unwrap()
                    .keys();
                prop_assert_eq!(keys.len(), expected.len());
                prop_assert_eq!(keys.into_iter().collect::<BTreeSet<_>>(), expected.clone());

                let mut count_base = GeneratedQuery::select(CONVERSATION, "E1");
                count_base.selection.kind = SelectKind::Count;
                let count = injector.inject(count_base, Some(&principal)).unwrap();
                prop_assert_eq!(
                    executor.execute(&count, ContextKind::SelectCount).unwrap(),
                    QueryResult::Count(expected.len() as u64)
                );

                // One joined row per message; each conversation still counts once
                let expected = member_of(true);
                let list = injector
                    .inject(via_messages(SelectKind::Entities), Some(&principal))
                    .unwrap();
                let keys: Vec<Value> = executor.execute(&list, ContextKind::Join).unwrap().keys();
                prop_assert_eq!(keys.len(), expected.len());
                prop_assert_eq!(keys.into_iter().collect::<BTreeSet<_>>(), expected.clone());

                let count = injector
                    .inject(via_messages(SelectKind::Count), Some(&principal))
                    .unwrap();
                prop_assert_eq!(
                    executor.execute(&count, ContextKind::JoinCount).unwrap(),
                    QueryResult::Count(expected.len() as u64)
                );
            }
            Ok(())
        })
        .unwrap();
}
