//! Property-based tests for the remote record codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary JSON bodies never panic `decode_document`.
//! 2. Arbitrary bytes never panic `decode_snapshot`.
//! 3. Any well-formed document decodes to the values it was built from.
//! 4. Dropping a required field always rejects the record; dropping an
//!    optional one never does.
//! 5. Category names outside the closed set are rejected.

use chrono::{DateTime, TimeZone, Utc};
use doitnow_proto::codec::{self, CodecError};
use doitnow_proto::task::{Category, OwnerId, Priority, RemoteDocument, TaskDocument, TaskId};
use proptest::prelude::*;
use serde_json::Value;

// --- Strategies ---

/// Strategy for arbitrary JSON values, nested a few levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 :.-]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z]{1,10}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for instants between 2000 and 2100, at millisecond precision.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800_000_i64..4_102_444_800_000_i64)
        .prop_map(|ms| Utc.timestamp_millis_opt(ms).single().unwrap_or_default())
}

fn arb_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

/// Strategy for well-formed task documents.
fn arb_document() -> impl Strategy<Value = TaskDocument> {
    (
        "[a-z0-9]{1,16}",
        "[^\x00]{1,20}",
        arb_category(),
        arb_priority(),
        arb_instant(),
        prop::option::of(arb_instant()),
        "[^\x00]{0,64}",
        arb_instant(),
    )
        .prop_map(
            |(owner, title, category, priority, due, completed_at, description, created_at)| {
                TaskDocument {
                    owner_id: OwnerId::new(owner),
                    title,
                    category,
                    priority,
                    due_date: due.to_rfc3339(),
                    completed_at,
                    description,
                    created_at,
                }
            },
        )
}

fn remote(data: Value) -> RemoteDocument {
    RemoteDocument {
        id: TaskId::new("doc-1"),
        data,
    }
}

const REQUIRED_FIELDS: [&str; 6] = [
    "ownerId",
    "title",
    "category",
    "priority",
    "dueDate",
    "createdAt",
];

// --- Properties ---

proptest! {
    #[test]
    fn arbitrary_json_never_panics(data in arb_json()) {
        let _ = codec::decode_document(&remote(data));
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_snapshot(&bytes);
    }

    #[test]
    fn well_formed_documents_decode(doc in arb_document()) {
        let data = codec::encode_document(&doc).unwrap_or(Value::Null);
        let decoded = codec::decode_document(&remote(data));
        prop_assert_eq!(decoded.ok(), Some(doc));
    }

    #[test]
    fn missing_required_field_rejects(
        doc in arb_document(),
        field in prop::sample::select(REQUIRED_FIELDS.to_vec()),
    ) {
        let mut data = codec::encode_document(&doc).unwrap_or(Value::Null);
        if let Some(object) = data.as_object_mut() {
            object.remove(field);
        }
        let result = codec::decode_document(&remote(data));
        prop_assert!(
            matches!(result, Err(CodecError::InvalidDocument { ref id, .. }) if id == "doc-1"),
            "record without {} decoded",
            field
        );
    }

    #[test]
    fn optional_fields_may_be_absent(doc in arb_document()) {
        let mut data = codec::encode_document(&doc).unwrap_or(Value::Null);
        if let Some(object) = data.as_object_mut() {
            object.remove("completedAt");
            object.remove("description");
        }
        let decoded = codec::decode_document(&remote(data));
        prop_assert!(decoded.is_ok());
        if let Ok(decoded) = decoded {
            prop_assert_eq!(decoded.completed_at, None);
            prop_assert_eq!(decoded.description, "");
        }
    }

    #[test]
    fn unknown_category_rejected(doc in arb_document(), name in "[a-z]{1,12}") {
        prop_assume!(name.parse::<Category>().is_err());
        let mut data = codec::encode_document(&doc).unwrap_or(Value::Null);
        data["category"] = Value::String(name);
        prop_assert!(codec::decode_document(&remote(data)).is_err());
    }

    #[test]
    fn category_parsing_ignores_case_and_separators(category in arb_category()) {
        let name = category.as_str();
        prop_assert_eq!(name.to_uppercase().parse::<Category>(), Ok(category));
        prop_assert_eq!(name.replace(' ', "-").parse::<Category>(), Ok(category));
    }
}
