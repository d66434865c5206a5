mod common;

use std::time::Duration;

use common::{test_switch, ACL, DROP, FORWARD, IPV4_LPM, NO_ACTION, SMAC};

use p4rt::entry::{
    build_table_entry, build_update, encode_value, ActionSpec, EntryOptions, Match, Operation,
};
use p4rt::error::EncodeError;

use proto::p4runtime::{entity, field_match, table_action, update};

fn drop_action() -> ActionSpec {
    ActionSpec::Direct {
        action: DROP.to_string(),
        params: vec![],
    }
}

fn forward_action(mac: Vec<u8>, port: u64) -> ActionSpec {
    ActionSpec::Direct {
        action: FORWARD.to_string(),
        params: vec![mac, encode_value(port, 9)],
    }
}

#[test]
fn encode_value_widths() {
    assert_eq!(encode_value(1, 9), vec![0, 1]);
    assert_eq!(encode_value(0x0a00_0001, 32), vec![10, 0, 0, 1]);
    assert_eq!(encode_value(5, 3), vec![5]);
    // Widths past 64 bits zero-pad on the left.
    let wide = encode_value(1, 128);
    assert_eq!(wide.len(), 16);
    assert_eq!(wide[..15], [0; 15]);
    assert_eq!(wide[15], 1);
}

#[test]
fn lpm_route_entry() {
    let switch = test_switch();
    let entry = build_table_entry(
        &switch,
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 1, 1],
            prefix_len: 24,
        }],
        &forward_action(vec![0, 0, 0, 0, 0, 1], 3),
        &EntryOptions::default(),
    )
    .unwrap();

    assert_eq!(entry.table_id, switch.table(IPV4_LPM).unwrap().preamble.id);
    assert_eq!(entry.priority, 0);
    assert_eq!(entry.r#match.len(), 1);
    assert_eq!(entry.r#match[0].field_id, 1);
    match entry.r#match[0].field_match_type {
        Some(field_match::FieldMatchType::Lpm(ref lpm)) => {
            assert_eq!(lpm.value, vec![10, 0, 1, 1]);
            assert_eq!(lpm.prefix_len, 24);
        }
        ref other => panic!("expected an LPM match, got {:?}", other),
    }

    let action = entry.action.unwrap();
    match action.r#type {
        Some(table_action::Type::Action(ref action)) => {
            assert_eq!(action.params.len(), 2);
            assert_eq!(action.params[0].param_id, 1);
            assert_eq!(action.params[0].value, vec![0, 0, 0, 0, 0, 1]);
            assert_eq!(action.params[1].param_id, 2);
            assert_eq!(action.params[1].value, vec![0, 3]);
        }
        ref other => panic!("expected a direct action, got {:?}", other),
    }
}

#[test]
fn names_and_aliases_both_resolve() {
    let switch = test_switch();
    let by_name = build_table_entry(
        &switch,
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap();
    let by_alias = build_table_entry(
        &switch,
        "ipv4_lpm",
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::Direct {
            action: "drop".to_string(),
            params: vec![],
        },
        &EntryOptions::default(),
    )
    .unwrap();
    assert_eq!(by_name, by_alias);
}

#[test]
fn unknown_table_rejected() {
    let err = build_table_entry(
        &test_switch(),
        "MyIngress.no_such_table",
        &[],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnknownTable("MyIngress.no_such_table".to_string())
    );
}

#[test]
fn unknown_action_rejected() {
    let err = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::Direct {
            action: "MyIngress.no_such_action".to_string(),
            params: vec![],
        },
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::UnknownAction { .. }));
}

#[test]
fn default_only_action_rejected_in_entries() {
    // NoAction is referenced by the table, but with default-only scope.
    let err = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::Direct {
            action: NO_ACTION.to_string(),
            params: vec![],
        },
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::UnknownAction { .. }));
}

#[test]
fn match_count_must_cover_key() {
    let err = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap_err();
    match err {
        EncodeError::SchemaMismatch { table, reason } => {
            assert_eq!(table, IPV4_LPM);
            assert!(reason.contains("hdr.ipv4.dstAddr"), "reason: {}", reason);
        }
        other => panic!("expected a schema mismatch, got {:?}", other),
    }
}

#[test]
fn match_kind_must_agree_with_schema() {
    let err = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Exact {
            value: vec![10, 0, 0, 1],
        }],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::SchemaMismatch { .. }));
}

#[test]
fn short_values_are_left_padded() {
    let entry = build_table_entry(
        &test_switch(),
        SMAC,
        &[Match::Exact { value: vec![1] }],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap();
    match entry.r#match[0].field_match_type {
        Some(field_match::FieldMatchType::Exact(ref exact)) => {
            assert_eq!(exact.value, vec![0, 0, 0, 0, 0, 1]);
        }
        ref other => panic!("expected an exact match, got {:?}", other),
    }
}

#[test]
fn wide_values_rejected_not_truncated() {
    let err = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![1, 2, 3, 4, 5],
            prefix_len: 8,
        }],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::SchemaMismatch { .. }));
}

#[test]
fn prefix_length_bounds() {
    let switch = test_switch();
    for prefix_len in [-1, 33] {
        let err = build_table_entry(
            &switch,
            IPV4_LPM,
            &[Match::Lpm {
                value: vec![10, 0, 0, 0],
                prefix_len,
            }],
            &drop_action(),
            &EntryOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidPrefixLength {
                field: "hdr.ipv4.dstAddr".to_string(),
                prefix_len,
                bit_width: 32,
            }
        );
    }
}

#[test]
fn ternary_key_requires_priority() {
    let switch = test_switch();
    let matches = [
        Match::Ternary {
            value: vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            mask: vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
        },
        Match::Range {
            low: vec![0, 1],
            high: vec![1, 0],
        },
    ];

    let err = build_table_entry(
        &switch,
        ACL,
        &matches,
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::SchemaMismatch { .. }));

    let entry = build_table_entry(
        &switch,
        ACL,
        &matches,
        &drop_action(),
        &EntryOptions {
            priority: Some(10),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(entry.priority, 10);
    match entry.r#match[1].field_match_type {
        Some(field_match::FieldMatchType::Range(ref range)) => {
            assert_eq!(range.low, vec![0, 1]);
            assert_eq!(range.high, vec![1, 0]);
        }
        ref other => panic!("expected a range match, got {:?}", other),
    }
}

#[test]
fn action_param_count_and_width_checked() {
    let switch = test_switch();
    let too_few = build_table_entry(
        &switch,
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::Direct {
            action: FORWARD.to_string(),
            params: vec![vec![0; 6]],
        },
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(too_few, EncodeError::SchemaMismatch { .. }));

    // port is bit<9>, so two bytes; three must be rejected.
    let too_wide = build_table_entry(
        &switch,
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::Direct {
            action: FORWARD.to_string(),
            params: vec![vec![0; 6], vec![0, 0, 1]],
        },
        &EntryOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(too_wide, EncodeError::SchemaMismatch { .. }));
}

#[test]
fn profile_references_encoded_by_id() {
    let entry = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &ActionSpec::ProfileMember(7),
        &EntryOptions::default(),
    )
    .unwrap();
    assert_eq!(
        entry.action.unwrap().r#type,
        Some(table_action::Type::ActionProfileMemberId(7))
    );
}

#[test]
fn idle_timeout_carried_in_nanoseconds() {
    let entry = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &drop_action(),
        &EntryOptions {
            idle_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(entry.idle_timeout_ns, 5_000_000_000);
}

#[test]
fn update_wraps_entry_with_operation() {
    let entry = build_table_entry(
        &test_switch(),
        IPV4_LPM,
        &[Match::Lpm {
            value: vec![10, 0, 0, 0],
            prefix_len: 8,
        }],
        &drop_action(),
        &EntryOptions::default(),
    )
    .unwrap();

    let wrapped = build_update(Operation::Delete, entry.clone());
    assert_eq!(wrapped.r#type, update::Type::Delete as i32);
    assert_eq!(
        wrapped.entity.unwrap().entity,
        Some(entity::Entity::TableEntry(entry))
    );
}
