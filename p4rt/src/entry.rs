/*
Copyright (c) 2024 The p4rt Authors
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Schema-checked construction of table entries.
//!
//! [`Match`] and [`ActionSpec`] describe an entry logically, in table order;
//! [`build_table_entry`] validates them against the pipeline schema and
//! produces the wire form. All validation happens here, so nothing malformed
//! reaches the device.

use std::fmt::{self, Display};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt};

use itertools::Itertools;

use proto::p4runtime::{self, entity, field_match, table_action, update};

use crate::error::EncodeError;
use crate::schema::{MatchField, MatchType, Switch, Table};

/// One key field of an entry. The variants mirror the match kinds a table
/// may declare; the kind must agree with the schema field at the same
/// position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Match {
    Exact { value: Vec<u8> },
    Ternary { value: Vec<u8>, mask: Vec<u8> },
    Lpm { value: Vec<u8>, prefix_len: i32 },
    Range { low: Vec<u8>, high: Vec<u8> },
}

impl Match {
    fn kind(&self) -> &'static str {
        match self {
            Match::Exact { .. } => "exact",
            Match::Ternary { .. } => "ternary",
            Match::Lpm { .. } => "LPM",
            Match::Range { .. } => "range",
        }
    }
}

/// The action half of an entry: a direct action with its parameter values in
/// declaration order, or a reference into an action profile. Profile
/// references are encoded by id and not validated further.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSpec {
    Direct { action: String, params: Vec<Vec<u8>> },
    ProfileMember(u32),
    ProfileGroup(u32),
}

/// Optional attributes of an entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Required whenever the key contains a ternary or range field.
    pub priority: Option<i32>,
    /// Idle time after which the device notifies the primary. Meaningful
    /// only on tables that declare idle notification.
    pub idle_timeout: Option<Duration>,
}

/// What a write does with an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Modify,
    Delete,
}

impl Operation {
    fn proto_type(self) -> update::Type {
        match self {
            Operation::Insert => update::Type::Insert,
            Operation::Modify => update::Type::Modify,
            Operation::Delete => update::Type::Delete,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Insert => "insert",
            Operation::Modify => "modify",
            Operation::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Big-endian encoding of `value` for a `bit_width`-bit field: exactly
/// `(bit_width + 7) / 8` bytes, zero-padded on the left for widths above 64
/// bits. Bits of `value` beyond `bit_width` are dropped.
pub fn encode_value(value: u64, bit_width: i32) -> Vec<u8> {
    let mut enc_val: Vec<u8> = vec![];
    enc_val.write_u64::<BigEndian>(value).unwrap();

    let num_bytes: usize = ((bit_width + 7) / 8) as usize;
    if num_bytes <= enc_val.len() {
        enc_val[enc_val.len() - num_bytes..].to_vec()
    } else {
        let mut wide = vec![0; num_bytes - enc_val.len()];
        wide.append(&mut enc_val);
        wide
    }
}

/// Validates `matches` and `action` against `table_name`'s schema and builds
/// the wire entry. Values shorter than their field are zero-padded on the
/// left; longer values are rejected, never truncated.
pub fn build_table_entry(
    switch: &Switch,
    table_name: &str,
    matches: &[Match],
    action: &ActionSpec,
    options: &EntryOptions,
) -> Result<p4runtime::TableEntry, EncodeError> {
    let table = switch
        .table(table_name)
        .ok_or_else(|| EncodeError::UnknownTable(table_name.to_string()))?;

    if matches.len() != table.match_fields.len() {
        return Err(mismatch(
            table,
            format!(
                "key takes {} fields ({}), got {}",
                table.match_fields.len(),
                table.match_fields.iter().map(|f| f.name.as_str()).join(", "),
                matches.len()
            ),
        ));
    }
    let r#match = matches
        .iter()
        .zip(&table.match_fields)
        .map(|(m, f)| encode_match(table, m, f))
        .collect::<Result<Vec<_>, _>>()?;

    let needs_priority = table
        .match_fields
        .iter()
        .any(|f| matches!(f.match_type, MatchType::Ternary | MatchType::Range));
    if needs_priority && options.priority.is_none() {
        return Err(mismatch(
            table,
            "entries require a priority: key contains ternary or range fields".to_string(),
        ));
    }

    let action = encode_action(table, action)?;

    Ok(p4runtime::TableEntry {
        table_id: table.preamble.id,
        r#match,
        action: Some(action),
        priority: options.priority.unwrap_or(0),
        is_default_action: false,
        idle_timeout_ns: options
            .idle_timeout
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0),
        metadata: Vec::new(),
    })
}

/// Wraps an entry into the update form carried by a write batch.
pub fn build_update(op: Operation, entry: p4runtime::TableEntry) -> p4runtime::Update {
    p4runtime::Update {
        r#type: op.proto_type() as i32,
        entity: Some(p4runtime::Entity {
            entity: Some(entity::Entity::TableEntry(entry)),
        }),
    }
}

fn encode_match(
    table: &Table,
    m: &Match,
    field: &MatchField,
) -> Result<p4runtime::FieldMatch, EncodeError> {
    use field_match::FieldMatchType;

    let width = field.byte_width();
    let wire = match (m, &field.match_type) {
        (Match::Exact { value }, MatchType::Exact) => FieldMatchType::Exact(field_match::Exact {
            value: fit(table, &field.name, value, width)?,
        }),
        (Match::Lpm { value, prefix_len }, MatchType::Lpm) => {
            if *prefix_len < 0 || *prefix_len > field.bit_width {
                return Err(EncodeError::InvalidPrefixLength {
                    field: field.name.clone(),
                    prefix_len: *prefix_len,
                    bit_width: field.bit_width,
                });
            }
            FieldMatchType::Lpm(field_match::Lpm {
                value: fit(table, &field.name, value, width)?,
                prefix_len: *prefix_len,
            })
        }
        (Match::Ternary { value, mask }, MatchType::Ternary) => {
            FieldMatchType::Ternary(field_match::Ternary {
                value: fit(table, &field.name, value, width)?,
                mask: fit(table, &field.name, mask, width)?,
            })
        }
        (Match::Range { low, high }, MatchType::Range) => {
            FieldMatchType::Range(field_match::Range {
                low: fit(table, &field.name, low, width)?,
                high: fit(table, &field.name, high, width)?,
            })
        }
        (m, declared) => {
            return Err(mismatch(
                table,
                format!(
                    "field {:?} is {}-matched, got a {} match",
                    field.name,
                    declared,
                    m.kind()
                ),
            ))
        }
    };
    Ok(p4runtime::FieldMatch {
        field_id: field.id,
        field_match_type: Some(wire),
    })
}

fn encode_action(table: &Table, spec: &ActionSpec) -> Result<p4runtime::TableAction, EncodeError> {
    let wire = match spec {
        ActionSpec::Direct { action, params } => {
            let schema_action =
                table
                    .entry_action(action)
                    .ok_or_else(|| EncodeError::UnknownAction {
                        table: table.preamble.name.clone(),
                        action: action.clone(),
                    })?;
            if params.len() != schema_action.params.len() {
                return Err(mismatch(
                    table,
                    format!(
                        "action {:?} takes {} parameters, got {}",
                        schema_action.preamble.name,
                        schema_action.params.len(),
                        params.len()
                    ),
                ));
            }
            let params = schema_action
                .params
                .iter()
                .zip(params)
                .map(|(p, value)| {
                    Ok(p4runtime::action::Param {
                        param_id: p.id,
                        value: fit(table, &p.name, value, p.byte_width())?,
                    })
                })
                .collect::<Result<Vec<_>, EncodeError>>()?;
            table_action::Type::Action(p4runtime::Action {
                action_id: schema_action.preamble.id,
                params,
            })
        }
        ActionSpec::ProfileMember(id) => table_action::Type::ActionProfileMemberId(*id),
        ActionSpec::ProfileGroup(id) => table_action::Type::ActionProfileGroupId(*id),
    };
    Ok(p4runtime::TableAction { r#type: Some(wire) })
}

/// Left-pads `value` with zeros to `width` bytes. Longer values are a
/// schema mismatch.
fn fit(table: &Table, name: &str, value: &[u8], width: usize) -> Result<Vec<u8>, EncodeError> {
    if value.len() > width {
        return Err(mismatch(
            table,
            format!(
                "{:?} holds {} bytes but {} were supplied",
                name,
                width,
                value.len()
            ),
        ));
    }
    let mut padded = vec![0; width - value.len()];
    padded.extend_from_slice(value);
    Ok(padded)
}

fn mismatch(table: &Table, reason: String) -> EncodeError {
    EncodeError::SchemaMismatch {
        table: table.preamble.name.clone(),
        reason,
    }
}
