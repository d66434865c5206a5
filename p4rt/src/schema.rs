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

//! Parsed form of the pipeline schema (p4info), reshaped for the lookups
//! entry construction needs. Only the table programming surface is kept;
//! the pipeline push forwards the raw document bytes, so the rest of
//! p4info reaches the device untouched.

use std::collections::HashMap;
use std::fmt::{self, Display};

use proto::p4info;

#[derive(Clone, Debug, Default)]
pub struct Preamble {
    pub id: u32,
    pub name: String,
    pub alias: String,
}

impl From<&p4info::Preamble> for Preamble {
    fn from(p: &p4info::Preamble) -> Self {
        Preamble {
            id: p.id,
            name: p.name.clone(),
            alias: p.alias.clone(),
        }
    }
}

impl Preamble {
    /// Objects answer to their fully qualified name and to their alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias == name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchType {
    Unspecified,
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
    Other(String),
}

impl Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MatchType::*;
        let s = match self {
            Unspecified => "unspecified",
            Exact => "exact",
            Lpm => "LPM",
            Ternary => "ternary",
            Range => "range",
            Optional => "optional",
            Other(s) => s,
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug)]
pub struct MatchField {
    pub id: u32,
    pub name: String,
    pub bit_width: i32,
    pub match_type: MatchType,
}

impl From<&p4info::MatchField> for MatchField {
    fn from(mf: &p4info::MatchField) -> Self {
        use p4info::match_field::{Match, MatchType as PbMatchType};
        let match_type = match mf.r#match {
            Some(Match::MatchType(t)) => match PbMatchType::try_from(t) {
                Ok(PbMatchType::Exact) => MatchType::Exact,
                Ok(PbMatchType::Lpm) => MatchType::Lpm,
                Ok(PbMatchType::Ternary) => MatchType::Ternary,
                Ok(PbMatchType::Range) => MatchType::Range,
                Ok(PbMatchType::Optional) => MatchType::Optional,
                _ => MatchType::Unspecified,
            },
            Some(Match::OtherMatchType(ref s)) => MatchType::Other(s.clone()),
            None => MatchType::Unspecified,
        };
        MatchField {
            id: mf.id,
            name: mf.name.clone(),
            bit_width: mf.bitwidth,
            match_type,
        }
    }
}

impl MatchField {
    /// Bytes the field's wire encoding occupies.
    pub fn byte_width(&self) -> usize {
        ((self.bit_width + 7) / 8) as usize
    }
}

impl Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field {}: bit<{}> {}-match",
            self.name, self.bit_width, self.match_type
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct Param {
    pub id: u32,
    pub name: String,
    pub bit_width: i32,
}

impl From<&p4info::action::Param> for Param {
    fn from(p: &p4info::action::Param) -> Self {
        Param {
            id: p.id,
            name: p.name.clone(),
            bit_width: p.bitwidth,
        }
    }
}

impl Param {
    pub fn byte_width(&self) -> usize {
        ((self.bit_width + 7) / 8) as usize
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: bit<{}>", self.name, self.bit_width)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Action {
    pub preamble: Preamble,
    pub params: Vec<Param>,
}

impl From<&p4info::Action> for Action {
    fn from(a: &p4info::Action) -> Self {
        Action {
            preamble: a.preamble.as_ref().map(Preamble::from).unwrap_or_default(),
            params: a.params.iter().map(Param::from).collect(),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {}(", self.preamble.name)?;
        for (p_index, p) in self.params.iter().enumerate() {
            if p_index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActionRef {
    pub action: Action,
    pub may_be_default: bool, // Allowed as the default action?
    pub may_be_entry: bool,   // Allowed as an entry's action?
}

impl ActionRef {
    fn new_from_proto(ar: &p4info::ActionRef, actions: &HashMap<u32, Action>) -> Option<Self> {
        use p4info::action_ref::Scope;
        // A ref to an action id the schema does not define is dropped; an
        // entry naming it later fails with an unknown-action error.
        let action = actions.get(&ar.id)?.clone();
        Some(ActionRef {
            action,
            may_be_default: ar.scope != Scope::TableOnly as i32,
            may_be_entry: ar.scope != Scope::DefaultOnly as i32,
        })
    }
}

impl Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.may_be_entry {
            write!(f, "default-only ")?;
        } else if !self.may_be_default {
            write!(f, "not-default ")?;
        }
        write!(f, "{}", self.action)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub preamble: Preamble,
    pub match_fields: Vec<MatchField>,
    pub actions: Vec<ActionRef>,
    pub max_entries: Option<u64>,
    pub idle_notify: bool,
    pub is_const_table: bool,
}

impl Table {
    fn new_from_proto(t: &p4info::Table, actions: &HashMap<u32, Action>) -> Self {
        use p4info::table::IdleTimeoutBehavior;
        Table {
            preamble: t.preamble.as_ref().map(Preamble::from).unwrap_or_default(),
            match_fields: t.match_fields.iter().map(MatchField::from).collect(),
            actions: t
                .action_refs
                .iter()
                .filter_map(|ar| ActionRef::new_from_proto(ar, actions))
                .collect(),
            max_entries: if t.size > 0 { Some(t.size as u64) } else { None },
            idle_notify: t.idle_timeout_behavior == IdleTimeoutBehavior::NotifyControl as i32,
            is_const_table: t.is_const_table,
        }
    }

    /// The named action, if entries of this table may use it.
    pub fn entry_action(&self, name: &str) -> Option<&Action> {
        self.actions
            .iter()
            .filter(|ar| ar.may_be_entry)
            .map(|ar| &ar.action)
            .find(|a| a.preamble.answers_to(name))
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}:", self.preamble.name)?;
        for mf in &self.match_fields {
            write!(f, "\t{}", mf)?;
        }
        for ar in &self.actions {
            write!(f, "\t{}", ar)?;
        }
        if let Some(max_entries) = self.max_entries {
            write!(f, "\tsize: {}", max_entries)?;
        }
        if self.is_const_table {
            write!(f, "\tconst table")?;
        }
        if self.idle_notify {
            write!(f, "\tidle notify")?;
        }
        Ok(())
    }
}

/// The forwarding tables of one pipeline, as handed over by the compiler.
#[derive(Clone, Debug, Default)]
pub struct Switch {
    pub tables: Vec<Table>,
}

impl From<&p4info::P4Info> for Switch {
    fn from(p4i: &p4info::P4Info) -> Self {
        let actions: HashMap<u32, Action> = p4i
            .actions
            .iter()
            .filter_map(|a| a.preamble.as_ref().map(|p| (p.id, Action::from(a))))
            .collect();
        let tables: Vec<Table> = p4i
            .tables
            .iter()
            .map(|t| Table::new_from_proto(t, &actions))
            .collect();
        Switch { tables }
    }
}

impl Switch {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.preamble.answers_to(name))
    }

    pub fn table_by_id(&self, id: u32) -> Option<&Table> {
        self.tables.iter().find(|t| t.preamble.id == id)
    }
}
