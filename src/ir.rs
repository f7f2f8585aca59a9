//! Strongly-typed field model. No `serde_json::Value` here.
//!
//! A [`Field`] is one node of the editable tree. Everything that only makes
//! sense for one kind lives inside that kind's [`FieldKind`] variant, so an
//! object can't carry `options` and a dropdown can't carry `children`.
//! List-ness is `array: Option<ItemBounds>`: item bounds can't outlive it.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::ReusableTypes;

// ————————————————————————————————————————————————————————————————————————————
// IDS
// ————————————————————————————————————————————————————————————————————————————

/// Opaque field identity, assigned once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Uuid);

impl FieldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FieldId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// KINDS
// ————————————————————————————————————————————————————————————————————————————

/// Bare kind tag, used where only the discriminant matters (kind changes, CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Integer,
    Float,
    Currency,
    Date,
    DateTime,
    Object,
    Dropdown,
    Reference,
}

impl Kind {
    pub const ALL: [Kind; 9] = [
        Kind::String,
        Kind::Integer,
        Kind::Float,
        Kind::Currency,
        Kind::Date,
        Kind::DateTime,
        Kind::Object,
        Kind::Dropdown,
        Kind::Reference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Currency => "currency",
            Kind::Date => "date",
            Kind::DateTime => "datetime",
            Kind::Object => "object",
            Kind::Dropdown => "dropdown",
            Kind::Reference => "reference",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown field kind `{s}`"))
    }
}

/// `minValue`/`maxValue` for the numeric-ish kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(flatten)]
    pub bounds: NumericBounds,
}

/// Kind plus the attributes that kind permits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    String(TextRules),
    Integer(NumericBounds),
    Float(NumericBounds),
    Currency(CurrencyRules),
    Date,
    DateTime,
    Object {
        #[serde(default)]
        children: Vec<Field>,
    },
    Dropdown {
        #[serde(default)]
        options: Vec<String>,
    },
    Reference {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_id: Option<FieldId>,
    },
}

impl FieldKind {
    /// The attribute-free variant of `kind`.
    pub fn blank(kind: Kind) -> Self {
        match kind {
            Kind::String => FieldKind::String(TextRules::default()),
            Kind::Integer => FieldKind::Integer(NumericBounds::default()),
            Kind::Float => FieldKind::Float(NumericBounds::default()),
            Kind::Currency => FieldKind::Currency(CurrencyRules::default()),
            Kind::Date => FieldKind::Date,
            Kind::DateTime => FieldKind::DateTime,
            Kind::Object => FieldKind::Object { children: Vec::new() },
            Kind::Dropdown => FieldKind::Dropdown { options: Vec::new() },
            Kind::Reference => FieldKind::Reference { reference_id: None },
        }
    }

    pub fn tag(&self) -> Kind {
        match self {
            FieldKind::String(_) => Kind::String,
            FieldKind::Integer(_) => Kind::Integer,
            FieldKind::Float(_) => Kind::Float,
            FieldKind::Currency(_) => Kind::Currency,
            FieldKind::Date => Kind::Date,
            FieldKind::DateTime => Kind::DateTime,
            FieldKind::Object { .. } => Kind::Object,
            FieldKind::Dropdown { .. } => Kind::Dropdown,
            FieldKind::Reference { .. } => Kind::Reference,
        }
    }
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::blank(Kind::String)
    }
}

/// `minItems`/`maxItems`; present only on list fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    /// Property key under the parent; empty means draft.
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<ItemBounds>,
    #[serde(default = "required_by_default")]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Lookup-only back reference; never used for ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FieldId>,
}

fn required_by_default() -> bool {
    true
}

impl Field {
    /// A blank draft: unnamed, required, single `string`.
    pub fn blank(parent_id: Option<FieldId>) -> Self {
        Self::new("", FieldKind::default(), parent_id)
    }

    pub fn new(name: impl Into<String>, kind: FieldKind, parent_id: Option<FieldId>) -> Self {
        Self {
            id: FieldId::new(),
            name: name.into(),
            kind,
            array: None,
            is_required: true,
            title: None,
            description: None,
            example: None,
            parent_id,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    pub fn children(&self) -> Option<&[Field]> {
        match &self.kind {
            FieldKind::Object { children } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Field>> {
        match &mut self.kind {
            FieldKind::Object { children } => Some(children),
            _ => None,
        }
    }

    pub fn reference_id(&self) -> Option<FieldId> {
        match &self.kind {
            FieldKind::Reference { reference_id } => *reference_id,
            _ => None,
        }
    }

    /// Explicit `title`, else the title-cased `name`.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(t) if !t.is_empty() => t.clone(),
            _ => title_case(&self.name),
        }
    }
}

/// `zip_code` / `zipCode` / `zip-code` → `Zip Code`.
pub fn title_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `shipping address` / `shipping_address` → `ShippingAddress`.
pub fn pascal_case(name: &str) -> String {
    words(name).iter().map(|w| capitalize(w)).collect()
}

fn words(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            prev_lower = false;
            continue;
        }
        // camelCase boundary
        if c.is_uppercase() && prev_lower && !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        cur.push(c);
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn capitalize(w: &str) -> String {
    let mut cs = w.chars();
    match cs.next() {
        Some(first) => first.to_uppercase().chain(cs).collect(),
        None => String::new(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

/// The editing forest plus the reusable types it may reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub reusable_types: ReusableTypes,
}

impl Schema {
    pub fn new(fields: Vec<Field>, reusable_types: ReusableTypes) -> Self {
        Self { fields, reusable_types }
    }
}

// ------------------------------- Tests ------------------------------------ //
