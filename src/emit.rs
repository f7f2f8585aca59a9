//! JSON Schema emission.
//!
//! Two passes over the same recursive procedure:
//! 1. definitions: every named reusable type → `definitions[name]`, built on
//!    demand so a type referenced before its turn gets built first;
//! 2. body: the forest → root `properties`/`required`.
//!
//! A type that needs itself while it is still being built gets the
//! invalid-reference placeholder instead of recursing. Depth is therefore
//! bounded by the number of distinct reusable types.
pub mod currency;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::diagnostics::Diagnostic;
use crate::ir::{Field, FieldId, FieldKind, ItemBounds, NumericBounds, Schema, TextRules};
use crate::registry::ReusableTypes;

pub use currency::{currency_pattern, symbol_for};

pub const INVALID_REFERENCE: &str = "Invalid or undefined reference";
pub const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";
pub const DATETIME_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$";

/// Compiled document plus whatever had to be degraded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub document: Value,
    pub diagnostics: Vec<Diagnostic>,
}

/// Pure, idempotent: same inputs, same document.
pub fn compile(fields: &[Field], types: &ReusableTypes) -> Value {
    compile_with_diagnostics(fields, types).document
}

pub fn compile_schema(schema: &Schema) -> Compiled {
    compile_with_diagnostics(&schema.fields, &schema.reusable_types)
}

pub fn compile_with_diagnostics(fields: &[Field], types: &ReusableTypes) -> Compiled {
    let mut cx = Compiler::new(types);
    for ty in types {
        if ty.name.is_empty() {
            log::debug!("skipping unnamed reusable type {}", ty.id);
            continue;
        }
        cx.ensure_definition(ty);
    }

    let mut document = cx.object_body(fields);
    if !cx.definitions.is_empty() {
        let defs: Map<String, Value> = cx.definitions.into_iter().collect();
        document["definitions"] = Value::Object(defs);
    }
    Compiled { document, diagnostics: cx.diagnostics }
}

// ------------------------------- Compiler -------------------------------- //

struct Compiler<'a> {
    types: &'a ReusableTypes,
    definitions: IndexMap<String, Value>,
    /// type id → definition name, once built
    resolved: HashMap<FieldId, String>,
    in_progress: HashSet<FieldId>,
    diagnostics: Vec<Diagnostic>,
}

enum Resolution {
    Ref(String),
    Placeholder,
}

impl<'a> Compiler<'a> {
    fn new(types: &'a ReusableTypes) -> Self {
        Self {
            types,
            definitions: IndexMap::new(),
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Builds `definitions[ty.name]` unless it exists or is mid-build.
    fn ensure_definition(&mut self, ty: &'a Field) -> Option<String> {
        if let Some(name) = self.resolved.get(&ty.id) {
            return Some(name.clone());
        }
        if ty.name.is_empty() || self.in_progress.contains(&ty.id) {
            return None;
        }
        if self.definitions.contains_key(&ty.name) {
            log::warn!("reusable type name `{}` is used twice; {} is not addressable", ty.name, ty.id);
            return None;
        }

        self.in_progress.insert(ty.id);
        let body = self.object_body(ty.children().unwrap_or_default());
        self.in_progress.remove(&ty.id);

        self.definitions.insert(ty.name.clone(), body);
        self.resolved.insert(ty.id, ty.name.clone());
        Some(ty.name.clone())
    }

    fn resolve(&mut self, field: &Field) -> Resolution {
        let types = self.types;
        let reference_id = field.reference_id();
        let Some(ty) = reference_id.and_then(|id| types.get(&id)) else {
            log::warn!("field `{}` references an undefined type", field.name);
            self.diagnostics.push(Diagnostic::DanglingReference {
                field: field.name.clone(),
                field_id: field.id,
                reference_id,
            });
            return Resolution::Placeholder;
        };
        match self.ensure_definition(ty) {
            Some(name) => Resolution::Ref(name),
            None if self.in_progress.contains(&ty.id) => {
                log::warn!("`{}` refers back to `{}` before it is built", field.name, ty.name);
                self.diagnostics.push(Diagnostic::CircularDefinition {
                    type_name: ty.name.clone(),
                    field: field.name.clone(),
                });
                Resolution::Placeholder
            }
            None => {
                self.diagnostics.push(Diagnostic::DanglingReference {
                    field: field.name.clone(),
                    field_id: field.id,
                    reference_id,
                });
                Resolution::Placeholder
            }
        }
    }

    /// `{type: object, properties, required, additionalProperties: false}`.
    /// Unnamed (draft) fields are left out entirely.
    fn object_body(&mut self, children: &[Field]) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();
        for child in children.iter().filter(|c| !c.name.is_empty()) {
            let schema = self.field_schema(child);
            if properties.insert(child.name.clone(), schema).is_some() {
                log::warn!("duplicate property `{}`; the later field wins", child.name);
            }
            required.retain(|n| n != &child.name);
            if child.is_required {
                required.push(child.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    fn field_schema(&mut self, field: &Field) -> Value {
        let item = self.item_schema(field);
        match &field.array {
            Some(bounds) => wrap_array(item, bounds),
            None => item,
        }
    }

    /// Everything except the array wrapper, null union included.
    fn item_schema(&mut self, field: &Field) -> Value {
        let mut o = match &field.kind {
            FieldKind::Reference { .. } => {
                return match self.resolve(field) {
                    Resolution::Ref(name) => json!({ "$ref": format!("#/definitions/{name}") }),
                    Resolution::Placeholder => {
                        let mut o = json!({ "type": "object", "description": INVALID_REFERENCE });
                        nullable(&mut o, field.is_required);
                        o
                    }
                };
            }
            FieldKind::String(rules) => string_schema(rules),
            FieldKind::Integer(bounds) | FieldKind::Float(bounds) => number_schema(bounds),
            FieldKind::Currency(c) => json!({
                "type": "string",
                "pattern": currency_pattern(c.currency_code.as_deref()),
            }),
            FieldKind::Date => json!({ "type": "string", "format": "date", "pattern": DATE_PATTERN }),
            FieldKind::DateTime => {
                json!({ "type": "string", "format": "date-time", "pattern": DATETIME_PATTERN })
            }
            FieldKind::Object { children } => self.object_body(children),
            FieldKind::Dropdown { options } => {
                let mut o = json!({ "type": "string" });
                if !options.is_empty() {
                    o["enum"] = json!(options);
                }
                o
            }
        };
        nullable(&mut o, field.is_required);

        if let Some(title) = &field.title {
            o["title"] = Value::from(title.as_str());
        }
        if let Some(description) = &field.description {
            o["description"] = Value::from(description.as_str());
        }
        if let Some(example) = &field.example {
            o["example"] = Value::from(example.as_str());
        }
        o
    }
}

// ------------------------------- Helpers --------------------------------- //

fn string_schema(rules: &TextRules) -> Value {
    let mut o = json!({ "type": "string" });
    if let Some(p) = &rules.pattern {
        o["pattern"] = Value::from(p.as_str());
    }
    if let Some(n) = rules.min_length {
        o["minLength"] = Value::from(n);
    }
    if let Some(n) = rules.max_length {
        o["maxLength"] = Value::from(n);
    }
    o
}

fn number_schema(bounds: &NumericBounds) -> Value {
    let mut o = json!({ "type": "number" });
    if let Some(m) = bounds.min_value {
        o["minimum"] = json_num_pref_i64(m);
    }
    if let Some(m) = bounds.max_value {
        o["maximum"] = json_num_pref_i64(m);
    }
    o
}

/// `"type": T` → `"type": [T, "null"]` for optional fields.
fn nullable(o: &mut Value, is_required: bool) {
    if is_required {
        return;
    }
    if let Some(base) = o.get("type").cloned() {
        if base.is_string() {
            o["type"] = json!([base, "null"]);
        }
    }
}

fn wrap_array(item: Value, bounds: &ItemBounds) -> Value {
    let mut o = json!({ "type": "array", "items": item });
    if let Some(n) = bounds.min_items {
        o["minItems"] = Value::from(n);
    }
    if let Some(n) = bounds.max_items {
        o["maxItems"] = Value::from(n);
    }
    o
}

// Prefer emitting integers when exact
fn json_num_pref_i64(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CurrencyRules, Kind};
    use crate::mutate::{add_field_with, set_array};

    fn field(name: &str, kind: FieldKind) -> Field {
        Field::new(name, kind, None)
    }

    fn optional(mut f: Field) -> Field {
        f.is_required = false;
        f
    }

    fn object(name: &str, children: Vec<Field>) -> Field {
        let parent = field(name, FieldKind::blank(Kind::Object));
        let id = parent.id;
        children
            .into_iter()
            .fold(vec![parent], |tree, c| add_field_with(&tree, Some(id), c))
            .remove(0)
    }

    fn reference(name: &str, target: Option<FieldId>) -> Field {
        field(name, FieldKind::Reference { reference_id: target })
    }

    #[test]
    fn address_scenario() {
        let zip = optional(field(
            "zip",
            FieldKind::String(TextRules { pattern: Some(r"^\d{5}$".into()), ..TextRules::default() }),
        ));
        let address = object("address", vec![field("street", FieldKind::default()), zip]);

        let doc = compile(&[address], &ReusableTypes::new());
        assert_eq!(
            doc,
            json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "object",
                        "properties": {
                            "street": { "type": "string" },
                            "zip": { "type": ["string", "null"], "pattern": "^\\d{5}$" }
                        },
                        "required": ["street"],
                        "additionalProperties": false
                    }
                },
                "required": ["address"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn dropdown_scenario() {
        let priority = field(
            "priority",
            FieldKind::Dropdown { options: vec!["Low".into(), "Medium".into(), "High".into()] },
        );
        let doc = compile(&[priority], &ReusableTypes::new());
        assert_eq!(doc["properties"]["priority"], json!({ "type": "string", "enum": ["Low", "Medium", "High"] }));
        assert_eq!(doc["required"], json!(["priority"]));
    }

    #[test]
    fn empty_dropdown_emits_no_enum() {
        let doc = compile(&[field("pick", FieldKind::blank(Kind::Dropdown))], &ReusableTypes::new());
        assert_eq!(doc["properties"]["pick"], json!({ "type": "string" }));
    }

    #[test]
    fn null_union_law_holds_for_every_typed_kind() {
        for kind in Kind::ALL.into_iter().filter(|k| *k != Kind::Reference) {
            let req = compile(&[field("f", FieldKind::blank(kind))], &ReusableTypes::new());
            let opt = compile(&[optional(field("f", FieldKind::blank(kind)))], &ReusableTypes::new());
            let base = req["properties"]["f"]["type"].clone();
            assert!(base.is_string(), "{kind}: required type is scalar");
            assert_eq!(opt["properties"]["f"]["type"], json!([base, "null"]), "{kind}");
            assert_eq!(opt["required"], json!([]), "{kind}");
        }
    }

    #[test]
    fn array_wraps_the_exact_single_schema() {
        let mut f = optional(field(
            "scores",
            FieldKind::Integer(NumericBounds { min_value: Some(0.0), max_value: Some(10.5) }),
        ));
        f.title = Some("Scores".into());
        let single = compile(&[f.clone()], &ReusableTypes::new())["properties"]["scores"].clone();
        assert_eq!(single["minimum"], json!(0));
        assert_eq!(single["maximum"], json!(10.5));

        f.array = Some(ItemBounds { min_items: Some(1), max_items: Some(3) });
        let listed = compile(&[f.clone()], &ReusableTypes::new())["properties"]["scores"].clone();
        assert_eq!(listed, json!({ "type": "array", "items": single, "minItems": 1, "maxItems": 3 }));

        // toggling off and on again is stable
        let id = f.id;
        let toggled = set_array(&set_array(&[f.clone()], &id, false), &id, true);
        let mut plain = f;
        plain.array = Some(ItemBounds::default());
        assert_eq!(compile(&toggled, &ReusableTypes::new()), compile(&[plain], &ReusableTypes::new()));
    }

    #[test]
    fn per_kind_encodings() {
        let tree = vec![
            field("born", FieldKind::Date),
            field("seen", FieldKind::DateTime),
            field(
                "price",
                FieldKind::Currency(CurrencyRules { currency_code: Some("USD".into()), ..Default::default() }),
            ),
            field(
                "code",
                FieldKind::String(TextRules { pattern: None, min_length: Some(2), max_length: Some(8) }),
            ),
            field("ratio", FieldKind::Float(NumericBounds { min_value: Some(-1.5), max_value: None })),
        ];
        let doc = compile(&tree, &ReusableTypes::new());
        let p = &doc["properties"];
        assert_eq!(p["born"], json!({ "type": "string", "format": "date", "pattern": DATE_PATTERN }));
        assert_eq!(p["seen"]["format"], "date-time");
        assert_eq!(p["price"], json!({ "type": "string", "pattern": r"^(?:\$)?\s*\d+(?:\.\d{1,2})?$" }));
        assert_eq!(p["code"], json!({ "type": "string", "minLength": 2, "maxLength": 8 }));
        assert_eq!(p["ratio"], json!({ "type": "number", "minimum": -1.5 }));
    }

    #[test]
    fn metadata_passes_through_and_title_is_not_invented() {
        let mut f = field("first_name", FieldKind::default());
        let bare = compile(&[f.clone()], &ReusableTypes::new());
        assert!(bare["properties"]["first_name"].get("title").is_none());

        f.title = Some("First".into());
        f.description = Some("Given name".into());
        f.example = Some("Ada".into());
        let doc = compile(&[f], &ReusableTypes::new());
        assert_eq!(
            doc["properties"]["first_name"],
            json!({ "type": "string", "title": "First", "description": "Given name", "example": "Ada" })
        );
    }

    #[test]
    fn draft_fields_are_skipped() {
        let tree = vec![field("", FieldKind::default()), field("kept", FieldKind::default())];
        let doc = compile(&tree, &ReusableTypes::new());
        assert_eq!(doc["properties"].as_object().unwrap().len(), 1);
        assert_eq!(doc["required"], json!(["kept"]));
    }

    #[test]
    fn references_resolve_to_definitions() {
        let (types, money) = ReusableTypes::new().add_type("Money");
        let schema = Schema::new(vec![], types).apply(&crate::mutate::Edit::Add { parent_id: Some(money) });
        let amount = schema.reusable_types.get(&money).unwrap().children().unwrap()[0].id;
        let schema = schema.apply(&crate::mutate::Edit::Rename { id: amount, name: "amount".into() });

        let mut total = reference("total", Some(money));
        total.array = Some(ItemBounds::default());
        let compiled = compile_with_diagnostics(&[total], &schema.reusable_types);

        assert!(compiled.diagnostics.is_empty());
        let doc = compiled.document;
        assert_eq!(
            doc["properties"]["total"],
            json!({ "type": "array", "items": { "$ref": "#/definitions/Money" } })
        );
        assert_eq!(
            doc["definitions"]["Money"],
            json!({
                "type": "object",
                "properties": { "amount": { "type": "string" } },
                "required": ["amount"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn dangling_reference_degrades_one_field_only() {
        let tree = vec![
            field("name", FieldKind::default()),
            optional(reference("owner", Some(FieldId::new()))),
            reference("unset", None),
        ];
        let compiled = compile_with_diagnostics(&tree, &ReusableTypes::new());
        let p = &compiled.document["properties"];
        assert_eq!(p["name"], json!({ "type": "string" }));
        assert_eq!(p["owner"], json!({ "type": ["object", "null"], "description": INVALID_REFERENCE }));
        assert_eq!(p["unset"], json!({ "type": "object", "description": INVALID_REFERENCE }));
        assert_eq!(compiled.document["required"], json!(["name", "unset"]));
        assert_eq!(compiled.diagnostics.len(), 2);
        assert!(matches!(compiled.diagnostics[0], Diagnostic::DanglingReference { .. }));
        assert!(compiled.document.get("definitions").is_none());
    }

    #[test]
    fn self_reference_is_cut_with_a_diagnostic() {
        let (types, node) = ReusableTypes::new().add_type("Node");
        let schema = Schema::new(vec![reference("head", Some(node))], types);
        let next = {
            let mut f = reference("next", Some(node));
            f.is_required = false;
            f
        };
        let schema = schema.apply(&crate::mutate::Edit::Add { parent_id: Some(node) });
        let draft = schema.reusable_types.get(&node).unwrap().children().unwrap()[0].id;
        let schema = schema.apply(&crate::mutate::Edit::Update(Field { id: draft, parent_id: Some(node), ..next }));

        let compiled = compile_schema(&schema);
        let doc = &compiled.document;
        assert_eq!(doc["properties"]["head"], json!({ "$ref": "#/definitions/Node" }));
        assert_eq!(
            doc["definitions"]["Node"]["properties"]["next"],
            json!({ "type": ["object", "null"], "description": INVALID_REFERENCE })
        );
        assert_eq!(
            compiled.diagnostics,
            vec![Diagnostic::CircularDefinition { type_name: "Node".into(), field: "next".into() }]
        );
    }

    #[test]
    fn mutual_references_build_dependency_first() {
        let (types, a) = ReusableTypes::new().add_type("A");
        let (types, b) = types.add_type("B");
        let schema = Schema::new(vec![], types)
            .apply(&crate::mutate::Edit::Add { parent_id: Some(a) })
            .apply(&crate::mutate::Edit::Add { parent_id: Some(b) });
        let a_kid = schema.reusable_types.get(&a).unwrap().children().unwrap()[0].id;
        let b_kid = schema.reusable_types.get(&b).unwrap().children().unwrap()[0].id;
        let schema = schema
            .apply(&crate::mutate::Edit::Update(Field {
                id: a_kid,
                parent_id: Some(a),
                ..reference("b", Some(b))
            }))
            .apply(&crate::mutate::Edit::Update(Field {
                id: b_kid,
                parent_id: Some(b),
                ..reference("a", Some(a))
            }));

        let compiled = compile_schema(&schema);
        let defs = compiled.document["definitions"].as_object().unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), ["B", "A"]);
        assert_eq!(defs["A"]["properties"]["b"], json!({ "$ref": "#/definitions/B" }));
        assert_eq!(defs["B"]["properties"]["a"]["description"], INVALID_REFERENCE);
        assert_eq!(compiled.diagnostics.len(), 1);
    }

    #[test]
    fn compile_is_idempotent() {
        let tree = vec![object("o", vec![field("a", FieldKind::Date)])];
        let types = ReusableTypes::new();
        assert_eq!(compile(&tree, &types), compile(&tree, &types));
    }
}
