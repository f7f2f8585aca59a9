//! JSON Schema → field forest.
//!
//! Duck-typed on `type`/`properties`/`items`/`format`/`required`; anything it
//! doesn't model becomes a `string` field plus an [`Diagnostic::ImportAmbiguity`].
//! Every produced field gets a fresh id.
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::diagnostics::Diagnostic;
use crate::ir::{Field, FieldId, FieldKind, ItemBounds, Kind, NumericBounds, Schema, TextRules};
use crate::registry::ReusableTypes;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Turn `definitions` into reusable types and `$ref`s into references.
    /// Off: definitions are ignored and `$ref`s stay unresolved.
    pub resolve_definitions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub fields: Vec<Field>,
    pub reusable_types: ReusableTypes,
    pub diagnostics: Vec<Diagnostic>,
}

impl Imported {
    pub fn into_schema(self) -> Schema {
        Schema::new(self.fields, self.reusable_types)
    }
}

/// Forest only, diagnostics dropped (they are still logged).
pub fn import(document: &Value) -> Vec<Field> {
    import_with(document, &ImportOptions::default()).fields
}

pub fn import_with(document: &Value, options: &ImportOptions) -> Imported {
    let mut im = Importer { options: *options, type_ids: HashMap::new(), diagnostics: Vec::new() };
    let reusable_types = if options.resolve_definitions {
        im.definitions(document)
    } else {
        ReusableTypes::new()
    };
    let fields = im.properties(document, None, "");
    Imported { fields, reusable_types, diagnostics: im.diagnostics }
}

// ------------------------------- Importer -------------------------------- //

struct Importer {
    options: ImportOptions,
    /// definition name → reusable type id
    type_ids: HashMap<String, FieldId>,
    diagnostics: Vec<Diagnostic>,
}

impl Importer {
    fn ambiguity(&mut self, path: &str, detail: String) {
        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };
        log::warn!("import {path}: {detail}");
        self.diagnostics.push(Diagnostic::ImportAmbiguity { path, detail });
    }

    /// Ids are handed out before any body is read so definitions can refer
    /// to each other in any order.
    fn definitions(&mut self, document: &Value) -> ReusableTypes {
        let Some(defs) = document.get("definitions").and_then(Value::as_object) else {
            return ReusableTypes::new();
        };
        let mut roots: Vec<Field> = defs
            .keys()
            .map(|name| Field::new(name.as_str(), FieldKind::blank(Kind::Object), None))
            .collect();
        for root in &roots {
            self.type_ids.insert(root.name.clone(), root.id);
        }
        for (root, def) in roots.iter_mut().zip(defs.values()) {
            let path = format!("/definitions/{}", root.name);
            if !matches!(base_type(def), Some("object") | None) {
                self.ambiguity(&path, "definition is not an object, imported as an empty type".into());
            }
            let children = self.properties(def, Some(root.id), &path);
            root.kind = FieldKind::Object { children };
            copy_metadata(root, def, None);
        }
        ReusableTypes::from_roots(roots)
    }

    fn properties(&mut self, schema: &Value, parent: Option<FieldId>, path: &str) -> Vec<Field> {
        let Some(props) = schema.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|xs| xs.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut taken: HashSet<String> = props.keys().filter(|k| !k.is_empty()).cloned().collect();
        props
            .iter()
            .map(|(name, prop)| {
                let path = format!("{path}/properties/{name}");
                let is_required = required.contains(name.as_str());
                if !name.is_empty() {
                    return self.field(name, prop, is_required, parent, &path);
                }
                let placeholder = placeholder_name(&taken);
                self.ambiguity(&path, format!("empty property name, imported as `{placeholder}`"));
                taken.insert(placeholder.clone());
                self.field(&placeholder, prop, is_required, parent, &path)
            })
            .collect()
    }

    fn field(&mut self, name: &str, prop: &Value, is_required: bool, parent: Option<FieldId>, path: &str) -> Field {
        let mut f = Field::new(name, FieldKind::default(), parent);
        f.is_required = is_required;

        let (item, item_path) = if base_type(prop) == Some("array") {
            f.array = Some(ItemBounds {
                min_items: prop.get("minItems").and_then(Value::as_u64),
                max_items: prop.get("maxItems").and_then(Value::as_u64),
            });
            match prop.get("items").filter(|i| i.is_object()) {
                Some(items) => (Some(items), format!("{path}/items")),
                None => {
                    self.ambiguity(path, "array without `items`, using string elements".into());
                    (None, path.to_string())
                }
            }
        } else {
            (Some(prop), path.to_string())
        };

        if let Some(item) = item {
            f.kind = self.kind_of(item, f.id, &item_path);
        }
        copy_metadata(&mut f, prop, item);
        f
    }

    fn kind_of(&mut self, s: &Value, own_id: FieldId, path: &str) -> FieldKind {
        if let Some(target) = s.get("$ref").and_then(Value::as_str) {
            return self.reference(target, path);
        }
        let ty = base_type(s).or_else(|| s.get("properties").map(|_| "object"));
        match ty {
            Some("object") => FieldKind::Object { children: self.properties(s, Some(own_id), path) },
            Some("number") | Some("integer") => FieldKind::Integer(NumericBounds {
                min_value: s.get("minimum").and_then(Value::as_f64),
                max_value: s.get("maximum").and_then(Value::as_f64),
            }),
            Some("string") => self.string_kind(s, path),
            Some("array") => {
                self.ambiguity(path, "nested arrays are not supported, using string".into());
                FieldKind::default()
            }
            Some(other) => {
                self.ambiguity(path, format!("unsupported type `{other}`, using string"));
                FieldKind::default()
            }
            None => {
                let detail = match s.get("items") {
                    Some(_) => "items without `type`, using string",
                    None => "missing `type`, using string",
                };
                self.ambiguity(path, detail.into());
                FieldKind::default()
            }
        }
    }

    fn string_kind(&mut self, s: &Value, path: &str) -> FieldKind {
        match s.get("format").and_then(Value::as_str) {
            Some("date") => return FieldKind::Date,
            Some("date-time") => return FieldKind::DateTime,
            Some(other) => self.ambiguity(path, format!("unmapped format `{other}`, kept as plain string")),
            None => {}
        }
        if let Some(options) = s.get("enum").and_then(Value::as_array) {
            let mut out: Vec<String> = Vec::with_capacity(options.len());
            let mut converted: Vec<String> = Vec::new();
            let mut dropped_null = false;
            for o in options {
                let text = match o {
                    Value::String(t) => t.clone(),
                    Value::Null => {
                        dropped_null = true;
                        continue;
                    }
                    other => {
                        converted.push(other.to_string());
                        example_text(other)
                    }
                };
                if !out.contains(&text) {
                    out.push(text);
                }
            }
            if !converted.is_empty() || dropped_null {
                let mut detail = Vec::new();
                if !converted.is_empty() {
                    detail.push(format!("non-string enum members [{}] converted to text", converted.join(", ")));
                }
                if dropped_null {
                    detail.push("`null` enum member dropped".to_string());
                }
                self.ambiguity(path, detail.join("; "));
            }
            return FieldKind::Dropdown { options: out };
        }
        FieldKind::String(TextRules {
            pattern: s.get("pattern").and_then(Value::as_str).map(str::to_string),
            min_length: s.get("minLength").and_then(Value::as_u64),
            max_length: s.get("maxLength").and_then(Value::as_u64),
        })
    }

    fn reference(&mut self, target: &str, path: &str) -> FieldKind {
        if self.options.resolve_definitions {
            let id = target
                .strip_prefix(DEFINITIONS_PREFIX)
                .and_then(|name| self.type_ids.get(name))
                .copied();
            if let Some(id) = id {
                return FieldKind::Reference { reference_id: Some(id) };
            }
            self.ambiguity(path, format!("`$ref` to `{target}` has no matching definition, using string"));
        } else {
            self.ambiguity(path, format!("`$ref` to `{target}` is not resolved, using string"));
        }
        FieldKind::default()
    }
}

// ------------------------------- Helpers --------------------------------- //

const PLACEHOLDER_NAME: &str = "field";

/// `field`, `field1`, … whichever its siblings don't already use.
fn placeholder_name(taken: &HashSet<String>) -> String {
    let mut candidate = PLACEHOLDER_NAME.to_string();
    let mut n = 0;
    while taken.contains(&candidate) {
        n += 1;
        candidate = format!("{PLACEHOLDER_NAME}{n}");
    }
    candidate
}

/// `type`, or the non-null member of a `[T, "null"]` union.
fn base_type(s: &Value) -> Option<&str> {
    match s.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(ts) => ts.iter().filter_map(Value::as_str).find(|t| *t != "null"),
        _ => None,
    }
}

/// Reads metadata from the property, falling back to the item schema (where
/// the compiler puts it for arrays).
fn copy_metadata(f: &mut Field, prop: &Value, item: Option<&Value>) {
    let lookup = |key: &str| prop.get(key).or_else(|| item.and_then(|i| i.get(key)));
    f.title = lookup("title").and_then(Value::as_str).map(str::to_string);
    f.description = lookup("description").and_then(Value::as_str).map(str::to_string);
    f.example = lookup("example")
        .or_else(|| lookup("examples").and_then(|xs| xs.as_array()?.first()))
        .map(example_text);
}

fn example_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::compile;
    use crate::index::TreeIndex;
    use crate::ir::CurrencyRules;
    use crate::mutate::add_field_with;
    use serde_json::json;

    /// Serialized field with ids stripped, for shape comparisons.
    fn shape(f: &Field) -> Value {
        fn strip(v: &mut Value) {
            match v {
                Value::Object(m) => {
                    m.remove("id");
                    m.remove("parentId");
                    m.values_mut().for_each(strip);
                }
                Value::Array(xs) => xs.iter_mut().for_each(strip),
                _ => {}
            }
        }
        let mut v = serde_json::to_value(f).unwrap();
        strip(&mut v);
        v
    }

    fn object(name: &str, children: Vec<Field>) -> Field {
        let parent = Field::new(name, FieldKind::blank(Kind::Object), None);
        let id = parent.id;
        children
            .into_iter()
            .fold(vec![parent], |tree, c| add_field_with(&tree, Some(id), c))
            .remove(0)
    }

    #[test]
    fn round_trip_preserves_shape_and_metadata() {
        let mut tags = Field::new("tags", FieldKind::Dropdown { options: vec!["a".into(), "b".into()] }, None);
        tags.array = Some(ItemBounds { min_items: Some(1), max_items: None });
        tags.is_required = false;
        tags.description = Some("Labels".into());

        let mut qty = Field::new("qty", FieldKind::Integer(NumericBounds { min_value: Some(0.0), max_value: Some(99.0) }), None);
        qty.example = Some("3".into());

        let mut code = Field::new(
            "code",
            FieldKind::String(TextRules { pattern: Some("^[A-Z]+$".into()), min_length: Some(2), max_length: None }),
            None,
        );
        code.title = Some("Code".into());

        let mut lines = object("lines", vec![qty, Field::new("sku", FieldKind::default(), None)]);
        lines.array = Some(ItemBounds::default());

        let forest = vec![
            object("order", vec![code, Field::new("placed", FieldKind::DateTime, None), lines]),
            tags,
            Field::new("due", FieldKind::Date, None),
        ];

        let back = import(&compile(&forest, &ReusableTypes::new()));
        assert_eq!(back.iter().map(shape).collect::<Vec<_>>(), forest.iter().map(shape).collect::<Vec<_>>());
    }

    #[test]
    fn ids_are_fresh_and_parents_wired() {
        let doc = json!({
            "type": "object",
            "properties": {
                "a": { "type": "object", "properties": { "b": { "type": "string" } }, "required": ["b"] },
                "c": { "type": "string" }
            },
            "required": ["a"]
        });
        let one = import(&doc);
        let two = import(&doc);
        let ix1 = TreeIndex::build(&one);
        let ix2 = TreeIndex::build(&two);
        assert_eq!(ix1.len(), 3);
        assert!(ix1.ids().all(|id| !ix2.contains(id)));

        assert!(one[0].is_required);
        assert!(!one[1].is_required);
        let b = &one[0].children().unwrap()[0];
        assert_eq!(b.parent_id, Some(one[0].id));
        assert!(b.is_required);
        assert!(one[0].parent_id.is_none());
    }

    #[test]
    fn numbers_import_as_integer_and_formats_map() {
        let doc = json!({
            "properties": {
                "price": { "type": "number", "minimum": 0.5 },
                "count": { "type": "integer" },
                "day": { "type": "string", "format": "date" },
                "at": { "type": ["string", "null"], "format": "date-time" }
            }
        });
        let fields = import(&doc);
        assert_eq!(fields[0].kind, FieldKind::Integer(NumericBounds { min_value: Some(0.5), max_value: None }));
        assert_eq!(fields[1].kind.tag(), Kind::Integer);
        assert_eq!(fields[2].kind, FieldKind::Date);
        assert_eq!(fields[3].kind, FieldKind::DateTime);
        assert!(fields.iter().all(|f| !f.is_required), "no `required` list");
    }

    #[test]
    fn unsupported_constructs_default_to_string_with_diagnostics() {
        let doc = json!({
            "properties": {
                "flag": { "type": "boolean" },
                "list": { "type": "array" },
                "loose": { "type": "array", "items": { "description": "??" } },
                "mail": { "type": "string", "format": "email" },
                "bare": {}
            }
        });
        let out = import_with(&doc, &ImportOptions::default());
        assert!(out.fields.iter().all(|f| f.kind.tag() == Kind::String));
        assert!(out.fields[1].is_array() && out.fields[2].is_array());
        assert_eq!(out.fields[2].description.as_deref(), Some("??"));
        assert_eq!(out.diagnostics.len(), 5);
        assert_eq!(
            out.diagnostics[0],
            Diagnostic::ImportAmbiguity {
                path: "/properties/flag".into(),
                detail: "unsupported type `boolean`, using string".into(),
            }
        );
    }

    #[test]
    fn example_is_coerced_to_text() {
        let doc = json!({
            "properties": {
                "n": { "type": "number", "example": 42 },
                "s": { "type": "string", "examples": ["first", "second"] }
            }
        });
        let fields = import(&doc);
        assert_eq!(fields[0].example.as_deref(), Some("42"));
        assert_eq!(fields[1].example.as_deref(), Some("first"));
    }

    #[test]
    fn refs_stay_unresolved_by_default() {
        let doc = json!({
            "properties": { "home": { "$ref": "#/definitions/Address" } },
            "definitions": { "Address": { "type": "object", "properties": { "city": { "type": "string" } } } }
        });
        let out = import_with(&doc, &ImportOptions::default());
        assert!(out.reusable_types.is_empty());
        assert_eq!(out.fields[0].kind.tag(), Kind::String);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn definitions_become_reusable_types_when_asked() {
        let (types, money) = ReusableTypes::new().add_type("Money");
        let amount = Field::new(
            "amount",
            FieldKind::Currency(CurrencyRules { currency_code: Some("EUR".into()), ..Default::default() }),
            Some(money),
        );
        let types = ReusableTypes::from_roots(add_field_with(types.as_slice(), Some(money), amount));
        let mut price = Field::new("price", FieldKind::Reference { reference_id: Some(money) }, None);
        price.is_required = false;
        let doc = compile(&[price], &types);

        let out = import_with(&doc, &ImportOptions { resolve_definitions: true });
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let imported = out.reusable_types.by_name("Money").unwrap();
        assert_ne!(imported.id, money);
        assert_eq!(out.fields[0].reference_id(), Some(imported.id));
        assert!(!out.fields[0].is_required);
        let child = &imported.children().unwrap()[0];
        assert_eq!(child.name, "amount");
        assert_eq!(child.parent_id, Some(imported.id));
        // currency has no JSON Schema type of its own; it comes back as a patterned string
        assert_eq!(child.kind.tag(), Kind::String);
    }

    #[test]
    fn empty_property_name_gets_a_unique_placeholder() {
        let doc = json!({
            "properties": {
                "": { "type": "string" },
                "field": { "type": "string" }
            },
            "required": [""]
        });
        let out = import_with(&doc, &ImportOptions::default());
        let names: Vec<_> = out.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["field1", "field"]);
        assert!(out.fields[0].is_required);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::ImportAmbiguity {
                path: "/properties/".into(),
                detail: "empty property name, imported as `field1`".into(),
            }]
        );

        // nothing vanishes on the way back out
        let doc = compile(&out.fields, &ReusableTypes::new());
        assert_eq!(doc["required"], json!(["field1", "field"]));
        assert_eq!(doc["properties"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn non_string_enum_members_are_reported() {
        let doc = json!({
            "properties": { "pick": { "type": "string", "enum": ["a", 1, null, "1", true] } }
        });
        let out = import_with(&doc, &ImportOptions::default());
        assert_eq!(
            out.fields[0].kind,
            FieldKind::Dropdown { options: vec!["a".into(), "1".into(), "true".into()] }
        );
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::ImportAmbiguity {
                path: "/properties/pick".into(),
                detail: "non-string enum members [1, true] converted to text; `null` enum member dropped".into(),
            }]
        );

        let clean = import_with(&json!({ "properties": { "p": { "type": "string", "enum": ["x"] } } }), &ImportOptions::default());
        assert!(clean.diagnostics.is_empty());
    }

    #[test]
    fn dangling_ref_with_resolution_on_is_reported() {
        let doc = json!({ "properties": { "x": { "$ref": "#/definitions/Nope" } } });
        let out = import_with(&doc, &ImportOptions { resolve_definitions: true });
        assert_eq!(out.fields[0].kind.tag(), Kind::String);
        assert_eq!(out.diagnostics.len(), 1);
    }
}
