//! CLI: compile | import | edit | request
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use crate::diagnostics::Diagnostic;
use crate::emit::compile_schema;
use crate::import::{import_with, ImportOptions};
use crate::index::find;
use crate::ir::{Field, FieldId, FieldKind, Kind, Schema};
use crate::mutate::{Direction, Edit};
use crate::project;
use crate::provider::{strategy_for, RequestInput, PROVIDERS};
use crate::session::Session;
use crate::store::DirStore;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build JSON Schema documents from editable field trees, and back
#[derive(Parser, Debug)]
#[command(name = "schema-forge", version)]
pub struct CommandLineInterface {
    /// log at debug level (RUST_LOG still wins when set)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile project documents into JSON Schema
    Compile(CompileOut),
    /// import JSON Schema documents into project documents
    Import(ImportOut),
    /// edit a stored project one operation at a time
    Edit(EditCmd),
    /// construct (not send) a structured-output request for an LLM provider
    Request(RequestOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CompileOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ImportOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// rebuild `definitions` as reusable types and `$ref`s as references
    #[arg(long, default_value_t = false)]
    resolve_definitions: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct EditCmd {
    /// directory holding stored projects
    #[arg(long, default_value = ".schema-forge")]
    store: PathBuf,

    /// project key inside the store
    #[arg(long, default_value = "default")]
    key: String,

    #[command(subcommand)]
    op: EditOp,
}

#[derive(Subcommand, Debug)]
enum EditOp {
    /// append a blank field (as a root, or under an object / reusable type)
    Add {
        #[arg(long)]
        parent: Option<FieldId>,
    },
    /// delete a field and its subtree
    Remove { id: FieldId },
    /// rename a field or reusable type
    Rename { id: FieldId, name: String },
    /// change a field's kind (string, integer, float, currency, date, datetime, object, dropdown, reference)
    Kind { id: FieldId, kind: Kind },
    /// make a field a list (true) or a single value (false)
    Array {
        id: FieldId,
        #[arg(action = ArgAction::Set)]
        on: bool,
    },
    /// mark a field required (true) or optional (false)
    Required {
        id: FieldId,
        #[arg(action = ArgAction::Set)]
        on: bool,
    },
    /// swap a field with its neighbour (up|down)
    Move {
        id: FieldId,
        direction: Direction,
        /// containing field; omit for the root list
        #[arg(long)]
        parent: Option<FieldId>,
    },
    /// move `active` to the position of `over` (same sibling list only)
    Reorder { active: FieldId, over: FieldId },
    /// set kind-specific attributes and metadata (an empty text value clears it)
    Set {
        id: FieldId,
        #[command(flatten)]
        attrs: SetAttrs,
    },
    /// turn an object field into a reusable type and reference it
    Promote { id: FieldId },
    /// create an empty reusable type
    AddType { name: String },
    /// delete a reusable type (references to it dangle)
    RemoveType { id: FieldId },
    /// replace the stored project with a file's contents
    Load {
        path: PathBuf,
        /// treat the file as JSON Schema and import it
        #[arg(long, default_value_t = false)]
        import: bool,
        #[arg(long, default_value_t = false)]
        resolve_definitions: bool,
    },
    /// print the tree with ids, or the compiled document
    Show {
        #[arg(long, default_value_t = false)]
        compiled: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct SetAttrs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    example: Option<String>,

    /// dropdown options, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    options: Option<Vec<String>>,

    /// string: regex the value must match
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long)]
    min_length: Option<u64>,
    #[arg(long)]
    max_length: Option<u64>,

    /// integer | float | currency: lower bound
    #[arg(long, allow_negative_numbers = true)]
    min: Option<f64>,
    /// integer | float | currency: upper bound
    #[arg(long, allow_negative_numbers = true)]
    max: Option<f64>,

    /// currency: ISO code (USD, EUR, ...)
    #[arg(long)]
    currency: Option<String>,

    /// list fields: item count bounds
    #[arg(long)]
    min_items: Option<u64>,
    #[arg(long)]
    max_items: Option<u64>,
}

#[derive(clap::Parser, Debug)]
struct RequestOut {
    /// project document to compile
    #[arg(long, short)]
    input: PathBuf,

    /// provider id (openai | anthropic)
    #[arg(long)]
    provider: String,

    /// user prompt placed in the request
    #[arg(long)]
    prompt: String,

    /// model override; the provider default otherwise
    #[arg(long)]
    model: Option<String>,

    /// env var holding the API key (defaults to <PROVIDER>_API_KEY)
    #[arg(long)]
    api_key_env: Option<String>,

    /// schema/tool name shown to the provider
    #[arg(long, default_value = "schema")]
    name: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Compile(target) => {
                let mut outputs = Vec::new();
                for path in target.input_settings.paths()? {
                    let schema = project::load_schema(&path)
                        .with_context(|| format!("failed to load project {}", path.display()))?;
                    let compiled = compile_schema(&schema);
                    report(&path, &compiled.diagnostics);
                    outputs.push((path, compiled.document));
                }
                emit(target.out.as_deref(), &collect_outputs(outputs))
            }
            Command::Import(target) => {
                let options = ImportOptions { resolve_definitions: target.resolve_definitions };
                let mut outputs = Vec::new();
                for path in target.input_settings.paths()? {
                    let document = project::load_value(&path)
                        .with_context(|| format!("failed to parse JSON Schema {}", path.display()))?;
                    let imported = import_with(&document, &options);
                    report(&path, &imported.diagnostics);
                    outputs.push((path, serde_json::to_value(imported.into_schema())?));
                }
                emit(target.out.as_deref(), &collect_outputs(outputs))
            }
            Command::Edit(target) => target.run(),
            Command::Request(target) => target.run(),
        }
    }
}

impl EditCmd {
    fn run(&self) -> anyhow::Result<()> {
        let store = DirStore::new(&self.store);
        let mut session = Session::open(store, self.key.as_str())
            .with_context(|| format!("failed to open `{}` in {}", self.key, self.store.display()))?;

        let edit = match &self.op {
            EditOp::Show { compiled: true } => {
                let compiled = session.compile();
                report(Path::new(session.key()), &compiled.diagnostics);
                return emit(None, &compiled.document);
            }
            EditOp::Show { compiled: false } => {
                print_tree(session.schema());
                return Ok(());
            }
            EditOp::Load { path, import, resolve_definitions } => {
                let schema = if *import {
                    let document = project::load_value(path)?;
                    let imported = import_with(
                        &document,
                        &ImportOptions { resolve_definitions: *resolve_definitions },
                    );
                    report(path, &imported.diagnostics);
                    imported.into_schema()
                } else {
                    project::load_schema(path)?
                };
                session.replace(schema);
                session.save()?;
                print_tree(session.schema());
                return Ok(());
            }
            EditOp::Add { parent } => Edit::Add { parent_id: *parent },
            EditOp::Remove { id } => Edit::Remove(*id),
            EditOp::Rename { id, name } => Edit::Rename { id: *id, name: name.clone() },
            EditOp::Kind { id, kind } => Edit::ChangeKind { id: *id, kind: *kind },
            EditOp::Array { id, on } => Edit::SetArray { id: *id, is_array: *on },
            EditOp::Required { id, on } => Edit::SetRequired { id: *id, is_required: *on },
            EditOp::Move { id, direction, parent } => {
                Edit::Move { id: *id, direction: *direction, parent_id: *parent }
            }
            EditOp::Reorder { active, over } => Edit::Reorder { active: *active, over: *over },
            EditOp::Set { id, attrs } => {
                let schema = session.schema();
                let field = find(&schema.fields, id)
                    .or_else(|| find(schema.reusable_types.as_slice(), id))
                    .with_context(|| format!("no field {id} in `{}`", self.key))?;
                Edit::Update(attrs.applied_to(field)?)
            }
            EditOp::Promote { id } => Edit::Promote(*id),
            EditOp::AddType { name } => Edit::AddType { name: name.clone() },
            EditOp::RemoveType { id } => Edit::RemoveType(*id),
        };

        let diagnostics = session.apply(&edit);
        report(Path::new(session.key()), &diagnostics);
        session.save()?;
        print_tree(session.schema());
        Ok(())
    }
}

impl SetAttrs {
    /// Copy of `field` with the given attributes set. Attributes the field's
    /// kind doesn't carry are rejected rather than dropped.
    fn applied_to(&self, field: &Field) -> anyhow::Result<Field> {
        let mut f = field.clone();
        if let Some(v) = &self.title {
            f.title = non_empty(v);
        }
        if let Some(v) = &self.description {
            f.description = non_empty(v);
        }
        if let Some(v) = &self.example {
            f.example = non_empty(v);
        }

        if let Some(values) = &self.options {
            let FieldKind::Dropdown { options } = &mut f.kind else {
                return Err(mismatch("--options", "dropdown", field));
            };
            options.clear();
            for v in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
                if !options.iter().any(|o| o == v) {
                    options.push(v.to_string());
                }
            }
        }

        if self.pattern.is_some() || self.min_length.is_some() || self.max_length.is_some() {
            let FieldKind::String(rules) = &mut f.kind else {
                return Err(mismatch("--pattern/--min-length/--max-length", "string", field));
            };
            if let Some(p) = &self.pattern {
                if !p.is_empty() {
                    regex::Regex::new(p).with_context(|| format!("invalid --pattern `{p}`"))?;
                }
                rules.pattern = non_empty(p);
            }
            if let Some(n) = self.min_length {
                rules.min_length = Some(n);
            }
            if let Some(n) = self.max_length {
                rules.max_length = Some(n);
            }
        }

        if self.min.is_some() || self.max.is_some() {
            let bounds = match &mut f.kind {
                FieldKind::Integer(b) | FieldKind::Float(b) => b,
                FieldKind::Currency(c) => &mut c.bounds,
                _ => return Err(mismatch("--min/--max", "integer, float or currency", field)),
            };
            if let Some(m) = self.min {
                bounds.min_value = Some(m);
            }
            if let Some(m) = self.max {
                bounds.max_value = Some(m);
            }
        }

        if let Some(code) = &self.currency {
            let FieldKind::Currency(c) = &mut f.kind else {
                return Err(mismatch("--currency", "currency", field));
            };
            c.currency_code = non_empty(&code.to_ascii_uppercase());
        }

        if self.min_items.is_some() || self.max_items.is_some() {
            let Some(bounds) = f.array.as_mut() else {
                bail!("--min-items/--max-items need a list field; `{}` is a single value", field.name);
            };
            if let Some(n) = self.min_items {
                bounds.min_items = Some(n);
            }
            if let Some(n) = self.max_items {
                bounds.max_items = Some(n);
            }
        }

        Ok(f)
    }
}

impl RequestOut {
    fn run(&self) -> anyhow::Result<()> {
        let strategy = strategy_for(&self.provider)
            .with_context(|| format!("known providers: {}", PROVIDERS.join(", ")))?;
        let schema = project::load_schema(&self.input)
            .with_context(|| format!("failed to load project {}", self.input.display()))?;
        let compiled = compile_schema(&schema);
        report(&self.input, &compiled.diagnostics);

        let key_var = self
            .api_key_env
            .clone()
            .unwrap_or_else(|| format!("{}_API_KEY", strategy.id().to_ascii_uppercase()));
        let api_key = std::env::var(&key_var).ok();
        if api_key.is_none() {
            log::warn!("{key_var} is not set; the request carries a placeholder key");
        }

        let spec = strategy.build(&RequestInput {
            document: &compiled.document,
            prompt: &self.prompt,
            model: self.model.as_deref(),
            api_key: api_key.as_deref(),
            schema_name: &self.name,
        });
        let mut shown = serde_json::to_value(&spec)?;
        if let Some(key) = api_key.as_deref() {
            redact(&mut shown, key);
        }
        emit(self.out.as_deref(), &shown)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn collect_outputs(mut outputs: Vec<(PathBuf, Value)>) -> Value {
    if outputs.len() == 1 {
        return outputs.remove(0).1;
    }
    Value::Object(
        outputs
            .into_iter()
            .map(|(path, v)| (path.to_string_lossy().to_string(), v))
            .collect(),
    )
}

fn emit(out: Option<&Path>, value: &Value) -> anyhow::Result<()> {
    let src = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => project::write_file(path, &src)?,
        None => println!("{src}"),
    }
    Ok(())
}

fn report(source: &Path, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    eprintln!(
        "{} {}: {} diagnostic(s)",
        "warning:".yellow().bold(),
        source.display(),
        diagnostics.len()
    );
    for d in diagnostics {
        eprintln!("  {} {d}", "-".yellow());
    }
}

fn print_tree(schema: &Schema) {
    fn walk(list: &[Field], depth: usize) {
        for f in list {
            let name = if f.name.is_empty() { "<unnamed>".italic().to_string() } else { f.name.bold().to_string() };
            let mut kind = f.kind.tag().to_string();
            if f.is_array() {
                kind.push_str("[]");
            }
            if !f.is_required {
                kind.push('?');
            }
            println!("{}{name}: {} {}", "  ".repeat(depth), kind.cyan(), f.id.to_string().dimmed());
            if let Some(kids) = f.children() {
                walk(kids, depth + 1);
            }
        }
    }
    println!("{}", "fields".underline());
    walk(&schema.fields, 1);
    if !schema.reusable_types.is_empty() {
        println!("{}", "reusable types".underline());
        walk(schema.reusable_types.as_slice(), 1);
    }
}

fn non_empty(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

fn mismatch(flag: &str, expected: &str, field: &Field) -> anyhow::Error {
    anyhow!("{flag} applies to {expected} fields; `{}` is {}", field.name, field.kind.tag())
}

/// Masks the key wherever it shows up in the printed request.
fn redact(v: &mut Value, secret: &str) {
    match v {
        Value::String(s) if s.contains(secret) => *s = s.replace(secret, "<redacted>"),
        Value::Array(xs) => xs.iter_mut().for_each(|x| redact(x, secret)),
        Value::Object(m) => m.values_mut().for_each(|x| redact(x, secret)),
        _ => {}
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
