//! Loads blueprint YAML files (spec.md §6) into a [`populace_core::Blueprint`].
//! Later files override earlier ones' vars and items, matching the `run`
//! command's documented file-merge order.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use populace_core::blueprint::Blueprint;
use populace_core::count::Count;
use populace_core::error::{Error, Result};
use populace_core::expr::Expr;
use populace_core::generator::boolean::BooleanGen;
use populace_core::generator::choices::{ChoicesSource, DynamicChoices};
use populace_core::generator::numeric::{FloatGen, IntegerGen};
use populace_core::generator::special::UuidGen;
use populace_core::generator::string::{
    AddressGen, CityGen, CompanyGen, EmailGen, FirstNameGen, FullNameGen, Gender, IpAddressGen,
    JobTitleGen, LastNameGen, LoremGen, TextGen, UrlGen,
};
use populace_core::generator::temporal::{DateGen, DateTimeGen, DateWindow, TimeGen, TimeTzGen};
use populace_core::generator::{Generator, Nullable, Unique};
use populace_core::item::{Field, FieldKind, Item, StoreBinding, StoreTarget, UniqueWith};
use populace_core::value::Value;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct BlueprintFile {
    #[serde(default)]
    vars: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    items: Vec<ItemSpec>,
}

#[derive(Debug, Deserialize)]
struct ItemSpec {
    name: String,
    parent: Option<String>,
    table: Option<String>,
    #[serde(default)]
    count: Option<CountSpec>,
    #[serde(default)]
    fields: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    store_in: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct CountSpec {
    number: Option<serde_yaml::Value>,
    min: Option<serde_yaml::Value>,
    max: Option<serde_yaml::Value>,
    by: Option<String>,
}

/// Loads and merges every blueprint file in order, then returns the
/// assembled `Blueprint`, ready for `preload_existing`/`generate`.
pub fn load_files(seed: u64, paths: &[impl AsRef<Path>]) -> std::result::Result<Blueprint, CliError> {
    let mut blueprint = Blueprint::new(seed);
    let mut item_specs: Vec<ItemSpec> = Vec::new();
    let mut item_positions: HashMap<String, usize> = HashMap::new();

    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: BlueprintFile =
            serde_yaml::from_str(&text).map_err(|source| CliError::Yaml {
                file: path.display().to_string(),
                source,
            })?;

        for (name, raw) in file.vars {
            blueprint.set_var(name, yaml_to_value(&raw));
        }

        for item in file.items {
            match item_positions.get(&item.name) {
                Some(&idx) => item_specs[idx] = item,
                None => {
                    item_positions.insert(item.name.clone(), item_specs.len());
                    item_specs.push(item);
                }
            }
        }
    }

    let mut built: HashMap<String, Item> = HashMap::new();
    for spec in item_specs {
        let item = build_item(&mut blueprint, &spec, &built)?;
        built.insert(item.name.clone(), item.clone());
        blueprint.add_item(item).map_err(CliError::Validation)?;
    }

    Ok(blueprint)
}

fn build_item(
    blueprint: &mut Blueprint,
    spec: &ItemSpec,
    built: &HashMap<String, Item>,
) -> std::result::Result<Item, CliError> {
    let base = match &spec.parent {
        Some(parent_name) => {
            let parent = built.get(parent_name).ok_or_else(|| {
                CliError::Validation(Error::validation_in(
                    &spec.name,
                    format!("parent `{parent_name}` is not declared before this item"),
                ))
            })?;
            parent.inherit(spec.name.clone())
        }
        None => {
            let table = spec.table.clone().ok_or_else(|| {
                CliError::Validation(Error::validation_in(
                    &spec.name,
                    "item has no parent and no `table`",
                ))
            })?;
            Item::new(spec.name.clone(), table, Count::Fixed(Expr::Literal(Value::Int(1))))
        }
    };

    let mut item = base;
    item.name = spec.name.clone();
    if let Some(table) = &spec.table {
        item.table = table.clone();
    }
    if let Some(count_spec) = &spec.count {
        item.count = build_count(count_spec)?;
    }

    for (field_name, raw) in &spec.fields {
        let field = build_field(blueprint, &item.table, field_name, raw)?;
        item.add_field(field_name.clone(), field);
    }

    for (target, expr_src) in &spec.store_in {
        let expr = Expr::parse(&Value::Str(expr_src.clone()));
        if let Some(rest) = target.strip_prefix("this.") {
            let (target_item, target_field) = rest.split_once('.').ok_or_else(|| {
                CliError::Validation(Error::validation_in(
                    &spec.name,
                    format!("store_in key `{target}` must be `this.<item>.<field>`"),
                ))
            })?;
            blueprint
                .add_field_to_item(target_item, target_field, Field::new(FieldKind::Store))
                .map_err(CliError::Validation)?;
            item.add_store_in(StoreBinding {
                target: StoreTarget::Item {
                    item: target_item.to_string(),
                    field: target_field.to_string(),
                },
                expr,
            });
        } else {
            blueprint.store_var(target);
            item.add_store_in(StoreBinding {
                target: StoreTarget::Global(target.clone()),
                expr,
            });
        }
    }

    Ok(item)
}

fn build_count(spec: &CountSpec) -> std::result::Result<Count, CliError> {
    let number_expr = |v: &serde_yaml::Value| Expr::parse(&yaml_to_value(v));

    if let Some(parent) = &spec.by {
        let number = spec
            .number
            .as_ref()
            .map(number_expr)
            .unwrap_or_else(|| Expr::Literal(Value::Int(1)));
        return Ok(Count::By {
            parent: parent.clone(),
            number,
        });
    }

    if let (Some(min), Some(max)) = (&spec.min, &spec.max) {
        return Ok(Count::Ranged {
            min: number_expr(min),
            max: number_expr(max),
        });
    }

    if let Some(number) = &spec.number {
        return Ok(Count::Fixed(number_expr(number)));
    }

    Err(CliError::Validation(Error::validation(
        "count must set `number`, `min`/`max`, or `by`",
    )))
}

fn build_field(
    blueprint: &mut Blueprint,
    table: &str,
    field_name: &str,
    raw: &serde_yaml::Value,
) -> std::result::Result<Field, CliError> {
    let Some(mapping) = raw.as_mapping() else {
        // Shorthand: a bare literal/expression value.
        return Ok(Field::new(FieldKind::Expression(Expr::parse(&yaml_to_value(raw)))));
    };

    let Some(generator_name) = mapping.get("generator").and_then(|v| v.as_str()) else {
        // A plain mapping with no `generator` key is a literal row value.
        return Ok(Field::new(FieldKind::Expression(Expr::Literal(yaml_to_value(raw)))));
    };

    let get = |key: &str| mapping.get(key);
    let get_str = |key: &str| get(key).and_then(|v| v.as_str()).map(str::to_string);
    let get_usize = |key: &str, default: usize| {
        get(key).and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(default)
    };
    let get_f64 = |key: &str, default: f64| get(key).and_then(|v| v.as_f64()).unwrap_or(default);
    let get_i64 = |key: &str, default: i64| get(key).and_then(|v| v.as_i64()).unwrap_or(default);

    // `unique` either names one sibling field or a list of sibling fields
    // whose already-resolved `this.<field>` values, plus this field's own
    // value, make up a composite tuple key (spec.md §4.3's `unique_with`,
    // e.g. "unique firstname with [lastname, birth]"). A bare `true`
    // instead falls through to `wrap_nullable_unique`'s plain, single-field
    // `Unique` generator wrapper.
    let unique_with = match get("unique") {
        Some(serde_yaml::Value::String(sibling)) => Some(vec![sibling.clone()]),
        Some(serde_yaml::Value::Sequence(siblings)) => Some(
            siblings
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    let kind = match generator_name {
        "Value" | "Yaml" => {
            let value = get("value").map(yaml_to_value).unwrap_or(Value::Null);
            FieldKind::Expression(Expr::Literal(value))
        }
        "Select" => {
            let select_table = get_str("table").ok_or_else(|| {
                CliError::Validation(Error::validation_field(
                    table,
                    field_name,
                    "Select generator requires `table`",
                ))
            })?;
            FieldKind::Select {
                table: select_table,
                column: get_str("pk").unwrap_or_else(|| "id".to_string()),
                where_expr: get_str("where").map(|w| Expr::parse(&Value::Str(w))),
                max_pool: get_usize("max", 1000),
            }
        }
        "Store" => FieldKind::Store,
        "Choices" => {
            let raw_choices = get("choices").ok_or_else(|| {
                CliError::Validation(Error::validation_field(
                    table,
                    field_name,
                    "Choices generator requires a `choices` list or `$var` reference",
                ))
            })?;
            let source = match raw_choices.as_sequence() {
                Some(choices) => {
                    ChoicesSource::Literal(choices.iter().map(|v| Expr::parse(&yaml_to_value(v))).collect())
                }
                None => ChoicesSource::ListRef(Expr::parse(&yaml_to_value(raw_choices))),
            };
            let nullable = match get("nullable") {
                None => false,
                Some(serde_yaml::Value::Bool(b)) => *b,
                Some(serde_yaml::Value::Number(_)) => get_f64("nullable", 0.0) > 0.0,
                Some(_) => true,
            };
            FieldKind::Choices(DynamicChoices { source, nullable })
        }
        name => {
            let generator = build_catalog_generator(table, field_name, name, &get, &get_str, &get_usize, &get_f64, &get_i64)?;
            let wrapped = if unique_with.is_some() {
                // Composite uniqueness is checked at the Field level below;
                // skip the plain single-field wrapper so the raw value
                // isn't checked against the wrong bloom filter twice.
                wrap_nullable(generator, &get, &get_f64)
            } else {
                wrap_nullable_unique(blueprint, table, field_name, generator, &get, &get_f64)
            };
            FieldKind::Generator(Rc::from(wrapped))
        }
    };

    let mut field = Field::new(kind);
    if let Some(siblings) = unique_with {
        let key = format!("{field_name}+{}", siblings.join("+"));
        let seen = blueprint.bloom_handle(table, &key);
        field = field.with_unique_with(UniqueWith { siblings, seen, max_attempts: 10_000 });
    }
    Ok(field)
}

type Getter<'a> = dyn Fn(&str) -> Option<&'a serde_yaml::Value> + 'a;
type StrGetter<'a> = dyn Fn(&str) -> Option<String> + 'a;
type UsizeGetter<'a> = dyn Fn(&str, usize) -> usize + 'a;
type F64Getter<'a> = dyn Fn(&str, f64) -> f64 + 'a;
type I64Getter<'a> = dyn Fn(&str, i64) -> i64 + 'a;

fn build_catalog_generator(
    table: &str,
    field_name: &str,
    name: &str,
    _get: &Getter<'_>,
    get_str: &StrGetter<'_>,
    get_usize: &UsizeGetter<'_>,
    get_f64: &F64Getter<'_>,
    get_i64: &I64Getter<'_>,
) -> std::result::Result<Box<dyn Generator>, CliError> {
    let gender = |s: Option<String>| match s.as_deref() {
        Some("M") => Gender::Male,
        Some("F") => Gender::Female,
        _ => Gender::Any,
    };

    // Bounds default to epoch-year Jan 1 / year-2100 Jan 1 when `after`/
    // `before` aren't given; the `past`/`future` toggles that would narrow
    // this further against the current instant are a documented
    // simplification (DESIGN.md).
    let window = || DateWindow {
        start: get_str("after").as_deref().and_then(parse_date).unwrap_or((1970, 1, 1)),
        end: get_str("before").as_deref().and_then(parse_date).unwrap_or((2100, 1, 1)),
    };

    Ok(match name {
        "Boolean" => Box::new(BooleanGen { probability_true: get_f64("ratio", 0.5) }),
        "Integer" => Box::new(IntegerGen {
            min: get_i64("min", 0),
            max: get_i64("max", i32::MAX as i64),
        }),
        "Float" => Box::new(FloatGen { min: get_f64("min", 0.0), max: get_f64("max", 1.0) }),
        "Text" => Box::new(TextGen {
            min_len: get_usize("min_length", 8),
            max_len: get_usize("max_length", 16),
            chars: get_str("chars"),
        }),
        "Lorem" => Box::new(LoremGen { words: get_usize("words", 6) }),
        "FirstName" => Box::new(FirstNameGen { gender: gender(get_str("gender")) }),
        "LastName" => Box::new(LastNameGen),
        "Name" => Box::new(FullNameGen { gender: gender(get_str("gender")) }),
        "Email" => Box::new(EmailGen),
        "City" => Box::new(CityGen),
        "Address" => Box::new(AddressGen),
        "JobTitle" => Box::new(JobTitleGen),
        "Company" => Box::new(CompanyGen),
        "IP" => Box::new(IpAddressGen),
        "URL" => Box::new(UrlGen),
        "Date" => Box::new(DateGen { window: window() }),
        "DateTime" => Box::new(DateTimeGen { window: window() }),
        "Time" => Box::new(TimeGen),
        "TimeTz" => Box::new(TimeTzGen),
        "UUID" => Box::new(UuidGen),
        other => {
            return Err(CliError::Validation(Error::validation_field(
                table,
                field_name,
                format!("unknown generator `{other}`"),
            )));
        }
    })
}

fn wrap_nullable_unique(
    blueprint: &mut Blueprint,
    table: &str,
    field_name: &str,
    inner: Box<dyn Generator>,
    get: &Getter<'_>,
    get_f64: &F64Getter<'_>,
) -> Box<dyn Generator> {
    let mut current = inner;

    if let Some(serde_yaml::Value::Bool(true)) = get("unique") {
        let handle = blueprint.bloom_handle(table, field_name);
        current = Box::new(Unique::with_shared(current, handle));
    }

    wrap_nullable(current, get, get_f64)
}

fn wrap_nullable(
    inner: Box<dyn Generator>,
    get: &Getter<'_>,
    get_f64: &F64Getter<'_>,
) -> Box<dyn Generator> {
    let mut current = inner;
    if let Some(nullable) = get("nullable") {
        let probability = match nullable {
            serde_yaml::Value::Bool(true) => Some(0.5),
            serde_yaml::Value::Bool(false) => None,
            serde_yaml::Value::Number(_) => Some(get_f64("nullable", 0.5)),
            _ => None,
        };
        if let Some(probability) = probability {
            current = Box::new(Nullable { inner: current, probability });
        }
    }
    current
}

fn parse_date(s: &str) -> Option<(i64, u32, u32)> {
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [y] => y.parse().ok().map(|y| (y, 1, 1)),
        [y, m, d] => Some((y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)),
        _ => None,
    }
}

/// Converts a parsed YAML node into the engine's dynamic `Value`.
pub fn yaml_to_value(raw: &serde_yaml::Value) -> Value {
    match raw {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => Value::Str(s.clone()),
        serde_yaml::Value::Sequence(seq) => Value::List(seq.iter().map(yaml_to_value).collect()),
        serde_yaml::Value::Mapping(map) => {
            let mut out = HashMap::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    out.insert(key.to_string(), yaml_to_value(v));
                }
            }
            Value::Row(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

pub type LoaderResult<T> = Result<T>;
