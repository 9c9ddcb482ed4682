//! Expression system: the three expression flavors a blueprint field value
//! or count can be written as.
//!
//! - `ValueExpression` — a bare `$var` or `$var.path` reference, resolved
//!   by direct lookup, no template engine involved.
//! - `JinjaValueExpression` — `$(expr)`, a single Jinja expression
//!   evaluated through `minijinja`, with a `random` filter registered for
//!   uniform choice over a sequence.
//! - `TemplateExpression` — a `{{ }}`/`{% %}` string template, also run
//!   through `minijinja`, producing a string result.

use std::collections::HashMap;
use std::sync::OnceLock;

use minijinja::value::Value as JinjaValue;
use minijinja::{Environment, Error as JinjaError, ErrorKind};

use crate::error::{Error, Result};
use crate::value::Value;

/// A parsed field expression, ready to be evaluated against a row's
/// in-progress field values (`this.<field>`) and the blueprint's vars.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value with no substitution.
    Literal(Value),
    /// `$var` or `$var.path.to.field`.
    ValueRef(String),
    /// `$(expr)` — raw minijinja expression source.
    Jinja(String),
    /// `{{ }}` / `{% %}` — minijinja template source.
    Template(String),
}

impl Expr {
    /// Parses a raw YAML scalar into an `Expr`, detecting which of the
    /// three forms (if any) it uses. Non-string scalars never carry
    /// expressions and parse as literals.
    pub fn parse(raw: &Value) -> Expr {
        let s = match raw {
            Value::Str(s) => s,
            other => return Expr::Literal(other.clone()),
        };

        if let Some(inner) = s.strip_prefix("$(").and_then(|s| s.strip_suffix(')')) {
            return Expr::Jinja(inner.to_string());
        }
        if let Some(rest) = s.strip_prefix('$') {
            if !rest.is_empty()
                && rest
                    .chars()
                    .next()
                    .map(|c| c.is_alphabetic() || c == '_')
                    .unwrap_or(false)
            {
                return Expr::ValueRef(rest.to_string());
            }
        }
        if s.contains("{{") || s.contains("{%") {
            return Expr::Template(s.clone());
        }
        Expr::Literal(Value::Str(s.clone()))
    }

    pub fn eval(&self, env: &EvalEnv<'_>) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::ValueRef(path) => env.resolve_path(path),
            Expr::Jinja(src) => {
                let rendered = jinja_env()
                    .compile_expression(src)
                    .and_then(|expr| expr.eval(env.to_jinja_context()))
                    .map_err(|e| Error::generation(format!("expression `{src}` failed: {e}")))?;
                Ok(jinja_to_value(&rendered))
            }
            Expr::Template(src) => {
                let rendered = jinja_env()
                    .render_named_str("<inline>", src, env.to_jinja_context())
                    .map_err(|e| Error::generation(format!("template failed: {e}")))?;
                Ok(Value::Str(rendered))
            }
        }
    }
}

/// The variable scope an expression is evaluated against: the blueprint's
/// global `vars`, plus `this`, the in-progress fields of the row currently
/// being generated.
pub struct EvalEnv<'a> {
    pub vars: &'a HashMap<String, Value>,
    pub this: &'a HashMap<String, Value>,
}

impl<'a> EvalEnv<'a> {
    pub fn resolve_path(&self, path: &str) -> Result<Value> {
        let mut parts = path.splitn(2, '.');
        let head = parts.next().unwrap_or_default();
        let rest = parts.next();

        let root = if head == "this" {
            // Bare `this` resolves to the whole row-in-progress, so a
            // `store_in` binding can capture it wholesale (e.g. `$this`).
            let Some(field) = rest else {
                return Ok(Value::Row(self.this.clone()));
            };
            let mut segs = field.splitn(2, '.');
            let first = segs.next().unwrap();
            let value = self
                .this
                .get(first)
                .cloned()
                .ok_or_else(|| Error::generation(format!("unknown field `this.{first}`")))?;
            return match segs.next() {
                Some(remaining) => value
                    .get_path(remaining)
                    .ok_or_else(|| Error::generation(format!("unknown path `this.{field}`"))),
                None => Ok(value),
            };
        } else {
            self.vars
                .get(head)
                .cloned()
                .ok_or_else(|| Error::generation(format!("unknown variable `${head}`")))?
        };

        match rest {
            Some(path) => root
                .get_path(path)
                .ok_or_else(|| Error::generation(format!("unknown path `${path}`"))),
            None => Ok(root),
        }
    }

    fn to_jinja_context(&self) -> JinjaValue {
        let mut map = HashMap::new();
        for (k, v) in self.vars {
            map.insert(k.clone(), value_to_jinja(v));
        }
        map.insert(
            "this".to_string(),
            value_to_jinja(&Value::Row(self.this.clone())),
        );
        JinjaValue::from_serialize(&JinjaMap(map))
    }
}

/// Wrapper so we can hand a `HashMap<String, JinjaValue>` to
/// `from_serialize` without requiring `Value` itself to implement
/// `Serialize`.
struct JinjaMap(HashMap<String, JinjaValue>);

impl serde::Serialize for JinjaMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, &v.to_string())?;
        }
        map.end()
    }
}

fn value_to_jinja(value: &Value) -> JinjaValue {
    match value {
        Value::Null => JinjaValue::from(()),
        Value::Bool(b) => JinjaValue::from(*b),
        Value::Int(i) => JinjaValue::from(*i),
        Value::Float(f) => JinjaValue::from(*f),
        Value::Str(s) => JinjaValue::from(s.clone()),
        Value::List(l) => JinjaValue::from(l.iter().map(value_to_jinja).collect::<Vec<_>>()),
        Value::Row(r) => {
            let mut map = HashMap::new();
            for (k, v) in r {
                map.insert(k.clone(), value_to_jinja(v));
            }
            JinjaValue::from(map)
        }
        Value::Store(handle) => {
            JinjaValue::from(handle.borrow().iter().map(value_to_jinja).collect::<Vec<_>>())
        }
    }
}

fn jinja_to_value(value: &JinjaValue) -> Value {
    use minijinja::value::ValueKind;
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => Value::Null,
        ValueKind::Bool => Value::Bool(value.is_true()),
        ValueKind::Number => {
            if let Some(i) = value.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(value.as_f64().unwrap_or_default())
            }
        }
        ValueKind::String => Value::Str(value.as_str().unwrap_or_default().to_string()),
        ValueKind::Seq => {
            let items = value
                .try_iter()
                .map(|it| it.map(|v| jinja_to_value(&v)).collect())
                .unwrap_or_default();
            Value::List(items)
        }
        _ => Value::Str(value.to_string()),
    }
}

/// A uniform-choice filter over a sequence, raising when the sequence is
/// empty, matching populous' custom `random` Jinja filter.
fn random_filter(value: JinjaValue) -> core::result::Result<JinjaValue, JinjaError> {
    let len = value.len().unwrap_or(0);
    if len == 0 {
        return Err(JinjaError::new(
            ErrorKind::InvalidOperation,
            "`random` filter called on an empty sequence",
        ));
    }
    let idx = rand::random::<u64>() as usize % len;
    value
        .get_item_by_index(idx)
        .map_err(|e| JinjaError::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn jinja_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.add_filter("random", random_filter);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env
    })
}
