//! Composable condition expressions.
//!
//! A [`ConditionExpressionBuilder`] records structured clauses and renders
//! them on demand into an expression string plus name/value placeholder maps.
//! Placeholders come from one counter per render (`#n0`, `:v1`, ...), and an
//! optional prefix (`#n0_t3`) keeps several rendered conditions apart when
//! they share one request.
//!
//! ```rust
//! use single_table_dal::condition::ConditionExpressionBuilder;
//!
//! let guard = ConditionExpressionBuilder::new()
//!     .attr("pk").not_exists()
//!     .attr("sk").not_exists();
//!
//! let rendered = guard.to_expression(None).unwrap();
//! assert_eq!(rendered.expression, "attribute_not_exists(#n0) AND attribute_not_exists(#n1)");
//! ```

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
enum Clause {
    Exists(String),
    NotExists(String),
    Equals(String, AttributeValue),
    BeginsWith(String, String),
    Contains(String, AttributeValue),
    Group(Vec<Clause>),
}

/// Rendered condition ready to attach to a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionExpression {
    /// Expression text with placeholders
    pub expression: String,
    /// `#token` to attribute name
    pub names: HashMap<String, String>,
    /// `:token` to value; empty for existence-only conditions
    pub values: HashMap<String, AttributeValue>,
}

impl ConditionExpression {
    /// Optional values map, `None` when empty (the store rejects empty maps).
    pub fn values_or_none(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

/// Builder of AND-combined attribute conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionExpressionBuilder {
    clauses: Vec<Clause>,
}

/// Pending condition on one attribute; finish it with one of its methods.
#[derive(Debug)]
#[must_use = "an attribute condition does nothing until completed"]
pub struct AttrCondition {
    builder: ConditionExpressionBuilder,
    name: String,
}

impl AttrCondition {
    fn finish(mut self, clause: Clause) -> ConditionExpressionBuilder {
        self.builder.clauses.push(clause);
        self.builder
    }

    /// `attribute_exists(name)`
    pub fn exists(self) -> ConditionExpressionBuilder {
        let name = self.name.clone();
        self.finish(Clause::Exists(name))
    }

    /// `attribute_not_exists(name)`
    pub fn not_exists(self) -> ConditionExpressionBuilder {
        let name = self.name.clone();
        self.finish(Clause::NotExists(name))
    }

    /// `name = value`
    pub fn equals(self, value: AttributeValue) -> ConditionExpressionBuilder {
        let name = self.name.clone();
        self.finish(Clause::Equals(name, value))
    }

    /// `name = "value"` for string attributes.
    pub fn equals_str(self, value: impl Into<String>) -> ConditionExpressionBuilder {
        self.equals(AttributeValue::S(value.into()))
    }

    /// `begins_with(name, prefix)`
    pub fn begins_with(self, prefix: impl Into<String>) -> ConditionExpressionBuilder {
        let name = self.name.clone();
        self.finish(Clause::BeginsWith(name, prefix.into()))
    }

    /// `contains(name, value)`
    pub fn contains(self, value: AttributeValue) -> ConditionExpressionBuilder {
        let name = self.name.clone();
        self.finish(Clause::Contains(name, value))
    }
}

impl ConditionExpressionBuilder {
    /// Empty builder; renders to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a condition on `name`.
    pub fn attr(self, name: impl Into<String>) -> AttrCondition {
        AttrCondition {
            builder: self,
            name: name.into(),
        }
    }

    /// Shorthand for a builder holding only `attribute_not_exists(name)`.
    pub fn attribute_not_exists(name: impl Into<String>) -> Self {
        Self::new().attr(name).not_exists()
    }

    /// Shorthand for a builder holding only `attribute_exists(name)`.
    pub fn attribute_exists(name: impl Into<String>) -> Self {
        Self::new().attr(name).exists()
    }

    /// Conjoins other builders as parenthesized groups. Empty ones are ignored.
    pub fn and(mut self, others: impl IntoIterator<Item = ConditionExpressionBuilder>) -> Self {
        for other in others {
            if !other.clauses.is_empty() {
                self.clauses.push(Clause::Group(other.clauses));
            }
        }
        self
    }

    /// True when nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the conditions, or `None` for an empty builder.
    ///
    /// With a prefix every placeholder gets a `_{prefix}` suffix.
    pub fn to_expression(&self, prefix: Option<&str>) -> Option<ConditionExpression> {
        if self.clauses.is_empty() {
            return None;
        }
        let mut renderer = Renderer {
            counter: 0,
            suffix: prefix.map(|p| format!("_{p}")).unwrap_or_default(),
            rendered: ConditionExpression::default(),
        };
        renderer.rendered.expression = renderer.render_all(&self.clauses);
        Some(renderer.rendered)
    }

    /// Evaluates the conditions against a stored item (`None` if absent).
    pub fn evaluate(&self, item: Option<&HashMap<String, AttributeValue>>) -> bool {
        self.clauses.iter().all(|clause| evaluate(clause, item))
    }
}

struct Renderer {
    counter: usize,
    suffix: String,
    rendered: ConditionExpression,
}

impl Renderer {
    fn name(&mut self, name: &str) -> String {
        let token = format!("#n{}{}", self.counter, self.suffix);
        self.counter += 1;
        let _ = self.rendered.names.insert(token.clone(), name.to_string());
        token
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let token = format!(":v{}{}", self.counter, self.suffix);
        self.counter += 1;
        let _ = self.rendered.values.insert(token.clone(), value);
        token
    }

    fn render_all(&mut self, clauses: &[Clause]) -> String {
        clauses
            .iter()
            .map(|clause| self.render(clause))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn render(&mut self, clause: &Clause) -> String {
        match clause {
            Clause::Exists(name) => format!("attribute_exists({})", self.name(name)),
            Clause::NotExists(name) => format!("attribute_not_exists({})", self.name(name)),
            Clause::Equals(name, value) => {
                let name = self.name(name);
                format!("{name} = {}", self.value(value.clone()))
            }
            Clause::BeginsWith(name, prefix) => {
                let name = self.name(name);
                let value = self.value(AttributeValue::S(prefix.clone()));
                format!("begins_with({name}, {value})")
            }
            Clause::Contains(name, value) => {
                let name = self.name(name);
                format!("contains({name}, {})", self.value(value.clone()))
            }
            Clause::Group(inner) => format!("({})", self.render_all(inner)),
        }
    }
}

fn evaluate(clause: &Clause, item: Option<&HashMap<String, AttributeValue>>) -> bool {
    let get = |name: &str| item.and_then(|item| item.get(name));
    match clause {
        Clause::Exists(name) => get(name).is_some(),
        Clause::NotExists(name) => get(name).is_none(),
        Clause::Equals(name, value) => get(name) == Some(value),
        Clause::BeginsWith(name, prefix) => {
            matches!(get(name), Some(AttributeValue::S(s)) if s.starts_with(prefix.as_str()))
        }
        Clause::Contains(name, value) => match (get(name), value) {
            (Some(AttributeValue::S(s)), AttributeValue::S(needle)) => s.contains(needle.as_str()),
            (Some(AttributeValue::Ss(set)), AttributeValue::S(needle)) => set.contains(needle),
            (Some(AttributeValue::Ns(set)), AttributeValue::N(needle)) => set.contains(needle),
            (Some(AttributeValue::L(list)), needle) => list.contains(needle),
            _ => false,
        },
        Clause::Group(inner) => inner.iter().all(|clause| evaluate(clause, item)),
    }
}
