//! In-memory form of one rule book, `scope -> label -> entry`, that keeps
//! document order and annotations so it can be written back as it was read.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ConfigError;

pub(crate) const DEFAULT_SCOPE: &str = "default";
pub(crate) const REGEX_PREFIX: &str = "_regex_";
/// Keys holding free text. Within a scope they still resolve like any other
/// key but never contribute to the vocabulary.
const ANNOTATION_KEYS: &[&str] = &["comment", "note"];
const DOCUMENT: &str = "rules";
const SINK: &str = "sink";
const JUSTIFICATION: &str = "justification";

fn invalid(key: &str, value: &Value) -> ConfigError {
    ConfigError::InvalidValue {
        document: DOCUMENT,
        value: format!("{key}: {value}"),
    }
}

fn into_object(key: &str, value: Value) -> Result<Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(invalid(key, &other)),
    }
}

fn is_annotation(key: &str, value: &Value) -> bool {
    ANNOTATION_KEYS.contains(&key) && !value.is_object()
}

/// A single rule: the canonical label it assigns and why.
#[derive(Clone, Debug)]
pub struct RuleEntry {
    pub sink: String,
    pub justification: Option<String>,
    /// Fields of an entry in object form, `None` for the bare string form.
    fields: Option<Map<String, Value>>,
    pattern: Option<Regex>,
}

impl RuleEntry {
    /// An entry in object form, as recorded for new rules.
    pub(crate) fn new(key: &str, sink: String, justification: String) -> Result<Self, ConfigError> {
        Self::build(key, sink, Some(justification), Some(Map::new()))
    }

    fn build(
        key: &str,
        sink: String,
        justification: Option<String>,
        fields: Option<Map<String, Value>>,
    ) -> Result<Self, ConfigError> {
        let pattern = match key.strip_prefix(REGEX_PREFIX) {
            Some(pattern) => Some(compile_full_match(pattern)?),
            None => None,
        };
        Ok(Self {
            sink,
            justification,
            fields,
            pattern,
        })
    }

    fn from_value(key: &str, value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(sink) => Self::build(key, sink, None, None),
            Value::Object(fields) => {
                let sink = fields
                    .get(SINK)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ConfigError::MissingKey {
                        document: DOCUMENT,
                        key: format!("{key}.{SINK}"),
                    })?
                    .to_string();
                let justification = fields
                    .get(JUSTIFICATION)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Self::build(key, sink, justification, Some(fields))
            }
            other => Err(invalid(key, &other)),
        }
    }

    fn to_value(&self) -> Value {
        let Some(fields) = &self.fields else {
            return Value::String(self.sink.clone());
        };
        let mut fields = fields.clone();
        fields.insert(SINK.to_string(), Value::String(self.sink.clone()));
        if let Some(justification) = &self.justification {
            fields.insert(JUSTIFICATION.to_string(), Value::String(justification.clone()));
        }
        Value::Object(fields)
    }

    /// Compiled pattern of a regex entry, `None` for a strict entry.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

/// Compiles `pattern` so that it only matches a whole label.
pub(crate) fn compile_full_match(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Clone, Debug)]
enum Item {
    Rule(RuleEntry),
    Annotation(Value),
}

/// One scope of rules, `label -> entry`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Layer(IndexMap<String, Item>);

impl Layer {
    fn from_value(key: &str, value: Value) -> Result<Self, ConfigError> {
        let mut items = IndexMap::new();
        for (label, value) in into_object(key, value)? {
            let item = match value {
                Value::String(_) | Value::Object(_) => Item::Rule(RuleEntry::from_value(&label, value)?),
                other if is_annotation(&label, &other) => Item::Annotation(other),
                other => return Err(invalid(&label, &other)),
            };
            items.insert(label, item);
        }
        Ok(Self(items))
    }

    fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(label, item)| {
                    let value = match item {
                        Item::Rule(entry) => entry.to_value(),
                        Item::Annotation(value) => value.clone(),
                    };
                    (label.clone(), value)
                })
                .collect(),
        )
    }

    pub(crate) fn get(&self, label: &str) -> Option<&RuleEntry> {
        match self.0.get(label) {
            Some(Item::Rule(entry)) => Some(entry),
            _ => None,
        }
    }

    pub(crate) fn rules(&self) -> impl Iterator<Item = (&str, &RuleEntry)> {
        self.0.iter().filter_map(|(label, item)| match item {
            Item::Rule(entry) => Some((label.as_str(), entry)),
            Item::Annotation(_) => None,
        })
    }

    pub(crate) fn set(&mut self, label: &str, entry: RuleEntry) {
        self.0.insert(label.to_string(), Item::Rule(entry));
    }
}

#[derive(Clone, Debug)]
enum EntityItem {
    Scope(Layer),
    Annotation(Value),
}

/// Rules of one entity: its `default` scope and its period scopes.
#[derive(Clone, Debug, Default)]
struct Entity(IndexMap<String, EntityItem>);

impl Entity {
    fn from_value(key: &str, value: Value) -> Result<Self, ConfigError> {
        let mut items = IndexMap::new();
        for (scope, value) in into_object(key, value)? {
            let item = if is_annotation(&scope, &value) {
                EntityItem::Annotation(value)
            } else {
                EntityItem::Scope(Layer::from_value(&format!("{key}.{scope}"), value)?)
            };
            items.insert(scope, item);
        }
        Ok(Self(items))
    }

    fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(scope, item)| {
                    let value = match item {
                        EntityItem::Scope(layer) => layer.to_value(),
                        EntityItem::Annotation(value) => value.clone(),
                    };
                    (scope.clone(), value)
                })
                .collect(),
        )
    }

    fn scope(&self, name: &str) -> Option<&Layer> {
        match self.0.get(name) {
            Some(EntityItem::Scope(layer)) => Some(layer),
            _ => None,
        }
    }

    fn scopes(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.0.iter().filter_map(|(name, item)| match item {
            EntityItem::Scope(layer) => Some((name.as_str(), layer)),
            EntityItem::Annotation(_) => None,
        })
    }

    fn scope_mut(&mut self, name: &str) -> Result<&mut Layer, ConfigError> {
        match self
            .0
            .entry(name.to_string())
            .or_insert_with(|| EntityItem::Scope(Layer::default()))
        {
            EntityItem::Scope(layer) => Ok(layer),
            EntityItem::Annotation(value) => Err(invalid(name, value)),
        }
    }
}

#[derive(Clone, Debug)]
enum BookItem {
    Global(Layer),
    Entity(Entity),
    Annotation(Value),
}

impl BookItem {
    fn to_value(&self) -> Value {
        match self {
            BookItem::Global(layer) => layer.to_value(),
            BookItem::Entity(entity) => entity.to_value(),
            BookItem::Annotation(value) => value.clone(),
        }
    }
}

/// A whole rule book: the global `default` scope plus one entry per entity.
#[derive(Clone, Debug)]
pub(crate) struct RuleBook(IndexMap<String, BookItem>);

impl RuleBook {
    pub(crate) fn empty() -> Self {
        Self(IndexMap::from([(
            DEFAULT_SCOPE.to_string(),
            BookItem::Global(Layer::default()),
        )]))
    }

    pub(crate) fn from_value(key: &str, value: Value) -> Result<Self, ConfigError> {
        let mut items = IndexMap::new();
        for (name, value) in into_object(key, value)? {
            let item = if name == DEFAULT_SCOPE {
                BookItem::Global(Layer::from_value(&format!("{key}.{name}"), value)?)
            } else if is_annotation(&name, &value) {
                BookItem::Annotation(value)
            } else {
                BookItem::Entity(Entity::from_value(&format!("{key}.{name}"), value)?)
            };
            items.insert(name, item);
        }
        if !items.contains_key(DEFAULT_SCOPE) {
            return Err(ConfigError::MissingKey {
                document: DOCUMENT,
                key: format!("{key}.{DEFAULT_SCOPE}"),
            });
        }
        Ok(Self(items))
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, item)| (name.clone(), item.to_value()))
                .collect(),
        )
    }

    fn entity(&self, group: &str) -> Option<&Entity> {
        match self.0.get(group) {
            Some(BookItem::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    fn global(&self) -> Option<&Layer> {
        match self.0.get(DEFAULT_SCOPE) {
            Some(BookItem::Global(layer)) => Some(layer),
            _ => None,
        }
    }

    /// Scopes in effect for a report, lowest priority first.
    pub(crate) fn layers_for(&self, group: &str, period: &str) -> Vec<&Layer> {
        let entity = self.entity(group);
        [
            self.global(),
            entity.and_then(|e| e.scope(DEFAULT_SCOPE)),
            entity.and_then(|e| e.scope(period)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Entry of the highest priority scope keyed by exactly `label`.
    pub(crate) fn find_strict(&self, group: &str, period: &str, label: &str) -> Option<&RuleEntry> {
        self.layers_for(group, period)
            .into_iter()
            .rev()
            .find_map(|layer| layer.get(label))
    }

    /// First regex entry, in merge order, whose pattern matches `source`.
    ///
    /// Merging the scopes from lowest to highest priority, a key keeps the
    /// position of its first occurrence and the entry of its last.
    pub(crate) fn find_regex(&self, group: &str, period: &str, source: &str) -> Option<&RuleEntry> {
        let layers = self.layers_for(group, period);
        for (depth, layer) in layers.iter().enumerate() {
            for (label, entry) in layer.rules() {
                if !label.starts_with(REGEX_PREFIX)
                    || layers[..depth].iter().any(|lower| lower.get(label).is_some())
                {
                    continue;
                }
                let entry = layers[depth + 1..]
                    .iter()
                    .rev()
                    .find_map(|upper| upper.get(label))
                    .unwrap_or(entry);
                if entry.pattern().is_some_and(|p| p.is_match(source)) {
                    return Some(entry);
                }
            }
        }
        None
    }

    pub(crate) fn global_mut(&mut self) -> Result<&mut Layer, ConfigError> {
        match self
            .0
            .entry(DEFAULT_SCOPE.to_string())
            .or_insert_with(|| BookItem::Global(Layer::default()))
        {
            BookItem::Global(layer) => Ok(layer),
            other => Err(invalid(DEFAULT_SCOPE, &other.to_value())),
        }
    }

    /// Returns the named scope of `group`, creating the entity and the scope
    /// as needed.
    pub(crate) fn entity_scope_mut(&mut self, group: &str, scope: &str) -> Result<&mut Layer, ConfigError> {
        match self
            .0
            .entry(group.to_string())
            .or_insert_with(|| BookItem::Entity(Entity::default()))
        {
            BookItem::Entity(entity) => entity.scope_mut(scope),
            other => Err(invalid(group, &other.to_value())),
        }
    }

    /// Every rule of the book as `(label, entry)`, whatever its scope.
    pub(crate) fn all_rules(&self) -> Vec<(&str, &RuleEntry)> {
        let mut out = Vec::new();
        for item in self.0.values() {
            match item {
                BookItem::Global(layer) => out.extend(layer.rules()),
                BookItem::Entity(entity) => {
                    for (_, layer) in entity.scopes() {
                        out.extend(layer.rules());
                    }
                }
                BookItem::Annotation(_) => {}
            }
        }
        out
    }

    /// Rules of entity-level scopes as `(entity, scope, label, entry)`.
    pub(crate) fn entity_rules(&self) -> Vec<(&str, &str, &str, &RuleEntry)> {
        let mut out = Vec::new();
        for (group, item) in self.0.iter() {
            if let BookItem::Entity(entity) = item {
                for (scope, layer) in entity.scopes() {
                    out.extend(
                        layer
                            .rules()
                            .map(|(label, entry)| (group.as_str(), scope, label, entry)),
                    );
                }
            }
        }
        out
    }
}

/// Returns `true` if the rule keyed `label` names a vocabulary column.
pub(crate) fn is_vocabulary_rule(label: &str) -> bool {
    !ANNOTATION_KEYS.contains(&label)
}
