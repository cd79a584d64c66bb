//! Typed field registry
//!
//! Maps `entity type × field name` to a getter. Names are validated once,
//! when the configuration is loaded; extraction afterwards walks validated
//! `EntityFields` and never looks a name up again.

use crate::config::Config;
use crate::schema::{fields, EntityType};
use crate::ConfigError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Extracts one field from a raw payload
pub type FieldGetter = fn(&Value) -> Value;

/// A named field bound to its getter
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    name: &'static str,
    getter: FieldGetter,
}

impl FieldSpec {
    pub fn new(name: &'static str, getter: FieldGetter) -> Self {
        Self { name, getter }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn extract(&self, raw: &Value) -> Value {
        (self.getter)(raw)
    }
}

/// The validated fields configured for one entity type
#[derive(Debug, Clone)]
pub struct EntityFields {
    entity: EntityType,
    specs: Vec<FieldSpec>,
}

impl EntityFields {
    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// True when no field is configured, meaning the entity is never fetched
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(FieldSpec::name).collect()
    }

    /// Extracts every configured field from a raw payload
    pub fn extract(&self, raw: &Value) -> Map<String, Value> {
        self.specs
            .iter()
            .map(|spec| (spec.name.to_string(), spec.extract(raw)))
            .collect()
    }
}

/// Validated field selections for every entity type
#[derive(Debug, Clone)]
pub struct FieldSelection {
    pub issue: EntityFields,
    pub pr: EntityFields,
    pub commit: EntityFields,
    pub comment: EntityFields,
}

impl FieldSelection {
    pub fn wants_pr(&self) -> bool {
        !self.pr.is_empty()
    }

    /// Commits hang off pull requests, so both selections must be non-empty
    pub fn wants_commit(&self) -> bool {
        self.wants_pr() && !self.commit.is_empty()
    }

    pub fn wants_comments(&self) -> bool {
        !self.comment.is_empty()
    }
}

/// Registry of every field each entity type may expose
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<EntityType, Vec<FieldSpec>>,
}

impl SchemaRegistry {
    /// Creates a registry holding the GitHub field getters
    pub fn new() -> Self {
        let mut registry = Self {
            schemas: HashMap::new(),
        };
        for spec in fields::issue_fields() {
            registry.register(EntityType::Issue, spec);
        }
        for spec in fields::pr_fields() {
            registry.register(EntityType::Pr, spec);
        }
        for spec in fields::commit_fields() {
            registry.register(EntityType::Commit, spec);
        }
        for spec in fields::comment_fields() {
            registry.register(EntityType::Comment, spec);
        }
        registry
    }

    /// Adds a field to an entity's schema, replacing any getter with the same name
    pub fn register(&mut self, entity: EntityType, spec: FieldSpec) {
        let specs = self.schemas.entry(entity).or_default();
        specs.retain(|s| s.name != spec.name);
        specs.push(spec);
    }

    /// Sorted names of the fields an entity may expose
    pub fn allowed_fields(&self, entity: EntityType) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .schemas
            .get(&entity)
            .map(|specs| specs.iter().map(FieldSpec::name).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    pub fn is_allowed(&self, entity: EntityType, name: &str) -> bool {
        self.lookup(entity, name).is_some()
    }

    fn lookup(&self, entity: EntityType, name: &str) -> Option<FieldSpec> {
        self.schemas
            .get(&entity)
            .and_then(|specs| specs.iter().find(|s| s.name == name))
            .copied()
    }

    /// Validates configured names for one entity, preserving their order
    ///
    /// Unknown or repeated names are configuration errors.
    pub fn select(
        &self,
        entity: EntityType,
        names: &[String],
    ) -> Result<EntityFields, ConfigError> {
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(names.len());

        for name in names {
            let spec = self
                .lookup(entity, name)
                .ok_or_else(|| ConfigError::UnknownField {
                    entity,
                    field: name.clone(),
                    allowed: self.allowed_fields(entity).join(", "),
                })?;

            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{} field '{}' is listed more than once",
                    entity, name
                )));
            }
            specs.push(spec);
        }

        Ok(EntityFields { entity, specs })
    }

    /// Validates every field list of a configuration
    pub fn selection(&self, config: &Config) -> Result<FieldSelection, ConfigError> {
        Ok(FieldSelection {
            issue: self.select(EntityType::Issue, config.fields_for(EntityType::Issue))?,
            pr: self.select(EntityType::Pr, config.fields_for(EntityType::Pr))?,
            commit: self.select(EntityType::Commit, config.fields_for(EntityType::Commit))?,
            comment: self.select(EntityType::Comment, config.fields_for(EntityType::Comment))?,
        })
    }

    /// Validates `names` and extracts them from `raw` in one step
    pub fn get_fields(
        &self,
        entity: EntityType,
        names: &[String],
        raw: &Value,
    ) -> Result<Map<String, Value>, ConfigError> {
        Ok(self.select(entity, names)?.extract(raw))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
