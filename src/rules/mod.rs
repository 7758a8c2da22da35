pub mod error;
pub mod expr;

use std::collections::HashMap;

use axum::http::Method;
use serde_json::Value;

pub use error::RuleError;
pub use expr::{Expr, PathRoot, Scope};

use crate::error::ApiError;
use crate::storage::{Record, Store};

/// CRUD action a request maps to: GET -> read, POST -> create,
/// PUT/PATCH -> update, DELETE -> delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Action::Read),
            Method::POST => Some(Action::Create),
            Method::PUT | Method::PATCH => Some(Action::Update),
            Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Action::Create => ".create",
            Action::Read => ".read",
            Action::Update => ".update",
            Action::Delete => ".delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    User,
    Owner,
}

/// One resolved access rule: a literal verdict, a role list, or a parsed
/// predicate expression.
#[derive(Debug, Clone)]
pub enum Rule {
    Allow(bool),
    Roles(Vec<Role>),
    Expr(Expr),
}

/// Per-action rules on one node of the rule tree.
#[derive(Debug, Clone, Default)]
pub struct ActionRules {
    create: Option<Rule>,
    read: Option<Rule>,
    update: Option<Rule>,
    delete: Option<Rule>,
}

impl ActionRules {
    fn get(&self, action: Action) -> Option<&Rule> {
        match action {
            Action::Create => self.create.as_ref(),
            Action::Read => self.read.as_ref(),
            Action::Update => self.update.as_ref(),
            Action::Delete => self.delete.as_ref(),
        }
    }

    fn set(&mut self, action: Action, rule: Rule) {
        let slot = match action {
            Action::Create => &mut self.create,
            Action::Read => &mut self.read,
            Action::Update => &mut self.update,
            Action::Delete => &mut self.delete,
        };
        *slot = Some(rule);
    }
}

type FieldRules = Vec<(String, ActionRules)>;

/// Per-record-id override: action rules plus field sub-rules.
#[derive(Debug, Clone, Default)]
pub struct RecordOverride {
    actions: ActionRules,
    fields: FieldRules,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionRules {
    actions: ActionRules,
    fields: FieldRules,
    records: HashMap<String, RecordOverride>,
}

/// The static, per-collection access-rule tree, loaded once at startup and
/// immutable afterwards. The `*` entry holds the global defaults.
#[derive(Debug, Clone)]
pub struct RuleSet {
    collections: HashMap<String, CollectionRules>,
}

const ACTIONS: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];

impl Default for RuleSet {
    fn default() -> Self {
        let mut defaults = CollectionRules::default();
        defaults.actions.set(Action::Create, Rule::Roles(vec![Role::User]));
        defaults.actions.set(Action::Update, Rule::Roles(vec![Role::Owner]));
        defaults.actions.set(Action::Delete, Rule::Roles(vec![Role::Owner]));

        let mut collections = HashMap::new();
        collections.insert("*".to_string(), defaults);
        Self { collections }
    }
}

impl RuleSet {
    /// Parse a rule configuration tree, layered over the built-in defaults.
    /// A configured collection entry (including `*`) replaces the default
    /// entry of the same name wholesale.
    pub fn from_json(config: &Value) -> Result<Self, RuleError> {
        let mut set = Self::default();
        if let Value::Object(config) = config {
            for (collection_name, node) in config {
                set.collections
                    .insert(collection_name.clone(), parse_collection(collection_name, node)?);
            }
        }
        Ok(set)
    }

    /// Resolve the action rule and field sub-rules for one request, in
    /// precedence order: global default, collection action rule, collection
    /// field rules, per-record action rule, per-record field rules. Each
    /// level only overrides when it defines something.
    fn resolve(
        &self,
        action: Action,
        collection: &str,
        record_id: Option<&str>,
    ) -> (Rule, Vec<(String, Rule)>) {
        let mut current = self
            .collections
            .get("*")
            .and_then(|c| c.actions.get(action))
            .cloned()
            .unwrap_or(Rule::Allow(true));
        let mut prop_rules: Vec<(String, Rule)> = Vec::new();

        if let Some(rules) = self.collections.get(collection) {
            if let Some(rule) = rules.actions.get(action) {
                current = rule.clone();
            }
            let fields = rules_for_action(&rules.fields, action);
            if !fields.is_empty() {
                prop_rules = fields;
            }
            if let Some(record) = record_id.and_then(|id| rules.records.get(id)) {
                if let Some(rule) = record.actions.get(action) {
                    current = rule.clone();
                }
                let fields = rules_for_action(&record.fields, action);
                if !fields.is_empty() {
                    prop_rules = fields;
                }
            }
        }

        (current, prop_rules)
    }

    /// Enforce the rules for one request. A denied action rule raises a 403
    /// (admin callers bypass the deny); field rules silently strip denied
    /// fields from the incoming payload on create/update and from the
    /// outgoing payload on read.
    pub fn apply(
        &self,
        action: Action,
        collection: &str,
        user: Option<&Record>,
        data: &mut Value,
        mut new_data: Option<&mut Record>,
        is_admin: bool,
        store: &Store,
    ) -> Result<(), ApiError> {
        let record_id = data.get("_id").and_then(Value::as_str).map(str::to_string);
        let (rule, prop_rules) = self.resolve(action, collection, record_id.as_deref());

        let new_data_view = match new_data.as_deref() {
            Some(map) => Value::Object(map.clone()),
            None => Value::Null,
        };
        let allowed = match &rule {
            Rule::Allow(verdict) => *verdict,
            Rule::Roles(roles) => check_roles(roles, user, data, is_admin)?,
            Rule::Expr(expr) => expr.truthy(&Scope {
                user,
                data,
                new_data: &new_data_view,
                store,
            }),
        };
        if !allowed && !is_admin {
            return Err(ApiError::credential("Forbidden"));
        }

        match action {
            Action::Create | Action::Update => {
                if let Some(payload) = new_data.as_deref_mut() {
                    let existing = data.clone();
                    for (prop, rule) in &prop_rules {
                        let snapshot = Value::Object(payload.clone());
                        if !field_rule_allows(rule, user, &existing, &snapshot, store) {
                            payload.remove(prop);
                        }
                    }
                }
            }
            Action::Read => match data {
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        redact(item, &prop_rules, user, store);
                    }
                }
                single @ Value::Object(_) => redact(single, &prop_rules, user, store),
                _ => {}
            },
            Action::Delete => {}
        }

        Ok(())
    }
}

fn parse_collection(name: &str, node: &Value) -> Result<CollectionRules, RuleError> {
    let node = node
        .as_object()
        .ok_or_else(|| RuleError::InvalidRule(name.to_string()))?;
    let mut rules = CollectionRules::default();
    for (key, value) in node {
        if key.starts_with('.') {
            if let Some((action, rule)) = parse_action_rule(key, value)? {
                rules.actions.set(action, rule);
            }
        } else if key == "*" {
            rules.fields = parse_field_rules(value)?;
        } else {
            rules.records.insert(key.clone(), parse_record(key, value)?);
        }
    }
    Ok(rules)
}

fn parse_record(id: &str, node: &Value) -> Result<RecordOverride, RuleError> {
    let node = node
        .as_object()
        .ok_or_else(|| RuleError::InvalidRule(id.to_string()))?;
    let mut record = RecordOverride::default();
    for (key, value) in node {
        if key.starts_with('.') {
            if let Some((action, rule)) = parse_action_rule(key, value)? {
                record.actions.set(action, rule);
            }
        } else {
            record
                .fields
                .push((key.clone(), parse_action_rules(key, value)?));
        }
    }
    Ok(record)
}

fn parse_field_rules(node: &Value) -> Result<FieldRules, RuleError> {
    let node = node
        .as_object()
        .ok_or_else(|| RuleError::InvalidRule("*".to_string()))?;
    let mut fields = FieldRules::new();
    for (field, value) in node {
        fields.push((field.clone(), parse_action_rules(field, value)?));
    }
    Ok(fields)
}

fn parse_action_rules(context: &str, node: &Value) -> Result<ActionRules, RuleError> {
    let node = node
        .as_object()
        .ok_or_else(|| RuleError::InvalidRule(context.to_string()))?;
    let mut rules = ActionRules::default();
    for (key, value) in node {
        if let Some((action, rule)) = parse_action_rule(key, value)? {
            rules.set(action, rule);
        }
    }
    Ok(rules)
}

fn parse_action_rule(key: &str, value: &Value) -> Result<Option<(Action, Rule)>, RuleError> {
    let action = ACTIONS
        .iter()
        .find(|a| a.key() == key)
        .copied()
        .ok_or_else(|| RuleError::InvalidRule(key.to_string()))?;
    Ok(parse_rule(key, value)?.map(|rule| (action, rule)))
}

/// Parse one rule value. Empty role lists and empty expression strings do
/// not override anything, so they parse to `None`.
fn parse_rule(context: &str, value: &Value) -> Result<Option<Rule>, RuleError> {
    match value {
        Value::Bool(verdict) => Ok(Some(Rule::Allow(*verdict))),
        Value::String(source) => {
            if source.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Rule::Expr(Expr::parse(source)?)))
            }
        }
        Value::Array(roles) => {
            if roles.is_empty() {
                return Ok(None);
            }
            let roles = roles
                .iter()
                .map(|role| match role.as_str() {
                    Some("Guest") => Ok(Role::Guest),
                    Some("User") => Ok(Role::User),
                    Some("Owner") => Ok(Role::Owner),
                    _ => Err(RuleError::UnknownRole(role.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Rule::Roles(roles)))
        }
        _ => Err(RuleError::InvalidRule(context.to_string())),
    }
}

/// Extract the rule each field defines for this specific action.
fn rules_for_action(fields: &FieldRules, action: Action) -> Vec<(String, Rule)> {
    fields
        .iter()
        .filter_map(|(field, rules)| {
            rules
                .get(action)
                .map(|rule| (field.clone(), rule.clone()))
        })
        .collect()
}

fn check_roles(
    roles: &[Role],
    user: Option<&Record>,
    data: &Value,
    is_admin: bool,
) -> Result<bool, ApiError> {
    if roles.contains(&Role::Guest) {
        return Ok(true);
    }
    if user.is_none() && !is_admin {
        return Err(ApiError::authorization("Unauthorized"));
    }
    if roles.contains(&Role::User) {
        return Ok(true);
    }
    if let Some(user) = user {
        if roles.contains(&Role::Owner) {
            return Ok(match (user.get("_id"), data.get("_ownerId")) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            });
        }
    }
    Ok(false)
}

fn field_rule_allows(
    rule: &Rule,
    user: Option<&Record>,
    data: &Value,
    new_data: &Value,
    store: &Store,
) -> bool {
    match rule {
        Rule::Allow(verdict) => *verdict,
        Rule::Expr(expr) => expr.truthy(&Scope {
            user,
            data,
            new_data,
            store,
        }),
        // role lists are not meaningful as field rules; never redact
        Rule::Roles(_) => true,
    }
}

fn redact(item: &mut Value, prop_rules: &[(String, Rule)], user: Option<&Record>, store: &Store) {
    let denied: Vec<String> = prop_rules
        .iter()
        .filter(|(_, rule)| !field_rule_allows(rule, user, &*item, &Value::Null, store))
        .map(|(prop, _)| prop.clone())
        .collect();
    if let Value::Object(map) = item {
        for prop in denied {
            map.remove(&prop);
        }
    }
}
