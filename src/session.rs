//! Per-connection session context
//!
//! Holds the current namespace, warehouse, role, and session variables for
//! one dispatcher instance. Mutated only by context-switch / variable
//! statements or the explicit setters; never persisted.

use std::collections::HashMap;

use regex::Regex;

/// Mutable per-connection state.
#[derive(Debug, Default, Clone)]
pub struct Session {
    /// Current database
    pub database: Option<String>,

    /// Current schema
    pub schema: Option<String>,

    /// Current warehouse (accepted, otherwise ignored by the emulator)
    pub warehouse: Option<String>,

    /// Current role (accepted, otherwise ignored by the emulator)
    pub role: Option<String>,

    /// Session variables, name -> raw value text as written in SET
    pub variables: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set database; resets the schema to PUBLIC the way USE DATABASE does.
    pub fn use_database(&mut self, database: &str) {
        self.database = Some(database.to_uppercase());
        self.schema = Some("PUBLIC".to_string());
    }

    pub fn use_schema(&mut self, schema: &str) {
        self.schema = Some(schema.to_uppercase());
    }

    pub fn use_warehouse(&mut self, warehouse: &str) {
        self.warehouse = Some(warehouse.to_uppercase());
    }

    pub fn use_role(&mut self, role: &str) {
        self.role = Some(role.to_uppercase());
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        self.variables
            .insert(name.to_uppercase(), value.to_string());
    }

    pub fn unset_variable(&mut self, name: &str) {
        self.variables.remove(&name.to_uppercase());
    }

    pub fn variable(&self, name: &str) -> Option<&String> {
        self.variables.get(&name.to_uppercase())
    }

    /// Replace `$name` references with the session variable's raw text.
    /// Unknown variables are left untouched for the engine to reject.
    pub fn substitute_variables(&self, sql: &str) -> String {
        if self.variables.is_empty() || !sql.contains('$') {
            return sql.to_string();
        }
        let var_pattern = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
        var_pattern
            .replace_all(sql, |caps: &regex::Captures<'_>| {
                match self.variable(&caps[1]) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    }
}
