// src/config.rs - Alarm server, group and item configuration

use crate::comparer::ComparerType;
use crate::error::{AlarmError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// Top-level alarm server configuration
///
/// # Examples
///
/// ```rust
/// use alarm_core::ServerConfig;
///
/// let config = ServerConfig::from_yaml(r#"
/// max_number_of_alarms: 100
/// store_type: StoreFirst
/// groups:
///   - name: Boiler
///     items:
///       - name: PT-200
///         trigger: 12.5
///         comparer: ">"
/// "#)?;
/// assert_eq!(config.groups[0].items[0].name, "PT-200");
/// # Ok::<(), alarm_core::AlarmError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Capacity of the event list, 0 means unbounded
    #[serde(default)]
    pub max_number_of_alarms: i64,

    /// Whether repeat activations keep the first or the latest active time
    #[serde(default)]
    pub store_type: StoreType,

    /// Scales the initial reservation of the event list
    #[serde(default = "default_multiplier")]
    pub minimum_items_multiplier: u32,

    /// Global switch for forwarding events to the alarm distributor
    #[serde(default)]
    pub enable_sending_to_alarm_distributor_server: bool,

    /// Disabled servers create no new events
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_number_of_alarms: 0,
            store_type: StoreType::default(),
            minimum_items_multiplier: default_multiplier(),
            enable_sending_to_alarm_distributor_server: false,
            enabled: default_true(),
            groups: Vec::new(),
        }
    }
}

/// Repeat-activation policy for the active time of a reused event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreType {
    /// Keep the timestamp of the first activation
    StoreFirst,
    /// Refresh the timestamp on every activation
    #[default]
    StoreLast,
}

// ============================================================================
// GROUP AND ITEM CONFIGURATION
// ============================================================================

/// Named container of alarm items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fallback distribution flag for items that leave theirs unset
    #[serde(default)]
    pub enable_distribution: bool,

    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            enable_distribution: false,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: ItemConfig) -> Self {
        self.items.push(item);
        self
    }
}

/// Single alarm item: trigger configuration plus behavior flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Stable id; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,

    pub name: String,

    /// Value the process value is compared against
    #[serde(default = "default_trigger")]
    pub trigger: Value,

    /// Comparison name, see [`ComparerType`]
    #[serde(default = "default_comparer")]
    pub comparer: String,

    #[serde(default = "default_true")]
    pub acknowledge_required: bool,

    /// Fold repeat activations into the open event instead of creating new ones
    #[serde(default)]
    pub repeat_count: bool,

    /// Item level distribution flag; `None` defers to the group
    #[serde(default)]
    pub enable_distribution: Option<bool>,

    /// Keep events once they reach Normal
    #[serde(default = "default_true")]
    pub history: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub message: String,
}

impl ItemConfig {
    /// Item that alarms while a boolean value is true
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            trigger: default_trigger(),
            comparer: default_comparer(),
            acknowledge_required: true,
            repeat_count: false,
            enable_distribution: None,
            history: true,
            enabled: true,
            priority: 0,
            message: String::new(),
        }
    }
}

fn default_true() -> bool { true }
fn default_multiplier() -> u32 { 1 }
fn default_trigger() -> Value { Value::Bool(true) }
fn default_comparer() -> String { "==".to_string() }

// ============================================================================
// LOADING AND VALIDATION
// ============================================================================

impl ServerConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Capacity as an unsigned limit, 0 meaning unbounded
    pub fn capacity(&self) -> usize {
        usize::try_from(self.max_number_of_alarms).unwrap_or(0)
    }

    /// Check the configuration before a server is built from it
    pub fn validate(&self) -> Result<()> {
        if self.max_number_of_alarms < 0 {
            return Err(AlarmError::Config(format!(
                "max_number_of_alarms must not be negative, got {}",
                self.max_number_of_alarms
            )));
        }
        if self.minimum_items_multiplier == 0 {
            return Err(AlarmError::Config(
                "minimum_items_multiplier must be at least 1".to_string(),
            ));
        }

        let mut group_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(AlarmError::Config(format!("Duplicate alarm group '{}'", group.name)));
            }
            group.validate()?;
        }
        Ok(())
    }
}

impl GroupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AlarmError::Config("Alarm group name must not be empty".to_string()));
        }
        let mut item_names = HashSet::new();
        for item in &self.items {
            if item.name.is_empty() {
                return Err(AlarmError::Config(format!(
                    "Alarm item in group '{}' has an empty name",
                    self.name
                )));
            }
            if !item_names.insert(item.name.as_str()) {
                return Err(AlarmError::Config(format!(
                    "Duplicate alarm item '{}' in group '{}'",
                    item.name, self.name
                )));
            }
            item.comparer.parse::<ComparerType>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
max_number_of_alarms: 50
store_type: StoreFirst
minimum_items_multiplier: 2
enable_sending_to_alarm_distributor_server: true
groups:
  - name: Tank Farm
    enable_distribution: true
    items:
      - name: LT-301
        trigger: 90.0
        comparer: ">="
        repeat_count: true
        priority: 1
        message: Level high
      - name: LS-302
        acknowledge_required: false
        history: false
        enable_distribution: false
"#;

    #[test]
    fn test_parse_sample() {
        let config = ServerConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.max_number_of_alarms, 50);
        assert_eq!(config.store_type, StoreType::StoreFirst);
        assert_eq!(config.minimum_items_multiplier, 2);
        assert!(config.enable_sending_to_alarm_distributor_server);
        assert!(config.enabled);

        let group = &config.groups[0];
        assert!(group.enable_distribution);
        assert_eq!(group.items[0].trigger, Value::Float(90.0));
        assert!(group.items[0].repeat_count);
        assert_eq!(group.items[0].enable_distribution, None);

        let switch = &group.items[1];
        assert_eq!(switch.trigger, Value::Bool(true));
        assert_eq!(switch.comparer, "==");
        assert!(!switch.acknowledge_required);
        assert!(!switch.history);
        assert_eq!(switch.enable_distribution, Some(false));

        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_yaml("{}").unwrap();
        assert_eq!(config.max_number_of_alarms, 0);
        assert_eq!(config.store_type, StoreType::StoreLast);
        assert_eq!(config.capacity(), 0);
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let config = ServerConfig {
            max_number_of_alarms: -1,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(AlarmError::Config(_))));
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let config = ServerConfig {
            minimum_items_multiplier: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(AlarmError::Config(_))));
    }

    #[test]
    fn test_unknown_comparer_rejected() {
        let mut item = ItemConfig::new("X");
        item.comparer = "approximately".to_string();
        let config = ServerConfig {
            groups: vec![GroupConfig::new("G").with_item(item)],
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(AlarmError::UnknownComparer(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = ServerConfig {
            groups: vec![GroupConfig::new("G"), GroupConfig::new("G")],
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let group = GroupConfig::new("G")
            .with_item(ItemConfig::new("A"))
            .with_item(ItemConfig::new("A"));
        assert!(group.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.groups[0].items.len(), 2);

        assert!(matches!(
            ServerConfig::from_file("/nonexistent/alarms.yaml"),
            Err(AlarmError::Io(_))
        ));
    }
}
