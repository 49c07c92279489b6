// src/group.rs - Named container of alarm items
use crate::config::GroupConfig;
use crate::error::{AlarmError, Result};
use crate::item::AlarmItem;
use uuid::Uuid;

/// Alarm group. Disabling a group suppresses every item in it.
#[derive(Debug, Clone)]
pub struct AlarmGroup {
    name: String,
    enabled: bool,
    enable_distribution: bool,
    items: Vec<AlarmItem>,
}

impl AlarmGroup {
    pub fn from_config(config: GroupConfig) -> Result<Self> {
        config.validate()?;
        let items = config
            .items
            .into_iter()
            .map(AlarmItem::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: config.name,
            enabled: config.enabled,
            enable_distribution: config.enable_distribution,
            items,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enable_distribution(&self) -> bool {
        self.enable_distribution
    }

    pub fn items(&self) -> &[AlarmItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [AlarmItem] {
        &mut self.items
    }

    pub fn item(&self, name: &str) -> Option<&AlarmItem> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub(crate) fn item_index(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| AlarmError::ItemNotFound {
                group: self.name.clone(),
                item: name.to_string(),
            })
    }

    pub(crate) fn item_by_id_mut(&mut self, id: Uuid) -> Option<&mut AlarmItem> {
        self.items.iter_mut().find(|i| i.id() == id)
    }
}
