// src/item.rs - Alarm item: trigger configuration plus runtime condition
use crate::comparer::ComparerType;
use crate::config::ItemConfig;
use crate::error::Result;
use crate::event::EventSource;
use crate::value::Value;
use uuid::Uuid;

/// Edge of the item's alarm condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionEdge {
    Activated,
    Deactivated,
}

/// What an activation edge should do with the event list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Create a new Active event
    Create,
    /// Fold the activation into the item's open event
    Repeat(Uuid),
}

/// Runtime alarm item owned by an [`AlarmGroup`](crate::AlarmGroup).
///
/// The item remembers the last evaluated condition so only edges reach the
/// server, and it points at its open event: the most recent event that is
/// still retained and not yet Normal.
#[derive(Debug, Clone)]
pub struct AlarmItem {
    id: Uuid,
    config: ItemConfig,
    comparer: ComparerType,
    condition: bool,
    last_value: Option<Value>,
    open_event: Option<Uuid>,
}

impl AlarmItem {
    pub fn from_config(config: ItemConfig) -> Result<Self> {
        let comparer = config.comparer.parse::<ComparerType>()?;
        Ok(Self {
            id: config.id.unwrap_or_else(Uuid::new_v4),
            config,
            comparer,
            condition: false,
            last_value: None,
            open_event: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ItemConfig {
        &self.config
    }

    pub fn comparer(&self) -> ComparerType {
        self.comparer
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Last condition delivered while the item was not suppressed
    pub fn condition(&self) -> bool {
        self.condition
    }

    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    pub fn open_event(&self) -> Option<Uuid> {
        self.open_event
    }

    pub(crate) fn set_open_event(&mut self, id: Option<Uuid>) {
        self.open_event = id;
    }

    /// Compare `value` against the trigger. Does not change the item.
    pub fn evaluate(&self, value: &Value) -> Result<bool> {
        self.comparer.evaluate(value, &self.config.trigger)
    }

    pub(crate) fn record_value(&mut self, value: Value) {
        self.last_value = Some(value);
    }

    /// Store the new condition and report the edge, if any
    pub(crate) fn set_condition(&mut self, active: bool) -> Option<ConditionEdge> {
        if self.condition == active {
            return None;
        }
        self.condition = active;
        Some(if active {
            ConditionEdge::Activated
        } else {
            ConditionEdge::Deactivated
        })
    }

    /// Decide between a new event and a repeat of the open one
    pub fn activation(&self) -> Activation {
        match self.open_event {
            Some(id) if self.config.repeat_count => Activation::Repeat(id),
            _ => Activation::Create,
        }
    }

    /// Distribution eligibility of this item's events.
    ///
    /// An explicit item flag wins; otherwise the group flag applies. Nothing is
    /// distributed while the server-wide switch is off.
    pub fn is_enable_distribution(&self, server_enabled: bool, group_enabled: bool) -> bool {
        server_enabled && self.config.enable_distribution.unwrap_or(group_enabled)
    }

    pub(crate) fn event_source(&self, group_name: &str, distribution: bool) -> EventSource {
        EventSource {
            item_id: self.id,
            item_name: self.config.name.clone(),
            group_name: group_name.to_string(),
            message: self.config.message.clone(),
            priority: self.config.priority,
            acknowledge_required: self.config.acknowledge_required,
            history: self.config.history,
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;

    #[test]
    fn test_edges() {
        let mut item = AlarmItem::from_config(ItemConfig::new("XS-1")).unwrap();
        assert_eq!(item.set_condition(false), None);
        assert_eq!(item.set_condition(true), Some(ConditionEdge::Activated));
        assert_eq!(item.set_condition(true), None);
        assert_eq!(item.set_condition(false), Some(ConditionEdge::Deactivated));
    }

    #[test]
    fn test_activation_policy() {
        let mut config = ItemConfig::new("XS-1");
        let mut item = AlarmItem::from_config(config.clone()).unwrap();
        let open = Uuid::new_v4();
        assert_eq!(item.activation(), Activation::Create);
        item.set_open_event(Some(open));
        assert_eq!(item.activation(), Activation::Create);

        config.repeat_count = true;
        let mut item = AlarmItem::from_config(config).unwrap();
        assert_eq!(item.activation(), Activation::Create);
        item.set_open_event(Some(open));
        assert_eq!(item.activation(), Activation::Repeat(open));
    }

    #[test]
    fn test_distribution_precedence() {
        let mut config = ItemConfig::new("XS-1");
        let item = AlarmItem::from_config(config.clone()).unwrap();
        assert!(item.is_enable_distribution(true, true));
        assert!(!item.is_enable_distribution(true, false));
        assert!(!item.is_enable_distribution(false, true));

        config.enable_distribution = Some(false);
        let item = AlarmItem::from_config(config.clone()).unwrap();
        assert!(!item.is_enable_distribution(true, true));

        config.enable_distribution = Some(true);
        let item = AlarmItem::from_config(config).unwrap();
        assert!(item.is_enable_distribution(true, false));
        assert!(!item.is_enable_distribution(false, false));
    }

    #[test]
    fn test_configured_id_is_kept() {
        let id = Uuid::new_v4();
        let mut config = ItemConfig::new("XS-1");
        config.id = Some(id);
        assert_eq!(AlarmItem::from_config(config).unwrap().id(), id);
    }

    #[test]
    fn test_unknown_comparer() {
        let mut config = ItemConfig::new("XS-1");
        config.comparer = "between".to_string();
        assert!(matches!(
            AlarmItem::from_config(config),
            Err(AlarmError::UnknownComparer(_))
        ));
    }
}
