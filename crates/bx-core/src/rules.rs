//! Declarative network rules
//!
//! Builds `declarativeNetRequest` dynamic rules from the block list. Rules are
//! never stored on our side; they are rebuilt in full on every list change.

use serde::{Deserialize, Serialize};

use crate::types::{BlockList, BlockPattern};

/// Priority used for every generated rule.
pub const RULE_PRIORITY: u32 = 1;

/// Action taken by a rule. Only `Block` is ever generated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Block,
    Allow,
    Redirect,
    UpgradeScheme,
    ModifyHeaders,
    AllowAllRequests,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
}

/// Request types a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

/// A single dynamic rule as the filtering engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub id: u32,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

fn default_priority() -> u32 {
    RULE_PRIORITY
}

/// Combined remove+add request for `updateDynamicRules`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<FilterRule>,
}

/// `||` host anchor prefix in front of the pattern.
pub fn url_filter(pattern: &BlockPattern) -> String {
    format!("||{}", pattern.as_str())
}

impl FilterRule {
    /// Main-frame block rule for `pattern` at the given 1-based position.
    pub fn block(id: u32, pattern: &BlockPattern) -> Self {
        Self {
            id,
            priority: RULE_PRIORITY,
            action: RuleAction { kind: ActionType::Block },
            condition: RuleCondition {
                url_filter: Some(url_filter(pattern)),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }
}

/// One rule per pattern, numbered from 1 in list order.
pub fn build_rules(list: &BlockList) -> Vec<FilterRule> {
    list.iter()
        .enumerate()
        .map(|(index, pattern)| FilterRule::block(index as u32 + 1, pattern))
        .collect()
}

/// Replace every currently active rule with the rules for `list`.
pub fn plan_update(current: &[FilterRule], list: &BlockList) -> RuleUpdate {
    RuleUpdate {
        remove_rule_ids: current.iter().map(|rule| rule.id).collect(),
        add_rules: build_rules(list),
    }
}
