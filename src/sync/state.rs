//! 拦截功能开关状态

use std::fmt;
use serde::{Deserialize, Serialize};

/// 功能开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    Enabled,
    #[default]
    Disabled,
}

impl FeatureState {
    pub fn is_enabled(&self) -> bool {
        *self == FeatureState::Enabled
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureState::Enabled => write!(f, "enabled"),
            FeatureState::Disabled => write!(f, "disabled"),
        }
    }
}
