//! 同步模块：本地规则集与外部引擎之间的状态同步
pub mod state;
pub mod reconciler;
pub mod service;

pub use self::reconciler::{Reconciler, SELF_ALLOW_RULE_ID, compute_delta, reserved_rules, to_wire_rules};
pub use self::service::{ImportOutcome, RuleSyncService};
pub use self::state::FeatureState;
