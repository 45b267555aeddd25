//! 触发窗口评估
//!
//! 判断模板的生效窗口是否包含当前时间。两端均为 unix 秒，闭区间，不做时区处理。

use serde::Deserialize;
use serde_json::Value;

use crate::error::{OfferError, Result};

/// 模板触发条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// 未声明窗口，始终生效
    Always,
    /// 时间窗口 [from, to]
    Window { from: i64, to: i64 },
}

#[derive(Deserialize)]
struct WindowJson {
    from: i64,
    to: i64,
}

impl Trigger {
    /// 从模板中存储的 JSON 解码
    ///
    /// null 或空对象解码为 `Always`；其余必须同时包含整数 from/to
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Always),
            Value::Object(map) if map.is_empty() => Ok(Self::Always),
            _ => {
                let window: WindowJson = serde_json::from_value(value.clone())
                    .map_err(|e| OfferError::ValidationFailed(format!("invalid trigger: {}", e)))?;
                Ok(Self::Window {
                    from: window.from,
                    to: window.to,
                })
            }
        }
    }

    /// 客户端看到的过期时间，无窗口时为 0
    pub fn expire_at(&self) -> i64 {
        match self {
            Self::Always => 0,
            Self::Window { to, .. } => *to,
        }
    }
}

/// 判断触发条件在 `now` 是否生效
pub fn is_triggered(trigger: &Trigger, now: i64) -> bool {
    match *trigger {
        Trigger::Always => true,
        Trigger::Window { from, to } => from <= now && now <= to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_window_bounds_are_inclusive() {
        let trigger = Trigger::Window { from: 10, to: 20 };
        assert!(!is_triggered(&trigger, 9));
        assert!(is_triggered(&trigger, 10));
        assert!(is_triggered(&trigger, 15));
        assert!(is_triggered(&trigger, 20));
        assert!(!is_triggered(&trigger, 21));
    }

    #[test]
    fn test_window_matches_definition_over_range() {
        let windows = [(0, 0), (-5, 5), (100, 50), (i64::MIN, i64::MAX)];
        for (from, to) in windows {
            let trigger = Trigger::Window { from, to };
            for now in [-10, -5, 0, 5, 49, 50, 100, 101] {
                assert_eq!(is_triggered(&trigger, now), from <= now && now <= to);
            }
        }
    }

    #[test]
    fn test_always_trigger() {
        assert!(is_triggered(&Trigger::Always, i64::MIN));
        assert!(is_triggered(&Trigger::Always, 0));
        assert_eq!(Trigger::Always.expire_at(), 0);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Trigger::from_json(&json!({"from": 1, "to": 2})).unwrap(),
            Trigger::Window { from: 1, to: 2 }
        );
        assert_eq!(Trigger::from_json(&Value::Null).unwrap(), Trigger::Always);
        assert_eq!(Trigger::from_json(&json!({})).unwrap(), Trigger::Always);
        assert_eq!(
            Trigger::from_json(&json!({"from": 1, "to": 2})).unwrap().expire_at(),
            2
        );
    }

    #[test]
    fn test_from_json_rejects_malformed_window() {
        assert!(matches!(
            Trigger::from_json(&json!({"from": "yesterday", "to": 2})),
            Err(OfferError::ValidationFailed(_))
        ));
        assert!(Trigger::from_json(&json!({"from": 1})).is_err());
        assert!(Trigger::from_json(&json!([1, 2])).is_err());
    }
}
