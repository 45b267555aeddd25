//! 模板过滤属性匹配
//!
//! 模板以 `{"attr": {"op": value}}` 声明过滤条件，请求携带 `attr=value` 形式的
//! 属性集合。支持的操作符：
//!
//! - `eq` / `neq`：字符串相等 / 不等
//! - `geq` / `lt`：数值区间，下界包含、上界不包含，均可省略
//!
//! 请求中的每个属性都必须被模板声明并满足；未声明时仅在通配模式下放行。
//! 模板声明而请求未携带的属性不参与判断。

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{OfferError, Result};

/// 请求携带的过滤属性
pub type FilterAttributes = BTreeMap<String, String>;

static SAFE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("valid regex"));

/// 单个属性上的条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRule {
    pub eq: Option<String>,
    pub neq: Option<String>,
    pub geq: Option<f64>,
    pub lt: Option<f64>,
}

impl FilterRule {
    fn from_json(attr: &str, value: &Value) -> Result<Self> {
        let ops = value.as_object().ok_or_else(|| {
            OfferError::ValidationFailed(format!("filter {} must be an object", attr))
        })?;

        let mut rule = Self::default();
        for (op, operand) in ops {
            match op.as_str() {
                "eq" => rule.eq = Some(operand_as_string(attr, operand)?),
                "neq" => rule.neq = Some(operand_as_string(attr, operand)?),
                "geq" => rule.geq = Some(operand_as_number(attr, operand)?),
                "lt" => rule.lt = Some(operand_as_number(attr, operand)?),
                other => {
                    return Err(OfferError::ValidationFailed(format!(
                        "filter {} has unknown operator {}",
                        attr, other
                    )));
                }
            }
        }
        Ok(rule)
    }

    /// 判断请求值是否满足条件
    pub fn accepts(&self, value: &str) -> bool {
        if self.eq.as_deref().is_some_and(|eq| eq != value) {
            return false;
        }
        if self.neq.as_deref().is_some_and(|neq| neq == value) {
            return false;
        }
        if self.geq.is_none() && self.lt.is_none() {
            return true;
        }

        let Ok(number) = value.parse::<f64>() else {
            return false;
        };
        self.geq.is_none_or(|geq| number >= geq) && self.lt.is_none_or(|lt| number < lt)
    }
}

fn operand_as_string(attr: &str, operand: &Value) -> Result<String> {
    match operand {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(OfferError::ValidationFailed(format!(
            "filter {} operand must be a scalar",
            attr
        ))),
    }
}

fn operand_as_number(attr: &str, operand: &Value) -> Result<f64> {
    let number = match operand {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    number.ok_or_else(|| {
        OfferError::ValidationFailed(format!("filter {} operand must be numeric", attr))
    })
}

/// 模板声明的全部过滤条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFilters {
    rules: BTreeMap<String, FilterRule>,
}

impl TemplateFilters {
    /// 从模板中存储的 JSON 解码，null 视为未声明
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => {
                return Err(OfferError::ValidationFailed(
                    "filters must be an object".to_string(),
                ));
            }
        };

        let rules = map
            .iter()
            .map(|(attr, rule)| Ok((attr.clone(), FilterRule::from_json(attr, rule)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, attr: &str) -> Option<&FilterRule> {
        self.rules.get(attr)
    }

    /// 判断模板是否匹配请求属性
    pub fn matches(&self, attrs: &FilterAttributes, allow_wildcard: bool) -> bool {
        attrs.iter().all(|(attr, value)| match self.rules.get(attr) {
            Some(rule) => rule.accepts(value),
            None => allow_wildcard,
        })
    }
}

/// 校验请求属性
///
/// 任一键或值包含 `[A-Za-z0-9_.]` 以外的字符时整个属性集合被忽略，
/// 返回空集合（不过滤）
pub fn sanitize_attributes(attrs: FilterAttributes) -> FilterAttributes {
    let invalid = attrs
        .iter()
        .find(|(k, v)| !SAFE_TOKEN.is_match(k) || !SAFE_TOKEN.is_match(v));

    if let Some((key, value)) = invalid {
        warn!(key = %key, value = %value, "Ignoring filter attributes with unsupported characters");
        return FilterAttributes::new();
    }
    attrs
}
