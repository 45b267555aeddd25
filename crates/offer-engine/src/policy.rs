//! 频率 / 周期策略评估
//!
//! 根据模板的展示频率（frequency）与领取周期（period）配置以及玩家计数，
//! 计算当前是否满足资格以及下一次可用时间。所有函数均为纯函数。
//!
//! ## 评估顺序
//!
//! 1. 展示次数已达 frequency.max：不满足，next_at = 0（永不再出现）
//! 2. 否则若 frequency.every 冷却未结束：不满足，候选 next_at = 上次展示 + every
//! 3. 领取次数已达 period.max：不满足，next_at = 0
//! 4. 否则若 period.every 冷却未结束：不满足，候选 next_at = 上次领取 + every
//! 5. 均未阻塞且两个 every 都未配置：满足，next_at = now
//! 6. 其余情况 next_at 取已配置冷却到期时间中较晚者
//!
//! 非法时长字符串直接返回错误，中止该模板的评估。

use chrono::Duration;

use crate::duration::{add_to_timestamp, parse_duration};
use crate::error::Result;
use crate::models::{FrequencyOrPeriod, PlayerCounters};

/// 资格评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    /// 下一次可用时间（unix 秒），0 表示永不
    pub next_at: i64,
}

impl Eligibility {
    fn never() -> Self {
        Self {
            eligible: false,
            next_at: 0,
        }
    }
}

fn parse_every(policy: &FrequencyOrPeriod) -> Result<Option<Duration>> {
    if policy.has_every() {
        parse_duration(&policy.every).map(Some)
    } else {
        Ok(None)
    }
}

/// 评估玩家当前是否有资格看到模板
pub fn evaluate(
    frequency: &FrequencyOrPeriod,
    period: &FrequencyOrPeriod,
    counters: &PlayerCounters,
    now: i64,
) -> Result<Eligibility> {
    // 先解析两个时长，任一非法都中止评估
    let frequency_every = parse_every(frequency)?;
    let period_every = parse_every(period)?;

    let mut blocked = false;

    if frequency.has_max() && counters.view_counter >= frequency.max {
        return Ok(Eligibility::never());
    }
    let view_ready_at = frequency_every.map(|d| add_to_timestamp(counters.view_timestamp, d));
    if view_ready_at.is_some_and(|t| t > now) {
        blocked = true;
    }

    if period.has_max() && counters.claim_counter >= period.max {
        return Ok(Eligibility::never());
    }
    let claim_ready_at = period_every.map(|d| add_to_timestamp(counters.claim_timestamp, d));
    if claim_ready_at.is_some_and(|t| t > now) {
        blocked = true;
    }

    let next_at = match (view_ready_at, claim_ready_at) {
        (None, None) => now,
        (Some(v), None) => v,
        (None, Some(c)) => c,
        (Some(v), Some(c)) => v.max(c),
    };

    Ok(Eligibility {
        eligible: !blocked,
        next_at,
    })
}

/// 计算一次领取之后的下一次可用时间
///
/// `claimed_at` 为被计数的那次领取的时间戳。模板已禁用或领取次数已达上限时返回 0。
pub fn next_claim_at(
    enabled: bool,
    frequency: &FrequencyOrPeriod,
    period: &FrequencyOrPeriod,
    claim_counter: i64,
    claimed_at: i64,
) -> Result<i64> {
    if !enabled {
        return Ok(0);
    }
    if period.has_max() && claim_counter >= period.max {
        return Ok(0);
    }

    let period_every = parse_every(period)?;
    let frequency_every = parse_every(frequency)?;

    let next_at = match (period_every, frequency_every) {
        (None, None) => claimed_at,
        (p, f) => {
            let by_period = p.map(|d| add_to_timestamp(claimed_at, d));
            let by_frequency = f.map(|d| add_to_timestamp(claimed_at, d));
            by_period.into_iter().chain(by_frequency).max().unwrap_or(claimed_at)
        }
    };
    Ok(next_at)
}

/// 计算一次曝光之后的下一次可用时间
pub fn next_view_at(frequency: &FrequencyOrPeriod, view_counter: i64, viewed_at: i64) -> Result<i64> {
    if frequency.has_max() && view_counter >= frequency.max {
        return Ok(0);
    }
    Ok(match parse_every(frequency)? {
        Some(d) => add_to_timestamp(viewed_at, d),
        None => viewed_at,
    })
}
