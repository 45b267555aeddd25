//! 时长字符串解析
//!
//! 模板中的 `every` 使用 Go 风格时长：可选符号，后跟一个或多个
//! "数字[.小数]单位" 片段，单位为 ns、us、µs、ms、s、m、h，例如 "1h30m"、"1.5s"。
//! 单独的 "0" 也是合法的。

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

use crate::error::{OfferError, Result};

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)").expect("valid duration regex")
});

static WHOLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:(?:\d+(?:\.\d*)?|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+$")
        .expect("valid duration regex")
});

const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn unit_nanos(unit: &str) -> i64 {
    match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        _ => 3_600 * NANOS_PER_SECOND,
    }
}

/// 解析时长字符串
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || OfferError::ValidationFailed(format!("invalid duration: {:?}", input));

    // 至多一个符号
    let unsigned = input
        .strip_prefix('-')
        .or_else(|| input.strip_prefix('+'))
        .unwrap_or(input);
    if unsigned == "0" {
        return Ok(Duration::zero());
    }
    if !WHOLE.is_match(input) {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    for caps in SEGMENT.captures_iter(unsigned) {
        let number = &caps[1];
        let scale = unit_nanos(&caps[2]);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };

        let mut nanos = int_value.checked_mul(scale).ok_or_else(invalid)?;
        if !frac_part.is_empty() {
            // 小数部分最多保留到纳秒精度
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac_value: i128 = digits.parse().map_err(|_| invalid())?;
            let frac_nanos = frac_value * scale as i128 / 10_i128.pow(digits.len() as u32);
            nanos = nanos
                .checked_add(i64::try_from(frac_nanos).map_err(|_| invalid())?)
                .ok_or_else(invalid)?;
        }
        total = total.checked_add(nanos).ok_or_else(invalid)?;
    }

    if input.starts_with('-') {
        total = -total;
    }
    Ok(Duration::nanoseconds(total))
}

/// unix 秒加上时长，结果向下取整到秒
pub fn add_to_timestamp(timestamp: i64, duration: Duration) -> i64 {
    let nanos = duration.num_nanoseconds().unwrap_or(i64::MAX);
    timestamp.saturating_add(nanos.div_euclid(NANOS_PER_SECOND))
}
