//! JSON 取值辅助函数
//!
//! 数值强制转换、日期解析与结构化相等比较，供操作符、编译器和冲突检测共用。

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// 尝试将 Value 转换为 f64
///
/// 接受 JSON 数字和可解析为数字的字符串，NaN / 无穷大视为不可转换。
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    n.is_finite().then_some(n)
}

/// 数值相等（容忍 f64 精度误差，避免 100 与 100.0 比较失败）
pub fn num_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}

/// 解析日期时间
///
/// 支持 RFC 3339、纯日期 `YYYY-MM-DD`（按 UTC 零点）以及 Unix 毫秒时间戳。
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// 结构化深度相等
///
/// 与 `Value` 自带的 `==` 不同，数字按数值比较（1 与 1.0 相等）。
/// 两边都是整数时按整数比较，超过 2^53 的整数不会因 f64 精度而误判相等。
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                return match (x.as_f64(), y.as_f64()) {
                    (Some(fx), Some(fy)) => fx == fy,
                    _ => false,
                };
            }
            match (x.as_i64(), y.as_i64()) {
                (Some(ix), Some(iy)) => ix == iy,
                _ => x.as_u64().is_some() && x.as_u64() == y.as_u64(),
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_eq(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, xv)| ym.get(k).is_some_and(|yv| deep_eq(xv, yv)))
        }
        _ => a == b,
    }
}

/// 按点号路径在嵌套对象/数组中取值（如 "profile.plan" 或 "items.0.sku"）
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;

    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}
