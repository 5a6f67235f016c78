//! Report Context - Value Objects

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 待安装更新数
///
/// 服务器可能返回数字，也可能返回哨兵字符串 `"N/A"`；其他字符串一律视为不可用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingUpdates {
    Count(u32),
    Unavailable,
}

impl PendingUpdates {
    pub fn count(&self) -> Option<u32> {
        match self {
            PendingUpdates::Count(n) => Some(*n),
            PendingUpdates::Unavailable => None,
        }
    }
}

impl std::fmt::Display for PendingUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingUpdates::Count(n) => write!(f, "{}", n),
            PendingUpdates::Unavailable => write!(f, "N/A"),
        }
    }
}

impl Serialize for PendingUpdates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PendingUpdates::Count(n) => serializer.serialize_u32(*n),
            PendingUpdates::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for PendingUpdates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PendingUpdatesVisitor;

        impl<'de> Visitor<'de> for PendingUpdatesVisitor {
            type Value = PendingUpdates;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a non-negative count or \"N/A\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(u32::try_from(v)
                    .map(PendingUpdates::Count)
                    .unwrap_or(PendingUpdates::Unavailable))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(u32::try_from(v)
                    .map(PendingUpdates::Count)
                    .unwrap_or(PendingUpdates::Unavailable))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.is_finite() && v >= 0.0 && v <= u32::MAX as f64 && v.fract() == 0.0 {
                    Ok(PendingUpdates::Count(v as u32))
                } else {
                    Ok(PendingUpdates::Unavailable)
                }
            }

            fn visit_str<E: de::Error>(self, _v: &str) -> Result<Self::Value, E> {
                Ok(PendingUpdates::Unavailable)
            }
        }

        deserializer.deserialize_any(PendingUpdatesVisitor)
    }
}

/// 主机指标
///
/// 所有字段均可缺失，派生值（如内存百分比）由调用方计算
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "cpuUsage", default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,

    #[serde(rename = "totalMemoryGB", default, skip_serializing_if = "Option::is_none")]
    pub total_memory_gb: Option<f64>,

    #[serde(rename = "usedMemoryGB", default, skip_serializing_if = "Option::is_none")]
    pub used_memory_gb: Option<f64>,

    #[serde(rename = "diskUsedPercent", default, skip_serializing_if = "Option::is_none")]
    pub disk_used_percent: Option<f64>,

    #[serde(rename = "usedDiskGB", default, skip_serializing_if = "Option::is_none")]
    pub used_disk_gb: Option<f64>,

    #[serde(rename = "totalDiskGB", default, skip_serializing_if = "Option::is_none")]
    pub total_disk_gb: Option<f64>,

    #[serde(rename = "pendingUpdates", default, skip_serializing_if = "Option::is_none")]
    pub pending_updates: Option<PendingUpdates>,
}

impl Metrics {
    /// 内存使用百分比，总内存缺失或非正时返回 None
    pub fn used_memory_percent(&self) -> Option<f64> {
        let total = self.total_memory_gb.filter(|t| *t > 0.0)?;
        let used = self.used_memory_gb?;
        Some(used / total * 100.0)
    }
}

/// 关键服务状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: String,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_updates_number_or_sentinel() {
        let n: PendingUpdates = serde_json::from_str("3").unwrap();
        assert_eq!(n, PendingUpdates::Count(3));
        assert_eq!(n.count(), Some(3));

        let na: PendingUpdates = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(na, PendingUpdates::Unavailable);
        assert_eq!(na.to_string(), "N/A");
        assert_eq!(serde_json::to_string(&na).unwrap(), "\"N/A\"");
    }

    #[test]
    fn test_metrics_wire_names() {
        let json = r#"{"cpuUsage": 42, "totalMemoryGB": 16, "usedMemoryGB": 8, "pendingUpdates": "N/A"}"#;
        let metrics: Metrics = serde_json::from_str(json).unwrap();
        assert_eq!(metrics.cpu_usage, Some(42.0));
        assert_eq!(metrics.used_memory_percent(), Some(50.0));
        assert_eq!(metrics.pending_updates, Some(PendingUpdates::Unavailable));
        assert!(metrics.used_disk_gb.is_none());
    }

    #[test]
    fn test_memory_percent_requires_positive_total() {
        let metrics = Metrics {
            total_memory_gb: Some(0.0),
            used_memory_gb: Some(4.0),
            ..Default::default()
        };
        assert!(metrics.used_memory_percent().is_none());

        let metrics = Metrics {
            total_memory_gb: Some(8.0),
            ..Default::default()
        };
        assert!(metrics.used_memory_percent().is_none());
    }

    #[test]
    fn test_service_running() {
        let svc = ServiceStatus {
            name: "W32Time".to_string(),
            status: "Running".to_string(),
        };
        assert!(svc.is_running());
    }
}
