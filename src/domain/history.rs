//! Sample History - 指标采样历史
//!
//! 固定容量的 FIFO 环形缓冲，保存最近 N 个采样用于趋势展示

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::report::Metrics;

/// 默认历史容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 15;

/// 一次指标采样
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// 单调采集时间（毫秒，相对会话开始）
    pub timestamp: u64,
    /// 墙钟时间，用于坐标轴标签
    pub recorded_at: DateTime<Utc>,
    pub used_percent: f64,
    pub cpu_usage: f64,
}

impl Sample {
    /// 从指标派生采样
    ///
    /// 总内存缺失或非正、已用内存缺失时返回 None；CPU 缺失记为 0
    pub fn from_metrics(metrics: &Metrics, timestamp: u64, recorded_at: DateTime<Utc>) -> Option<Self> {
        let used_percent = metrics.used_memory_percent()?;
        Some(Self {
            timestamp,
            recorded_at,
            used_percent,
            cpu_usage: metrics.cpu_usage.unwrap_or(0.0),
        })
    }
}

/// 采样历史缓冲
///
/// 单写者：只有监控会话追加
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleHistory {
    /// 创建缓冲，容量限制在 1..=15
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, DEFAULT_HISTORY_CAPACITY);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加采样，满时先淘汰最旧的
    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// 按采集顺序返回当前内容
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
