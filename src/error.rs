use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::models::ParamName;

/// 范围循环被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSkip {
    /// 起点与终点相同
    SameBounds,
    /// 步长为0
    ZeroStep,
    /// 步长方向无法到达终点
    WrongDirection,
}

impl fmt::Display for RangeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSkip::SameBounds => f.write_str("start equals stop"),
            RangeSkip::ZeroStep => f.write_str("step is zero"),
            RangeSkip::WrongDirection => f.write_str("step points away from stop"),
        }
    }
}

/// 被静默降级处理的输入问题
///
/// 默认的渲染路径不会因为这些问题失败，只会把它们收集起来交给调用方决定是否展示。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("parameter '{name}' is not a clean integer: {raw:?}, using {coerced}")]
    InvalidInteger {
        name: ParamName,
        raw: String,
        coerced: i64,
    },

    #[error("parameter '{name}' is out of range: {raw:?}, saturated to {coerced}")]
    IntegerOverflow {
        name: ParamName,
        raw: String,
        coerced: i64,
    },

    #[error("parameter '{name}' got a list of {len} entries where an integer was expected, using {coerced}")]
    CollectionAsInteger {
        name: ParamName,
        len: usize,
        coerced: i64,
    },

    #[error("parameter '{name}' does not accept a list, keeping the default")]
    ListNotAllowed { name: ParamName },

    #[error("parameter '{name}' has no entries after splitting {raw:?}")]
    EmptyParameter { name: ParamName, raw: String },

    #[error("unknown parameter '{name}' ignored")]
    UnknownParameter { name: String },

    #[error("range {start} to {stop} by {step} skipped: {reason}")]
    RangeSkipped {
        start: i64,
        stop: i64,
        step: i64,
        reason: RangeSkip,
    },

    #[error("backspace {backspace} exceeds output length {len}, output cleared")]
    BackspaceOverrun { backspace: i64, len: usize },
}

/// 库边界返回的错误
#[derive(Debug, Error)]
pub enum LoopError {
    /// 严格模式下存在诊断信息
    #[error("{count} diagnostic(s) raised, first: {first}")]
    Strict { first: Diagnostic, count: usize },

    #[error("Failed to parse YAML invocation: {source}")]
    Config {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("invalid invocation: {message}")]
    Validation { message: String },
}

impl LoopError {
    /// 有诊断信息时转换为错误
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Option<Self> {
        diagnostics.first().map(|first| LoopError::Strict {
            first: first.clone(),
            count: diagnostics.len(),
        })
    }
}

/// 记录一条诊断信息并输出警告日志
pub(crate) fn record(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    warn!("{}", diagnostic);
    diagnostics.push(diagnostic);
}
