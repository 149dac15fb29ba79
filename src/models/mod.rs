use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 默认的键占位符名称
pub const DEFAULT_KEY_NAME: &str = "loopee_key";
/// 默认的值占位符名称
pub const DEFAULT_VALUE_NAME: &str = "loopee_value";
/// 默认的计数占位符名称
pub const DEFAULT_COUNT_NAME: &str = "loopee_count";
/// `by` 参数的默认步长
pub const DEFAULT_STEP: i64 = 1;

/// 可识别的参数名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamName {
    Foreach,
    Forint,
    To,
    By,
    As,
    Count,
    Backspace,
}

impl ParamName {
    /// 按解析顺序排列的全部参数
    pub const ALL: [ParamName; 7] = [
        ParamName::Foreach,
        ParamName::Forint,
        ParamName::To,
        ParamName::By,
        ParamName::As,
        ParamName::Count,
        ParamName::Backspace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Foreach => "foreach",
            ParamName::Forint => "forint",
            ParamName::To => "to",
            ParamName::By => "by",
            ParamName::As => "as",
            ParamName::Count => "count",
            ParamName::Backspace => "backspace",
        }
    }

    /// 从参数名解析，未知名称返回 None
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// 是否始终保持为集合（单个元素也不折叠）
    pub fn keeps_collection(&self) -> bool {
        matches!(self, ParamName::Foreach)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析后的参数值
///
/// `List` 的键是元素的位置（从0开始）；`KeyedList` 携带 `key:value` 中声明的键，
/// 混入其中的普通元素以位置的十进制字符串作为键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
    KeyedList(Vec<(String, String)>),
}

impl ParamValue {
    /// 按存储顺序返回 (键, 值) 对
    pub fn entries(&self) -> Vec<(String, &str)> {
        match self {
            ParamValue::Scalar(value) => vec![("0".to_string(), value.as_str())],
            ParamValue::List(values) => values
                .iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value.as_str()))
                .collect(),
            ParamValue::KeyedList(pairs) => pairs
                .iter()
                .map(|(key, value)| (key.clone(), value.as_str()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParamValue::Scalar(_) => 1,
            ParamValue::List(values) => values.len(),
            ParamValue::KeyedList(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 解析完成的参数集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// 要遍历的列表，未设置时枚举循环不产生输出
    pub foreach: Option<ParamValue>,
    pub forint: i64,
    pub to: i64,
    pub by: i64,
    /// `as` 参数：单个值占位符名，或 `键名:值名`
    pub names: ParamValue,
    pub count: String,
    pub backspace: i64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            foreach: None,
            forint: 0,
            to: 0,
            by: DEFAULT_STEP,
            names: ParamValue::KeyedList(vec![(
                DEFAULT_KEY_NAME.to_string(),
                DEFAULT_VALUE_NAME.to_string(),
            )]),
            count: DEFAULT_COUNT_NAME.to_string(),
            backspace: 0,
        }
    }
}

/// 参数值的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Explicit,
    Embed,
    Default,
}

impl ParamSource {
    /// 查找顺序，先命中者生效
    pub const LOOKUP_ORDER: [ParamSource; 3] =
        [ParamSource::Explicit, ParamSource::Embed, ParamSource::Default];
}

/// YAML中的参数输入，允许直接写数字或布尔值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamInput {
    Integer(i64),
    Float(f64),
    Flag(bool),
    Text(String),
}

impl ParamInput {
    pub fn to_param_string(&self) -> String {
        match self {
            ParamInput::Integer(value) => value.to_string(),
            ParamInput::Float(value) => value.to_string(),
            ParamInput::Flag(true) => "1".to_string(),
            ParamInput::Flag(false) => String::new(),
            ParamInput::Text(value) => value.clone(),
        }
    }
}

/// 一次调用的完整描述
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invocation {
    /// 标签上显式给出的参数
    #[serde(default)]
    pub params: HashMap<String, ParamInput>,
    /// 外层 embed 上下文中的变量，键可以带 `embed:` 前缀
    #[serde(default)]
    pub embed: HashMap<String, ParamInput>,
    /// 允许从 embed 上下文继承的参数名
    #[serde(default)]
    pub embed_whitelist: Vec<String>,
    /// 标签对之间的模板文本
    #[serde(default)]
    pub template: String,
}
