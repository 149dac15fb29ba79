use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{record, Diagnostic};
use crate::models::{ParamName, ParamSource, ParamValue, ParameterSet};

/// 嵌入上下文变量的前缀
const EMBED_PREFIX: &str = "embed:";

/// `key:value` 片段匹配正则
///
/// 值不能跨行，但允许片段以一个换行符结尾（换行符不计入值）。
fn pair_regex() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_-]*):([^\n]*)\n?$").expect("static pair pattern")
    })
}

/// 参数解析结果
#[derive(Debug, Clone)]
pub struct Resolution {
    pub params: ParameterSet,
    /// 每个参数最终生效的来源
    pub sources: BTreeMap<ParamName, ParamSource>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 参数解析器
///
/// 按 显式参数 > embed 上下文（仅白名单参数） > 默认值 的优先级确定每个参数的值，
/// 然后做管道符拆分、冒号键值拆分和单值折叠。
#[derive(Debug, Clone, Default)]
pub struct ParamResolver {
    /// 标签上显式给出的参数
    params: HashMap<String, String>,
    /// embed 上下文变量，键不带前缀
    embed: HashMap<String, String>,
    /// 允许从 embed 继承的参数
    embed_whitelist: HashSet<ParamName>,
}

impl ParamResolver {
    /// 创建新的参数解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置显式参数
    pub fn set_param<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 批量设置显式参数
    pub fn set_params(&mut self, params: HashMap<String, String>) -> &mut Self {
        for (key, value) in params {
            self.params.insert(key, value);
        }
        self
    }

    /// 设置 embed 上下文变量，`embed:` 前缀可有可无
    pub fn set_embed<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        let key = key.into();
        let key = key
            .strip_prefix(EMBED_PREFIX)
            .map(str::to_string)
            .unwrap_or(key);
        self.embed.insert(key, value.into());
        self
    }

    /// 允许指定参数从 embed 上下文继承
    pub fn allow_embed(&mut self, name: ParamName) -> &mut Self {
        self.embed_whitelist.insert(name);
        self
    }

    /// 解析全部参数
    pub fn resolve(&self) -> Resolution {
        let mut params = ParameterSet::default();
        let mut sources = BTreeMap::new();
        let mut diagnostics = Vec::new();

        let mut unknown: Vec<&String> = self
            .params
            .keys()
            .filter(|key| ParamName::parse(key).is_none())
            .collect();
        unknown.sort();
        for key in unknown {
            record(
                &mut diagnostics,
                Diagnostic::UnknownParameter { name: key.clone() },
            );
        }

        for name in ParamName::ALL {
            let (source, raw) = self.lookup(name);
            sources.insert(name, source);

            // 默认值已经在 ParameterSet::default() 中
            let Some(raw) = raw else {
                debug!("Parameter '{}' uses its default", name);
                continue;
            };

            debug!("Parameter '{}' set from {:?}: {:?}", name, source, raw);
            let value = normalize(name, raw, &mut diagnostics);
            assign(&mut params, name, value, raw, &mut diagnostics);
        }

        Resolution {
            params,
            sources,
            diagnostics,
        }
    }

    /// 按来源顺序查找参数的原始字符串
    fn lookup(&self, name: ParamName) -> (ParamSource, Option<&str>) {
        ParamSource::LOOKUP_ORDER
            .into_iter()
            .find_map(|source| self.fetch(source, name).map(|raw| (source, Some(raw))))
            .unwrap_or((ParamSource::Default, None))
    }

    fn fetch(&self, source: ParamSource, name: ParamName) -> Option<&str> {
        let raw = match source {
            ParamSource::Explicit => self.params.get(name.as_str()),
            ParamSource::Embed if self.embed_whitelist.contains(&name) => {
                self.embed.get(name.as_str())
            }
            ParamSource::Embed | ParamSource::Default => None,
        };
        // 空字符串视为未设置
        raw.map(String::as_str).filter(|raw| !raw.is_empty())
    }
}

/// 按未转义的管道符拆分，丢弃空片段，并把 `\|` 还原为 `|`
pub fn split_pipes(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in raw.chars() {
        if ch == '|' && !escaped {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
        escaped = ch == '\\';
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
        .into_iter()
        .map(|part| part.replace("\\|", "|"))
        .collect()
}

/// 把原始字符串解析为 `List` 或 `KeyedList`，不做折叠
pub fn parse_value(raw: &str) -> ParamValue {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut keyed = false;

    for (index, part) in split_pipes(raw).into_iter().enumerate() {
        let pair = pair_regex()
            .captures(&part)
            .map(|captures| (captures[1].to_string(), captures[2].to_string()));
        let (key, value) = match pair {
            Some(pair) => {
                keyed = true;
                pair
            }
            None => (index.to_string(), part),
        };

        // 相同的键后写覆盖前写，位置保持不变
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    if keyed {
        ParamValue::KeyedList(entries)
    } else {
        ParamValue::List(entries.into_iter().map(|(_, value)| value).collect())
    }
}

/// 解析并按参数规则折叠单值
pub fn normalize(name: ParamName, raw: &str, diagnostics: &mut Vec<Diagnostic>) -> ParamValue {
    let value = parse_value(raw);

    if value.is_empty() {
        record(
            diagnostics,
            Diagnostic::EmptyParameter {
                name,
                raw: raw.to_string(),
            },
        );
        return value;
    }

    if name.keeps_collection() {
        return value;
    }

    collapse(value)
}

/// 只有一个位置为0的元素时折叠为标量
fn collapse(value: ParamValue) -> ParamValue {
    match value {
        ParamValue::List(mut values) if values.len() == 1 => {
            ParamValue::Scalar(values.remove(0))
        }
        ParamValue::KeyedList(mut pairs) if pairs.len() == 1 && pairs[0].0 == "0" => {
            ParamValue::Scalar(pairs.remove(0).1)
        }
        other => other,
    }
}

/// 整数字面量的解析情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntParse {
    /// 整个字符串都是整数
    Exact(i64),
    /// 只有前缀是整数，或完全没有数字（结果为0）
    Partial(i64),
    /// 超出 i64 范围，已饱和
    Overflow(i64),
}

/// 解析开头的整数：允许前导空白和正负号，其后的内容被忽略
pub fn parse_leading_int(raw: &str) -> IntParse {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return IntParse::Partial(0);
    }

    let digits = &rest[..digits_len];
    let parsed = if negative {
        format!("-{}", digits).parse::<i64>()
    } else {
        digits.parse::<i64>()
    };

    match parsed {
        Ok(value) if digits_len == rest.len() => IntParse::Exact(value),
        Ok(value) => IntParse::Partial(value),
        Err(_) if negative => IntParse::Overflow(i64::MIN),
        Err(_) => IntParse::Overflow(i64::MAX),
    }
}

/// 把参数值转换为整数，无法转换时为0
pub fn coerce_integer(name: ParamName, value: &ParamValue, diagnostics: &mut Vec<Diagnostic>) -> i64 {
    let raw = match value {
        ParamValue::Scalar(raw) => raw,
        collection => {
            let coerced = if collection.is_empty() { 0 } else { 1 };
            if !collection.is_empty() {
                record(
                    diagnostics,
                    Diagnostic::CollectionAsInteger {
                        name,
                        len: collection.len(),
                        coerced,
                    },
                );
            }
            return coerced;
        }
    };

    match parse_leading_int(raw) {
        IntParse::Exact(value) => value,
        IntParse::Partial(coerced) => {
            record(
                diagnostics,
                Diagnostic::InvalidInteger {
                    name,
                    raw: raw.clone(),
                    coerced,
                },
            );
            coerced
        }
        IntParse::Overflow(coerced) => {
            record(
                diagnostics,
                Diagnostic::IntegerOverflow {
                    name,
                    raw: raw.clone(),
                    coerced,
                },
            );
            coerced
        }
    }
}

fn assign(
    params: &mut ParameterSet,
    name: ParamName,
    value: ParamValue,
    raw: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match name {
        ParamName::Foreach => params.foreach = Some(value),
        ParamName::Forint => params.forint = coerce_integer(name, &value, diagnostics),
        ParamName::To => params.to = coerce_integer(name, &value, diagnostics),
        ParamName::By => params.by = coerce_integer(name, &value, diagnostics),
        ParamName::Backspace => params.backspace = coerce_integer(name, &value, diagnostics),
        ParamName::As => params.names = value,
        ParamName::Count => match value {
            ParamValue::Scalar(count) => params.count = count,
            // 空列表已经记录过 EmptyParameter
            collection if collection.is_empty() => {}
            _ => {
                debug!("Ignoring list value {:?} for '{}'", raw, name);
                record(diagnostics, Diagnostic::ListNotAllowed { name });
            }
        },
    }
}
