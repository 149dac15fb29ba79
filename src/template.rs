use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{record, Diagnostic, LoopError, RangeSkip};
use crate::models::{
    ParamValue, ParameterSet, DEFAULT_KEY_NAME, DEFAULT_STEP, DEFAULT_VALUE_NAME,
};
use crate::params::{ParamResolver, Resolution};

/// 每次迭代要替换的占位符名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub key: String,
    pub value: String,
    pub count: String,
}

impl Placeholders {
    /// 根据 `as` 和 `count` 参数确定占位符名称
    ///
    /// `as` 为单个值时只重命名值占位符；为键值对（或列表）时以最后一项为准，
    /// 键命名键占位符，值命名值占位符。
    pub fn from_params(params: &ParameterSet) -> Self {
        let (key, value) = match &params.names {
            ParamValue::Scalar(value) => (DEFAULT_KEY_NAME.to_string(), value.clone()),
            collection => match collection.entries().pop() {
                Some((key, value)) => (key, value.to_string()),
                None => (DEFAULT_KEY_NAME.to_string(), DEFAULT_VALUE_NAME.to_string()),
            },
        };

        Self {
            key,
            value,
            count: params.count.clone(),
        }
    }
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Rendered {
    /// 严格模式：存在任何诊断信息时返回错误
    pub fn into_strict(self) -> Result<String, LoopError> {
        match LoopError::from_diagnostics(&self.diagnostics) {
            Some(error) => Err(error),
            None => Ok(self.output),
        }
    }
}

/// 循环渲染器
pub struct LoopRenderer<'a> {
    params: &'a ParameterSet,
    /// `{key}` 形式的键占位符
    key_token: String,
    /// `{value}` 形式的值占位符
    value_token: String,
    /// `{count}` 形式的计数占位符
    count_token: String,
}

impl<'a> LoopRenderer<'a> {
    /// 创建新的循环渲染器
    pub fn new(params: &'a ParameterSet) -> Self {
        let placeholders = Placeholders::from_params(params);
        Self {
            params,
            key_token: token(&placeholders.key),
            value_token: token(&placeholders.value),
            count_token: token(&placeholders.count),
        }
    }

    /// 渲染模板：先执行列表循环，再执行整数循环，最后按 backspace 截掉末尾字符
    pub fn render(&self, template: &str) -> Rendered {
        let mut output = String::new();
        let mut diagnostics = Vec::new();

        let listed = self.process_foreach(template, &mut output);
        let ranged = self.process_forint(template, &mut output, &mut diagnostics);
        debug!(
            "Rendered {} list iterations and {} range iterations",
            listed, ranged
        );

        let output = trim_backspace(output, self.params.backspace, &mut diagnostics);
        Rendered {
            output,
            diagnostics,
        }
    }

    /// 处理列表循环，返回迭代次数
    fn process_foreach(&self, template: &str, output: &mut String) -> usize {
        let Some(foreach) = &self.params.foreach else {
            return 0;
        };

        let entries = foreach.entries();
        for (index, (key, value)) in entries.iter().enumerate() {
            let count = (index + 1).to_string();
            output.push_str(&substitute(
                template,
                &[
                    (&self.key_token, key.as_str()),
                    (&self.value_token, *value),
                    (&self.count_token, count.as_str()),
                ],
            ));
        }

        entries.len()
    }

    /// 处理整数循环，返回迭代次数
    fn process_forint(
        &self,
        template: &str,
        output: &mut String,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> usize {
        let (start, stop, step) = (self.params.forint, self.params.to, self.params.by);

        if let Err(reason) = check_range(start, stop, step) {
            // 起点等于终点且步长为默认值是未使用整数循环时的常态，不算问题
            if reason == RangeSkip::SameBounds && step == DEFAULT_STEP {
                debug!("Range loop skipped: {}", reason);
            } else {
                record(
                    diagnostics,
                    Diagnostic::RangeSkipped {
                        start,
                        stop,
                        step,
                        reason,
                    },
                );
            }
            return 0;
        }

        let ascending = step > 0;
        let mut current = start;
        let mut iterations = 0;
        while (ascending && current <= stop) || (!ascending && current >= stop) {
            iterations += 1;
            let value = current.to_string();
            let count = iterations.to_string();
            output.push_str(&substitute(
                template,
                &[
                    (&self.value_token, value.as_str()),
                    (&self.count_token, count.as_str()),
                ],
            ));

            // 溢出意味着下一个值已经越过终点
            match current.checked_add(step) {
                Some(next) => current = next,
                None => break,
            }
        }

        iterations
    }
}

impl Resolution {
    /// 用解析好的参数渲染模板，诊断信息包含解析阶段的内容
    pub fn render(&self, template: &str) -> Rendered {
        let rendered = LoopRenderer::new(&self.params).render(template);
        let mut diagnostics = self.diagnostics.clone();
        diagnostics.extend(rendered.diagnostics);
        Rendered {
            output: rendered.output,
            diagnostics,
        }
    }
}

/// 检查整数循环是否可以执行
///
/// 起点和终点不同、步长非0、并且步长方向指向终点时才执行，避免死循环。
pub fn check_range(start: i64, stop: i64, step: i64) -> Result<(), RangeSkip> {
    if step == 0 {
        return Err(RangeSkip::ZeroStep);
    }
    if start == stop {
        return Err(RangeSkip::SameBounds);
    }
    if (step > 0) != (start < stop) {
        return Err(RangeSkip::WrongDirection);
    }
    Ok(())
}

/// 从末尾删除 `backspace` 个字符
pub fn trim_backspace(mut output: String, backspace: i64, diagnostics: &mut Vec<Diagnostic>) -> String {
    if backspace <= 0 {
        return output;
    }

    let len = output.chars().count();
    let remove = usize::try_from(backspace).unwrap_or(usize::MAX);
    if remove > len {
        record(diagnostics, Diagnostic::BackspaceOverrun { backspace, len });
        return String::new();
    }

    let cut = output
        .char_indices()
        .nth(len - remove)
        .map(|(index, _)| index)
        .unwrap_or(output.len());
    output.truncate(cut);
    output
}

/// 依次替换占位符，后面的替换会作用于前面替换的结果
fn substitute(template: &str, bindings: &[(&String, &str)]) -> String {
    let mut result = template.to_string();
    for (placeholder, value) in bindings {
        if result.contains(placeholder.as_str()) {
            result = result.replace(placeholder.as_str(), value);
        }
    }
    result
}

fn token(name: &str) -> String {
    format!("{{{}}}", name)
}

/// 用显式参数渲染模板，忽略诊断信息
pub fn render_loop(params: &HashMap<String, String>, template: &str) -> String {
    let mut resolver = ParamResolver::new();
    resolver.set_params(params.clone());
    let rendered = resolver.resolve().render(template);
    info!(
        "Loop rendered {} bytes with {} diagnostic(s)",
        rendered.output.len(),
        rendered.diagnostics.len()
    );
    rendered.output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pairs: &[(&str, &str)], template: &str) -> Rendered {
        let mut resolver = ParamResolver::new();
        for (key, value) in pairs {
            resolver.set_param(*key, *value);
        }
        resolver.resolve().render(template)
    }

    fn output(pairs: &[(&str, &str)], template: &str) -> String {
        render(pairs, template).output
    }

    #[test]
    fn test_foreach_plain_values() {
        let result = output(
            &[("foreach", "red|green|blue")],
            "{loopee_key}={loopee_value};",
        );
        assert_eq!(result, "0=red;1=green;2=blue;");
    }

    #[test]
    fn test_foreach_key_value_pairs() {
        let result = output(
            &[("foreach", "red:ff0000|green:00ff00|blue:0000ff")],
            "Color: {loopee_key}, RGB: {loopee_value}\n",
        );
        assert_eq!(
            result,
            "Color: red, RGB: ff0000\nColor: green, RGB: 00ff00\nColor: blue, RGB: 0000ff\n"
        );
    }

    #[test]
    fn test_foreach_single_value_still_loops() {
        let result = output(&[("foreach", "only")], "[{loopee_key}:{loopee_value}]");
        assert_eq!(result, "[0:only]");
    }

    #[test]
    fn test_foreach_escaped_pipe() {
        let result = output(&[("foreach", r"a\|b|c")], "<{loopee_value}>");
        assert_eq!(result, "<a|b><c>");
    }

    #[test]
    fn test_custom_value_name() {
        let result = output(
            &[("foreach", "red|green"), ("as", "color")],
            "{loopee_key}:{color} ",
        );
        assert_eq!(result, "0:red 1:green ");
    }

    #[test]
    fn test_custom_key_value_names() {
        let result = output(
            &[("foreach", "red:ff0000|green:00ff00"), ("as", "color:rgb")],
            "{color}={rgb}|{loopee_key}|{loopee_value};",
        );
        assert_eq!(
            result,
            "red=ff0000|{loopee_key}|{loopee_value};green=00ff00|{loopee_key}|{loopee_value};"
        );
    }

    #[test]
    fn test_as_list_uses_last_entry() {
        let placeholders = Placeholders::from_params(&ParameterSet {
            names: ParamValue::List(vec!["a".to_string(), "b".to_string()]),
            ..ParameterSet::default()
        });
        assert_eq!(placeholders.key, "1");
        assert_eq!(placeholders.value, "b");
    }

    #[test]
    fn test_empty_as_keeps_defaults() {
        let placeholders = Placeholders::from_params(&ParameterSet {
            names: ParamValue::List(vec![]),
            ..ParameterSet::default()
        });
        assert_eq!(placeholders.key, DEFAULT_KEY_NAME);
        assert_eq!(placeholders.value, DEFAULT_VALUE_NAME);
    }

    #[test]
    fn test_forint_with_backspace() {
        let result = output(
            &[("forint", "5"), ("to", "25"), ("by", "5"), ("backspace", "1")],
            "{loopee_value},",
        );
        assert_eq!(result, "5,10,15,20,25");
    }

    #[test]
    fn test_forint_descending() {
        let result = output(&[("forint", "3"), ("to", "-3"), ("by", "-2")], "{loopee_value} ");
        assert_eq!(result, "3 1 -1 -3 ");
    }

    #[test]
    fn test_forint_does_not_pass_stop() {
        let result = output(&[("forint", "1"), ("to", "10"), ("by", "4")], "{loopee_value},");
        assert_eq!(result, "1,5,9,");
    }

    #[test]
    fn test_forint_custom_name() {
        let result = output(
            &[("forint", "5"), ("to", "25"), ("by", "5"), ("as", "integer"), ("backspace", "1")],
            "{integer},",
        );
        assert_eq!(result, "5,10,15,20,25");
    }

    #[test]
    fn test_forint_same_bounds_is_silent() {
        let rendered = render(&[("forint", "5"), ("to", "5")], "{loopee_value}");
        assert_eq!(rendered.output, "");
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn test_forint_wrong_direction() {
        let rendered = render(&[("forint", "5"), ("to", "25"), ("by", "-5")], "{loopee_value}");
        assert_eq!(rendered.output, "");
        assert_eq!(
            rendered.diagnostics,
            vec![Diagnostic::RangeSkipped {
                start: 5,
                stop: 25,
                step: -5,
                reason: RangeSkip::WrongDirection,
            }]
        );
    }

    #[test]
    fn test_forint_zero_step() {
        for (start, stop) in [("0", "10"), ("10", "0"), ("3", "3")] {
            let result = output(&[("forint", start), ("to", stop), ("by", "0")], "x");
            assert_eq!(result, "");
        }
    }

    #[test]
    fn test_equal_bounds_with_explicit_step_is_reported() {
        let rendered = render(&[("forint", "3"), ("to", "3"), ("by", "0")], "x");
        assert_eq!(rendered.output, "");
        assert_eq!(
            rendered.diagnostics,
            vec![Diagnostic::RangeSkipped {
                start: 3,
                stop: 3,
                step: 0,
                reason: RangeSkip::ZeroStep,
            }]
        );

        let rendered = render(&[("by", "-2")], "x");
        assert_eq!(rendered.output, "");
        assert_eq!(
            rendered.diagnostics,
            vec![Diagnostic::RangeSkipped {
                start: 0,
                stop: 0,
                step: -2,
                reason: RangeSkip::SameBounds,
            }]
        );
    }

    #[test]
    fn test_check_range() {
        assert_eq!(check_range(5, 5, 1), Err(RangeSkip::SameBounds));
        assert_eq!(check_range(5, 5, 0), Err(RangeSkip::ZeroStep));
        assert_eq!(check_range(5, 25, 0), Err(RangeSkip::ZeroStep));
        assert_eq!(check_range(5, 25, -5), Err(RangeSkip::WrongDirection));
        assert_eq!(check_range(25, 5, 5), Err(RangeSkip::WrongDirection));
        assert_eq!(check_range(5, 25, 5), Ok(()));
        assert_eq!(check_range(25, 5, -5), Ok(()));
    }

    #[test]
    fn test_forint_stops_on_overflow() {
        let params = ParameterSet {
            forint: i64::MAX - 1,
            to: i64::MAX,
            by: 5,
            ..ParameterSet::default()
        };
        let rendered = LoopRenderer::new(&params).render("{loopee_value};");
        assert_eq!(rendered.output, format!("{};", i64::MAX - 1));
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn test_count_placeholder() {
        let result = output(&[("foreach", "a|b|c")], "{loopee_count}.{loopee_value} ");
        assert_eq!(result, "1.a 2.b 3.c ");

        let result = output(
            &[("forint", "10"), ("to", "30"), ("by", "10"), ("count", "n")],
            "#{n}={loopee_value} ",
        );
        assert_eq!(result, "#1=10 #2=20 #3=30 ");
    }

    #[test]
    fn test_foreach_and_forint_both_contribute() {
        let result = output(
            &[("foreach", "a|b"), ("forint", "1"), ("to", "2")],
            "{loopee_value}",
        );
        assert_eq!(result, "ab12");
    }

    #[test]
    fn test_backspace_overrun() {
        let rendered = render(&[("foreach", "ab"), ("backspace", "10")], "{loopee_value}");
        assert_eq!(rendered.output, "");
        assert_eq!(
            rendered.diagnostics,
            vec![Diagnostic::BackspaceOverrun {
                backspace: 10,
                len: 2
            }]
        );
    }

    #[test]
    fn test_trim_backspace() {
        let mut diagnostics = Vec::new();
        assert_eq!(
            trim_backspace("5,10,15,20,25,".to_string(), 1, &mut diagnostics),
            "5,10,15,20,25"
        );
        assert_eq!(trim_backspace("abc".to_string(), 0, &mut diagnostics), "abc");
        assert_eq!(trim_backspace("abc".to_string(), -2, &mut diagnostics), "abc");
        assert_eq!(trim_backspace("abc".to_string(), 3, &mut diagnostics), "");
        assert_eq!(trim_backspace("héllo".to_string(), 4, &mut diagnostics), "h");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_substitution_is_sequential() {
        // 值中包含计数占位符时，会被随后的计数替换
        let result = output(&[("foreach", "{loopee_count}")], "{loopee_value}");
        assert_eq!(result, "1");

        let result = output(&[("foreach", "k:v")], "{loopee_key}{loopee_value}");
        assert_eq!(result, "kv");
    }

    #[test]
    fn test_render_is_idempotent() {
        let pairs = [("foreach", "x|y"), ("forint", "1"), ("to", "3"), ("backspace", "1")];
        assert_eq!(output(&pairs, "{loopee_value},"), output(&pairs, "{loopee_value},"));
    }

    #[test]
    fn test_render_loop_ignores_diagnostics() {
        let mut params = HashMap::new();
        params.insert("foreach".to_string(), "a|b".to_string());
        params.insert("unknown".to_string(), "1".to_string());
        assert_eq!(render_loop(&params, "{loopee_value}"), "ab");
    }

    #[test]
    fn test_strict_render() {
        let rendered = render(&[("foreach", "a")], "{loopee_value}");
        assert_eq!(rendered.into_strict().unwrap(), "a");

        let rendered = render(&[("by", "0"), ("to", "3")], "x");
        assert!(matches!(
            rendered.into_strict(),
            Err(LoopError::Strict { count: 1, .. })
        ));
    }
}
