use tracing::info;

use crate::error::LoopError;
use crate::models::{Invocation, ParamName};
use crate::params::{ParamResolver, Resolution};
use crate::template::Rendered;

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 从YAML字符串加载调用描述
    pub fn from_yaml_str(yaml_content: &str) -> Result<Invocation, LoopError> {
        let invocation: Invocation = serde_yaml::from_str(yaml_content)?;

        Ok(invocation)
    }

    /// 验证调用描述的有效性
    pub fn validate_config(invocation: &Invocation) -> Result<(), LoopError> {
        // embed 白名单只能包含可识别的参数
        for name in &invocation.embed_whitelist {
            if ParamName::parse(name).is_none() {
                return Err(LoopError::Validation {
                    message: format!("embed whitelist entry '{}' is not a known parameter", name),
                });
            }
        }

        if invocation.template.is_empty() {
            info!("Invocation has an empty template, output will be empty");
        }

        Ok(())
    }
}

impl Invocation {
    /// 从YAML字符串创建并验证
    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, LoopError> {
        let invocation = ConfigManager::from_yaml_str(yaml_content)?;
        ConfigManager::validate_config(&invocation)?;
        Ok(invocation)
    }

    /// 构建参数解析器
    pub fn resolver(&self) -> ParamResolver {
        let mut resolver = ParamResolver::new();
        for (key, value) in &self.params {
            resolver.set_param(key.as_str(), value.to_param_string());
        }
        for (key, value) in &self.embed {
            resolver.set_embed(key.as_str(), value.to_param_string());
        }
        for name in self.embed_whitelist.iter().filter_map(|n| ParamName::parse(n)) {
            resolver.allow_embed(name);
        }
        resolver
    }

    pub fn resolve(&self) -> Resolution {
        self.resolver().resolve()
    }

    /// 渲染，返回输出和诊断信息
    pub fn run(&self) -> Rendered {
        self.resolve().render(&self.template)
    }

    /// 严格模式渲染，任何诊断信息都会变成错误
    pub fn run_strict(&self) -> Result<String, LoopError> {
        self.run().into_strict()
    }
}
