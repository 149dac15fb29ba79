pub mod config;
pub mod error;
pub mod models;
pub mod params;
pub mod template;

// 重新导出主要类型，方便外部使用
pub use config::ConfigManager;
pub use error::{Diagnostic, LoopError, RangeSkip};
pub use models::*;
pub use params::{ParamResolver, Resolution};
pub use template::{render_loop, LoopRenderer, Placeholders, Rendered};
