//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `APFLOW__*` 覆盖（双下划线表示嵌套，
//! 如 `APFLOW__APPROVAL__THRESHOLD_USD=10000`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub approval: ApprovalSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub persistence: PersistenceSection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// [app] 段：应用名、HTTP 监听端口
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

/// [approval] 段：HITL 审批阈值
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalSection {
    /// 金额达到该值（美元）需要人工审批；低于则自动批准
    #[serde(default = "default_threshold_usd")]
    pub threshold_usd: f64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            threshold_usd: default_threshold_usd(),
        }
    }
}

fn default_threshold_usd() -> f64 {
    5000.0
}

/// [tools] 段：重试预算与 Mock ERP 故障率
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// fetch 工具失败时的最大尝试次数（自我纠错预算）
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Mock ERP 模拟超时概率，0.0 为完全确定性
    #[serde(default = "default_erp_failure_rate")]
    pub erp_failure_rate: f64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            erp_failure_rate: default_erp_failure_rate(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_erp_failure_rate() -> f64 {
    0.15
}

/// [persistence] 段：checkpoint 数据库路径
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSection {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/checkpoints.db")
}

/// [llm] 段：模型标识（仅配置面，本核心不直接调用 LLM）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            approval: ApprovalSection::default(),
            tools: ToolsSection::default(),
            persistence: PersistenceSection::default(),
            llm: LlmSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 APFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 APFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("APFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.approval.threshold_usd, 5000.0);
        assert_eq!(cfg.tools.max_retries, 3);
        assert_eq!(cfg.app.port, 8080);
    }
}
