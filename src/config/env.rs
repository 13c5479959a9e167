use crate::error::{BotFlowError, Result};
use std::env;
use std::path::PathBuf;

pub const FLOWS_ENV: &str = "BOTFLOW_FLOWS";
pub const MAX_HANDLER_HOPS_ENV: &str = "BOTFLOW_MAX_HANDLER_HOPS";
pub const SESSION_PREFIX_ENV: &str = "BOTFLOW_SESSION_PREFIX";
pub const REDIS_URL_ENV: &str = "BOTFLOW_REDIS_URL";
pub const SESSION_TTL_ENV: &str = "BOTFLOW_SESSION_TTL_SECS";

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            BotFlowError::Config(format!("environment variable `{key}` is not set"))
        })
    }

    /// 获取可选的环境变量（空值视为未设置）
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    /// 解析数值型环境变量，未设置时返回 None
    pub fn get_env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
        match Self::get_env_optional(key) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                BotFlowError::Config(format!("environment variable `{key}` has invalid value `{raw}`"))
            }),
            None => Ok(None),
        }
    }
}

/// 引擎配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Flow 定义文件路径
    pub flows_path: Option<PathBuf>,
    /// 单次调用中连续执行 handler / generator 的上限
    pub max_handler_hops: u32,
    pub session_prefix: String,
    pub redis_url: Option<String>,
    pub session_ttl_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flows_path: None,
            max_handler_hops: 64,
            session_prefix: "session".to_string(),
            redis_url: None,
            session_ttl_secs: None,
        }
    }
}

impl EngineConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            flows_path: EnvConfig::get_env_optional(FLOWS_ENV).map(PathBuf::from),
            max_handler_hops: EnvConfig::get_env_parsed(MAX_HANDLER_HOPS_ENV)?
                .unwrap_or(defaults.max_handler_hops),
            session_prefix: EnvConfig::get_env_optional(SESSION_PREFIX_ENV)
                .unwrap_or(defaults.session_prefix),
            redis_url: EnvConfig::get_env_optional(REDIS_URL_ENV),
            session_ttl_secs: EnvConfig::get_env_parsed(SESSION_TTL_ENV)?,
        })
    }

    pub fn with_flows_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flows_path = Some(path.into());
        self
    }

    pub fn flows_path(&self) -> Result<&PathBuf> {
        self.flows_path.as_ref().ok_or_else(|| {
            BotFlowError::Config(format!("no flow definitions configured (set `{FLOWS_ENV}`)"))
        })
    }
}

/// 宏：简化环境变量获取
#[macro_export]
macro_rules! env_var {
    ($key:expr) => {
        $crate::config::EnvConfig::get_env($key)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_parsed() {
        env::set_var("BOTFLOW_TEST_HOPS", "12");
        assert_eq!(EnvConfig::get_env_parsed::<u32>("BOTFLOW_TEST_HOPS").unwrap(), Some(12));

        env::set_var("BOTFLOW_TEST_HOPS", "many");
        assert!(EnvConfig::get_env_parsed::<u32>("BOTFLOW_TEST_HOPS").is_err());

        env::remove_var("BOTFLOW_TEST_HOPS");
        assert_eq!(EnvConfig::get_env_parsed::<u32>("BOTFLOW_TEST_HOPS").unwrap(), None);
    }

    #[test]
    fn test_missing_env_is_config_error() {
        let result = crate::env_var!("BOTFLOW_TEST_SURELY_UNSET");
        assert!(matches!(result, Err(BotFlowError::Config(_))));
    }

    #[test]
    fn test_flows_path_required() {
        let config = EngineConfig::default();
        assert!(config.flows_path().is_err());
        let config = config.with_flows_path("flows/matcher.json");
        assert_eq!(
            config.flows_path().unwrap(),
            &PathBuf::from("flows/matcher.json")
        );
    }
}
