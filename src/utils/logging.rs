use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

pub const DEBUG_ENV: &str = "BOTFLOW_DEBUG";
const FILTER_ENV: &str = "RUST_LOG";

/// 日志配置
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// 输出 target、文件、行号与线程 id
    pub debug: bool,
    /// 显式过滤指令，优先于默认级别
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// 读取 `BOTFLOW_DEBUG` 与 `RUST_LOG`
    pub fn from_env() -> Self {
        Self {
            debug: EnvConfig::get_env_optional(DEBUG_ENV).is_some(),
            filter: EnvConfig::get_env_optional(FILTER_ENV),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 生效的过滤指令
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None if self.debug => "botflow=debug,info".to_string(),
            None => "botflow=info,warn".to_string(),
        }
    }

    /// 安装全局 subscriber；已安装过时返回 false
    pub fn init(&self) -> bool {
        let env_filter = EnvFilter::try_new(self.directive())
            .unwrap_or_else(|_| EnvFilter::new("botflow=info,warn"));

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(self.debug)
                    .with_file(self.debug)
                    .with_line_number(self.debug)
                    .with_thread_ids(self.debug),
            )
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(filter = %self.directive(), "logging initialised");
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_follows_debug_flag() {
        let quiet = LoggingConfig::default();
        assert_eq!(quiet.directive(), "botflow=info,warn");

        let verbose = LoggingConfig {
            debug: true,
            filter: None,
        };
        assert_eq!(verbose.directive(), "botflow=debug,info");
    }

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            debug: true,
            filter: None,
        }
        .with_filter("botflow::runtime=trace");
        assert_eq!(config.directive(), "botflow::runtime=trace");
    }
}
