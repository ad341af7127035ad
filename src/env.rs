//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量统一使用 `NWS_` 前缀。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器
///
/// 默认值由配置层提供，这里只负责读取和校验显式设置的值。
pub trait EnvVar<T> {
    const NAME: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 仅当变量被显式设置时返回值，用于覆盖配置文件
    fn get_override() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "NWS_LOG_LEVEL";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }

    /// 设置文件目录
    pub struct SettingsDir;
    impl EnvVar<String> for SettingsDir {
        const NAME: &'static str = "NWS_SETTINGS_DIR";

        fn parse(value: &str) -> EnvResult<String> {
            let expanded = shellexpand::tilde(value.trim()).to_string();
            if expanded.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Directory must not be empty".to_string(),
                });
            }
            Ok(expanded)
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言（语言代码或中文名称，如 zh / 中文 / ja）
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "NWS_TARGET_LANG";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim();
            if lang.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Target language must not be empty".to_string(),
                });
            }
            Ok(lang.to_string())
        }
    }

    /// 翻译模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "NWS_TRANSLATION_MODE";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                "bilingual" | "dual" => Ok("bilingual".to_string()),
                "replace" => Ok("replace".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid mode '{}'. Use: bilingual, replace", value),
                }),
            }
        }
    }

    /// 模型接口地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "NWS_API_URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "NWS_MODEL";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Model name must not be empty".to_string(),
                });
            }
            Ok(model.to_string())
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "NWS_API_KEY";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 最大并发请求数
    pub struct ConcurrentLimit;
    impl EnvVar<usize> for ConcurrentLimit {
        const NAME: &'static str = "NWS_CONCURRENT_LIMIT";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 单次请求的最大分块字符数
    pub struct MaxChunkSize;
    impl EnvVar<usize> for MaxChunkSize {
        const NAME: &'static str = "NWS_MAX_CHUNK_SIZE";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 100, 50000)
        }
    }

    /// 视口预加载边距
    pub struct ViewportMargin;
    impl EnvVar<f64> for ViewportMargin {
        const NAME: &'static str = "NWS_VIEWPORT_MARGIN";

        fn parse(value: &str) -> EnvResult<f64> {
            let margin: f64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number".to_string(),
            })?;

            if !(0.0..=10000.0).contains(&margin) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Margin must be between 0 and 10000 pixels".to_string(),
                });
            }

            Ok(margin)
        }
    }

    /// 请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "NWS_REQUEST_TIMEOUT";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }

            if seconds > 600 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout too long (max 600 seconds)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }

    /// 自动重试次数
    pub struct MaxRetries;
    impl EnvVar<usize> for MaxRetries {
        const NAME: &'static str = "NWS_MAX_RETRIES";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 10)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "NWS_CACHE_ENABLED";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存容量
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "NWS_CACHE_CAPACITY";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 10, 100000)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}
