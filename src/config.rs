use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 默认数据源 (Google Drive 上的 NF 压缩包)
pub const DEFAULT_ARCHIVE_URL: &str =
    "https://drive.google.com/uc?export=download&id=1FlijXfHFSkFq0nf0I8mt3J9-NOOymR3y";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// x-functions-key; 未配置时由部署平台负责鉴权
    #[serde(default)]
    pub function_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub archive_url: String,
    pub header_pattern: String,
    pub items_pattern: String,
    pub delimiter: char,
    pub format_timestamps: bool,
    pub drop_invoice_total: bool,
}

impl SourceConfig {
    /// CSV 分隔符必须是单字节 ASCII
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "source.delimiter deve ser um caractere ASCII, recebido {:?}",
                    self.delimiter
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Fs,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// fs: 本地目录; azure: 容器 URL
    pub container: String,
    pub blob_name: String,
    #[serde(default)]
    pub sas_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_iterations: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 7071,
                function_key: None,
            },
            source: SourceConfig {
                archive_url: DEFAULT_ARCHIVE_URL.to_string(),
                header_pattern: "Cabecalho".to_string(),
                items_pattern: "Itens".to_string(),
                delimiter: ',',
                format_timestamps: true,
                drop_invoice_total: true,
            },
            cache: CacheConfig {
                backend: CacheBackend::Fs,
                container: "cache".to_string(),
                blob_name: "df_resultado.parquet".to_string(),
                sas_token: None,
            },
            agent: AgentConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: None,
                model: "gpt-3.5-turbo".to_string(),
                temperature: 0.2,
                max_tokens: 400,
                max_iterations: 15,
                timeout_secs: None,
            },
        }
    }
}

impl AppConfig {
    /// 加载顺序: 内置默认值 -> ./fiscal.toml (可选) -> FISCAL__* 环境变量 -> OPENAI_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name("fiscal").required(false))
            .add_source(Environment::with_prefix("FISCAL").separator("__"))
            .set_override_option("agent.api_key", std::env::var("OPENAI_API_KEY").ok())?
            .build()?
            .try_deserialize()?;
        config.source.delimiter_byte()?;
        Ok(config)
    }

    /// 打印用: 隐藏密钥
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***".to_string());
        let mut copy = self.clone();
        copy.server.function_key = mask(&self.server.function_key);
        copy.cache.sas_token = mask(&self.cache.sas_token);
        copy.agent.api_key = mask(&self.agent.api_key);
        copy
    }
}
