use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Upload size limit shared by the gateway and the viewer (10MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub upload: UploadConfig,
    pub viewer: ViewerConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub timeout_seconds: u64,
}

/// Location of the external analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub chat_path: String,
    pub upload_path: String,
    pub area_analysis_path: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_size: u64,
    /// Also hand uploads received by the viewer to the backend.
    pub forward_to_backend: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Pixel width pages are rendered at.
    pub render_width: f64,
    /// Overrides the width-derived scale when set.
    pub fixed_scale: Option<f64>,
    /// Height used for text runs that report none.
    pub default_text_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Answer from canned replies when the backend cannot be reached.
    pub mock_fallback: bool,
    pub welcome_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub prometheus_namespace: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder(None).build()?.try_deserialize()
    }

    /// Loads configuration for one service, layering `config/{service}` over
    /// the shared files and defaulting the listen port to `default_port`.
    pub fn load_for_service(service: &str, default_port: u16) -> Result<Self, ConfigError> {
        Self::builder(Some(service))
            .set_default("server.port", i64::from(default_port))?
            .build()?
            .try_deserialize()
    }

    fn builder(service: Option<&str>) -> ConfigBuilder<DefaultState> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            );

        if let Some(service) = service {
            builder = builder.add_source(File::with_name(&format!("config/{}", service)).required(false));
        }

        builder
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with FINANCEGUARD prefix
            .add_source(Environment::with_prefix("FINANCEGUARD").separator("__"))
    }

    pub fn backend_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Multipart framing on top of the largest accepted PDF
            max_request_size: 12 * 1024 * 1024,
            timeout_seconds: 30,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            chat_path: "/chat".to_string(),
            upload_path: "/api/pdf/upload".to_string(),
            area_analysis_path: "/api/analyze-area".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_UPLOAD_BYTES,
            forward_to_backend: false,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render_width: 800.0,
            fixed_scale: None,
            default_text_height: 20.0,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mock_fallback: false,
            welcome_message: "Hello! I'm your FinanceGuard AI assistant. I can help you understand the financial document and answer any questions you have about it. You can select text from the document to ask specific questions.".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            file_path: None,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            prometheus_namespace: "financeguard".to_string(),
        }
    }
}
