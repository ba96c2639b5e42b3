use std::time::Duration;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const CEREBRAS_DEFAULT_MODEL: &str = "llama-3.3-70b";

// Unified enum to wrap different provider configurations
pub enum ProviderConfig {
    Groq(GroqProviderConfig),
    Cerebras(CerebrasProviderConfig),
}

// Define specific config structs for each provider
pub struct GroqProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl GroqProviderConfig {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            base_url: GROQ_BASE_URL.to_string(),
            api_key,
            model,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct CerebrasProviderConfig {
    pub api_key: String,
    pub model: String,
}
