//! Configuration for receipt scans.
//!
//! Every knob lives in [`ScanConfig`], built through [`ScanConfigBuilder`].
//! One config can be shared by any number of concurrent scans; nothing in it
//! is mutated during a run.

use crate::error::ScanError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Desktop Chrome identity. Some portals refuse default HTTP-library agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Smallest accepted `max_llm_input_chars`. Below this not even one receipt
/// line plus its header survives the cut.
pub const MIN_LLM_INPUT_CHARS: usize = 200;

/// Configuration for a receipt scan.
///
/// Built via [`ScanConfig::builder()`] or [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use nfce2list::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .fetch_timeout_secs(20)
///     .model("gpt-4.1-nano")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Page request timeout in seconds. Default: 15.
    pub fetch_timeout_secs: u64,

    /// `User-Agent` sent to the portal. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Accept self-signed or otherwise invalid portal certificates. Default: true.
    ///
    /// Tax portals are notorious for broken chains. The receipt page is public
    /// and nothing secret is sent, so the default favours reachability.
    pub accept_invalid_certs: bool,

    /// Try the LLM before the layout heuristics. Default: true.
    ///
    /// When false, or when no provider can be resolved, only the heuristics run.
    pub use_llm: bool,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, a small default is used.
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 4096.
    ///
    /// A busy supermarket receipt runs to ~80 lines; at ~30 tokens per JSON
    /// entry that is well inside the limit.
    pub max_tokens: usize,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub llm_timeout_secs: u64,

    /// Visible page text sent to the LLM is cut to this many characters.
    /// Default: 8000.
    pub max_llm_input_chars: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::RECEIPT_EXTRACTION_PROMPT`].
    pub system_prompt: Option<String>,

    /// Number of receipts processed at once by [`crate::scan_many`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: true,
            use_llm: true,
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.1,
            max_tokens: 4096,
            llm_timeout_secs: 60,
            max_llm_input_chars: 8000,
            system_prompt: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("use_llm", &self.use_llm)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("max_llm_input_chars", &self.max_llm_input_chars)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn accept_invalid_certs(mut self, v: bool) -> Self {
        self.config.accept_invalid_certs = v;
        self
    }

    pub fn use_llm(mut self, v: bool) -> Self {
        self.config.use_llm = v;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    pub fn max_llm_input_chars(mut self, n: usize) -> Self {
        self.config.max_llm_input_chars = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(ScanError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if c.llm_timeout_secs == 0 {
            return Err(ScanError::InvalidConfig(
                "LLM timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_llm_input_chars < MIN_LLM_INPUT_CHARS {
            return Err(ScanError::InvalidConfig(format!(
                "LLM input limit must be ≥ {} characters, got {}",
                MIN_LLM_INPUT_CHARS, c.max_llm_input_chars
            )));
        }
        if c.user_agent.trim().is_empty() {
            return Err(ScanError::InvalidConfig("User agent must not be empty".into()));
        }
        Ok(self.config)
    }
}
