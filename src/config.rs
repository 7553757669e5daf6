//! Environment-backed configuration for external collaborators.
//!
//! Every collaborator gets its own config struct with a `from_env`
//! constructor. Mandatory variables fail loudly at startup rather than
//! surfacing as request-time errors.

use std::env;

/// Payment provider (Stripe-compatible) configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
}

impl StripeConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            secret_key: env::var("STRIPE_SECRET_KEY")
                .map_err(|_| "STRIPE_SECRET_KEY must be set".to_string())?,
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map_err(|_| "STRIPE_WEBHOOK_SECRET must be set".to_string())?,
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
        })
    }
}

/// Supabase Storage configuration for artifact persistence.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub project_url: String,
    pub service_key: String,
    pub bucket: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            project_url: env::var("SUPABASE_URL")
                .map_err(|_| "SUPABASE_URL must be set".to_string())?,
            service_key: env::var("SUPABASE_SERVICE_KEY")
                .map_err(|_| "SUPABASE_SERVICE_KEY must be set".to_string())?,
            bucket: env::var("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| "documents".to_string()),
        })
    }
}

/// Text-completion provider configuration.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Per-call timeout. LLM completions routinely take tens of seconds.
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl CompletionConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            api_base: env::var("COMPLETION_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: env::var("COMPLETION_API_KEY")
                .map_err(|_| "COMPLETION_API_KEY must be set".to_string())?,
            model: env::var("COMPLETION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            max_attempts: env::var("COMPLETION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        })
    }
}

/// Database connection string, loaded separately so the CLI tools can
/// connect without the rest of the server configuration.
pub fn database_url() -> Result<String, String> {
    env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())
}
