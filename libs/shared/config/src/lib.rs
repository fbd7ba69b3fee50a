use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Needed only for GoTrue admin calls (doctor promotion).
    pub supabase_service_role_key: String,
    pub ai_disabled: bool,
    pub ai_model_path: String,
    pub ai_retrain_interval_minutes: u64,
    pub ai_min_training_samples: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, doctor approvals will fail");
                    String::new()
                }),
            ai_disabled: env::var("AI_DISABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or_else(|_| {
                    warn!("AI_DISABLED not set, AI diagnosis stays disabled");
                    true
                }),
            ai_model_path: env::var("AI_MODEL_PATH")
                .unwrap_or_else(|_| "data/symptom_model.json".to_string()),
            ai_retrain_interval_minutes: env::var("AI_RETRAIN_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1440)
                .max(1),
            ai_min_training_samples: env::var("AI_MIN_TRAINING_SAMPLES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(20),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_ai_enabled(&self) -> bool {
        !self.ai_disabled
    }
}

/// Anything other than an explicit "off" value keeps the flag set.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(parse_flag("anything"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" OFF "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
    }
}
