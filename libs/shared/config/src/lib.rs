use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub scheduling: SchedulingConfig,
}

/// Tunables for the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    pub default_slot_minutes: i64,
    pub reschedule_lookahead_hours: i64,
    pub reschedule_lookahead_cap_hours: i64,
    pub max_alternatives: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_slot_minutes: 30,
            reschedule_lookahead_hours: 8,
            reschedule_lookahead_cap_hours: 24,
            max_alternatives: 5,
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_slot_minutes: env_or(
                "SCHEDULING_DEFAULT_SLOT_MINUTES",
                defaults.default_slot_minutes,
            ),
            reschedule_lookahead_hours: env_or(
                "SCHEDULING_RESCHEDULE_LOOKAHEAD_HOURS",
                defaults.reschedule_lookahead_hours,
            ),
            reschedule_lookahead_cap_hours: env_or(
                "SCHEDULING_RESCHEDULE_LOOKAHEAD_CAP_HOURS",
                defaults.reschedule_lookahead_cap_hours,
            ),
            max_alternatives: env_or("SCHEDULING_MAX_ALTERNATIVES", defaults.max_alternatives),
            default_page_size: env_or("SCHEDULING_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: env_or("SCHEDULING_MAX_PAGE_SIZE", defaults.max_page_size),
        }
    }

    /// Hours searched for alternatives after a rejected reschedule.
    pub fn effective_lookahead_hours(&self) -> i64 {
        self.reschedule_lookahead_hours
            .min(self.reschedule_lookahead_cap_hours)
            .max(0)
    }
}

impl AppConfig {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

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
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
