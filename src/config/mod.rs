//! Configuration module

mod settings;

pub use settings::{
    AdminConfig, EnhancementConfig, GenerationConfig, LoggingConfig, ServerConfig, Settings,
    StatsConfig, ADMIN_PASSWORD_HASH_ENV,
};
