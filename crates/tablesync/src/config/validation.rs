//! Configuration validation.

use super::{Config, SSL_MODES};
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;

    if db.host.is_empty() {
        return Err(SyncError::Config("database.host is required".into()));
    }
    if db.database.is_empty() {
        return Err(SyncError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(SyncError::Config("database.user is required".into()));
    }
    if db.port == 0 {
        return Err(SyncError::Config("database.port must be non-zero".into()));
    }

    let ssl_mode = db.ssl_mode.to_lowercase();
    if !SSL_MODES.contains(&ssl_mode.as_str()) {
        return Err(SyncError::Config(format!(
            "database.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            db.ssl_mode
        )));
    }

    Ok(())
}
