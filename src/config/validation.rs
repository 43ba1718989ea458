use super::models::{Config, StorageProvider};
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("pool.workers must be at least 1")]
    ZeroWorkers,

    #[error("pool.queue_depth must be at least 1")]
    ZeroQueueDepth,

    #[error("HTTP timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },

    #[error("storage.part_size must be positive")]
    ZeroPartSize,

    #[error("storage.max_concurrent_parts must be at least 1")]
    ZeroPartConcurrency,

    #[error("Storage provider is local but storage.root is not set")]
    MissingLocalRoot,

    #[error("Invalid storage.public_base_url '{url}': {reason}")]
    InvalidPublicBaseUrl { url: String, reason: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_pool(config)?;
    validate_http(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_pool(config: &Config) -> Result<(), ValidationError> {
    if config.pool.workers == Some(0) {
        return Err(ValidationError::ZeroWorkers);
    }
    if config.pool.queue_depth == 0 {
        return Err(ValidationError::ZeroQueueDepth);
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("connect_timeout_secs", config.http.connect_timeout_secs),
        ("read_timeout_secs", config.http.read_timeout_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::ZeroTimeout {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Part sizing, backend prerequisites and the public URL base
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    let storage = &config.storage;

    if storage.part_size.as_u64() == 0 {
        return Err(ValidationError::ZeroPartSize);
    }
    if storage.max_concurrent_parts == 0 {
        return Err(ValidationError::ZeroPartConcurrency);
    }
    if storage.provider == StorageProvider::Local && storage.root.is_none() {
        return Err(ValidationError::MissingLocalRoot);
    }

    Url::parse(&storage.public_base_url).map_err(|e| ValidationError::InvalidPublicBaseUrl {
        url: storage.public_base_url.clone(),
        reason: e.to_string(),
    })?;

    Ok(())
}
