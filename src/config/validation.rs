use crate::config::types::{
    AiConfig, AiProvider, ChunkingConfig, Config, CrawlerConfig, GraphBackend, GraphConfig,
    RetryConfig, SecurityConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_security_config(&config.security)?;
    validate_chunking_config(&config.chunking)?;
    validate_graph_config(&config.graph)?;
    validate_ai_config(&config.ai)?;
    validate_retry_config(&config.retry)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages_per_domain < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-per-domain must be >= 1, got {}",
            config.max_pages_per_domain
        )));
    }

    if !config.crawl_delay_secs.is_finite() || !(0.0..=60.0).contains(&config.crawl_delay_secs) {
        return Err(ConfigError::Validation(format!(
            "crawl-delay must be between 0 and 60 seconds, got {}",
            config.crawl_delay_secs
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.relevance_min_priority > 10 {
        return Err(ConfigError::Validation(format!(
            "relevance-min-priority must be between 0 and 10, got {}",
            config.relevance_min_priority
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_security_config(config: &SecurityConfig) -> Result<(), ConfigError> {
    if config.max_url_length < 64 {
        return Err(ConfigError::Validation(format!(
            "max-url-length must be >= 64, got {}",
            config.max_url_length
        )));
    }

    for pattern in &config.blocked_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

fn validate_chunking_config(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if config.max_chunk_chars < 200 {
        return Err(ConfigError::Validation(format!(
            "max-chunk-chars must be >= 200, got {}",
            config.max_chunk_chars
        )));
    }
    Ok(())
}

fn validate_graph_config(config: &GraphConfig) -> Result<(), ConfigError> {
    match config.backend {
        GraphBackend::Neo4j => {
            let url = Url::parse(&config.url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid graph url: {}", e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "graph url must use http or https, got '{}'",
                    config.url
                )));
            }
            if config.database.is_empty() || config.username.is_empty() {
                return Err(ConfigError::Validation(
                    "graph database and username cannot be empty".to_string(),
                ));
            }
        }
        GraphBackend::Sqlite => {
            if config.sqlite_path.is_empty() {
                return Err(ConfigError::Validation(
                    "sqlite-path cannot be empty".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_ai_config(config: &AiConfig) -> Result<(), ConfigError> {
    if config.provider == AiProvider::Disabled {
        return Ok(());
    }

    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid ai base-url: {}", e)))?;

    if config.generation_model.is_empty() || config.embedding_model.is_empty() {
        return Err(ConfigError::Validation(
            "ai generation-model and embedding-model cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "ai timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if !(1..=10).contains(&config.max_attempts) {
        return Err(ConfigError::Validation(format!(
            "retry max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Accepts `example.com` and `*.example.com`
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    check_host(host).map_err(|problem| {
        ConfigError::InvalidPattern(format!("blocked domain '{}' {}", pattern, problem))
    })
}

/// Describes the first thing wrong with a bare host name
fn check_host(host: &str) -> Result<(), &'static str> {
    if host.is_empty() {
        return Err("is empty");
    }
    if host.split('.').count() < 2 {
        return Err("needs at least two labels");
    }
    for label in host.split('.') {
        if label.is_empty() {
            return Err("has an empty label");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("has a label starting or ending with '-'");
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err("contains invalid characters");
        }
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ConfigError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && check_host(domain).is_ok()
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact-email '{}' is not an email address",
            email
        )))
    }
}
