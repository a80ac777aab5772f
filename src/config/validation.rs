use hyper::Method;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::models::{Backend, Config, Endpoint};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

// Path captures look like `{user_id}`; anything else inside braces is a
// config typo we want to reject before the router does.
static CAPTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").expect("capture regex is valid")
});
static BRACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("brace regex is valid"));

/// Aggregator configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire configuration, collecting every problem rather
    /// than stopping at the first one.
    pub fn validate(config: &Config) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.endpoints.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "endpoints".to_string(),
            });
        }

        let mut seen_routes = std::collections::HashSet::new();
        for (i, endpoint) in config.endpoints.iter().enumerate() {
            Self::validate_endpoint(i, endpoint, &mut errors);

            if !seen_routes.insert((endpoint.method.clone(), endpoint.endpoint.clone())) {
                errors.push(ValidationError::InvalidField {
                    field: format!("endpoint {}", endpoint.endpoint),
                    message: format!("duplicate route {} {}", endpoint.method, endpoint.endpoint),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_endpoint(index: usize, endpoint: &Endpoint, errors: &mut Vec<ValidationError>) {
        let label = if endpoint.endpoint.is_empty() {
            format!("endpoint {index}")
        } else {
            format!("endpoint {}", endpoint.endpoint)
        };

        if endpoint.endpoint.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("{label}: endpoint path"),
            });
        } else if !endpoint.endpoint.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: format!("{label}: endpoint path"),
                message: "must start with '/'".to_string(),
            });
        }

        Self::validate_captures(&label, "endpoint path", &endpoint.endpoint, errors);

        if endpoint.method.parse::<Method>().is_err() {
            errors.push(ValidationError::InvalidField {
                field: format!("{label}: method"),
                message: format!("'{}' is not a valid HTTP method", endpoint.method),
            });
        }

        if endpoint.backends.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("{label}: backends (at least one is required)"),
            });
        }

        for (j, backend) in endpoint.backends.iter().enumerate() {
            Self::validate_backend(&label, j, backend, errors);
        }
    }

    fn validate_backend(
        endpoint_label: &str,
        index: usize,
        backend: &Backend,
        errors: &mut Vec<ValidationError>,
    ) {
        let label = format!("{endpoint_label}, backend {index}");

        if backend.host.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("{label}: host"),
            });
        } else if !backend.host.starts_with("http://") && !backend.host.starts_with("https://") {
            errors.push(ValidationError::InvalidField {
                field: format!("{label}: host"),
                message: format!("'{}' must start with http:// or https://", backend.host),
            });
        }

        Self::validate_captures(&label, "url_pattern", backend.url_pattern(), errors);

        // Both set is accepted: concat wins at merge time. Surface it so the
        // operator knows the group directive is inert.
        if backend.concat.is_some() && backend.group.is_some() {
            tracing::warn!(
                backend = %backend.host,
                "both 'group' and 'concat' are set; 'concat' takes precedence"
            );
        }
    }

    fn validate_captures(
        label: &str,
        field: &str,
        pattern: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for brace in BRACE_RE.find_iter(pattern) {
            if !CAPTURE_RE.is_match(brace.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("{label}: {field}"),
                    message: format!("malformed path capture '{}'", brace.as_str()),
                });
            }
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        messages.join("; ")
    }
}
