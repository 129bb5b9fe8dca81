use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// Fatal errors abort the whole run instead of a single item.
    fn is_fatal(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::SocialApi(e) => {
                error!("Social API error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        match self {
            CoreError::SocialApi(e) => e.is_fatal(),
            CoreError::Config(e) => e.is_fatal(),
            CoreError::Database(e) => e.is_fatal(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::SocialApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { .. } => {
                "Invalid input provided. Please check your input and try again.".to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            CoreError::RequestFailed { message, .. } => {
                format!("Request failed: {}", message)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::SocialApi(_) => "SOCIAL_API".to_string(),
            CoreError::Database(_) => "DATABASE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
            CoreError::RequestFailed { .. } => "REQUEST_FAILED".to_string(),
        }
    }
}

impl ErrorExt for SocialApiError {
    fn log_error(&self) -> &Self {
        error!("SocialApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SocialApiError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            SocialApiError::AuthenticationFailed { .. }
                | SocialApiError::NotAuthenticated
                | SocialApiError::InvalidToken
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SocialApiError::AuthenticationFailed { .. } => {
                "Login failed. Please check the account handle and app password.".to_string()
            }
            SocialApiError::NotAuthenticated => {
                "The client has not logged in yet.".to_string()
            }
            SocialApiError::InvalidToken => {
                "Session token is invalid or expired. Please log in again.".to_string()
            }
            SocialApiError::SearchFailed { query, .. } => {
                format!("Searching for '{}' failed. It will be retried next run.", query)
            }
            SocialApiError::ThreadFetchFailed { .. } => {
                "Could not inspect the reply thread; the post will be skipped.".to_string()
            }
            SocialApiError::PostFailed { .. } => "The reply could not be posted.".to_string(),
            SocialApiError::UploadFailed { .. } => {
                "The attachment could not be uploaded; replying without it.".to_string()
            }
            SocialApiError::MetadataFailed { url, .. } => {
                format!("Could not read link preview for {}.", url)
            }
            SocialApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            _ => "Social API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            SocialApiError::AuthenticationFailed { .. } => "SOCIAL_AUTH_FAILED".to_string(),
            SocialApiError::NotAuthenticated => "SOCIAL_NOT_AUTHENTICATED".to_string(),
            SocialApiError::InvalidToken => "SOCIAL_INVALID_TOKEN".to_string(),
            SocialApiError::SearchFailed { .. } => "SOCIAL_SEARCH_FAILED".to_string(),
            SocialApiError::ThreadFetchFailed { .. } => "SOCIAL_THREAD_FETCH_FAILED".to_string(),
            SocialApiError::PostFailed { .. } => "SOCIAL_POST_FAILED".to_string(),
            SocialApiError::UploadFailed { .. } => "SOCIAL_UPLOAD_FAILED".to_string(),
            SocialApiError::MetadataFailed { .. } => "SOCIAL_METADATA_FAILED".to_string(),
            SocialApiError::RateLimitExceeded { .. } => "SOCIAL_RATE_LIMIT".to_string(),
            SocialApiError::InvalidResponse { .. } => "SOCIAL_INVALID_RESPONSE".to_string(),
            SocialApiError::ServerError { .. } => "SOCIAL_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!("DatabaseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DatabaseError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed { .. } | DatabaseError::MigrationFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => {
                "History database connection failed. Please check HISTORY_DB.".to_string()
            }
            DatabaseError::DatabaseLocked => {
                "History database is temporarily busy. Please try again.".to_string()
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            DatabaseError::DatabaseLocked => "DB_LOCKED".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        true
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::InvalidFormat { .. } => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_fatal() {
                info!("Error is fatal for the current run");
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
