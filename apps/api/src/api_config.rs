use std::collections::BTreeSet;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use opsgate_application::{GateMode, GovernancePolicy};
use opsgate_core::{ActorRole, AppError};
use opsgate_domain::RiskThresholds;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Plan/execution/audit persistence backend.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Durable Postgres stores.
    Postgres {
        /// Connection string for the governance database.
        database_url: String,
    },
    /// In-memory stores for development and tests.
    Memory,
}

/// Intent classifier backend.
#[derive(Debug, Clone)]
pub enum ClassifierConfig {
    /// Deterministic keyword fallback classifier.
    Keyword,
    /// Remotely hosted language-model classifier.
    Http {
        /// Classification endpoint.
        endpoint: Url,
    },
}

/// Second-factor verifier backend.
#[derive(Debug, Clone)]
pub enum TwoFactorConfig {
    /// Development verifier accepting one configured code.
    Static {
        /// The accepted code.
        code: String,
    },
    /// TOTP verifier with pre-enrolled subjects.
    Totp {
        /// Issuer label embedded in otpauth URIs.
        issuer: String,
        /// `(subject, base32 secret)` enrollments.
        secrets: Vec<(String, String)>,
    },
}

/// Runtime configuration for the API composition root.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Run migrations and exit when invoked as `opsgate-api migrate`.
    pub migrate_only: bool,
    /// Bind host.
    pub api_host: String,
    /// Bind port.
    pub api_port: u16,
    /// Persistence backend.
    pub store: StoreConfig,
    /// Classifier backend.
    pub classifier: ClassifierConfig,
    /// Second-factor backend.
    pub two_factor: TwoFactorConfig,
    /// Governance policy knobs.
    pub policy: GovernancePolicy,
    /// Seed demonstration records into the in-memory domain gateway.
    pub seed_demo_data: bool,
}

impl ApiConfig {
    /// Loads configuration from the environment.
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let store = match env::var("OPS_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StoreConfig::Postgres {
                database_url: required_env("DATABASE_URL")?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "OPS_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let classifier = match env::var("OPS_CLASSIFIER")
            .unwrap_or_else(|_| "keyword".to_owned())
            .as_str()
        {
            "keyword" => ClassifierConfig::Keyword,
            "http" => {
                let endpoint = required_env("OPS_CLASSIFIER_URL")?;
                let endpoint = Url::parse(endpoint.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid OPS_CLASSIFIER_URL: {error}"))
                })?;
                ClassifierConfig::Http { endpoint }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "OPS_CLASSIFIER must be either 'keyword' or 'http', got '{other}'"
                )));
            }
        };

        let two_factor = match env::var("OPS_TWO_FACTOR")
            .unwrap_or_else(|_| "static".to_owned())
            .as_str()
        {
            "static" => TwoFactorConfig::Static {
                code: required_env("OPS_STATIC_2FA_CODE")?,
            },
            "totp" => TwoFactorConfig::Totp {
                issuer: env::var("OPS_TOTP_ISSUER").unwrap_or_else(|_| "Opsgate".to_owned()),
                secrets: parse_totp_secrets(required_env("OPS_TOTP_SECRETS")?.as_str())?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "OPS_TWO_FACTOR must be either 'static' or 'totp', got '{other}'"
                )));
            }
        };

        let policy = load_policy()?;
        let seed_demo_data = env::var("OPS_SEED_DEMO_DATA")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            store,
            classifier,
            two_factor,
            policy,
            seed_demo_data,
        })
    }

    /// Returns the bind address.
    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;

        Ok(SocketAddr::from((host, self.api_port)))
    }
}

fn load_policy() -> Result<GovernancePolicy, AppError> {
    let defaults = GovernancePolicy::default();

    let confidence_threshold = parse_env("OPS_CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?;
    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(AppError::Validation(
            "OPS_CONFIDENCE_THRESHOLD must be between 0 and 1".to_owned(),
        ));
    }

    let senior_roles = match env::var("OPS_SENIOR_ROLES") {
        Ok(value) => {
            let mut roles = BTreeSet::new();
            for raw in value.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
                roles.insert(ActorRole::from_str(raw).map_err(|error| {
                    AppError::Validation(format!("invalid OPS_SENIOR_ROLES entry: {error}"))
                })?);
            }
            if roles.is_empty() {
                return Err(AppError::Validation(
                    "OPS_SENIOR_ROLES must name at least one role".to_owned(),
                ));
            }
            roles
        }
        Err(_) => defaults.senior_roles,
    };

    let gate_mode = match env::var("OPS_GATE_MODE") {
        Ok(value) => GateMode::from_str(value.as_str())
            .map_err(|error| AppError::Validation(format!("invalid OPS_GATE_MODE: {error}")))?,
        Err(_) => defaults.gate_mode,
    };

    Ok(GovernancePolicy {
        confidence_threshold,
        max_preview_rows: parse_env("OPS_MAX_PREVIEW_ROWS", defaults.max_preview_rows)?,
        risk_thresholds: RiskThresholds {
            medium_impact: parse_env(
                "OPS_RISK_MEDIUM_IMPACT",
                defaults.risk_thresholds.medium_impact,
            )?,
            high_impact: parse_env("OPS_RISK_HIGH_IMPACT", defaults.risk_thresholds.high_impact)?,
        },
        senior_roles,
        gate_mode,
        classification_timeout: Duration::from_millis(parse_env(
            "OPS_CLASSIFICATION_TIMEOUT_MS",
            u64::try_from(defaults.classification_timeout.as_millis()).unwrap_or(15_000),
        )?),
        estimation_timeout: Duration::from_millis(parse_env(
            "OPS_ESTIMATION_TIMEOUT_MS",
            u64::try_from(defaults.estimation_timeout.as_millis()).unwrap_or(5_000),
        )?),
    })
}

fn parse_totp_secrets(raw: &str) -> Result<Vec<(String, String)>, AppError> {
    let mut secrets = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((subject, secret)) = pair.split_once('=') else {
            return Err(AppError::Validation(
                "OPS_TOTP_SECRETS entries must look like 'subject=BASE32SECRET'".to_owned(),
            ));
        };
        secrets.push((subject.trim().to_owned(), secret.trim().to_owned()));
    }
    if secrets.is_empty() {
        return Err(AppError::Validation(
            "OPS_TOTP_SECRETS must enroll at least one subject".to_owned(),
        ));
    }

    Ok(secrets)
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| AppError::Validation(format!("invalid {name} value '{value}'"))),
        Err(_) => Ok(default),
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

/// Initializes the tracing subscriber for the process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
