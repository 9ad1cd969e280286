use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use events_common::events::SourceKind;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3302")]
    pub port: u16,

    #[envconfig(from = "SOURCE_KIND", default = "git")]
    pub source_kind: SourceKind,

    #[envconfig(from = "GRANULARITY", default = "2")]
    pub granularity: u32,

    #[envconfig(from = "BATCH_SIZE", default = "1000")]
    pub batch_size: usize,

    #[envconfig(from = "REQUEST_TIMEOUT", default = "30000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(from = "SCROLL_KEEPALIVE", default = "5m")]
    pub scroll_keepalive: NonEmptyString,

    #[envconfig(nested = true)]
    pub elasticsearch: ElasticsearchConfig,

    #[envconfig(from = "IDENTITIES_FILE")]
    pub identities_file: Option<String>,

    #[envconfig(from = "PROJECTS_FILE")]
    pub projects_file: Option<String>,

    #[envconfig(from = "UUIDS_FILE")]
    pub uuids_file: Option<String>,

    #[envconfig(from = "PIPELINE_FILE")]
    pub pipeline_file: Option<String>,

    #[envconfig(nested = true)]
    pub genderize: GenderizeConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Envconfig, Clone)]
pub struct ElasticsearchConfig {
    #[envconfig(from = "ES_SOURCE_URL")]
    pub source_url: String,

    #[envconfig(from = "ES_SOURCE_INDEX")]
    pub source_index: NonEmptyString,

    #[envconfig(from = "ES_DESTINATION_URL")]
    pub destination_url: String,

    #[envconfig(from = "ES_DESTINATION_INDEX")]
    pub destination_index: NonEmptyString,
}

#[derive(Envconfig, Clone)]
pub struct GenderizeConfig {
    #[envconfig(from = "GENDER_ENABLED", default = "false")]
    pub enabled: bool,

    #[envconfig(from = "GENDERIZE_URL", default = "https://api.genderize.io")]
    pub url: String,

    #[envconfig(from = "GENDERIZE_API_KEY")]
    pub api_key: Option<String>,

    #[envconfig(from = "GENDER_CACHE_FILE")]
    pub cache_file: Option<String>,

    #[envconfig(from = "GENDER_CACHE_CAPACITY", default = "100000")]
    pub cache_capacity: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
