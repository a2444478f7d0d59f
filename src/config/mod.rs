use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{find_config_file, read_config, read_config_from};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    #[serde(default)]
    learning: Learning,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_token_ttl_hours")]
    token_ttl_hours: i64,
    #[serde(default = "default_admin_username")]
    admin_username: String,
    #[serde(default = "default_admin_password")]
    admin_password: String,
}

/// Knobs of the learning domain itself.
#[derive(Debug, Deserialize)]
pub struct Learning {
    /// Share of a video that must be watched before the lesson counts as completed.
    #[serde(default = "default_video_completion_ratio")]
    video_completion_ratio: f64,
    /// Pass score (percent) given to tests created without one.
    #[serde(default = "default_pass_score")]
    default_pass_score: f64,
    #[serde(default = "default_event_capacity")]
    event_capacity: usize,
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_admin_username() -> String {
    String::from("admin")
}

fn default_admin_password() -> String {
    String::from("admin")
}

fn default_video_completion_ratio() -> f64 {
    0.9
}

pub const DEFAULT_PASS_SCORE: f64 = 50.0;

fn default_pass_score() -> f64 {
    DEFAULT_PASS_SCORE
}

fn default_event_capacity() -> usize {
    256
}

impl Default for Learning {
    fn default() -> Self {
        Self {
            video_completion_ratio: default_video_completion_ratio(),
            default_pass_score: default_pass_score(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let text = read_config(use_local)?;
                    Self::parse(&text)
                };

                match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Config not found.");
                        std::process::exit(1);
                    }
                }
            })
            .await
    }

    pub fn parse(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        let ratio = self.learning.video_completion_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "learning.video_completion_ratio must be in (0, 1], got {ratio}"
            )));
        }

        let pass = self.learning.default_pass_score;
        if !(0.0..=100.0).contains(&pass) {
            return Err(ConfigError::Invalid(format!(
                "learning.default_pass_score must be in [0, 100], got {pass}"
            )));
        }

        if self.learning.event_capacity == 0 {
            return Err(ConfigError::Invalid(String::from(
                "learning.event_capacity must be positive",
            )));
        }

        Ok(())
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn learning(&self) -> &Learning {
        &self.learning
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    #[inline]
    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours
    }

    #[inline]
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    #[inline]
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

impl Learning {
    #[inline]
    pub fn video_completion_ratio(&self) -> f64 {
        self.video_completion_ratio
    }

    #[inline]
    pub fn default_pass_score(&self) -> f64 {
        self.default_pass_score
    }

    #[inline]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"
        [host]
        bindto = "0.0.0.0:8080"

        [app]
        jwt = "secret"
        database_uri = "postgres://localhost/lms"
    "#;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.host().bindto(), "0.0.0.0:8080");
        assert!(!config.app().docs());
        assert_eq!(config.app().token_ttl_hours(), 24);
        assert_eq!(config.app().admin_username(), "admin");
        assert_eq!(config.learning().video_completion_ratio(), 0.9);
        assert_eq!(config.learning().default_pass_score(), 50.0);
        assert_eq!(config.learning().event_capacity(), 256);
    }

    #[test]
    fn learning_section_overrides() {
        let text = format!(
            "{MINIMAL}\n[learning]\nvideo_completion_ratio = 0.75\ndefault_pass_score = 80.0\n"
        );
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.learning().video_completion_ratio(), 0.75);
        assert_eq!(config.learning().default_pass_score(), 80.0);
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        for ratio in ["1.5", "0.0", "-0.2", "nan"] {
            let text = format!("{MINIMAL}\n[learning]\nvideo_completion_ratio = {ratio}\n");
            let err = Config::parse(&text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "ratio {ratio}");
        }
        let text = format!("{MINIMAL}\n[learning]\nvideo_completion_ratio = 1.0\n");
        assert!(Config::parse(&text).is_ok());
    }

    #[test]
    fn missing_section_is_a_parse_error() {
        let err = Config::parse("[host]\nbindto = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlDeError(_)));
    }
}
