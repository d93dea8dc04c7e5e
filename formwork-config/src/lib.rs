// Configuration for the Formwork form engine

pub mod env;
pub mod error;
pub mod loader;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// When input events trigger validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Only on submit
    #[default]
    OnSubmit,
    /// On every change
    OnChange,
    /// When a field loses focus
    OnBlur,
    /// First on blur, then on every change
    OnTouched,
    /// On blur and on change
    All,
}

impl FromStr for ValidationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "onsubmit" => Ok(ValidationMode::OnSubmit),
            "onchange" => Ok(ValidationMode::OnChange),
            "onblur" => Ok(ValidationMode::OnBlur),
            "ontouched" => Ok(ValidationMode::OnTouched),
            "all" => Ok(ValidationMode::All),
            _ => Err(ConfigError::InvalidValue {
                key: "mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Whether fields disabled by their `disabled_when` predicate are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledPolicy {
    /// Disabled fields are never validated and never carry errors
    #[default]
    Skip,
    /// Disabled fields are validated like any other field
    Validate,
}

impl FromStr for DisabledPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(DisabledPolicy::Skip),
            "validate" => Ok(DisabledPolicy::Validate),
            _ => Err(ConfigError::InvalidValue {
                key: "disabled_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// UI events that may trigger validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Change,
    Blur,
}

/// Form engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Validation strategy before the first submit
    pub mode: ValidationMode,
    /// Validation strategy after the first submit
    pub revalidate_mode: ValidationMode,
    pub disabled_policy: DisabledPolicy,
    /// Reset the store after a successful submit handler
    pub reset_on_success: bool,
    /// Entries an array field keeps at minimum
    pub min_array_entries: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::OnSubmit,
            revalidate_mode: ValidationMode::OnChange,
            disabled_policy: DisabledPolicy::Skip,
            reset_on_success: true,
            min_array_entries: 1,
        }
    }
}

impl FormConfig {
    pub fn builder() -> FormConfigBuilder {
        FormConfigBuilder::new()
    }

    /// Load from a TOML or JSON file, detected by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::new(FileFormat::detect(path)?);
        let mut config = Self::default();
        config.merge_json(loader.load_file(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `FORMWORK_*` variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(&EnvLoader::default().load())?;
        config.validate()?;
        Ok(config)
    }

    /// Whether an input event should validate the field.
    ///
    /// `touched` is the field's touched state before the event, `submitted`
    /// whether the form has been submitted since the last reset.
    pub fn should_validate(&self, event: InputEvent, touched: bool, submitted: bool) -> bool {
        let mode = if submitted {
            self.revalidate_mode
        } else {
            self.mode
        };

        match (mode, event) {
            (ValidationMode::All, _) => true,
            (ValidationMode::OnChange, InputEvent::Change) => true,
            (ValidationMode::OnBlur, InputEvent::Blur) => true,
            (ValidationMode::OnTouched, InputEvent::Blur) => true,
            (ValidationMode::OnTouched, InputEvent::Change) => touched,
            _ => false,
        }
    }

    /// Check cross-setting constraints
    pub fn validate(&self) -> Result<()> {
        if !matches!(
            self.revalidate_mode,
            ValidationMode::OnChange | ValidationMode::OnBlur | ValidationMode::OnSubmit
        ) {
            return Err(ConfigError::ValidationError(format!(
                "revalidate_mode must be on_change, on_blur or on_submit, got {:?}",
                self.revalidate_mode
            )));
        }
        Ok(())
    }

    /// Overlay keys present in a JSON object
    fn merge_json(&mut self, overlay: serde_json::Value) -> Result<()> {
        let mut base = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let (Some(base_map), serde_json::Value::Object(overlay_map)) =
            (base.as_object_mut(), overlay)
        {
            for (key, value) in overlay_map {
                base_map.insert(key, value);
            }
        }

        *self = serde_json::from_value(base).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Apply string settings such as those collected from the environment
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        if let Some(value) = vars.get("mode") {
            self.mode = value.parse()?;
        }
        if let Some(value) = vars.get("revalidate_mode") {
            self.revalidate_mode = value.parse()?;
        }
        if let Some(value) = vars.get("disabled_policy") {
            self.disabled_policy = value.parse()?;
        }
        if let Some(value) = vars.get("reset_on_success") {
            self.reset_on_success = parse_bool("reset_on_success", value)?;
        }
        if let Some(value) = vars.get("min_array_entries") {
            self.min_array_entries = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "min_array_entries".to_string(),
                value: value.clone(),
            })?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Layered configuration: defaults, then file, then `.env`, then environment
pub struct FormConfigBuilder {
    config: FormConfig,
    files: Vec<(PathBuf, Option<String>)>,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    env_prefix: String,
}

impl FormConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FormConfig::default(),
            files: Vec::new(),
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn revalidate_mode(mut self, mode: ValidationMode) -> Self {
        self.config.revalidate_mode = mode;
        self
    }

    pub fn disabled_policy(mut self, policy: DisabledPolicy) -> Self {
        self.config.disabled_policy = policy;
        self
    }

    pub fn reset_on_success(mut self, enabled: bool) -> Self {
        self.config.reset_on_success = enabled;
        self
    }

    pub fn min_array_entries(mut self, min: usize) -> Self {
        self.config.min_array_entries = min;
        self
    }

    /// Add a config file
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push((path.into(), None));
        self
    }

    /// Add a config file whose form settings live under `[section]`
    pub fn file_section(mut self, path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        self.files.push((path.into(), Some(section.into())));
        self
    }

    /// Read prefixed environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Read a `.env` file (the default one when `path` is `None`)
    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<FormConfig> {
        let mut config = self.config;

        for (path, section) in &self.files {
            let mut loader = ConfigLoader::new(FileFormat::detect(path)?);
            if let Some(section) = section {
                loader = loader.section(section.clone());
            }
            config.merge_json(loader.load_file(path)?)?;
        }

        let env_loader = EnvLoader::new(self.env_prefix.clone());
        if self.load_dotenv {
            config.apply_env(&env_loader.load_dotenv(self.dotenv_path.as_deref())?)?;
        } else if self.load_env {
            config.apply_env(&env_loader.load())?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for FormConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FormConfig::default();
        assert_eq!(config.mode, ValidationMode::OnSubmit);
        assert_eq!(config.revalidate_mode, ValidationMode::OnChange);
        assert_eq!(config.disabled_policy, DisabledPolicy::Skip);
        assert!(config.reset_on_success);
        assert_eq!(config.min_array_entries, 1);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("onChange".parse::<ValidationMode>().unwrap(), ValidationMode::OnChange);
        assert_eq!("on_blur".parse::<ValidationMode>().unwrap(), ValidationMode::OnBlur);
        assert_eq!("on-touched".parse::<ValidationMode>().unwrap(), ValidationMode::OnTouched);
        assert_eq!("ALL".parse::<ValidationMode>().unwrap(), ValidationMode::All);
        assert!("sometimes".parse::<ValidationMode>().is_err());
    }

    #[test]
    fn test_should_validate_before_submit() {
        let on_submit = FormConfig::default();
        assert!(!on_submit.should_validate(InputEvent::Change, true, false));
        assert!(!on_submit.should_validate(InputEvent::Blur, true, false));

        let on_touched = FormConfig::builder()
            .mode(ValidationMode::OnTouched)
            .build()
            .unwrap();
        assert!(!on_touched.should_validate(InputEvent::Change, false, false));
        assert!(on_touched.should_validate(InputEvent::Blur, false, false));
        assert!(on_touched.should_validate(InputEvent::Change, true, false));
    }

    #[test]
    fn test_should_validate_after_submit_uses_revalidate_mode() {
        let config = FormConfig::default();
        assert!(config.should_validate(InputEvent::Change, false, true));
        assert!(!config.should_validate(InputEvent::Blur, false, true));
    }

    #[test]
    fn test_apply_env() {
        let mut config = FormConfig::default();
        let vars = HashMap::from([
            ("mode".to_string(), "onBlur".to_string()),
            ("disabled_policy".to_string(), "validate".to_string()),
            ("reset_on_success".to_string(), "no".to_string()),
            ("min_array_entries".to_string(), "0".to_string()),
        ]);

        config.apply_env(&vars).unwrap();
        assert_eq!(config.mode, ValidationMode::OnBlur);
        assert_eq!(config.disabled_policy, DisabledPolicy::Validate);
        assert!(!config.reset_on_success);
        assert_eq!(config.min_array_entries, 0);
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let mut config = FormConfig::default();
        let vars = HashMap::from([("min_array_entries".to_string(), "many".to_string())]);
        assert!(matches!(
            config.apply_env(&vars),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_merge_json_keeps_unset_keys() {
        let mut config = FormConfig::default();
        config
            .merge_json(serde_json::json!({ "mode": "all" }))
            .unwrap();

        assert_eq!(config.mode, ValidationMode::All);
        assert!(config.reset_on_success);
    }

    #[test]
    fn test_revalidate_mode_constraint() {
        let result = FormConfig::builder()
            .revalidate_mode(ValidationMode::OnTouched)
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_builder_reads_file_section() {
        let path = std::env::temp_dir().join(format!("formwork-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            [form]
            mode = "on_touched"
            min_array_entries = 0
            "#,
        )
        .unwrap();

        let config = FormConfig::builder()
            .reset_on_success(false)
            .file_section(&path, "form")
            .build();
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.mode, ValidationMode::OnTouched);
        assert_eq!(config.min_array_entries, 0);
        assert!(!config.reset_on_success);
    }

    #[test]
    fn test_missing_file() {
        assert!(FormConfig::from_file("/nonexistent/form.toml").is_err());
    }
}
