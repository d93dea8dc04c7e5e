// Environment variable loading

use std::collections::HashMap;
use std::env;

/// Default prefix for form settings in the environment
pub const ENV_PREFIX: &str = "FORMWORK";

/// Collects `PREFIX_*` variables as lowercase keys without the prefix
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load from the process environment
    pub fn load(&self) -> HashMap<String, String> {
        self.collect(env::vars())
    }

    /// Load from an explicit set of variables
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{}_", self.prefix);
        vars.into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&marker)
                    .map(|rest| (rest.to_lowercase(), value))
            })
            .collect()
    }

    /// Load variables from a `.env` file into the process, then collect them
    pub fn load_dotenv(&self, path: Option<&str>) -> crate::Result<HashMap<String, String>> {
        match path {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| crate::ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing default .env is not an error
                dotenvy::dotenv().ok();
            }
        }
        Ok(self.load())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}
