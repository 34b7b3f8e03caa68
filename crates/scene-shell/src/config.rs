use scene_runtime_std::DEFAULT_MAX_CYCLES;

use crate::error::ShellError;

const PRETTY_JSON_VAR: &str = "SCENE_PRETTY_JSON";
const MAX_CYCLES_VAR: &str = "SCENE_MAX_CYCLES";

/// Settings for a [`Shell`](crate::Shell).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    /// Indent the JSON handed to `on_json_update`.
    pub pretty_json: bool,
    /// Upper bound on scheduling cycles per `run_until_idle` call.
    pub max_cycles: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            pretty_json: true,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

impl ShellConfig {
    pub fn with_pretty_json(mut self, pretty_json: bool) -> Self {
        self.pretty_json = pretty_json;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Reads `SCENE_PRETTY_JSON` and `SCENE_MAX_CYCLES`, keeping defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self, ShellError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ShellError> {
        let mut config = Self::default();
        if let Some(value) = lookup(PRETTY_JSON_VAR) {
            config.pretty_json = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ShellError::InvalidConfig {
                        variable: PRETTY_JSON_VAR,
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup(MAX_CYCLES_VAR) {
            config.max_cycles = match value.trim().parse() {
                Ok(cycles) if cycles > 0 => cycles,
                _ => {
                    return Err(ShellError::InvalidConfig {
                        variable: MAX_CYCLES_VAR,
                        value,
                    })
                }
            };
        }
        Ok(config)
    }
}
