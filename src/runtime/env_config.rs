//! Environment variable and config file support for [`LoopConfig`].
//!
//! # Configuration Precedence
//!
//! 1. **Programmatic**: builder methods on [`LoopConfig`]
//! 2. **Environment variables**: `ABB_*`
//! 3. **Config file**: TOML (requires the `config-file` feature)
//! 4. **Defaults**: [`LoopConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `ABB_HOST_PRIMITIVES` | comma list of `immediate`, `microtask`, or `none` | `capabilities` |
//! | `ABB_UNHANDLED_RESPONSE` | `panic` / `log` / `silent` | `unhandled_response` |
//! | `ABB_MAX_RECORDED_UNHANDLED` | `usize` | `max_recorded_unhandled` |

use super::config::{ConfigError, LoopConfig, UnhandledResponse};
use super::Capabilities;

/// Environment variable name for the advertised host primitives.
pub const ENV_HOST_PRIMITIVES: &str = "ABB_HOST_PRIMITIVES";
/// Environment variable name for the unhandled-failure response.
pub const ENV_UNHANDLED_RESPONSE: &str = "ABB_UNHANDLED_RESPONSE";
/// Environment variable name for the unhandled-failure record limit.
pub const ENV_MAX_RECORDED_UNHANDLED: &str = "ABB_MAX_RECORDED_UNHANDLED";

/// Applies environment overrides. Unset variables are left alone.
pub(crate) fn apply_env_overrides(config: &mut LoopConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_HOST_PRIMITIVES) {
        config.capabilities = parse_capabilities(ENV_HOST_PRIMITIVES, &val)?;
    }
    if let Some(val) = read_env(ENV_UNHANDLED_RESPONSE) {
        config.unhandled_response = parse_response(ENV_UNHANDLED_RESPONSE, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_RECORDED_UNHANDLED) {
        config.max_recorded_unhandled = parse_usize(ENV_MAX_RECORDED_UNHANDLED, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidEnv {
            var,
            reason: format!("expected unsigned integer, got {val:?} ({e})"),
        })
}

fn parse_response(var: &'static str, val: &str) -> Result<UnhandledResponse, ConfigError> {
    UnhandledResponse::parse(val).ok_or_else(|| ConfigError::InvalidEnv {
        var,
        reason: format!("expected panic/log/silent, got {val:?}"),
    })
}

fn parse_capabilities(var: &'static str, val: &str) -> Result<Capabilities, ConfigError> {
    let mut caps = Capabilities::TIMERS_ONLY;
    for item in val.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.to_ascii_lowercase().as_str() {
            "immediate" => caps.immediate = true,
            "microtask" => caps.microtask = true,
            "none" => {}
            other => {
                return Err(ConfigError::InvalidEnv {
                    var,
                    reason: format!("unknown host primitive {other:?}"),
                })
            }
        }
    }
    Ok(caps)
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable loop configuration.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub(crate) struct LoopTomlConfig {
    #[serde(default)]
    host: HostToml,
    #[serde(default)]
    unhandled: UnhandledToml,
}

#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
struct HostToml {
    primitives: Option<Vec<String>>,
}

#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
struct UnhandledToml {
    response: Option<String>,
    max_recorded: Option<usize>,
}

#[cfg(feature = "config-file")]
pub(crate) fn parse_toml_str(toml_str: &str) -> Result<LoopTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Toml(e.to_string()))
}

/// Applies a parsed TOML document. Only present fields override.
#[cfg(feature = "config-file")]
pub(crate) fn apply_toml_config(
    config: &mut LoopConfig,
    toml: &LoopTomlConfig,
) -> Result<(), ConfigError> {
    if let Some(ref primitives) = toml.host.primitives {
        config.capabilities = parse_capabilities("host.primitives", &primitives.join(","))?;
    }
    if let Some(ref response) = toml.unhandled.response {
        config.unhandled_response = parse_response("unhandled.response", response)?;
    }
    if let Some(max) = toml.unhandled.max_recorded {
        config.max_recorded_unhandled = max;
    }
    Ok(())
}
