//! Model selection: maps a user-facing tier choice and a temperature onto
//! the configuration handed to the answer service for a single request.

use std::fmt;

use clap::ValueEnum;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Temperature is selected in hundredths.
const TEMPERATURE_STEPS_PER_UNIT: f32 = 100.0;

/// The fixed set of models a user can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModelTier {
    #[default]
    #[value(name = "gpt-3.5")]
    Gpt35,
    #[value(name = "gpt-4")]
    Gpt4,
}

impl ModelTier {
    /// Identifier sent to the API.
    pub fn model_identifier(&self) -> &'static str {
        match self {
            ModelTier::Gpt35 => "gpt-3.5-turbo",
            ModelTier::Gpt4 => "gpt-4",
        }
    }

    /// Label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            ModelTier::Gpt35 => "GPT-3.5",
            ModelTier::Gpt4 => "GPT-4",
        }
    }

    /// Parse a tier the way the command line does, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(input.trim(), true).ok()
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clamp a requested temperature into the supported range and snap it to
/// the selection step. NaN falls back to the minimum.
pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return MIN_TEMPERATURE;
    }
    let clamped = temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
    // `+ 0.0` turns a negative zero into a positive one
    (clamped * TEMPERATURE_STEPS_PER_UNIT).round() / TEMPERATURE_STEPS_PER_UNIT + 0.0
}

/// Configuration for one answer request. A new selection only affects
/// requests issued after it is made.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    tier: ModelTier,
    model_identifier: String,
    temperature: f32,
}

impl ModelConfig {
    pub fn new(tier: ModelTier, temperature: f32) -> Self {
        Self {
            tier,
            model_identifier: tier.model_identifier().to_string(),
            temperature: clamp_temperature(temperature),
        }
    }

    pub fn tier(&self) -> ModelTier {
        self.tier
    }

    pub fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn with_tier(&self, tier: ModelTier) -> Self {
        Self::new(tier, self.temperature)
    }

    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self::new(self.tier, temperature)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(ModelTier::default(), MIN_TEMPERATURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_map_to_api_identifiers() {
        assert_eq!(ModelTier::Gpt35.model_identifier(), "gpt-3.5-turbo");
        assert_eq!(ModelTier::Gpt4.model_identifier(), "gpt-4");
    }

    #[test]
    fn parse_accepts_cli_names_in_any_case() {
        assert_eq!(ModelTier::parse("gpt-4"), Some(ModelTier::Gpt4));
        assert_eq!(ModelTier::parse(" GPT-3.5 "), Some(ModelTier::Gpt35));
        assert_eq!(ModelTier::parse("gpt-5"), None);
    }

    #[test]
    fn temperature_is_clamped_into_range() {
        assert_eq!(clamp_temperature(-1.0), 0.0);
        assert_eq!(clamp_temperature(3.5), 2.0);
        assert_eq!(clamp_temperature(f32::NAN), 0.0);
        assert!((clamp_temperature(0.704) - 0.70).abs() < 1e-6);
    }

    #[test]
    fn infinite_temperatures_clamp_to_the_nearest_bound() {
        assert_eq!(clamp_temperature(f32::INFINITY), 2.0);
        assert_eq!(clamp_temperature(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn negative_zero_temperature_is_normalised() {
        for requested in [-0.0, -0.001] {
            let temperature = clamp_temperature(requested);
            assert!(temperature.is_sign_positive());
            assert_eq!(format!("{:.2}", temperature), "0.00");
        }
    }

    #[test]
    fn default_config_is_cheapest_tier_at_zero_temperature() {
        let config = ModelConfig::default();
        assert_eq!(config.tier(), ModelTier::Gpt35);
        assert_eq!(config.model_identifier(), "gpt-3.5-turbo");
        assert_eq!(config.temperature(), 0.0);
    }

    #[test]
    fn reselection_keeps_the_other_field() {
        let config = ModelConfig::new(ModelTier::Gpt35, 0.5).with_tier(ModelTier::Gpt4);
        assert_eq!(config.model_identifier(), "gpt-4");
        assert!((config.temperature() - 0.5).abs() < 1e-6);

        let config = config.with_temperature(9.0);
        assert_eq!(config.tier(), ModelTier::Gpt4);
        assert_eq!(config.temperature(), 2.0);
    }
}
