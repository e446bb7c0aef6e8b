//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tunable thresholds for resolution, relationship inference and anomaly rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Overall similarity an existing entity must exceed to absorb a record.
    pub match_threshold: f64,
    /// Name similarity a reference attribute must exceed to create an edge.
    pub relationship_threshold: f64,
    /// Minimum deal amount inspected by the deal-risk rule.
    pub deal_risk_amount: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.7,
            relationship_threshold: 0.7,
            deal_risk_amount: 10_000.0,
        }
    }
}

impl EngineConfig {
    /// Checks every field is within its allowed range.
    ///
    /// # Errors
    /// `ThresholdOutOfRange` for a threshold outside `[0, 1]`, `InvalidAmount`
    /// for a negative or non-finite deal-risk floor.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_unit("match_threshold", self.match_threshold)?;
        check_unit("relationship_threshold", self.relationship_threshold)?;
        if !self.deal_risk_amount.is_finite() || self.deal_risk_amount < 0.0 {
            return Err(ValidationError::InvalidAmount {
                value: self.deal_risk_amount,
            });
        }
        Ok(())
    }

    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// `InvalidConfig` when the document does not parse, otherwise whatever
    /// [`Self::validate`] reports.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ThresholdOutOfRange { name, value })
    }
}

/// Configuration for [`crate::EngineRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum queued requests before submission fails with `QueueFull`.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}
