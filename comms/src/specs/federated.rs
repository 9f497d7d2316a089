use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display},
    num::NonZeroUsize,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Error returned whenever a training configuration is missing a field or holds an invalid value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErr {
    Missing {
        field: &'static str,
    },
    Malformed {
        field: &'static str,
        value: String,
    },
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "missing config field `{field}`"),
            Self::Malformed { field, value } => {
                write!(f, "config field `{field}` has a malformed value `{value}`")
            }
            Self::OutOfRange { field, reason } => {
                write!(f, "config field `{field}` is out of range: {reason}")
            }
        }
    }
}

impl Error for ConfigErr {}

/// The hyperparameters a client uses for one round of local training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f32,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
}

impl TrainingConfig {
    /// Creates a new validated `TrainingConfig`.
    ///
    /// # Arguments
    /// * `learning_rate` - The step length for the optimizer, must be finite and positive.
    /// * `epochs` - The amount of local passes over the partition, must be positive.
    /// * `batch_size` - The amount of examples per optimizer step, must be positive.
    ///
    /// # Returns
    /// The configuration or the first invalid field.
    pub fn new(learning_rate: f32, epochs: usize, batch_size: usize) -> Result<Self, ConfigErr> {
        let epochs = NonZeroUsize::new(epochs).ok_or(ConfigErr::OutOfRange {
            field: "epochs",
            reason: "must be positive",
        })?;

        let batch_size = NonZeroUsize::new(batch_size).ok_or(ConfigErr::OutOfRange {
            field: "batch_size",
            reason: "must be positive",
        })?;

        let config = Self {
            learning_rate,
            epochs,
            batch_size,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration from its string map form,
    /// where every value travels as text (`{"learning_rate": "0.01", ...}`).
    ///
    /// # Arguments
    /// * `map` - The raw key value pairs.
    ///
    /// # Returns
    /// The configuration, or `ConfigErr` if a field is missing, unparsable or out of range.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigErr> {
        let learning_rate = parse_field(map, "learning_rate")?;
        let epochs = parse_field(map, "epochs")?;
        let batch_size = parse_field(map, "batch_size")?;
        Self::new(learning_rate, epochs, batch_size)
    }

    /// Checks the invariants that serde can't express on its own.
    ///
    /// # Returns
    /// An error if the learning rate is not a finite positive number.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigErr::OutOfRange {
                field: "learning_rate",
                reason: "must be a finite positive number",
            });
        }

        Ok(())
    }
}

fn parse_field<T: FromStr>(map: &HashMap<String, String>, field: &'static str) -> Result<T, ConfigErr> {
    let raw = map.get(field).ok_or(ConfigErr::Missing { field })?;

    raw.trim().parse().map_err(|_| ConfigErr::Malformed {
        field,
        value: raw.clone(),
    })
}

/// The data split a partition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Self::Train),
            "val" => Ok(Self::Val),
            "test" => Ok(Self::Test),
            other => Err(ConfigErr::Malformed {
                field: "split",
                value: other.to_string(),
            }),
        }
    }
}

/// The half of a client's partition: `Support` is used for local training and `Query` is held
/// out for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    Support,
    Query,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Query => "query",
        }
    }
}

impl Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subset {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "support" => Ok(Self::Support),
            "query" => Ok(Self::Query),
            other => Err(ConfigErr::Malformed {
                field: "subset",
                value: other.to_string(),
            }),
        }
    }
}

/// What a client evaluates the received weights on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub batch_size: NonZeroUsize,
    pub split: Split,
    pub subset: Subset,
}

/// The outcome of evaluating some weights over a partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub loss: f32,
    pub accuracy: f32,
    pub num_examples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_map_parses_textual_values() {
        let config = TrainingConfig::from_map(&map(&[
            ("learning_rate", "0.05"),
            ("epochs", "3"),
            ("batch_size", " 32 "),
        ]))
        .unwrap();

        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.epochs.get(), 3);
        assert_eq!(config.batch_size.get(), 32);
    }

    #[test]
    fn from_map_reports_missing_field() {
        let err = TrainingConfig::from_map(&map(&[("learning_rate", "0.05"), ("epochs", "3")]))
            .unwrap_err();

        assert_eq!(err, ConfigErr::Missing { field: "batch_size" });
    }

    #[test]
    fn from_map_reports_malformed_field() {
        let err = TrainingConfig::from_map(&map(&[
            ("learning_rate", "fast"),
            ("epochs", "3"),
            ("batch_size", "32"),
        ]))
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigErr::Malformed {
                field: "learning_rate",
                ..
            }
        ));
    }

    #[test]
    fn non_positive_values_are_rejected() {
        assert!(TrainingConfig::new(0.0, 1, 1).is_err());
        assert!(TrainingConfig::new(-0.1, 1, 1).is_err());
        assert!(TrainingConfig::new(f32::NAN, 1, 1).is_err());
        assert!(TrainingConfig::new(0.1, 0, 1).is_err());
        assert!(TrainingConfig::new(0.1, 1, 0).is_err());
    }

    #[test]
    fn zero_epochs_fail_to_deserialize() {
        let json = r#"{"learning_rate": 0.1, "epochs": 0, "batch_size": 4}"#;
        assert!(serde_json::from_str::<TrainingConfig>(json).is_err());
    }

    #[test]
    fn split_and_subset_parse_their_path_names() {
        assert_eq!("val".parse::<Split>().unwrap(), Split::Val);
        assert_eq!("query".parse::<Subset>().unwrap(), Subset::Query);
        assert!("dev".parse::<Split>().is_err());
        assert_eq!(Split::Train.to_string(), "train");
    }
}
