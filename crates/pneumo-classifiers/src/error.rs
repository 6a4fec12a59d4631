use std::error::Error;
use std::fmt;

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    UncertaintySampling,
    Clustering,
    Synthesis,
    Fit,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::UncertaintySampling => "uncertainty sampling",
            Stage::Clustering => "clustering",
            Stage::Synthesis => "synthesis",
            Stage::Fit => "fit",
            Stage::Evaluation => "evaluation",
        };
        f.write_str(name)
    }
}

/// Error type for resampling, training and comparison failures.
#[derive(Debug)]
pub enum TrainingError {
    /// Requested sample or cluster sizes exceed the rows available.
    InvalidSamplingConfiguration { stage: Stage, reason: String },
    /// A paired comparison needs at least two trials.
    InsufficientTrials { available: usize },
    /// Feature/label row counts disagree or a required column is missing.
    DataShapeMismatch(String),
    /// The classifier could not be fitted or queried.
    Model { stage: Stage, reason: String },
    Round { round: usize, source: Box<TrainingError> },
    Trial { trial: usize, source: Box<TrainingError> },
}

impl TrainingError {
    pub fn sampling(stage: Stage, reason: impl Into<String>) -> Self {
        TrainingError::InvalidSamplingConfiguration {
            stage,
            reason: reason.into(),
        }
    }

    pub fn model(stage: Stage, reason: impl Into<String>) -> Self {
        TrainingError::Model {
            stage,
            reason: reason.into(),
        }
    }

    pub fn shape(reason: impl Into<String>) -> Self {
        TrainingError::DataShapeMismatch(reason.into())
    }

    /// Attach the (1-based) round index to an error.
    pub fn in_round(self, round: usize) -> Self {
        TrainingError::Round {
            round,
            source: Box::new(self),
        }
    }

    /// Attach the (1-based) trial index to an error.
    pub fn in_trial(self, trial: usize) -> Self {
        TrainingError::Trial {
            trial,
            source: Box::new(self),
        }
    }

    /// The innermost error, with round/trial wrappers stripped.
    pub fn root(&self) -> &TrainingError {
        match self {
            TrainingError::Round { source, .. } | TrainingError::Trial { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self.root() {
            TrainingError::InvalidSamplingConfiguration { stage, .. }
            | TrainingError::Model { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn round(&self) -> Option<usize> {
        match self {
            TrainingError::Round { round, .. } => Some(*round),
            TrainingError::Trial { source, .. } => source.round(),
            _ => None,
        }
    }

    pub fn trial(&self) -> Option<usize> {
        match self {
            TrainingError::Trial { trial, .. } => Some(*trial),
            TrainingError::Round { source, .. } => source.trial(),
            _ => None,
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrainingError::InvalidSamplingConfiguration { stage, reason } => {
                write!(f, "Invalid sampling configuration during {}: {}", stage, reason)
            }
            TrainingError::InsufficientTrials { available } => write!(
                f,
                "Paired comparison needs at least 2 trials, got {}",
                available
            ),
            TrainingError::DataShapeMismatch(reason) => write!(f, "Data shape mismatch: {}", reason),
            TrainingError::Model { stage, reason } => {
                write!(f, "Classifier failure during {}: {}", stage, reason)
            }
            TrainingError::Round { round, source } => write!(f, "round {}: {}", round, source),
            TrainingError::Trial { trial, source } => write!(f, "trial {}: {}", trial, source),
        }
    }
}

impl Error for TrainingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainingError::Round { source, .. } | TrainingError::Trial { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wrappers_keep_stage_and_indices() {
        let err = TrainingError::sampling(Stage::Clustering, "3 rows for 4 clusters")
            .in_round(2)
            .in_trial(5);

        assert_eq!(err.stage(), Some(Stage::Clustering));
        assert_eq!(err.round(), Some(2));
        assert_eq!(err.trial(), Some(5));
        assert!(matches!(
            err.root(),
            TrainingError::InvalidSamplingConfiguration { .. }
        ));

        let message = err.to_string();
        assert!(message.starts_with("trial 5: round 2:"));
        assert!(message.contains("clustering"));
    }
}
