use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult};

/// Fixed manufacturing steps, in production order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageName {
    RawMaterialPrep,
    Assembly,
    QualityCheck,
    Packaging,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::RawMaterialPrep,
        StageName::Assembly,
        StageName::QualityCheck,
        StageName::Packaging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::RawMaterialPrep => "RAW_MATERIAL_PREP",
            StageName::Assembly => "ASSEMBLY",
            StageName::QualityCheck => "QUALITY_CHECK",
            StageName::Packaging => "PACKAGING",
        }
    }
}

impl core::fmt::Display for StageName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown manufacturing stage: {wanted}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "PENDING",
            StageStatus::InProgress => "IN_PROGRESS",
            StageStatus::Completed => "COMPLETED",
        }
    }

    /// The only status a stage may move to next.
    pub fn next(&self) -> Option<StageStatus> {
        match self {
            StageStatus::Pending => Some(StageStatus::InProgress),
            StageStatus::InProgress => Some(StageStatus::Completed),
            StageStatus::Completed => None,
        }
    }
}

impl core::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(StageStatus::Pending),
            "IN_PROGRESS" => Ok(StageStatus::InProgress),
            "COMPLETED" => Ok(StageStatus::Completed),
            other => Err(DomainError::invalid_status(format!("unknown stage status: {other}"))),
        }
    }
}

/// Progress of one manufacturing step of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturingStage {
    pub stage: StageName,
    pub status: StageStatus,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ManufacturingStage {
    pub fn pending(stage: StageName, at: DateTime<Utc>) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            note: None,
            updated_at: at,
        }
    }

    /// Validate a move to `target`: forward, one step at a time.
    pub fn check_advance(&self, target: StageStatus) -> DomainResult<()> {
        if self.status.next() != Some(target) {
            return Err(DomainError::invalid_status(format!(
                "stage {} cannot move from {} to {}",
                self.stage, self.status, target
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_move_one_step_forward() {
        let stage = ManufacturingStage::pending(StageName::Assembly, Utc::now());
        assert!(stage.check_advance(StageStatus::InProgress).is_ok());
        assert!(stage.check_advance(StageStatus::Completed).is_err());
        assert!(stage.check_advance(StageStatus::Pending).is_err());
    }

    #[test]
    fn names_parse_from_wire_form() {
        assert_eq!("quality_check".parse::<StageName>().unwrap(), StageName::QualityCheck);
        assert_eq!("IN_PROGRESS".parse::<StageStatus>().unwrap(), StageStatus::InProgress);
    }
}
