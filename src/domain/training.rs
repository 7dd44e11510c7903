//! Training module and progress domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::percentage;

/// A training course employees complete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingModule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Markdown course content.
    pub content: String,
    pub duration_minutes: i64,
    /// Required modules count toward the required completion rate.
    pub required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingModule {
    pub fn new(
        organization_id: Uuid,
        title: String,
        description: Option<String>,
        content: String,
        duration_minutes: i64,
        required: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            title,
            description,
            content,
            duration_minutes,
            required,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Completion state of one employee on one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TrainingStatus {
    /// Status implied by a progress percentage.
    pub fn from_percent(percent: i64) -> Self {
        match percent {
            p if p >= 100 => TrainingStatus::Completed,
            p if p > 0 => TrainingStatus::InProgress,
            _ => TrainingStatus::NotStarted,
        }
    }
}

impl std::fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingStatus::NotStarted => write!(f, "not_started"),
            TrainingStatus::InProgress => write!(f, "in_progress"),
            TrainingStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TrainingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(TrainingStatus::NotStarted),
            "in_progress" => Ok(TrainingStatus::InProgress),
            "completed" => Ok(TrainingStatus::Completed),
            _ => Err(format!("Unknown training status: {}", s)),
        }
    }
}

/// Progress record of one employee on one module.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingProgress {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub module_id: Uuid,
    pub status: TrainingStatus,
    /// 0..=100.
    pub progress_percent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingProgress {
    /// Fresh, not-started record.
    pub fn new(organization_id: Uuid, employee_id: Uuid, module_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            employee_id,
            module_id,
            status: TrainingStatus::NotStarted,
            progress_percent: 0,
            started_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply a reported percentage.
    ///
    /// Completed records stay completed; `started_at` and `completed_at` are
    /// set the first time their state is reached.
    pub fn apply_progress(&mut self, percent: i64, now: DateTime<Utc>) {
        if self.status == TrainingStatus::Completed {
            return;
        }

        let percent = percent.clamp(0, 100);
        self.progress_percent = percent;
        self.status = TrainingStatus::from_percent(percent);
        self.updated_at = now;

        if percent > 0 && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if self.status == TrainingStatus::Completed {
            self.completed_at = Some(now);
        }
    }
}

/// Progress row joined with the module title.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleProgress {
    pub module_id: Uuid,
    pub title: String,
    pub required: bool,
    pub duration_minutes: i64,
    pub status: TrainingStatus,
    pub progress_percent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Training completion for one employee.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TrainingSummary {
    pub total_modules: i64,
    pub required_modules: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub not_started: i64,
    /// Completed modules over all modules, 0..=100.
    pub completion_percentage: i64,
    /// Completed required modules over required modules, 0..=100.
    pub required_completion_percentage: i64,
}

impl TrainingSummary {
    /// Summarize per-module progress. Modules with no record count as not started.
    pub fn from_modules(modules: &[ModuleProgress]) -> Self {
        let total_modules = modules.len() as i64;
        let required_modules = modules.iter().filter(|m| m.required).count() as i64;
        let count = |status: TrainingStatus| {
            modules.iter().filter(|m| m.status == status).count() as i64
        };
        let completed = count(TrainingStatus::Completed);
        let required_completed = modules
            .iter()
            .filter(|m| m.required && m.status == TrainingStatus::Completed)
            .count() as i64;

        Self {
            total_modules,
            required_modules,
            completed,
            in_progress: count(TrainingStatus::InProgress),
            not_started: count(TrainingStatus::NotStarted),
            completion_percentage: percentage(completed, total_modules),
            required_completion_percentage: percentage(required_completed, required_modules),
        }
    }
}

/// One row of the organization training report.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeTrainingRow {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub email: String,
    #[serde(flatten)]
    pub summary: TrainingSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(required: bool, status: TrainingStatus) -> ModuleProgress {
        ModuleProgress {
            module_id: Uuid::new_v4(),
            title: "HIPAA Basics".to_string(),
            required,
            duration_minutes: 30,
            status,
            progress_percent: 0,
            completed_at: None,
        }
    }

    #[test]
    fn test_status_from_percent() {
        assert_eq!(TrainingStatus::from_percent(0), TrainingStatus::NotStarted);
        assert_eq!(TrainingStatus::from_percent(1), TrainingStatus::InProgress);
        assert_eq!(TrainingStatus::from_percent(99), TrainingStatus::InProgress);
        assert_eq!(TrainingStatus::from_percent(100), TrainingStatus::Completed);
    }

    #[test]
    fn test_apply_progress_sets_timestamps_once() {
        let mut p = TrainingProgress::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let t1 = Utc::now();
        p.apply_progress(40, t1);
        assert_eq!(p.status, TrainingStatus::InProgress);
        assert_eq!(p.started_at, Some(t1));

        let t2 = t1 + chrono::Duration::minutes(5);
        p.apply_progress(100, t2);
        assert_eq!(p.started_at, Some(t1));
        assert_eq!(p.completed_at, Some(t2));

        // Completed is sticky.
        p.apply_progress(10, t2 + chrono::Duration::minutes(1));
        assert_eq!(p.status, TrainingStatus::Completed);
        assert_eq!(p.progress_percent, 100);
    }

    #[test]
    fn test_summary_percentages() {
        let modules = vec![
            module(true, TrainingStatus::Completed),
            module(true, TrainingStatus::InProgress),
            module(false, TrainingStatus::Completed),
        ];
        let summary = TrainingSummary::from_modules(&modules);
        assert_eq!(summary.total_modules, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.completion_percentage, 67);
        assert_eq!(summary.required_completion_percentage, 50);
    }

    #[test]
    fn test_summary_with_no_modules() {
        let summary = TrainingSummary::from_modules(&[]);
        assert_eq!(summary.completion_percentage, 0);
        assert_eq!(summary.required_completion_percentage, 0);
    }
}
