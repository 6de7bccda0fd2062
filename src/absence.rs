//! Absence accounting: hour aggregation, threshold classification and the
//! transition detection behind the alert emails.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
              QueryFilter, Set, Statement, Value};
use serde::Serialize;

use crate::entity::{professor_absence, student_absence};
use crate::error::AppError;

/// One professor absence day counts as 8 hours.
pub const HOURS_PER_DAY: f64 = 8.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdStatus {
    Ok,
    Warning,
    Exceeded,
}

/// Classifies accumulated hours against a threshold. A threshold of zero (or
/// less) can never be reached, so the status stays `ok`.
pub fn classify(hours: f64, threshold: f64, warning_percentage: f64) -> ThresholdStatus {
    if threshold <= 0.0 {
        return ThresholdStatus::Ok;
    }
    if hours >= threshold {
        return ThresholdStatus::Exceeded;
    }
    if hours >= threshold * warning_percentage / 100.0 {
        return ThresholdStatus::Warning;
    }
    ThresholdStatus::Ok
}

/// Percentage of the threshold consumed; 0 when the threshold is unset.
pub fn absence_rate(hours: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    hours / threshold * 100.0
}

pub fn hours_to_days(hours: f64) -> f64 {
    hours / HOURS_PER_DAY
}

/// Sum of absence hours for a student, optionally narrowed to one module.
/// Justified absences are excluded unless `count_justified` is set.
pub async fn student_absence_hours(
    db: &DatabaseConnection,
    student_id: i32,
    module_id: Option<i32>,
    count_justified: bool,
) -> Result<f64, AppError> {
    let mut sql =
        String::from("SELECT COALESCE(SUM(hours), 0.0) as total FROM t_student_absence WHERE student_id = ?");
    let mut values = vec![Value::Int(Some(student_id))];
    if let Some(module_id) = module_id {
        sql.push_str(" AND module_id = ?");
        values.push(Value::Int(Some(module_id)));
    }
    if !count_justified {
        sql.push_str(" AND is_justified = ?");
        values.push(Value::Bool(Some(false)));
    }
    sum_by_sql(db, &sql, values).await
}

/// Sum of absence hours for a professor (no module dimension).
pub async fn professor_absence_hours(
    db: &DatabaseConnection,
    professor_id: i32,
    count_justified: bool,
) -> Result<f64, AppError> {
    let mut sql =
        String::from("SELECT COALESCE(SUM(hours), 0.0) as total FROM t_professor_absence WHERE professor_id = ?");
    let mut values = vec![Value::Int(Some(professor_id))];
    if !count_justified {
        sql.push_str(" AND is_justified = ?");
        values.push(Value::Bool(Some(false)));
    }
    sum_by_sql(db, &sql, values).await
}

async fn sum_by_sql(
    db: &DatabaseConnection,
    sql: &str,
    values: Vec<Value>,
) -> Result<f64, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    let row = db.query_one(stmt).await?;
    let total = row
        .and_then(|r| r.try_get::<f64>("", "total").ok())
        .unwrap_or(0.0);
    Ok(total)
}

pub struct NewStudentAbsence {
    pub student_id: i32,
    pub module_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub reason: Option<String>,
    pub is_justified: bool,
    pub recorded_by_id: Option<i32>,
}

/// Inserts a student absence after enforcing the one-record-per
/// (student, module, date) invariant.
pub async fn record_student_absence(
    db: &DatabaseConnection,
    new: NewStudentAbsence,
) -> Result<student_absence::Model, AppError> {
    let existing = student_absence::Entity::find()
        .filter(student_absence::Column::StudentId.eq(new.student_id))
        .filter(student_absence::Column::ModuleId.eq(new.module_id))
        .filter(student_absence::Column::Date.eq(new.date))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate("Cette absence a déjà été enregistrée."));
    }

    let model = student_absence::ActiveModel {
        student_id: Set(new.student_id),
        module_id: Set(new.module_id),
        date: Set(new.date),
        hours: Set(new.hours),
        reason: Set(new.reason),
        is_justified: Set(new.is_justified),
        recorded_by_id: Set(new.recorded_by_id),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    let inserted = model.insert(db).await?;
    Ok(inserted)
}

pub struct NewProfessorAbsence {
    pub professor_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub reason: Option<String>,
    pub is_justified: bool,
    pub recorded_by_id: Option<i32>,
}

/// Inserts a professor absence after enforcing the one-record-per
/// (professor, date) invariant.
pub async fn record_professor_absence(
    db: &DatabaseConnection,
    new: NewProfessorAbsence,
) -> Result<professor_absence::Model, AppError> {
    let existing = professor_absence::Entity::find()
        .filter(professor_absence::Column::ProfessorId.eq(new.professor_id))
        .filter(professor_absence::Column::Date.eq(new.date))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate("Cette absence a déjà été enregistrée."));
    }

    let model = professor_absence::ActiveModel {
        professor_id: Set(new.professor_id),
        date: Set(new.date),
        hours: Set(new.hours),
        reason: Set(new.reason),
        is_justified: Set(new.is_justified),
        recorded_by_id: Set(new.recorded_by_id),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    let inserted = model.insert(db).await?;
    Ok(inserted)
}

pub struct AbsenceEvaluation {
    pub total_hours: f64,
    pub status: ThresholdStatus,
    pub previous_status: ThresholdStatus,
}

impl AbsenceEvaluation {
    /// The status to notify about, if this insert crossed a boundary.
    /// Re-entering the same band never re-notifies.
    pub fn triggered(&self) -> Option<ThresholdStatus> {
        if self.status == self.previous_status {
            return None;
        }
        match self.status {
            ThresholdStatus::Warning | ThresholdStatus::Exceeded => Some(self.status),
            ThresholdStatus::Ok => None,
        }
    }
}

/// Recomputes a student's unjustified total for a module and classifies it
/// next to the pre-insert status. `added_hours` is what the just-persisted
/// record contributed to the unjustified total (zero for a justified one).
pub async fn evaluate_student_absence(
    db: &DatabaseConnection,
    student_id: i32,
    module_id: i32,
    threshold: f64,
    added_hours: f64,
    warning_percentage: f64,
) -> Result<AbsenceEvaluation, AppError> {
    let total_hours = student_absence_hours(db, student_id, Some(module_id), false).await?;
    let previous_status = classify(total_hours - added_hours, threshold, warning_percentage);
    let status = classify(total_hours, threshold, warning_percentage);
    Ok(AbsenceEvaluation { total_hours, status, previous_status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        // threshold 10h, warning at 50%
        assert_eq!(classify(0.0, 10.0, 50.0), ThresholdStatus::Ok);
        assert_eq!(classify(4.5, 10.0, 50.0), ThresholdStatus::Ok);
        assert_eq!(classify(5.0, 10.0, 50.0), ThresholdStatus::Warning);
        assert_eq!(classify(9.5, 10.0, 50.0), ThresholdStatus::Warning);
        assert_eq!(classify(10.0, 10.0, 50.0), ThresholdStatus::Exceeded);
        assert_eq!(classify(14.0, 10.0, 50.0), ThresholdStatus::Exceeded);
    }

    #[test]
    fn zero_threshold_is_always_ok() {
        assert_eq!(classify(0.0, 0.0, 50.0), ThresholdStatus::Ok);
        assert_eq!(classify(100.0, 0.0, 50.0), ThresholdStatus::Ok);
        assert_eq!(classify(1.0, -4.0, 50.0), ThresholdStatus::Ok);
    }

    #[test]
    fn custom_warning_percentage() {
        assert_eq!(classify(5.0, 10.0, 75.0), ThresholdStatus::Ok);
        assert_eq!(classify(7.5, 10.0, 75.0), ThresholdStatus::Warning);
    }

    #[test]
    fn rate_is_percentage_of_threshold() {
        assert_eq!(absence_rate(5.0, 10.0), 50.0);
        assert_eq!(absence_rate(12.0, 10.0), 120.0);
        assert_eq!(absence_rate(3.0, 0.0), 0.0);
    }

    #[test]
    fn day_conversion() {
        assert_eq!(hours_to_days(8.0), 1.0);
        assert_eq!(hours_to_days(20.0), 2.5);
    }

    #[test]
    fn notification_fires_on_transitions_only() {
        let eval = |prev: f64, total: f64| AbsenceEvaluation {
            total_hours: total,
            status: classify(total, 10.0, 50.0),
            previous_status: classify(prev, 10.0, 50.0),
        };

        // ok -> warning
        assert_eq!(eval(4.0, 6.0).triggered(), Some(ThresholdStatus::Warning));
        // stays inside the warning band: no second mail
        assert_eq!(eval(6.0, 8.0).triggered(), None);
        // warning -> exceeded
        assert_eq!(eval(8.0, 11.0).triggered(), Some(ThresholdStatus::Exceeded));
        // ok -> exceeded in one jump still mails exceeded
        assert_eq!(eval(2.0, 12.0).triggered(), Some(ThresholdStatus::Exceeded));
        // justified record adds nothing and never notifies
        assert_eq!(eval(6.0, 6.0).triggered(), None);
    }
}
