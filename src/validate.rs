//! Field validation shared by the route handlers.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AppError;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static ACADEMIC_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{4}$").unwrap());

pub fn email(value: &str) -> Result<(), AppError> {
    if !EMAIL_RE.is_match(value) {
        return Err(AppError::validation_field("Email invalide.", "email"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.len() < 8 {
        return Err(AppError::validation_field(
            "Le mot de passe doit contenir au moins 8 caractères.",
            "password",
        ));
    }
    Ok(())
}

pub fn required(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation_field(format!("{} est requis.", field), field));
    }
    Ok(())
}

/// Absence records run from half an hour to a full teaching day.
pub fn absence_hours(value: f64) -> Result<(), AppError> {
    if !(0.5..=12.0).contains(&value) {
        return Err(AppError::validation_field("Heures invalides (0.5 - 12).", "hours"));
    }
    Ok(())
}

pub fn absence_date(value: NaiveDate) -> Result<(), AppError> {
    if value > Utc::now().date_naive() {
        return Err(AppError::validation_field(
            "La date ne peut pas être dans le futur.",
            "date",
        ));
    }
    Ok(())
}

pub fn academic_year(value: &str) -> Result<(), AppError> {
    if !ACADEMIC_YEAR_RE.is_match(value) {
        return Err(AppError::validation_field("Format attendu: YYYY-YYYY.", "academicYear"));
    }
    Ok(())
}

pub fn semester(value: i32) -> Result<(), AppError> {
    if !(1..=12).contains(&value) {
        return Err(AppError::validation_field("Semestre invalide.", "semester"));
    }
    Ok(())
}

pub fn module_hours(total_hours: f64) -> Result<(), AppError> {
    if total_hours < 1.0 {
        return Err(AppError::validation_field(
            "Les heures doivent être supérieures à 0.",
            "totalHours",
        ));
    }
    Ok(())
}

pub fn threshold_minutes(minutes: i32) -> Result<(), AppError> {
    if !(0..=59).contains(&minutes) {
        return Err(AppError::validation_field(
            "Les minutes doivent être entre 0 et 59.",
            "absenceThresholdMinutes",
        ));
    }
    Ok(())
}

pub fn credits(value: i32) -> Result<(), AppError> {
    if !(1..=10).contains(&value) {
        return Err(AppError::validation_field("Crédits invalides.", "credits"));
    }
    Ok(())
}

pub fn max_students(value: i32) -> Result<(), AppError> {
    if value < 1 {
        return Err(AppError::validation_field(
            "La capacité doit être supérieure à 0.",
            "maxStudents",
        ));
    }
    Ok(())
}

pub fn warning_percentage(value: f64) -> Result<(), AppError> {
    if !(10.0..=100.0).contains(&value) {
        return Err(AppError::validation_field(
            "Pourcentage invalide (10-100).",
            "warningPercentage",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(email("etudiant@gestionscol.tn").is_ok());
        assert!(email("pas-un-email").is_err());
        assert!(email("a@b").is_err());
    }

    #[test]
    fn hours_range() {
        assert!(absence_hours(0.5).is_ok());
        assert!(absence_hours(12.0).is_ok());
        assert!(absence_hours(0.0).is_err());
        assert!(absence_hours(12.5).is_err());
    }

    #[test]
    fn academic_year_format() {
        assert!(academic_year("2025-2026").is_ok());
        assert!(academic_year("2025/2026").is_err());
        assert!(academic_year("25-26").is_err());
    }

    #[test]
    fn future_dates_rejected() {
        let today = Utc::now().date_naive();
        assert!(absence_date(today).is_ok());
        assert!(absence_date(today + chrono::Duration::days(1)).is_err());
    }
}
