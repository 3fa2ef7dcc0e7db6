//! Field derivation rules for SM tickets.
//!
//! Everything here is a pure function over caller-supplied records. Bad input
//! never fails a submission: an unparseable receipt date or a non-numeric
//! elapsed time leaves the dependent fields at their last known value.
//! Only missing required fields block a write.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::{Category, Record, RecordField, RecordInput, RecordSubmission};
use crate::error::AppError;
use crate::types::FieldError;

/// Working days in one man-month.
const DAYS_PER_MM: f64 = 21.0;
/// Working hours in one day.
const HOURS_PER_DAY: f64 = 8.0;
const MINUTES_PER_HOUR: f64 = 60.0;

/// Fields that must be non-blank before a record reaches the backend.
pub const REQUIRED_FIELDS: [RecordField; 6] = [
    RecordField::Category,
    RecordField::ReceiptDate,
    RecordField::Requester,
    RecordField::RequestContent,
    RecordField::SmManager,
    RecordField::RequestTeam,
];

/// Fields cascaded from the receipt date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedDates {
    pub year: String,
    pub target_month: String,
    pub start_date: String,
    pub expected_deploy_date: String,
    pub actual_deploy_date: String,
}

/// Parse the date formats the form and older rows have used.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Derive year, target month and the three schedule dates from a receipt date.
///
/// Returns `None` for an unparseable date; callers keep their current values.
pub fn derive_dates_from_receipt(receipt_date: &str) -> Option<DerivedDates> {
    let Some(date) = parse_calendar_date(receipt_date) else {
        if !receipt_date.trim().is_empty() {
            log::warn!(
                "Unparseable receipt date '{}', keeping existing derived fields",
                receipt_date
            );
        }
        return None;
    };

    let receipt = receipt_date.trim().to_string();
    Some(DerivedDates {
        year: format!("{:04}", date.year()),
        target_month: format!("{:04}-{:02}", date.year(), date.month()),
        start_date: receipt.clone(),
        expected_deploy_date: receipt.clone(),
        actual_deploy_date: receipt,
    })
}

/// Form binding for a changed receipt date: overwrite all five dependent fields.
pub fn apply_receipt_date(input: &mut RecordInput) {
    if let Some(derived) = derive_dates_from_receipt(&input.receipt_date) {
        input.year = derived.year;
        input.target_month = derived.target_month;
        input.start_date = derived.start_date;
        input.expected_deploy_date = derived.expected_deploy_date;
        input.actual_deploy_date = derived.actual_deploy_date;
    }
}

fn elapsed_component(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        Ok(_) => 0.0,
        Err(_) => {
            if !raw.trim().is_empty() {
                log::debug!("Non-numeric elapsed time '{}' treated as 0", raw);
            }
            0.0
        }
    }
}

/// Convert elapsed days/hours/minutes to man-months, rounded to 3 decimals.
///
/// One man-month is 21 working days of 8 hours.
pub fn compute_total_man_months(days: &str, hours: &str, minutes: &str) -> f64 {
    let total = elapsed_component(days) / DAYS_PER_MM
        + elapsed_component(hours) / (DAYS_PER_MM * HOURS_PER_DAY)
        + elapsed_component(minutes) / (DAYS_PER_MM * HOURS_PER_DAY * MINUTES_PER_HOUR);
    (total * 1000.0).round() / 1000.0
}

/// Recompute `totalMM` from the elapsed-time fields.
pub fn refresh_total_man_months(input: &mut RecordInput) {
    let mm = compute_total_man_months(
        &input.work_time_days,
        &input.work_time_hours,
        &input.work_time_minutes,
    );
    input.total_mm = mm.to_string();
}

/// Next task number for a category: one past the largest numeric task number.
///
/// Recomputed from the collection every time; non-numeric task numbers are
/// ignored.
pub fn next_task_number(records: &[Record], category: &str) -> u32 {
    records
        .iter()
        .filter(|r| r.input.category == category)
        .filter_map(|r| r.input.task_no.trim().parse::<u32>().ok())
        .max()
        .map(|max| max.saturating_add(1))
        .unwrap_or(1)
}

/// Report every blank required field. Does not stop at the first one.
pub fn validate_required(input: &RecordInput) -> Vec<FieldError> {
    REQUIRED_FIELDS
        .iter()
        .filter(|field| field.value(input).trim().is_empty())
        .map(|field| FieldError::required(*field))
        .collect()
}

/// Fill the derived fields of a validated input.
///
/// Year and target month always follow the receipt date. Schedule dates only
/// default to it when left blank, so a later edit to them survives.
fn fill_derived(input: &mut RecordInput) {
    if let Some(derived) = derive_dates_from_receipt(&input.receipt_date) {
        input.year = derived.year;
        input.target_month = derived.target_month;
        for (field, value) in [
            (RecordField::StartDate, derived.start_date),
            (RecordField::ExpectedDeployDate, derived.expected_deploy_date),
            (RecordField::ActualDeployDate, derived.actual_deploy_date),
        ] {
            let slot = field.slot(input);
            if slot.trim().is_empty() {
                *slot = value;
            }
        }
    }
    refresh_total_man_months(input);
}

fn resolve_and_validate(submission: RecordSubmission) -> Result<RecordInput, AppError> {
    let RecordSubmission {
        mut input,
        custom_category,
    } = submission;
    input.category = Category::resolve(&input.category, custom_category.as_deref());

    let errors = validate_required(&input);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    fill_derived(&mut input);
    Ok(input)
}

/// Timestamp format for `createdAt`.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Turn a form submission into a new record ready for the backend.
pub fn prepare_new_record(
    submission: RecordSubmission,
    existing: &[Record],
    now: DateTime<Utc>,
) -> Result<Record, AppError> {
    let mut input = resolve_and_validate(submission)?;
    input.task_no = next_task_number(existing, &input.category).to_string();

    Ok(Record {
        id: uuid::Uuid::new_v4().to_string(),
        input,
        created_at: timestamp(now),
    })
}

/// Move schedule dates the client left untouched along with a changed
/// receipt date. A date that differs from the stored one was edited and stays.
fn follow_receipt_change(input: &mut RecordInput, current: &RecordInput) {
    if input.receipt_date.trim() == current.receipt_date.trim() {
        return;
    }
    let Some(derived) = derive_dates_from_receipt(&input.receipt_date) else {
        return;
    };
    for (field, value) in [
        (RecordField::StartDate, derived.start_date),
        (RecordField::ExpectedDeployDate, derived.expected_deploy_date),
        (RecordField::ActualDeployDate, derived.actual_deploy_date),
    ] {
        let stored = field.value(current).trim().to_string();
        let slot = field.slot(input);
        if slot.trim() == stored {
            *slot = value;
        }
    }
}

/// Replace every mutable field of `current`, keeping `id` and `createdAt`.
///
/// A blank task number, or one carried over from a different category, is
/// reassigned from the target category. Schedule dates still equal to the
/// stored ones follow a changed receipt date.
pub fn prepare_update(
    current: &Record,
    submission: RecordSubmission,
    existing: &[Record],
) -> Result<Record, AppError> {
    let mut input = resolve_and_validate(submission)?;
    follow_receipt_change(&mut input, &current.input);

    let moved = input.category != current.input.category
        && input.task_no.trim() == current.input.task_no.trim();
    if input.task_no.trim().is_empty() || moved {
        let others: Vec<Record> = existing
            .iter()
            .filter(|r| r.id != current.id)
            .cloned()
            .collect();
        input.task_no = next_task_number(&others, &input.category).to_string();
    }

    Ok(Record {
        id: current.id.clone(),
        input,
        created_at: current.created_at.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(category: &str, task_no: &str) -> Record {
        Record {
            id: format!("{}-{}", category, task_no),
            input: RecordInput {
                category: category.to_string(),
                task_no: task_no.to_string(),
                ..Default::default()
            },
            created_at: String::new(),
        }
    }

    fn complete_input() -> RecordInput {
        RecordInput {
            category: "Dashboard".into(),
            receipt_date: "2024-03-15".into(),
            requester: "Han".into(),
            request_content: "Morning dashboard check".into(),
            sm_manager: "Wi".into(),
            request_team: "Management Systems".into(),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn man_months_known_values() {
        assert_eq!(compute_total_man_months("1", "0", "0"), 0.048);
        assert_eq!(compute_total_man_months("0", "8", "0"), 0.048);
        assert_eq!(compute_total_man_months("0", "0", "30"), 0.003);
        assert_eq!(compute_total_man_months("21", "0", "0"), 1.0);
        assert_eq!(compute_total_man_months("0", "1", "0"), 0.006);
    }

    #[test]
    fn man_months_matches_formula() {
        for d in 0..5 {
            for h in 0..24 {
                for m in (0..60).step_by(7) {
                    let expected =
                        ((d as f64 / 21.0 + h as f64 / 168.0 + m as f64 / 10080.0) * 1000.0)
                            .round()
                            / 1000.0;
                    let got = compute_total_man_months(
                        &d.to_string(),
                        &h.to_string(),
                        &m.to_string(),
                    );
                    assert_eq!(got, expected, "d={} h={} m={}", d, h, m);
                }
            }
        }
    }

    #[test]
    fn man_months_defaults_bad_input_to_zero() {
        assert_eq!(compute_total_man_months("", "", ""), 0.0);
        assert_eq!(compute_total_man_months("abc", "8", "-5"), 0.048);
        assert_eq!(compute_total_man_months(" 1 ", "NaN", "inf"), 0.048);
    }

    #[test]
    fn total_mm_renders_without_trailing_zeros() {
        let mut input = RecordInput {
            work_time_hours: "1".into(),
            ..Default::default()
        };
        refresh_total_man_months(&mut input);
        assert_eq!(input.total_mm, "0.006");

        input.work_time_hours.clear();
        refresh_total_man_months(&mut input);
        assert_eq!(input.total_mm, "0");
    }

    #[test]
    fn next_task_number_empty_is_one() {
        assert_eq!(next_task_number(&[], "Dashboard"), 1);
    }

    #[test]
    fn next_task_number_scans_only_the_category() {
        let records = vec![
            record("Dashboard", "3"),
            record("Dashboard", "7"),
            record("Plan", "99"),
        ];
        assert_eq!(next_task_number(&records, "Dashboard"), 8);
        assert_eq!(next_task_number(&records, "Plan"), 100);
        assert_eq!(next_task_number(&records, "Other"), 1);
    }

    #[test]
    fn next_task_number_skips_non_numeric() {
        let records = vec![
            record("Other", "DAILY-20240315-AB12"),
            record("Other", "2"),
            record("Other", ""),
        ];
        assert_eq!(next_task_number(&records, "Other"), 3);

        let only_text = vec![record("Other", "AUTO-1")];
        assert_eq!(next_task_number(&only_text, "Other"), 1);
    }

    #[test]
    fn receipt_date_derives_all_dates() {
        let d = derive_dates_from_receipt("2024-03-15").unwrap();
        assert_eq!(d.year, "2024");
        assert_eq!(d.target_month, "2024-03");
        assert_eq!(d.start_date, "2024-03-15");
        assert_eq!(d.expected_deploy_date, "2024-03-15");
        assert_eq!(d.actual_deploy_date, "2024-03-15");
    }

    #[test]
    fn unparseable_receipt_date_keeps_previous_values() {
        assert!(derive_dates_from_receipt("15th of March").is_none());

        let mut input = RecordInput {
            receipt_date: "not a date".into(),
            year: "2023".into(),
            start_date: "2023-12-01".into(),
            ..Default::default()
        };
        apply_receipt_date(&mut input);
        assert_eq!(input.year, "2023");
        assert_eq!(input.start_date, "2023-12-01");
    }

    #[test]
    fn apply_receipt_date_overwrites_dependents() {
        let mut input = RecordInput {
            receipt_date: "2024-01-31".into(),
            start_date: "2023-12-01".into(),
            actual_deploy_date: "2023-12-05".into(),
            ..Default::default()
        };
        apply_receipt_date(&mut input);
        assert_eq!(input.target_month, "2024-01");
        assert_eq!(input.start_date, "2024-01-31");
        assert_eq!(input.actual_deploy_date, "2024-01-31");
    }

    #[test]
    fn accepts_timestamp_receipt_dates() {
        assert_eq!(
            parse_calendar_date("2024-03-15T10:00:00+09:00"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(
            parse_calendar_date("2024/03/15"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn validate_complete_input_has_no_errors() {
        assert!(validate_required(&complete_input()).is_empty());
    }

    #[test]
    fn validate_reports_every_missing_field() {
        let errors = validate_required(&RecordInput::default());
        assert_eq!(errors.len(), REQUIRED_FIELDS.len());

        let mut input = complete_input();
        input.requester = "   ".into();
        input.request_team.clear();
        let errors = validate_required(&input);
        let fields: Vec<RecordField> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![RecordField::Requester, RecordField::RequestTeam]);
    }

    #[test]
    fn new_record_gets_derived_fields_and_next_number() {
        let mut input = complete_input();
        input.work_time_minutes = "30".into();
        input.total_mm = "999".into();
        input.expected_deploy_date = "2024-03-20".into();

        let existing = vec![record("Dashboard", "4")];
        let rec = prepare_new_record(input.into(), &existing, now()).unwrap();

        assert_eq!(rec.input.task_no, "5");
        assert_eq!(rec.input.year, "2024");
        assert_eq!(rec.input.target_month, "2024-03");
        assert_eq!(rec.input.start_date, "2024-03-15");
        assert_eq!(rec.input.expected_deploy_date, "2024-03-20");
        assert_eq!(rec.input.total_mm, "0.003");
        assert_eq!(rec.created_at, "2024-03-15T09:30:00Z");
        assert!(uuid::Uuid::parse_str(&rec.id).is_ok());
    }

    #[test]
    fn new_record_with_missing_fields_is_rejected() {
        let mut input = complete_input();
        input.category.clear();
        input.sm_manager.clear();
        match prepare_new_record(input.into(), &[], now()) {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn custom_category_numbers_independently() {
        let mut input = complete_input();
        input.category = "Other".into();
        let submission = RecordSubmission {
            input,
            custom_category: Some("Batch".into()),
        };
        let existing = vec![record("Other", "9"), record("Batch", "2")];
        let rec = prepare_new_record(submission, &existing, now()).unwrap();
        assert_eq!(rec.input.category, "Batch");
        assert_eq!(rec.input.task_no, "3");
    }

    #[test]
    fn update_preserves_identity() {
        let current = prepare_new_record(complete_input().into(), &[], now()).unwrap();
        let mut edited = current.input.clone();
        edited.note = "rolled back".into();
        edited.work_time_days = "1".into();

        let updated = prepare_update(&current, edited.into(), &[current.clone()]).unwrap();
        assert_eq!(updated.id, current.id);
        assert_eq!(updated.created_at, current.created_at);
        assert_eq!(updated.input.note, "rolled back");
        assert_eq!(updated.input.total_mm, "0.048");
        assert_eq!(updated.input.task_no, "1");
    }

    #[test]
    fn update_moving_category_renumbers() {
        let current = prepare_new_record(complete_input().into(), &[], now()).unwrap();
        let existing = vec![current.clone(), record("Plan", "6")];
        let mut edited = current.input.clone();
        edited.category = "Plan".into();

        let updated = prepare_update(&current, edited.into(), &existing).unwrap();
        assert_eq!(updated.input.task_no, "7");
    }

    #[test]
    fn update_receipt_date_moves_untouched_dates() {
        let current = prepare_new_record(complete_input().into(), &[], now()).unwrap();
        let mut edited = current.input.clone();
        edited.receipt_date = "2024-04-01".into();

        let updated = prepare_update(&current, edited.into(), &[current.clone()]).unwrap();
        assert_eq!(updated.input.year, "2024");
        assert_eq!(updated.input.target_month, "2024-04");
        assert_eq!(updated.input.start_date, "2024-04-01");
        assert_eq!(updated.input.expected_deploy_date, "2024-04-01");
        assert_eq!(updated.input.actual_deploy_date, "2024-04-01");
    }

    #[test]
    fn update_receipt_date_keeps_edited_dates() {
        let current = prepare_new_record(complete_input().into(), &[], now()).unwrap();
        let mut edited = current.input.clone();
        edited.receipt_date = "2024-04-01".into();
        edited.expected_deploy_date = "2024-04-20".into();

        let updated = prepare_update(&current, edited.into(), &[current.clone()]).unwrap();
        assert_eq!(updated.input.start_date, "2024-04-01");
        assert_eq!(updated.input.expected_deploy_date, "2024-04-20");
        assert_eq!(updated.input.actual_deploy_date, "2024-04-01");
    }

    #[test]
    fn update_without_receipt_change_keeps_dates() {
        let current = prepare_new_record(complete_input().into(), &[], now()).unwrap();
        let mut edited = current.input.clone();
        edited.start_date = "2024-03-18".into();

        let updated = prepare_update(&current, edited.into(), &[current.clone()]).unwrap();
        assert_eq!(updated.input.start_date, "2024-03-18");
        assert_eq!(updated.input.actual_deploy_date, "2024-03-15");
    }
}
