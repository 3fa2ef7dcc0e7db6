//! Reminders: cron-labelled ticket templates
//!
//! Manages reminder definitions with support for:
//! - Cron expression parsing (standard 5-field syntax)
//! - Timezone-aware next-run labels
//! - Built-in presets and template defaults
//! - Manual runs that file a ticket through the record service
//!
//! Nothing in-process fires reminders on their own; an external trigger
//! (a cron job hitting the HTTP endpoints) or a manual run does.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::AppError;
use crate::records::{prepare_new_record, Record, RecordInput, RecordSubmission};
use crate::services::RecordService;
use crate::types::{NewReminder, Reminder};

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

// ---------------------------------------------------------------------------
// Cron helpers
// ---------------------------------------------------------------------------

/// Rewrite numeric weekdays (0 or 7 = Sunday) as names, which the cron crate
/// reads unambiguously.
fn weekday_names(field: &str) -> String {
    field
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };
            let range = range
                .split('-')
                .map(|part| match part.parse::<usize>() {
                    Ok(n) if n < WEEKDAY_NAMES.len() => WEEKDAY_NAMES[n].to_string(),
                    _ => part.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a cron expression
pub fn parse_cron(expr: &str) -> Result<Schedule, AppError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(AppError::InvalidCron {
            expr: expr.to_string(),
            reason: format!("expected 5 fields, found {}", fields.len()),
        });
    }

    // The cron crate expects 6 fields (with seconds), but we use 5-field format
    // Add "0" for seconds at the start
    let full_expr = format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        weekday_names(fields[4])
    );

    full_expr.parse::<Schedule>().map_err(|e| AppError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    name.parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid timezone: {}", name)))
}

/// Next fire time strictly after `now`, evaluated in `timezone`.
pub fn next_run_time(
    cron_expression: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AppError> {
    let schedule = parse_cron(cron_expression)?;
    let tz = parse_timezone(timezone)?;
    let next = schedule
        .after(&now.with_timezone(&tz))
        .next()
        .ok_or_else(|| AppError::InvalidCron {
            expr: cron_expression.to_string(),
            reason: "no upcoming scheduled time".to_string(),
        })?;
    Ok(next.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A built-in reminder users can register in one click.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub key: &'static str,
    pub name: &'static str,
    pub cron_expression: &'static str,
    pub description: &'static str,
    pub template: RecordInput,
}

fn maintenance_template() -> RecordInput {
    RecordInput {
        category: "Other".into(),
        process_type: "SM Operation".into(),
        sla_sm_activity: "Routine Check".into(),
        sla_sm_activity_detail: "Weekly system check".into(),
        request_team: "System Operations".into(),
        request_org_type: "Internal".into(),
        system_part: "All Systems".into(),
        work_review_target: "Y".into(),
        ..Default::default()
    }
}

fn monthly_report_template() -> RecordInput {
    RecordInput {
        category: "Plan".into(),
        process_type: "SM Operation".into(),
        sla_sm_activity: "Reporting".into(),
        sla_sm_activity_detail: "Monthly operations report".into(),
        request_team: "Management".into(),
        request_org_type: "Internal".into(),
        system_part: "Management System".into(),
        work_review_target: "Y".into(),
        ..Default::default()
    }
}

/// Morning check of the dashboards, filed as a 30 minute Dashboard ticket.
pub fn dashboard_check_template() -> RecordInput {
    RecordInput {
        category: "Dashboard".into(),
        request_team: "Business Support Systems".into(),
        request_org_type: "SM Operations (vendor)".into(),
        requester: "Business Analysis".into(),
        lg_uplus_team_name: "Business Analysis".into(),
        system_part: "Management System".into(),
        target_system_name: "Management Reporting System".into(),
        process_type: "SM Operation".into(),
        request_content: "Dashboard, bundle and receivables morning check".into(),
        process_content: "Dashboard, bundle and receivables morning check".into(),
        deploy_completed: "Completed".into(),
        work_time_days: "0".into(),
        work_time_hours: "0".into(),
        work_time_minutes: "30".into(),
        ..Default::default()
    }
}

/// Daily monitoring pass, filed as a one hour Other ticket.
pub fn daily_monitoring_template() -> RecordInput {
    RecordInput {
        category: "Other".into(),
        request_team: "System Operations".into(),
        request_org_type: "SM Operations (vendor)".into(),
        requester: "Automation".into(),
        lg_uplus_team_name: "System Operations".into(),
        system_part: "All Systems".into(),
        target_system_name: "Integrated Management System".into(),
        process_type: "SM Operation".into(),
        request_content: "Daily system monitoring and status check".into(),
        process_content: "Confirmed normal operation and reviewed logs".into(),
        note: "Daily check created automatically".into(),
        deploy_completed: "Completed".into(),
        work_time_days: "0".into(),
        work_time_hours: "1".into(),
        work_time_minutes: "0".into(),
        ..Default::default()
    }
}

pub fn presets() -> Vec<Preset> {
    vec![
        Preset {
            key: "dashboard_morning_check",
            name: "Dashboard morning check",
            cron_expression: "0 9 * * *",
            description: "Files the dashboard morning check every day at 09:00.",
            template: dashboard_check_template(),
        },
        Preset {
            key: "weekly_maintenance",
            name: "Weekly system check",
            cron_expression: "0 9 * * 1",
            description: "Files a system check ticket every Monday at 09:00.",
            template: maintenance_template(),
        },
        Preset {
            key: "monthly_report",
            name: "Monthly report",
            cron_expression: "0 17 1 * *",
            description: "Files the monthly report ticket on the 1st at 17:00.",
            template: monthly_report_template(),
        },
        Preset {
            key: "daily_backup",
            name: "Daily backup check",
            cron_expression: "0 0 * * *",
            description: "Files a backup verification ticket every day at midnight.",
            template: RecordInput {
                sla_sm_activity: "Backup Check".into(),
                sla_sm_activity_detail: "Daily backup status check".into(),
                ..maintenance_template()
            },
        },
    ]
}

fn fill(slot: &mut String, default: impl Into<String>) {
    if slot.trim().is_empty() {
        *slot = default.into();
    }
}

/// Build a ticket from a template as of `now`.
///
/// Blank template fields get generic defaults; the receipt date is today and
/// the task number continues the category's sequence.
pub fn build_template_record(
    template: &RecordInput,
    name: &str,
    existing: &[Record],
    now: DateTime<Tz>,
) -> Result<Record, AppError> {
    let today = now.format("%Y-%m-%d").to_string();
    let mut input = template.clone();

    input.task_no.clear();
    input.receipt_date = today.clone();
    input.start_date = today.clone();
    fill(&mut input.category, "Other");
    fill(&mut input.request_path, "Scheduled");
    fill(&mut input.work_basis_number, format!("AUTO-{}", now.format("%Y")));
    fill(&mut input.request_team, "System Operations");
    fill(&mut input.request_org_type, "Internal");
    fill(&mut input.requester, "System");
    fill(&mut input.lg_uplus_team_name, "LG U+ Operations");
    fill(&mut input.system_part, "All Systems");
    fill(&mut input.target_system_name, "Integrated System");
    fill(&mut input.sla_sm_activity, "Scheduled Task");
    fill(&mut input.sla_sm_activity_detail, name);
    fill(&mut input.process_type, "SM Operation");
    fill(&mut input.request_content, format!("[Scheduled] {} - {}", name, today));
    fill(&mut input.process_content, "Created on schedule");
    fill(&mut input.note, format!("Created by reminder ({})", today));
    fill(&mut input.sm_manager, "System");
    fill(&mut input.expected_deploy_date, today.clone());
    fill(&mut input.deploy_completed, "N");
    fill(&mut input.work_time_days, "0");
    fill(&mut input.work_time_hours, "8");
    fill(&mut input.work_time_minutes, "0");
    fill(&mut input.error_fix_required, "N");
    fill(&mut input.work_review_target, "Y");
    fill(&mut input.work_review_week, now.format("%G-W%V").to_string());

    prepare_new_record(
        RecordSubmission::from(input),
        existing,
        now.with_timezone(&Utc),
    )
}

/// File a template ticket now through the record service.
pub async fn create_from_template(
    records: &RecordService,
    template: &RecordInput,
    name: &str,
    timezone: &str,
) -> Result<Record, AppError> {
    let tz = parse_timezone(timezone)?;
    let now = Utc::now().with_timezone(&tz);
    let record = records
        .insert_with(|existing| build_template_record(template, name, existing, now))
        .await?;
    log::info!("Template '{}' filed as {} #{}", name, record.input.category, record.input.task_no);
    Ok(record)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Reminder definitions persisted as JSON in the state directory.
pub struct ReminderRegistry {
    path: PathBuf,
    default_timezone: String,
    reminders: Mutex<Vec<Reminder>>,
}

impl ReminderRegistry {
    /// Load reminders from `path`; a missing file is an empty registry.
    pub fn load(path: PathBuf, default_timezone: &str) -> Result<Self, String> {
        let reminders = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read reminders: {}", e))?;
            serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse reminders: {}", e))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            default_timezone: default_timezone.to_string(),
            reminders: Mutex::new(reminders),
        })
    }

    fn save(&self, reminders: &[Reminder]) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(reminders)
            .map_err(|e| AppError::Io(format!("Serialize error: {}", e)))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// All reminders, with next-run labels refreshed for active ones.
    pub fn list(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.reminders
            .lock()
            .iter()
            .cloned()
            .map(|mut reminder| {
                reminder.next_run = label_next_run(&reminder, now);
                reminder
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Reminder, AppError> {
        self.reminders
            .lock()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("reminder {}", id)))
    }

    pub fn add(&self, new: NewReminder, now: DateTime<Utc>) -> Result<Reminder, AppError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("reminder name is required".to_string()));
        }
        let cron_expression = new.cron_expression.trim().to_string();
        parse_cron(&cron_expression)?;
        let timezone = new
            .timezone
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| self.default_timezone.clone());
        parse_timezone(&timezone)?;

        let mut reminder = Reminder {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            cron_expression,
            timezone,
            is_active: new.is_active,
            template: new.template,
            last_run: None,
            next_run: None,
        };
        reminder.next_run = label_next_run(&reminder, now);

        let mut reminders = self.reminders.lock();
        let mut next = reminders.clone();
        next.push(reminder.clone());
        self.save(&next)?;
        *reminders = next;
        log::info!("Registered reminder '{}' ({})", reminder.name, reminder.cron_expression);
        Ok(reminder)
    }

    pub fn set_active(
        &self,
        id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Reminder, AppError> {
        self.modify(id, |reminder| {
            reminder.is_active = active;
            reminder.next_run = label_next_run(reminder, now);
        })
    }

    /// Stamp a completed run.
    pub fn mark_run(&self, id: &str, at: DateTime<Utc>) -> Result<Reminder, AppError> {
        self.modify(id, |reminder| {
            reminder.last_run = Some(at);
            reminder.next_run = label_next_run(reminder, at);
        })
    }

    pub fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut reminders = self.reminders.lock();
        let next: Vec<Reminder> = reminders.iter().filter(|r| r.id != id).cloned().collect();
        if next.len() == reminders.len() {
            return Err(AppError::NotFound(format!("reminder {}", id)));
        }
        self.save(&next)?;
        *reminders = next;
        log::info!("Deleted reminder {}", id);
        Ok(())
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut Reminder)) -> Result<Reminder, AppError> {
        let mut reminders = self.reminders.lock();
        let mut next = reminders.clone();
        let reminder = next
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("reminder {}", id)))?;
        f(reminder);
        let updated = reminder.clone();
        self.save(&next)?;
        *reminders = next;
        Ok(updated)
    }
}

fn label_next_run(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !reminder.is_active {
        return None;
    }
    match next_run_time(&reminder.cron_expression, &reminder.timezone, now) {
        Ok(next) => Some(next),
        Err(e) => {
            log::warn!("Reminder '{}' has no next run: {}", reminder.name, e);
            None
        }
    }
}

/// Run one reminder now: file its ticket, then stamp `lastRun`.
pub async fn run_reminder(
    registry: &ReminderRegistry,
    records: &RecordService,
    id: &str,
) -> Result<(Reminder, Record), AppError> {
    let reminder = registry.get(id)?;
    let record =
        create_from_template(records, &reminder.template, &reminder.name, &reminder.timezone)
            .await?;
    let reminder = registry.mark_run(id, Utc::now())?;
    Ok((reminder, record))
}
