//! SM operation tickets: the record model and everything derived from it.
//!
//! A record is a flat bag of strings on the wire. Only a handful are typed
//! in practice (dates, elapsed time, the per-category task number); the rest
//! are organizational metadata that flow through untouched. `RecordField`
//! is the single declaration of every mutable field, its camelCase form key,
//! its external table column and its human-readable label.

pub mod derive;
pub mod export;
pub mod mapping;
pub mod query;

use serde::{Deserialize, Serialize};

pub use derive::{
    apply_receipt_date, compute_total_man_months, derive_dates_from_receipt, next_task_number,
    prepare_new_record, prepare_update, timestamp, validate_required, DerivedDates,
};
pub use export::{export_file_name, to_delimited_text, ExportColumn, DEFAULT_EXPORT_COLUMNS};
pub use mapping::{from_external_row, to_external_row, ExternalRow};
pub use query::{RecordQuery, SortDirection};

/// One SM ticket as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub input: RecordInput,
    pub created_at: String,
}

/// Every user-editable field of a record. Update replaces this wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordInput {
    pub category: String,
    pub task_no: String,
    pub year: String,
    pub target_month: String,
    pub receipt_date: String,
    pub request_path: String,
    pub work_basis_number: String,
    pub request_team: String,
    pub request_org_type: String,
    pub requester: String,
    pub lg_uplus_team_name: String,
    pub system_part: String,
    pub target_system_name: String,
    pub sla_sm_activity: String,
    pub sla_sm_activity_detail: String,
    pub process_type: String,
    pub request_content: String,
    pub process_content: String,
    pub note: String,
    pub sm_manager: String,
    pub start_date: String,
    pub expected_deploy_date: String,
    pub deploy_completed: String,
    pub actual_deploy_date: String,
    pub work_time_days: String,
    pub work_time_hours: String,
    pub work_time_minutes: String,
    #[serde(rename = "totalMM")]
    pub total_mm: String,
    #[serde(rename = "monthlyActualBillingMM")]
    pub monthly_actual_billing_mm: String,
    pub error_fix_required: String,
    pub work_review_target: String,
    pub work_review_week: String,
}

/// Form payload: the input plus the free-text label typed when "Other" is picked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSubmission {
    #[serde(flatten)]
    pub input: RecordInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_category: Option<String>,
}

impl From<RecordInput> for RecordSubmission {
    fn from(input: RecordInput) -> Self {
        Self {
            input,
            custom_category: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Built-in ticket categories. Anything else is a custom label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Dashboard,
    Plan,
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Dashboard, Category::Plan, Category::Other];

    /// Label stored for rows written before the category column existed.
    pub const FALLBACK: Category = Category::Dashboard;

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Dashboard => "Dashboard",
            Category::Plan => "Plan",
            Category::Other => "Other",
        }
    }

    pub fn parse(label: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
    }

    /// Resolve the stored label for a form selection.
    ///
    /// "Other" with a non-blank custom label stores the custom label itself.
    pub fn resolve(selected: &str, custom: Option<&str>) -> String {
        let custom = custom.map(str::trim).filter(|c| !c.is_empty());
        match (Category::parse(selected), custom) {
            (Some(Category::Other), Some(label)) => label.to_string(),
            (Some(known), _) => known.as_str().to_string(),
            (None, _) => selected.trim().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// Every mutable record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    Category,
    TaskNo,
    Year,
    TargetMonth,
    ReceiptDate,
    RequestPath,
    WorkBasisNumber,
    RequestTeam,
    RequestOrgType,
    Requester,
    LgUplusTeamName,
    SystemPart,
    TargetSystemName,
    SlaSmActivity,
    SlaSmActivityDetail,
    ProcessType,
    RequestContent,
    ProcessContent,
    Note,
    SmManager,
    StartDate,
    ExpectedDeployDate,
    DeployCompleted,
    ActualDeployDate,
    WorkTimeDays,
    WorkTimeHours,
    WorkTimeMinutes,
    #[serde(rename = "totalMM")]
    TotalMm,
    #[serde(rename = "monthlyActualBillingMM")]
    MonthlyActualBillingMm,
    ErrorFixRequired,
    WorkReviewTarget,
    WorkReviewWeek,
}

/// `(field, form key, external column, label)`
const FIELD_TABLE: [(RecordField, &str, &str, &str); 32] = [
    (RecordField::Category, "category", "category", "Category"),
    (RecordField::TaskNo, "taskNo", "taskno", "Task No"),
    (RecordField::Year, "year", "year", "Year"),
    (RecordField::TargetMonth, "targetMonth", "targetmonth", "Target Month"),
    (RecordField::ReceiptDate, "receiptDate", "receiptdate", "Receipt Date"),
    (RecordField::RequestPath, "requestPath", "requestpath", "Request Path"),
    (RecordField::WorkBasisNumber, "workBasisNumber", "workbasisnumber", "Work Basis No"),
    (RecordField::RequestTeam, "requestTeam", "requestteam", "Request Team"),
    (RecordField::RequestOrgType, "requestOrgType", "requestorgtype", "Request Org Type"),
    (RecordField::Requester, "requester", "requester", "Requester"),
    (RecordField::LgUplusTeamName, "lgUplusTeamName", "lguplusteamname", "LG U+ Team"),
    (RecordField::SystemPart, "systemPart", "systempart", "System (Part)"),
    (RecordField::TargetSystemName, "targetSystemName", "targetsystemname", "Target System"),
    (RecordField::SlaSmActivity, "slaSmActivity", "slasmactivity", "SLA SM Activity"),
    (
        RecordField::SlaSmActivityDetail,
        "slaSmActivityDetail",
        "slasmactivitydetail",
        "SLA SM Activity (Detail)",
    ),
    (RecordField::ProcessType, "processType", "processtype", "Process Type"),
    (RecordField::RequestContent, "requestContent", "requestcontent", "Request Content"),
    (RecordField::ProcessContent, "processContent", "processcontent", "Process Content"),
    (RecordField::Note, "note", "note", "Note"),
    (RecordField::SmManager, "smManager", "smmanager", "SM Manager"),
    (RecordField::StartDate, "startDate", "startdate", "Start Date"),
    (
        RecordField::ExpectedDeployDate,
        "expectedDeployDate",
        "expecteddeploydate",
        "Expected Deploy Date",
    ),
    (RecordField::DeployCompleted, "deployCompleted", "deploycompleted", "Deploy Status"),
    (RecordField::ActualDeployDate, "actualDeployDate", "actualdeploydate", "Deploy Date"),
    (RecordField::WorkTimeDays, "workTimeDays", "worktimedays", "Work Days"),
    (RecordField::WorkTimeHours, "workTimeHours", "worktimehours", "Work Hours"),
    (RecordField::WorkTimeMinutes, "workTimeMinutes", "worktimeminutes", "Work Minutes"),
    (RecordField::TotalMm, "totalMM", "totalmm", "Total MM"),
    (
        RecordField::MonthlyActualBillingMm,
        "monthlyActualBillingMM",
        "monthlyactualbillingmm",
        "Monthly Billed MM",
    ),
    (RecordField::ErrorFixRequired, "errorFixRequired", "errorfixrequired", "Error Fix"),
    (RecordField::WorkReviewTarget, "workReviewTarget", "workreviewtarget", "Work Review Target"),
    (RecordField::WorkReviewWeek, "workReviewWeek", "workreviewweek", "Work Review Week"),
];

impl RecordField {
    pub fn all() -> impl Iterator<Item = RecordField> {
        FIELD_TABLE.iter().map(|(field, ..)| *field)
    }

    fn entry(self) -> &'static (RecordField, &'static str, &'static str, &'static str) {
        // FIELD_TABLE is declared in enum order.
        &FIELD_TABLE[self as usize]
    }

    /// camelCase key used by the form and the JSON API.
    pub fn key(self) -> &'static str {
        self.entry().1
    }

    /// Column name in the external table.
    pub fn column(self) -> &'static str {
        self.entry().2
    }

    /// Human-readable label used for CSV headers and error messages.
    pub fn label(self) -> &'static str {
        self.entry().3
    }

    /// Older column names still present in rows written by earlier revisions.
    pub fn legacy_columns(self) -> &'static [&'static str] {
        match self {
            RecordField::TargetMonth => &["month"],
            RecordField::ActualDeployDate => &["deploydate", "deployDate"],
            _ => &[],
        }
    }

    pub fn value(self, input: &RecordInput) -> &str {
        match self {
            RecordField::Category => &input.category,
            RecordField::TaskNo => &input.task_no,
            RecordField::Year => &input.year,
            RecordField::TargetMonth => &input.target_month,
            RecordField::ReceiptDate => &input.receipt_date,
            RecordField::RequestPath => &input.request_path,
            RecordField::WorkBasisNumber => &input.work_basis_number,
            RecordField::RequestTeam => &input.request_team,
            RecordField::RequestOrgType => &input.request_org_type,
            RecordField::Requester => &input.requester,
            RecordField::LgUplusTeamName => &input.lg_uplus_team_name,
            RecordField::SystemPart => &input.system_part,
            RecordField::TargetSystemName => &input.target_system_name,
            RecordField::SlaSmActivity => &input.sla_sm_activity,
            RecordField::SlaSmActivityDetail => &input.sla_sm_activity_detail,
            RecordField::ProcessType => &input.process_type,
            RecordField::RequestContent => &input.request_content,
            RecordField::ProcessContent => &input.process_content,
            RecordField::Note => &input.note,
            RecordField::SmManager => &input.sm_manager,
            RecordField::StartDate => &input.start_date,
            RecordField::ExpectedDeployDate => &input.expected_deploy_date,
            RecordField::DeployCompleted => &input.deploy_completed,
            RecordField::ActualDeployDate => &input.actual_deploy_date,
            RecordField::WorkTimeDays => &input.work_time_days,
            RecordField::WorkTimeHours => &input.work_time_hours,
            RecordField::WorkTimeMinutes => &input.work_time_minutes,
            RecordField::TotalMm => &input.total_mm,
            RecordField::MonthlyActualBillingMm => &input.monthly_actual_billing_mm,
            RecordField::ErrorFixRequired => &input.error_fix_required,
            RecordField::WorkReviewTarget => &input.work_review_target,
            RecordField::WorkReviewWeek => &input.work_review_week,
        }
    }

    pub fn slot(self, input: &mut RecordInput) -> &mut String {
        match self {
            RecordField::Category => &mut input.category,
            RecordField::TaskNo => &mut input.task_no,
            RecordField::Year => &mut input.year,
            RecordField::TargetMonth => &mut input.target_month,
            RecordField::ReceiptDate => &mut input.receipt_date,
            RecordField::RequestPath => &mut input.request_path,
            RecordField::WorkBasisNumber => &mut input.work_basis_number,
            RecordField::RequestTeam => &mut input.request_team,
            RecordField::RequestOrgType => &mut input.request_org_type,
            RecordField::Requester => &mut input.requester,
            RecordField::LgUplusTeamName => &mut input.lg_uplus_team_name,
            RecordField::SystemPart => &mut input.system_part,
            RecordField::TargetSystemName => &mut input.target_system_name,
            RecordField::SlaSmActivity => &mut input.sla_sm_activity,
            RecordField::SlaSmActivityDetail => &mut input.sla_sm_activity_detail,
            RecordField::ProcessType => &mut input.process_type,
            RecordField::RequestContent => &mut input.request_content,
            RecordField::ProcessContent => &mut input.process_content,
            RecordField::Note => &mut input.note,
            RecordField::SmManager => &mut input.sm_manager,
            RecordField::StartDate => &mut input.start_date,
            RecordField::ExpectedDeployDate => &mut input.expected_deploy_date,
            RecordField::DeployCompleted => &mut input.deploy_completed,
            RecordField::ActualDeployDate => &mut input.actual_deploy_date,
            RecordField::WorkTimeDays => &mut input.work_time_days,
            RecordField::WorkTimeHours => &mut input.work_time_hours,
            RecordField::WorkTimeMinutes => &mut input.work_time_minutes,
            RecordField::TotalMm => &mut input.total_mm,
            RecordField::MonthlyActualBillingMm => &mut input.monthly_actual_billing_mm,
            RecordField::ErrorFixRequired => &mut input.error_fix_required,
            RecordField::WorkReviewTarget => &mut input.work_review_target,
            RecordField::WorkReviewWeek => &mut input.work_review_week,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_is_in_enum_order() {
        for (idx, (field, ..)) in FIELD_TABLE.iter().enumerate() {
            assert_eq!(*field as usize, idx, "{:?} out of order", field);
        }
    }

    #[test]
    fn form_keys_match_serde_names() {
        let mut input = RecordInput::default();
        for field in RecordField::all() {
            *field.slot(&mut input) = field.key().to_string();
        }
        let json = serde_json::to_value(&input).unwrap();
        for field in RecordField::all() {
            assert_eq!(json[field.key()], field.key(), "{:?}", field);
        }
    }

    #[test]
    fn columns_are_lowercase_keys() {
        for field in RecordField::all() {
            assert_eq!(field.column(), field.key().to_lowercase());
        }
    }

    #[test]
    fn other_with_custom_label_stores_the_label() {
        assert_eq!(Category::resolve("Other", Some(" Batch ")), "Batch");
        assert_eq!(Category::resolve("Other", Some("  ")), "Other");
        assert_eq!(Category::resolve("plan", Some("ignored")), "Plan");
        assert_eq!(Category::resolve("Audit", None), "Audit");
    }

    #[test]
    fn record_serializes_flat() {
        let record = Record {
            id: "r1".into(),
            input: RecordInput {
                category: "Plan".into(),
                total_mm: "0.048".into(),
                ..Default::default()
            },
            created_at: "2024-03-15 09:00:00".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["category"], "Plan");
        assert_eq!(json["totalMM"], "0.048");
        assert_eq!(json["createdAt"], "2024-03-15 09:00:00");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
