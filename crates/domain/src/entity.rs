use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opsgate_core::AppError;
use serde::{Deserialize, Serialize};

/// Functional module an entity belongs to, used for classifier routing and
/// audit scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Student, course, department and attendance records.
    Academic,
    /// Fees, invoices and payments.
    Finance,
    /// Faculty, employee and payroll records.
    Hr,
    /// Model-produced grade and risk predictions.
    Predictions,
}

impl ModuleKind {
    /// Returns a stable storage value for this module.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Finance => "finance",
            Self::Hr => "hr",
            Self::Predictions => "predictions",
        }
    }
}

impl FromStr for ModuleKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "academic" => Ok(Self::Academic),
            "finance" => Ok(Self::Finance),
            "hr" => Ok(Self::Hr),
            "predictions" => Ok(Self::Predictions),
            _ => Err(AppError::Validation(format!("unknown module '{value}'"))),
        }
    }
}

impl Display for ModuleKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Closed registry of governed institutional record types.
///
/// Commands can only ever target one of these; the classifier output is
/// normalized into this enum at the orchestrator boundary so permission and
/// risk checks pattern-match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Enrolled student master record.
    Student,
    /// Teaching staff record.
    Faculty,
    /// Course catalog entry.
    Course,
    /// Academic department.
    Department,
    /// Per-lecture attendance mark.
    Attendance,
    /// Model-produced grade prediction.
    Prediction,
    /// Student fee obligation.
    StudentFee,
    /// Issued invoice.
    Invoice,
    /// Recorded payment.
    Payment,
    /// Non-teaching employee record.
    Employee,
    /// Monthly payroll entry.
    SalaryRecord,
}

impl EntityKind {
    /// Returns a stable storage value for this entity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::Course => "course",
            Self::Department => "department",
            Self::Attendance => "attendance",
            Self::Prediction => "prediction",
            Self::StudentFee => "student_fee",
            Self::Invoice => "invoice",
            Self::Payment => "payment",
            Self::Employee => "employee",
            Self::SalaryRecord => "salary_record",
        }
    }

    /// Returns all known entities.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EntityKind] = &[
            EntityKind::Student,
            EntityKind::Faculty,
            EntityKind::Course,
            EntityKind::Department,
            EntityKind::Attendance,
            EntityKind::Prediction,
            EntityKind::StudentFee,
            EntityKind::Invoice,
            EntityKind::Payment,
            EntityKind::Employee,
            EntityKind::SalaryRecord,
        ];

        ALL
    }

    /// Returns the functional module that owns this entity.
    #[must_use]
    pub fn module(&self) -> ModuleKind {
        match self {
            Self::Student | Self::Course | Self::Department | Self::Attendance => {
                ModuleKind::Academic
            }
            Self::StudentFee | Self::Invoice | Self::Payment => ModuleKind::Finance,
            Self::Faculty | Self::Employee | Self::SalaryRecord => ModuleKind::Hr,
            Self::Prediction => ModuleKind::Predictions,
        }
    }

    /// Returns whether this entity holds personal or financial data that
    /// keeps a confirmation gate on otherwise low-risk mutations.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::Student
                | Self::StudentFee
                | Self::Invoice
                | Self::Payment
                | Self::Employee
                | Self::SalaryRecord
        )
    }

    /// Returns whether this entity is a financial ledger or payroll record.
    /// Mutations of ledger entities never classify below MEDIUM risk.
    #[must_use]
    pub fn is_ledger(&self) -> bool {
        matches!(
            self,
            Self::StudentFee | Self::Invoice | Self::Payment | Self::SalaryRecord
        )
    }

    /// Returns whether deleting a record of this entity cascades into
    /// dependent records, which makes a snapshot-based rollback unreliable.
    #[must_use]
    pub fn delete_cascades(&self) -> bool {
        matches!(
            self,
            Self::Student | Self::Faculty | Self::Course | Self::Department | Self::Employee
        )
    }

    /// Returns the well-known field names carried by records of this entity.
    #[must_use]
    pub fn known_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Student => &[
                "roll_number",
                "semester",
                "section",
                "cgpa",
                "admission_year",
                "department",
            ],
            Self::Faculty => &["employee_id", "designation", "department"],
            Self::Course => &["code", "name", "semester", "credits", "department"],
            Self::Department => &["name", "code"],
            Self::Attendance => &["date", "is_present", "method", "student_id", "course_id"],
            Self::Prediction => &[
                "predicted_grade",
                "risk_score",
                "confidence",
                "student_id",
                "course_id",
            ],
            Self::StudentFee => &[
                "student_id",
                "fee_type",
                "amount",
                "due_date",
                "semester",
                "academic_year",
                "is_paid",
            ],
            Self::Invoice => &[
                "student_id",
                "invoice_number",
                "amount_due",
                "status",
                "description",
            ],
            Self::Payment => &[
                "student_id",
                "amount",
                "payment_method",
                "reference_number",
                "status",
                "notes",
            ],
            Self::Employee => &["employee_type", "date_of_joining", "phone", "city", "state"],
            Self::SalaryRecord => &[
                "employee_id",
                "month",
                "year",
                "gross_salary",
                "deductions",
                "net_salary",
                "status",
            ],
        }
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Plural and colloquial aliases come straight from how people phrase
        // commands ("show all students", "pending salaries").
        match value.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Ok(Self::Student),
            "faculty" | "facultys" | "faculties" | "teacher" | "teachers" => Ok(Self::Faculty),
            "course" | "courses" => Ok(Self::Course),
            "department" | "departments" => Ok(Self::Department),
            "attendance" | "attendances" => Ok(Self::Attendance),
            "prediction" | "predictions" => Ok(Self::Prediction),
            "student_fee" | "student_fees" | "fee" | "fees" => Ok(Self::StudentFee),
            "invoice" | "invoices" => Ok(Self::Invoice),
            "payment" | "payments" => Ok(Self::Payment),
            "employee" | "employees" => Ok(Self::Employee),
            "salary_record" | "salary_records" | "salary" | "salaries" => Ok(Self::SalaryRecord),
            other => Err(AppError::Validation(format!("unknown entity '{other}'"))),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}
