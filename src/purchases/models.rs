//! Ledger data model: purchases, line items and generated artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Sentinel owner for purchases whose buyer could not be matched to an
/// account at webhook time. Artifacts are still generated under this
/// namespace and re-homed later by reconciliation tooling.
pub const UNKNOWN_USER: &str = "unknown";

/// Purchase-level rollup status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PurchaseStatus::Pending),
            "completed" => Some(PurchaseStatus::Completed),
            "failed" => Some(PurchaseStatus::Failed),
            _ => None,
        }
    }
}

/// The five artifact slots a generated unit can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TemplatePdf,
    TemplateDocx,
    SamplePdf,
    SampleDocx,
    StudyMaterialPdf,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::TemplatePdf,
        ArtifactKind::TemplateDocx,
        ArtifactKind::SamplePdf,
        ArtifactKind::SampleDocx,
        ArtifactKind::StudyMaterialPdf,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::TemplatePdf
            | ArtifactKind::SamplePdf
            | ArtifactKind::StudyMaterialPdf => "pdf",
            ArtifactKind::TemplateDocx | ArtifactKind::SampleDocx => "docx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension() {
            "pdf" => "application/pdf",
            _ => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::TemplatePdf => "template_pdf",
            ArtifactKind::TemplateDocx => "template_docx",
            ArtifactKind::SamplePdf => "sample_pdf",
            ArtifactKind::SampleDocx => "sample_docx",
            ArtifactKind::StudyMaterialPdf => "study_material_pdf",
        }
    }
}

/// A persisted artifact: where it lives and how to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactRef {
    /// Artifact id, the `{artifact_id}` segment of the storage path.
    pub artifact_id: String,
    pub storage_path: String,
    /// Signed URL as issued at generation time. Time-bounded; read-side
    /// callers re-issue fresh URLs instead of trusting this one.
    pub download_url: String,
}

/// The five optional artifact slots of one generated unit.
///
/// Absence of a slot is the signal that its sub-pipeline failed; there is
/// no separate per-slot error record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_pdf: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_docx: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_pdf: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_docx: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_material_pdf: Option<ArtifactRef>,
}

impl ArtifactSet {
    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactRef> {
        match kind {
            ArtifactKind::TemplatePdf => self.template_pdf.as_ref(),
            ArtifactKind::TemplateDocx => self.template_docx.as_ref(),
            ArtifactKind::SamplePdf => self.sample_pdf.as_ref(),
            ArtifactKind::SampleDocx => self.sample_docx.as_ref(),
            ArtifactKind::StudyMaterialPdf => self.study_material_pdf.as_ref(),
        }
    }

    pub fn set(&mut self, kind: ArtifactKind, artifact: ArtifactRef) {
        match kind {
            ArtifactKind::TemplatePdf => self.template_pdf = Some(artifact),
            ArtifactKind::TemplateDocx => self.template_docx = Some(artifact),
            ArtifactKind::SamplePdf => self.sample_pdf = Some(artifact),
            ArtifactKind::SampleDocx => self.sample_docx = Some(artifact),
            ArtifactKind::StudyMaterialPdf => self.study_material_pdf = Some(artifact),
        }
    }

    /// All five slots populated. This is the reprocessing sweep's
    /// completeness bar, stricter than the orchestrator's "attempted" bar.
    pub fn is_full(&self) -> bool {
        ArtifactKind::ALL.iter().all(|k| self.get(*k).is_some())
    }

    pub fn is_empty(&self) -> bool {
        ArtifactKind::ALL.iter().all(|k| self.get(*k).is_none())
    }

    /// Representative artifact for single-document consumers, in the fixed
    /// preference order: study material PDF, sample PDF, template PDF.
    pub fn representative(&self) -> Option<&ArtifactRef> {
        self.study_material_pdf
            .as_ref()
            .or(self.sample_pdf.as_ref())
            .or(self.template_pdf.as_ref())
    }
}

/// One per-quantity generation record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneratedUnit {
    pub artifacts: ArtifactSet,
    /// Representative artifact id for backward-compatible consumers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Line item generation state. `Completed` means "the generation attempt
/// finished for every unit", not "zero sub-failures"; callers inspect the
/// artifact slots to know what is actually downloadable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Completed {
        /// Convenience copy of the first unit's artifact set.
        artifacts: ArtifactSet,
        units: Vec<GeneratedUnit>,
    },
    Failed {
        reason: String,
    },
}

impl ItemState {
    pub fn is_completed(&self) -> bool {
        matches!(self, ItemState::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemState::Failed { .. })
    }
}

/// One purchased line item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub id: Uuid,
    /// Document family name, e.g. "Demanda de divorcio".
    pub name: String,
    /// Legal domain, e.g. "Civil".
    pub area: String,
    pub jurisdiction: String,
    /// Minor currency units.
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(flatten)]
    pub state: ItemState,
}

impl LineItem {
    pub fn new(name: &str, area: &str, jurisdiction: &str, unit_price: i64, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            area: area.to_string(),
            jurisdiction: jurisdiction.to_string(),
            unit_price,
            quantity: quantity.max(1),
            state: ItemState::Pending,
        }
    }
}

/// One checkout transaction and everything generated for it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    /// Payment provider's checkout session id; the idempotency key.
    pub external_transaction_id: String,
    pub user_id: String,
    pub customer_email: String,
    pub items: Vec<LineItem>,
    /// Minor currency units.
    pub total_amount: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    pub documents_generated: u32,
    pub documents_failed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn new_pending(
        external_transaction_id: &str,
        user_id: &str,
        customer_email: &str,
        items: Vec<LineItem>,
        total_amount: i64,
        currency: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_transaction_id: external_transaction_id.to_string(),
            user_id: user_id.to_string(),
            customer_email: customer_email.to_string(),
            items,
            total_amount,
            currency: currency.to_string(),
            status: PurchaseStatus::Pending,
            documents_generated: 0,
            documents_failed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the purchase-level rollup from the current item states.
    ///
    /// Partial success is success: one generated item out of many is still
    /// a `Completed` purchase. `Failed` only when every item failed (which
    /// is vacuously true for an empty item list).
    pub fn recompute_rollup(&mut self) {
        self.documents_generated = self.items.iter().filter(|i| i.state.is_completed()).count() as u32;
        self.documents_failed = self.items.iter().filter(|i| i.state.is_failed()).count() as u32;
        self.status = if self.documents_generated > 0 {
            PurchaseStatus::Completed
        } else {
            PurchaseStatus::Failed
        };
        self.updated_at = Utc::now();
    }

    /// Locate the unit owning a representative document id, together with
    /// its line item.
    pub fn find_document(&self, document_id: &str) -> Option<(&LineItem, &GeneratedUnit)> {
        self.items.iter().find_map(|item| match &item.state {
            ItemState::Completed { units, .. } => units
                .iter()
                .find(|u| u.document_id.as_deref() == Some(document_id))
                .map(|u| (item, u)),
            _ => None,
        })
    }
}
