use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

/// Where a submission stands in the review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    #[default]
    Submitted,
    Reviewed,
}

/// The persisted outcome of the review of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingRecord {
    pub submission_id: String,
    /// The PDF as submitted, never modified.
    pub pdf_url: String,
    /// The latest annotated version, replaced on every save that burns new ink.
    #[serde(default)]
    pub annotated_pdf_url: Option<String>,
    #[serde(default)]
    pub marks_awarded: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl GradingRecord {
    /// A freshly submitted, not yet reviewed, record.
    pub fn submitted(submission_id: impl Into<String>, pdf_url: impl Into<String>) -> Self {
        GradingRecord {
            submission_id: submission_id.into(),
            pdf_url: pdf_url.into(),
            annotated_pdf_url: None,
            marks_awarded: None,
            feedback: None,
            status: ReviewStatus::Submitted,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    /// The document new ink has to be drawn onto: the latest annotated version when there is
    /// one, so that the ink of earlier reviews is kept, and the original submission otherwise.
    pub fn source_url(&self) -> &str {
        self.annotated_pdf_url.as_deref().unwrap_or(&self.pdf_url)
    }

    /// Applies a review, stamping the reviewer and the time of the review.
    pub fn apply(&mut self, update: &GradingUpdate, reviewer: &str, reviewed_at: OffsetDateTime) {
        self.marks_awarded = update.marks_awarded;
        self.feedback = update.feedback.clone();
        if let Some(annotated_pdf_url) = &update.annotated_pdf_url {
            self.annotated_pdf_url = Some(annotated_pdf_url.clone());
        }
        self.status = update.status;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(reviewed_at);
    }
}

/// The body sent to persist a review, keyed by the submission it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingUpdate {
    pub marks_awarded: Option<f64>,
    pub feedback: Option<String>,
    pub annotated_pdf_url: Option<String>,
    pub status: ReviewStatus,
}

impl GradingUpdate {
    /// A review marking the submission as reviewed. Blank feedback is stored as no feedback,
    /// anything else is stored in NFC form.
    pub fn reviewed(
        marks_awarded: Option<f64>,
        feedback: &str,
        annotated_pdf_url: Option<String>,
    ) -> Self {
        let feedback = if feedback.trim().is_empty() {
            None
        } else {
            Some(feedback.nfc().collect::<String>())
        };

        GradingUpdate {
            marks_awarded,
            feedback,
            annotated_pdf_url,
            status: ReviewStatus::Reviewed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn the_latest_annotated_version_is_the_source() {
        let mut record = GradingRecord::submitted("s-1", "file:///original.pdf");
        assert_eq!(record.source_url(), "file:///original.pdf");

        record.annotated_pdf_url = Some("file:///graded.pdf".into());
        assert_eq!(record.source_url(), "file:///graded.pdf");
    }

    #[test]
    fn applying_a_review_stamps_reviewer_and_time() {
        let mut record = GradingRecord::submitted("s-1", "file:///original.pdf");
        let update = GradingUpdate::reviewed(None, "Good work", None);
        let reviewed_at = datetime!(2024-05-01 10:00 UTC);

        record.apply(&update, "ms-lee", reviewed_at);

        assert_eq!(record.status, ReviewStatus::Reviewed);
        assert_eq!(record.marks_awarded, None);
        assert_eq!(record.feedback.as_deref(), Some("Good work"));
        assert_eq!(record.annotated_pdf_url, None);
        assert_eq!(record.reviewed_by.as_deref(), Some("ms-lee"));
        assert_eq!(record.reviewed_at, Some(reviewed_at));
    }

    #[test]
    fn a_review_without_new_ink_keeps_the_annotated_version() {
        let mut record = GradingRecord::submitted("s-1", "file:///original.pdf");
        record.annotated_pdf_url = Some("file:///graded.pdf".into());

        record.apply(
            &GradingUpdate::reviewed(Some(8.5), "", None),
            "ms-lee",
            datetime!(2024-05-01 10:00 UTC),
        );

        assert_eq!(record.annotated_pdf_url.as_deref(), Some("file:///graded.pdf"));
        assert_eq!(record.marks_awarded, Some(8.5));
        assert_eq!(record.feedback, None);
    }

    #[test]
    fn feedback_is_normalized() {
        let update = GradingUpdate::reviewed(None, "Tre\u{0300}s bien", None);

        assert_eq!(update.feedback.as_deref(), Some("Tr\u{00e8}s bien"));
    }

    #[test]
    fn the_update_body_uses_camel_case() {
        let update = GradingUpdate::reviewed(Some(7.0), "ok", Some("https://files/x.pdf".into()));
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "marksAwarded": 7.0,
                "feedback": "ok",
                "annotatedPdfUrl": "https://files/x.pdf",
                "status": "REVIEWED"
            })
        );
    }

    #[test]
    fn records_survive_a_json_round_trip() {
        let mut record = GradingRecord::submitted("s-1", "file:///original.pdf");
        record.apply(
            &GradingUpdate::reviewed(Some(3.0), "x", None),
            "ms-lee",
            datetime!(2024-05-01 10:00:30 UTC),
        );
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"reviewedAt\":\"2024-05-01T10:00:30Z\""));
        assert_eq!(serde_json::from_str::<GradingRecord>(&json).unwrap(), record);

        let minimal: GradingRecord =
            serde_json::from_str(r#"{"submissionId": "s-2", "pdfUrl": "file:///a.pdf"}"#).unwrap();
        assert_eq!(minimal, GradingRecord::submitted("s-2", "file:///a.pdf"));
    }
}
