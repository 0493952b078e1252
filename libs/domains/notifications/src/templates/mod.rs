//! Message composition for near-miss notifications.
//!
//! Rendering is pure: the same kind and payload always produce the same
//! subject and body. Payload values are HTML-escaped by Handlebars; subjects
//! are plain text and are not escaped.

use crate::error::NotificationResult;
use crate::models::{ComposedMessage, NotificationKind, ReportPayload};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const NOT_AVAILABLE: &str = "N/A";
const NO_DESCRIPTION: &str = "No description provided";
const UPDATE_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Renders notification kinds into subject + HTML body.
#[derive(Clone)]
pub struct MessageComposer {
    handlebars: Arc<Handlebars<'static>>,
}

/// Display-ready view of a [`ReportPayload`].
#[derive(Debug, Serialize)]
struct ReportView {
    report_id: String,
    date_occurred: String,
    time_occurred: String,
    employee_name: String,
    plant: String,
    dept_name: String,
    equipment_area: Option<String>,
    hazard_assessment: Option<String>,
    priority_class: String,
    description: String,
    immediate_action: Option<String>,
    created_by: String,
    updated_by: String,
    updated_at: String,
}

fn or_na(value: &Option<String>) -> String {
    present(value).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// `Some` only for non-blank values.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// CSS suffix for the priority badge: `high`, `medium`, `low`, else `unknown`.
fn priority_class(hazard_assessment: Option<&str>) -> String {
    let Some(value) = hazard_assessment else {
        return "unknown".to_string();
    };
    let value = value.to_ascii_lowercase();
    if value.contains("high") || value.contains("immediate") {
        "high"
    } else if value.contains("medium") {
        "medium"
    } else if value.contains("low") {
        "low"
    } else {
        "unknown"
    }
    .to_string()
}

impl From<&ReportPayload> for ReportView {
    fn from(payload: &ReportPayload) -> Self {
        let hazard_assessment = present(&payload.hazard_assessment);
        Self {
            report_id: payload
                .report_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            date_occurred: or_na(&payload.date_occurred),
            time_occurred: or_na(&payload.time_occurred),
            employee_name: or_na(&payload.employee_name),
            plant: or_na(&payload.plant),
            dept_name: or_na(&payload.dept_name),
            equipment_area: present(&payload.equipment_area),
            priority_class: priority_class(hazard_assessment.as_deref()),
            hazard_assessment,
            description: present(&payload.description)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            immediate_action: present(&payload.immediate_action),
            created_by: or_na(&payload.created_by),
            updated_by: or_na(&payload.updated_by),
            updated_at: payload
                .updated_at
                .map(|t| t.format(UPDATE_DATE_FORMAT).to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

impl MessageComposer {
    pub fn new() -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_template_string("new_report", NEW_REPORT_HTML_TEMPLATE)?;
        handlebars.register_template_string("high_priority", HIGH_PRIORITY_HTML_TEMPLATE)?;
        handlebars.register_template_string("update", UPDATE_HTML_TEMPLATE)?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    pub fn compose(
        &self,
        kind: NotificationKind,
        payload: &ReportPayload,
    ) -> NotificationResult<ComposedMessage> {
        let view = ReportView::from(payload);
        debug!(kind = %kind, report_id = %view.report_id, "Composing notification");

        let (template, subject) = match kind {
            NotificationKind::NewReport => (
                "new_report",
                format!("New Near Miss Report - {} Plant", view.plant),
            ),
            NotificationKind::HighPriority => (
                "high_priority",
                format!("HIGH PRIORITY: Near Miss Report - {} Plant", view.plant),
            ),
            NotificationKind::Update => (
                "update",
                format!("Near Miss Report Update - {} Plant", view.plant),
            ),
        };

        let html_body = self.handlebars.render(template, &view)?;
        Ok(ComposedMessage { subject, html_body })
    }
}

// ============================================================================
// Templates
// ============================================================================

const NEW_REPORT_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body { font-family: Arial, sans-serif; margin: 20px; }
        .header { background-color: #28a745; color: white; padding: 15px; border-radius: 5px; }
        .content { padding: 20px; background-color: #f8f9fa; border-radius: 5px; margin-top: 10px; }
        .field { margin-bottom: 10px; }
        .label { font-weight: bold; color: #495057; }
        .priority-high { background-color: #dc3545; color: white; padding: 3px 8px; border-radius: 3px; }
        .priority-medium { background-color: #ffc107; color: black; padding: 3px 8px; border-radius: 3px; }
        .priority-low { background-color: #17a2b8; color: white; padding: 3px 8px; border-radius: 3px; }
    </style>
</head>
<body>
    <div class="header">
        <h2>🚨 New Near Miss Report Submitted</h2>
    </div>

    <div class="content">
        <div class="field">
            <span class="label">Report ID:</span> #{{report_id}}
        </div>
        <div class="field">
            <span class="label">Date/Time:</span> {{date_occurred}} at {{time_occurred}}
        </div>
        <div class="field">
            <span class="label">Employee:</span> {{employee_name}}
        </div>
        <div class="field">
            <span class="label">Location:</span> {{plant}} Plant - {{dept_name}}{{#if equipment_area}} ({{equipment_area}}){{/if}}
        </div>
        {{#if hazard_assessment}}
        <div class="field">
            <span class="label">Priority:</span> <span class="priority-{{priority_class}}">{{hazard_assessment}}</span>
        </div>
        {{/if}}
        <div class="field">
            <span class="label">Description:</span>
            <div style="background: white; padding: 10px; border-left: 4px solid #28a745; margin-top: 5px;">
                {{description}}
            </div>
        </div>
        {{#if immediate_action}}
        <div class="field">
            <span class="label">Immediate Action:</span> {{immediate_action}}
        </div>
        {{/if}}
        <div class="field">
            <span class="label">Submitted by:</span> {{created_by}}
        </div>

        <div style="margin-top: 20px; padding: 15px; background: white; border-radius: 5px;">
            <p><strong>Action Required:</strong></p>
            <ul>
                <li>Review the incident details</li>
                <li>Assess if corrective action is needed</li>
                <li>Update the report status as appropriate</li>
            </ul>
        </div>
    </div>

    <p style="font-size: 12px; color: #6c757d; margin-top: 20px;">
        This is an automated notification from the NEARMISS System.
    </p>
</body>
</html>
"#;

const HIGH_PRIORITY_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body { font-family: Arial, sans-serif; margin: 20px; }
        .header { background-color: #dc3545; color: white; padding: 15px; border-radius: 5px; }
        .urgent { background-color: #fff3cd; border: 2px solid #ffc107; padding: 15px; border-radius: 5px; margin: 10px 0; }
        .content { padding: 20px; background-color: #f8f9fa; border-radius: 5px; }
        .field { margin-bottom: 10px; }
        .label { font-weight: bold; color: #495057; }
    </style>
</head>
<body>
    <div class="header">
        <h2>🚨 HIGH PRIORITY: Near Miss Report</h2>
    </div>

    <div class="urgent">
        <h3>⚠️ IMMEDIATE ATTENTION REQUIRED ⚠️</h3>
        <p>This near miss has been classified as <strong>HIGH/IMMEDIATE</strong> priority and requires urgent review and action.</p>
    </div>

    <div class="content">
        <div class="field">
            <span class="label">Report ID:</span> #{{report_id}}
        </div>
        <div class="field">
            <span class="label">Date/Time:</span> {{date_occurred}} at {{time_occurred}}
        </div>
        <div class="field">
            <span class="label">Employee:</span> {{employee_name}}
        </div>
        <div class="field">
            <span class="label">Location:</span> {{plant}} Plant - {{dept_name}}{{#if equipment_area}} ({{equipment_area}}){{/if}}
        </div>
        {{#if hazard_assessment}}
        <div class="field">
            <span class="label">Priority:</span> {{hazard_assessment}}
        </div>
        {{/if}}
        <div class="field">
            <span class="label">Description:</span>
            <div style="background: white; padding: 10px; border-left: 4px solid #dc3545; margin-top: 5px;">
                {{description}}
            </div>
        </div>
        {{#if immediate_action}}
        <div class="field">
            <span class="label">Immediate Action:</span> {{immediate_action}}
        </div>
        {{/if}}
        <div class="field">
            <span class="label">Submitted by:</span> {{created_by}}
        </div>

        <div style="margin-top: 20px; padding: 15px; background: white; border-radius: 5px; border-left: 4px solid #dc3545;">
            <p><strong>IMMEDIATE ACTIONS REQUIRED:</strong></p>
            <ul>
                <li>Stop work if area poses immediate danger</li>
                <li>Investigate the incident immediately</li>
                <li>Implement corrective measures</li>
                <li>Update report status within 2 hours</li>
            </ul>
        </div>
    </div>

    <p style="font-size: 12px; color: #6c757d; margin-top: 20px;">
        This is an automated HIGH PRIORITY notification from the NEARMISS System.
    </p>
</body>
</html>
"#;

const UPDATE_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body { font-family: Arial, sans-serif; margin: 20px; }
        .header { background-color: #17a2b8; color: white; padding: 15px; border-radius: 5px; }
        .content { padding: 20px; background-color: #f8f9fa; border-radius: 5px; margin-top: 10px; }
        .field { margin-bottom: 10px; }
        .label { font-weight: bold; color: #495057; }
    </style>
</head>
<body>
    <div class="header">
        <h2>📝 Near Miss Report Updated</h2>
    </div>

    <div class="content">
        <div class="field">
            <span class="label">Report ID:</span> #{{report_id}}
        </div>
        <div class="field">
            <span class="label">Updated by:</span> {{updated_by}}
        </div>
        <div class="field">
            <span class="label">Update Date:</span> {{updated_at}}
        </div>

        <div style="margin-top: 20px; padding: 15px; background: white; border-radius: 5px;">
            <p>A near miss report has been updated. Please review the changes and take appropriate action if needed.</p>
        </div>
    </div>

    <p style="font-size: 12px; color: #6c757d; margin-top: 20px;">
        This is an automated notification from the NEARMISS System.
    </p>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn payload() -> ReportPayload {
        ReportPayload {
            report_id: Some(1042),
            date_occurred: Some("2026-03-14".into()),
            time_occurred: Some("09:30".into()),
            employee_name: Some("Ana Diaz".into()),
            plant: Some("North".into()),
            dept_name: Some("Stamping".into()),
            equipment_area: Some("Press 4".into()),
            hazard_assessment: Some("High/Immediate".into()),
            description: Some("Guard left open during changeover".into()),
            immediate_action: Some("Line stopped".into()),
            created_by: Some("adiaz".into()),
            ..ReportPayload::default()
        }
    }

    fn composer() -> MessageComposer {
        MessageComposer::new().unwrap()
    }

    #[test]
    fn test_subjects_per_kind() {
        let composer = composer();
        let p = payload();

        assert_eq!(
            composer.compose(NotificationKind::NewReport, &p).unwrap().subject,
            "New Near Miss Report - North Plant"
        );
        assert_eq!(
            composer
                .compose(NotificationKind::HighPriority, &p)
                .unwrap()
                .subject,
            "HIGH PRIORITY: Near Miss Report - North Plant"
        );
        assert_eq!(
            composer.compose(NotificationKind::Update, &p).unwrap().subject,
            "Near Miss Report Update - North Plant"
        );
    }

    #[test]
    fn test_new_report_renders_fields() {
        let message = composer()
            .compose(NotificationKind::NewReport, &payload())
            .unwrap();

        assert!(message.html_body.contains("#1042"));
        assert!(message.html_body.contains("2026-03-14 at 09:30"));
        assert!(message.html_body.contains("North Plant - Stamping (Press 4)"));
        assert!(message.html_body.contains(r#"class="priority-high""#));
        assert!(message.html_body.contains("Line stopped"));
        assert!(message.html_body.contains("#28a745"));
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let message = composer()
            .compose(NotificationKind::NewReport, &ReportPayload::default())
            .unwrap();

        assert_eq!(message.subject, "New Near Miss Report - N/A Plant");
        assert!(message.html_body.contains("#N/A"));
        assert!(message.html_body.contains("No description provided"));
        assert!(!message.html_body.contains("Immediate Action:"));
        assert!(!message.html_body.contains("Priority:"));
    }

    #[test]
    fn test_high_priority_escalated_framing() {
        let message = composer()
            .compose(NotificationKind::HighPriority, &payload())
            .unwrap();

        assert!(message.html_body.contains("IMMEDIATE ATTENTION REQUIRED"));
        assert!(message.html_body.contains("Update report status within 2 hours"));
        assert!(message.html_body.contains("Guard left open during changeover"));
        assert!(message.html_body.contains("#dc3545"));
    }

    #[test]
    fn test_update_uses_supplied_timestamp() {
        let p = ReportPayload {
            updated_by: Some("jsmith".into()),
            updated_at: Some(Utc.with_ymd_and_hms(2026, 3, 15, 14, 5, 0).unwrap()),
            ..payload()
        };
        let message = composer().compose(NotificationKind::Update, &p).unwrap();

        assert!(message.html_body.contains("03/15/2026 14:05"));
        assert!(message.html_body.contains("jsmith"));
    }

    #[test]
    fn test_values_are_html_escaped() {
        let p = ReportPayload {
            description: Some("<script>alert('x')</script>".into()),
            ..payload()
        };
        let message = composer().compose(NotificationKind::NewReport, &p).unwrap();

        assert!(!message.html_body.contains("<script>"));
        assert!(message.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = composer();
        let p = payload();
        assert_eq!(
            composer.compose(NotificationKind::Update, &p).unwrap(),
            composer.compose(NotificationKind::Update, &p).unwrap()
        );
    }

    #[test]
    fn test_priority_class_mapping() {
        assert_eq!(priority_class(Some("High/Immediate")), "high");
        assert_eq!(priority_class(Some("Medium")), "medium");
        assert_eq!(priority_class(Some("low")), "low");
        assert_eq!(priority_class(Some("?")), "unknown");
        assert_eq!(priority_class(None), "unknown");
    }
}
