//! JSON report adapter implementing ReportPort.

use crate::domain::error::PipreplayError;
use crate::domain::report::Report;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn render(&self, report: &Report) -> Result<String, PipreplayError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.map_err(|e| PipreplayError::Serialization {
            reason: e.to_string(),
        })
    }
}
