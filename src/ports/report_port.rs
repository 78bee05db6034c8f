//! Report rendering port.

use crate::domain::error::PipreplayError;
use crate::domain::report::Report;

pub trait ReportPort {
    fn render(&self, report: &Report) -> Result<String, PipreplayError>;

    /// Default implementation: renders and writes the result to `output_path`.
    fn write(&self, report: &Report, output_path: &str) -> Result<(), PipreplayError> {
        let rendered = self.render(report)?;
        std::fs::write(output_path, rendered)?;
        Ok(())
    }
}
