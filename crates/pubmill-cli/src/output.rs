use std::io::Write;

use owo_colors::OwoColorize;
use pubmill_xml::{Severity, ValidationIssue, ValidationReport};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the validation report after conversion.
pub fn print_report(
    w: &mut dyn Write,
    report: &ValidationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    if report.valid {
        let line = format!("Document is valid ({} warnings)", report.warnings.len());
        if color.enabled() {
            writeln!(w, "{}", line.green())?;
        } else {
            writeln!(w, "{line}")?;
        }
    } else {
        let line = format!(
            "Document is INVALID ({} errors, {} warnings)",
            report.errors.len(),
            report.warnings.len()
        );
        if color.enabled() {
            writeln!(w, "{}", line.red().bold())?;
        } else {
            writeln!(w, "{line}")?;
        }
    }

    for issue in &report.errors {
        print_issue(w, issue, color)?;
    }
    for issue in &report.warnings {
        print_issue(w, issue, color)?;
    }
    Ok(())
}

fn print_issue(w: &mut dyn Write, issue: &ValidationIssue, color: ColorMode) -> std::io::Result<()> {
    let tag = match issue.severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
        Severity::Critical => "critical",
    };
    let line = format!("  [{tag}] {}: {}", issue.element, issue.message);
    if color.enabled() {
        match issue.severity {
            Severity::Warning => writeln!(w, "{}", line.yellow())?,
            Severity::Error | Severity::Critical => writeln!(w, "{}", line.red())?,
        }
    } else {
        writeln!(w, "{line}")?;
    }
    if let Some(suggestion) = &issue.suggestion {
        let hint = format!("          hint: {suggestion}");
        if color.enabled() {
            writeln!(w, "{}", hint.dimmed())?;
        } else {
            writeln!(w, "{hint}")?;
        }
    }
    Ok(())
}
