//! Terminal output.
//!
//! Results go to stdout, errors to stderr. Warnings are logged through
//! `tracing`. Colours come from `console`, which drops them when the stream
//! is not a terminal.

use console::style;

use crate::domain::ResolvedTarget;
use crate::warning::NbpkgWarning;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Report a non-fatal problem.
///
/// Warnings go through the log subscriber only, which writes them to stderr.
pub fn display_warning(warning: &NbpkgWarning) {
    tracing::warn!("{}", warning);
}

/// Every field of a resolved target, one per line.
pub fn format_resolved_target(target: &ResolvedTarget) -> String {
    let rows = [
        ("branch", target.branch.clone()),
        ("family", target.family.to_string()),
        ("dist_var", target.dist_var.clone()),
        ("dist_val", target.dist_val.clone()),
        ("dist_tag", target.dist_tag.clone()),
        (
            "build_root",
            target.build_root.clone().unwrap_or_else(|| "(none)".to_string()),
        ),
        ("build_target", target.build_target.clone()),
        ("free", target.is_free.to_string()),
    ];

    rows.iter()
        .map(|(name, value)| format!("{:<14}{}", format!("{}:", name), value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn display_resolved_target(target: &ResolvedTarget) {
    println!("{}", style(format!("Resolved {}", target.branch)).bold());
    for line in format_resolved_target(target).lines() {
        println!("  {}", line);
    }
}
