//! Colored console output for scan reports.

use crate::scanner::{ModuleOutcome, ScanReport};
use crate::types::Result;
use colored::Colorize;

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    json_mode: bool,
}

impl ConsoleOutput {
    /// Colors are toggled globally through `colored::control`.
    pub fn new(json_mode: bool, colors: bool) -> Self {
        if !colors {
            colored::control::set_override(false);
        }
        Self { json_mode }
    }

    pub fn print_banner(&self) {
        if self.json_mode {
            return;
        }

        println!();
        println!("{}", "╔══════════════════════════════════════════════╗".cyan());
        println!(
            "{}",
            format!("║  SYMPROBE v{:<34}║", env!("CARGO_PKG_VERSION")).cyan()
        );
        println!("{}", "║  Symfony web profiler prober                 ║".cyan());
        println!("{}", "╚══════════════════════════════════════════════╝".cyan());
        println!();
    }

    /// Print scan summary, or the whole report in JSON mode.
    pub fn print_summary(&self, report: &ScanReport) -> Result<()> {
        if self.json_mode {
            println!("{}", self.render_json(report)?);
            return Ok(());
        }

        println!();
        println!("{}", "=== Scan Summary ===".bright_cyan());
        println!("  Target:       {}", report.target);
        println!("  Symfony:      {}", report.version);
        if let Some(ref php) = report.php_version {
            println!("  PHP:          {}", php);
        }
        println!("  Environment:  {}", report.environment);
        println!("  Duration:     {:.2}s", report.duration_secs);

        println!();
        for module in &report.modules {
            let status = match module.outcome {
                ModuleOutcome::Completed => "done".green(),
                ModuleOutcome::Skipped { ref required } => {
                    format!("skipped (requires {})", required).dimmed()
                }
                ModuleOutcome::Failed { ref error } => format!("failed: {}", error).red(),
            };
            println!("  {:<18} {}", module.name, status);
        }

        println!();
        println!("  Artifacts:    {}", report.artifacts.len());
        println!("  Routes:       {}", report.routes.len());
        println!("  Variables:    {}", report.env_vars.len());

        if report.credentials.is_empty() {
            println!("  Credentials:  0");
        } else {
            println!(
                "  {}",
                format!("CREDENTIALS FOUND: {}", report.credentials.len())
                    .red()
                    .bold()
            );
            for credential in &report.credentials {
                println!("    |-- {}", credential);
            }
        }

        if let Some(ref dir) = report.output {
            println!("  Saved to:     {}", dir.display().to_string().bright_white());
        }

        if !report.tokens.is_empty() {
            println!("  Tokens:       {}", report.tokens.join(" ").dimmed());
        }
        println!();
        Ok(())
    }

    fn render_json(&self, report: &ScanReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, true)
    }
}
