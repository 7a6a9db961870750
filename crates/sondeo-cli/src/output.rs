//! Human and JSON rendering of gradient-check reports.

use sondeo::gradcheck::GradientCheckReport;
use sondeo::probe::Scenario;

/// Output flags shared by every subcommand.
pub struct Options {
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
}

/// Print one scenario's report in the selected format.
pub fn render(scenario: Scenario, report: &GradientCheckReport, opts: &Options) {
    if opts.json {
        let payload = serde_json::json!({
            "scenario": scenario,
            "report": report,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).expect("report serializes")
        );
        return;
    }

    if opts.quiet {
        return;
    }

    println!(
        "{scenario} probe: ok (output shape {:?}, max |analytic - numeric| = {:e}, tolerance {:e})",
        report.output_shape, report.max_error, report.tolerance
    );

    if opts.verbose {
        for pair in &report.jacobians {
            println!(
                "  input {}: jacobian {}x{} ({} entries), max error {:e}",
                pair.input_index,
                pair.rows,
                pair.cols,
                pair.analytic.len(),
                pair.max_error
            );
        }
    }
}
