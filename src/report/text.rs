use crate::report::{CeilingSummary, format_f64_6};

pub fn render_report_text(summary: &CeilingSummary) -> String {
    let mut out = String::new();

    out.push_str("Noise Ceiling Extrapolation Report\n");
    out.push_str("==================================\n\n");

    out.push_str("1. Ceiling\n");
    out.push_str(&format!("Identifier: {}\n", summary.identifier));
    out.push_str(&format!(
        "Center: {} (-{} / +{})\n",
        format_f64_6(summary.center),
        format_f64_6(summary.error_low),
        format_f64_6(summary.error_high)
    ));
    match summary.endpoint_x {
        Some(x) => out.push_str(&format!("Extrapolation endpoint: {} subjects\n", format_f64_6(x))),
        None => out.push_str("Extrapolation endpoint: NA\n"),
    }
    out.push_str(&format!("{}\n\n", ceiling_statement(summary.center)));

    out.push_str("2. Fitted growth curve\n");
    out.push_str(&format!(
        "v0 median: {}\ntau0 median: {}\n",
        summary.v0_median.map(format_f64_6).unwrap_or_else(|| "NA".to_string()),
        summary.tau0_median.map(format_f64_6).unwrap_or_else(|| "NA".to_string())
    ));
    out.push_str(&format!("Bootstrap rounds per unit: {}\n\n", summary.num_bootstraps));

    out.push_str("3. Units\n");
    out.push_str(&format!("Units retained: {}\n", summary.n_units));
    out.push_str(&format!("Units skipped: {}\n\n", summary.skips.units));

    out.push_str("4. Skips and caveats\n");
    out.push_str(&format!("Held-out subjects skipped: {}\n", summary.skips.subjects));
    out.push_str(&format!("Subject subsets skipped: {}\n", summary.skips.subsets));
    out.push_str(&format!(
        "Bootstrap rounds without convergence: {}\n",
        summary.skips.bootstrap_rounds
    ));
    if summary.skips.total() > 0 {
        out.push_str("Note: the ceiling rests on fewer samples than requested.\n");
    }

    out
}

fn ceiling_statement(center: f64) -> &'static str {
    if !center.is_finite() {
        "No unit produced a converged extrapolation."
    } else if center >= 0.8 {
        "Measurements are highly consistent across subjects."
    } else if center >= 0.4 {
        "Measurements are moderately consistent across subjects."
    } else {
        "Measurements are weakly consistent across subjects."
    }
}
