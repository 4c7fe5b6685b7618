use crate::error::Result;
use crate::report::CeilingSummary;

pub fn render_summary_json(summary: &CeilingSummary) -> Result<String> {
    let mut out = serde_json::to_string_pretty(summary)?;
    out.push('\n');
    Ok(out)
}
