use clap::ValueEnum;
use issue_scout::{Orchestrator, RateLimitResource, RateLimitResponse};

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Handle the limits command.
pub(crate) async fn handle_limits(
    orchestrator: &Orchestrator,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let limits = orchestrator.rate_limits().await?;
    let items = rate_limits_to_display(&limits);
    println!("{}", RateLimitDisplay::render(items, output)?);
    Ok(())
}

/// Rate limit information for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
}

impl RateLimitDisplay {
    pub(crate) fn from_resource(name: &str, resource: &RateLimitResource) -> Self {
        let usage_percent = if resource.limit > 0 {
            (resource.used as f64 / resource.limit as f64) * 100.0
        } else {
            0.0
        };
        let reset_at = resource.reset_at();
        let reset_duration = reset_at.signed_duration_since(chrono::Utc::now());
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };

        Self {
            resource: name.to_string(),
            limit: resource.limit.to_string(),
            used: resource.used.to_string(),
            remaining: resource.remaining.to_string(),
            usage_percent: format!("{:.1}%", usage_percent),
            reset_at: reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
        }
    }

    pub(crate) fn render(
        mut items: Vec<Self>,
        format: OutputFormat,
    ) -> Result<String, serde_json::Error> {
        // Sort by resource name for consistent output
        items.sort_by(|a, b| a.resource.cmp(&b.resource));

        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(items);
                table.with(tabled::settings::Style::rounded());
                Ok(table.to_string())
            }
            OutputFormat::Json => serde_json::to_string_pretty(&items),
        }
    }
}

/// Build display rows for every resource the API reported.
pub(crate) fn rate_limits_to_display(limits: &RateLimitResponse) -> Vec<RateLimitDisplay> {
    limits
        .resources
        .entries()
        .iter()
        .map(|(name, resource)| RateLimitDisplay::from_resource(name, resource))
        .collect()
}

/// Format a duration in a human-readable way.
pub(crate) fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issue_scout::github::parse_rate_limit_response;

    fn sample_resource(limit: u64, used: u64, remaining: u64, reset: i64) -> RateLimitResource {
        RateLimitResource {
            limit,
            used,
            remaining,
            reset,
        }
    }

    #[test]
    fn output_format_default_is_table() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn format_duration_handles_seconds_minutes_and_hours() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::seconds(120)), "2m");
        assert_eq!(format_duration(chrono::Duration::seconds(125)), "2m 5s");
        assert_eq!(format_duration(chrono::Duration::seconds(3600)), "1h");
        assert_eq!(format_duration(chrono::Duration::seconds(3900)), "1h 5m");
    }

    #[test]
    fn rate_limits_to_display_includes_reported_resources() {
        let body = br#"{
            "resources": {
                "core": {"limit": 5000, "used": 1000, "remaining": 4000, "reset": 2000000000},
                "search": {"limit": 30, "used": 5, "remaining": 25, "reset": 2000000000},
                "graphql": {"limit": 5000, "used": 50, "remaining": 4950, "reset": 2000000000}
            },
            "rate": {"limit": 5000, "used": 1000, "remaining": 4000, "reset": 2000000000}
        }"#;
        let limits = parse_rate_limit_response(body).unwrap();

        let display = rate_limits_to_display(&limits);
        let names: Vec<_> = display.iter().map(|d| d.resource.as_str()).collect();

        assert!(names.contains(&"core"));
        assert!(names.contains(&"search"));
        assert!(names.contains(&"graphql"));
        assert!(!names.contains(&"code_search"));
    }

    #[test]
    fn rate_limit_display_from_resource_formats_percent_and_reset() {
        let resource = sample_resource(100, 25, 75, 2_000_000_000);
        let display = RateLimitDisplay::from_resource("core", &resource);

        assert_eq!(display.resource, "core");
        assert_eq!(display.limit, "100");
        assert_eq!(display.used, "25");
        assert_eq!(display.remaining, "75");
        assert_eq!(display.usage_percent, "25.0%");
        assert!(display.reset_at.contains("UTC"));
    }

    #[test]
    fn past_reset_reads_as_now() {
        let display = RateLimitDisplay::from_resource("core", &sample_resource(60, 60, 0, 0));
        assert_eq!(display.reset_in, "now");
        assert_eq!(display.usage_percent, "100.0%");
    }

    #[test]
    fn render_supports_json_and_table() {
        let items = vec![
            RateLimitDisplay::from_resource("zeta", &sample_resource(100, 10, 90, 2_000_000_000)),
            RateLimitDisplay::from_resource("alpha", &sample_resource(30, 0, 30, 2_000_000_000)),
        ];

        let json = RateLimitDisplay::render(items.clone(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["resource"], "alpha");
        assert_eq!(parsed[1]["remaining"], "90");

        let table = RateLimitDisplay::render(items, OutputFormat::Table).unwrap();
        assert!(table.contains("Remaining"));
        assert!(table.find("alpha") < table.find("zeta"));
    }
}
