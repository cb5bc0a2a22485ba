// Colored terminal output for `chatgate config`.

use colored::Colorize;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Print the effective limits and the installed filter chain.
pub fn display_config(config: &Config, pipeline: &Pipeline) {
    let rl = &config.rate_limit;

    println!("\n{}", "=== Rate limits ===".bold());
    let rows: [(&str, String); 8] = [
        ("Messages per minute", rl.messages_per_minute.to_string()),
        ("Burst warning above", rl.burst_limit.to_string()),
        ("Cooldown", format!("{}s", rl.cooldown.as_secs())),
        ("Requests per window", rl.max_requests_per_window.to_string()),
        ("Window size", format!("{}s", rl.window_size.as_secs())),
        ("Minimum interval", format!("{}s", rl.min_interval.as_secs())),
        ("Block duration", format!("{}s", rl.block_duration.as_secs())),
        ("Max pending", rl.max_pending.to_string()),
    ];
    for (label, value) in rows {
        println!("  {:<22} {}", label.dimmed(), value);
    }

    println!("\n{}", "=== Toxicity ===".bold());
    if config.toxicity_enabled() {
        println!("  {} Perspective API scorer", "enabled".green());
        if !config.languages.is_empty() {
            println!("  {:<22} {}", "Languages".dimmed(), config.languages.join(", "));
        }
        if let Some(guard) = &config.language_guard {
            println!("  {:<22} {}", "Required language".dimmed(), guard.language);
        }
    } else {
        println!(
            "  {} (set PERSPECTIVE_API_KEY to enable)",
            "disabled".yellow()
        );
    }

    println!("\n{}", "=== Filter chain ===".bold());
    for (i, name) in pipeline.filter_names().iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    println!();
}
