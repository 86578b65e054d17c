//! Startup banner for the operator terminal.
//!
//! Uses the `console` crate for proper text styling and width calculation.

use console::{measure_text_width, pad_str, style, Alignment};

use crate::state::Reachability;
use crate::tunnel::AddressScope;

/// Box width (inner content width, excluding borders)
const BOX_WIDTH: usize = 58;

fn top_border() -> String {
    format!("╔{}╗\n", "═".repeat(BOX_WIDTH + 2))
}

fn middle_border() -> String {
    format!("╠{}╣\n", "═".repeat(BOX_WIDTH + 2))
}

fn bottom_border() -> String {
    format!("╚{}╝\n", "═".repeat(BOX_WIDTH + 2))
}

/// Create a content line with proper padding using console's pad_str
fn content_line(text: &str) -> String {
    let padded = pad_str(text, BOX_WIDTH, Alignment::Left, None);
    format!("║ {} ║\n", padded)
}

fn centered_line(text: &str) -> String {
    let padded = pad_str(text, BOX_WIDTH, Alignment::Center, None);
    format!("║ {} ║\n", padded)
}

fn empty_line() -> String {
    content_line("")
}

/// Truncate text so it fits inside the box
fn fit(text: &str) -> String {
    if measure_text_width(text) > BOX_WIDTH - 2 {
        let truncated: String = text.chars().take(BOX_WIDTH - 5).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

fn scope_label(scope: &AddressScope) -> &'static str {
    match scope {
        AddressScope::Loopback => "loopback",
        AddressScope::LinkLocal => "link-local",
        AddressScope::PrivateLan => "LAN",
        AddressScope::VpnOverlay => "overlay",
        AddressScope::Other => "other",
    }
}

/// Create the startup box describing how to reach the gateway
pub fn reachability_banner(port: u16, reachability: &Reachability) -> String {
    let title = format!("{} GATEWAY READY", style("✓").green());

    let local_url = format!("http://localhost:{}", port);
    let local_line = format!("Local:  {}", style(&local_url).cyan().underlined());

    let mut output = String::new();
    output.push('\n');
    output.push_str(&top_border());
    output.push_str(&centered_line(&title));
    output.push_str(&middle_border());
    output.push_str(&empty_line());
    output.push_str(&content_line(&local_line));
    output.push_str(&empty_line());

    match reachability {
        Reachability::Probing => {
            output.push_str(&content_line("Public route is still being probed..."));
        }
        Reachability::Tunneled { provider, url } => {
            let head = format!("Public, via {}:", provider);
            output.push_str(&content_line(&head));
            let url_line = format!(
                "{} {}",
                style("➜").cyan(),
                style(&fit(url)).cyan().underlined()
            );
            output.push_str(&content_line(&url_line));
        }
        Reachability::LanOnly { candidates } if candidates.is_empty() => {
            output.push_str(&content_line("No tunnel and no routable interface found."));
        }
        Reachability::LanOnly { candidates } => {
            output.push_str(&content_line("No tunnel; reachable on the local network:"));
            for candidate in candidates {
                let url = format!("http://{}:{}", candidate.address, port);
                let tag = format!("({})", scope_label(&candidate.scope));
                let line = format!(
                    "{} {}  {}",
                    style("➜").cyan(),
                    style(&fit(&url)).cyan().underlined(),
                    style(&tag).dim()
                );
                output.push_str(&content_line(&line));
            }
        }
    }

    output.push_str(&empty_line());
    output.push_str(&bottom_border());
    output.push('\n');

    output
}
