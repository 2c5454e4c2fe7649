//! Host summary table.

use unicode_width::UnicodeWidthStr;

use super::{Browser, HostEntry};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BRIGHT_GREEN: &str = "\x1b[92m";
const RESET: &str = "\x1b[0m";

/// Rule width used when there is nothing to measure.
const EMPTY_RULE_WIDTH: usize = 55;

fn paint(text: &str, color: &str, colored: bool) -> String {
    if colored {
        format!("{}{}{}", color, text, RESET)
    } else {
        text.to_string()
    }
}

/// Pad to a display width, counting wide characters as two cells.
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() { "-" } else { text }
}

/// Header plus one row per host, columns padded to the widest cell.
///
/// Returns an empty list for an empty page.
pub fn summary_lines(hosts: &[&HostEntry], colored: bool) -> Vec<String> {
    if hosts.is_empty() {
        return Vec::new();
    }

    // name, user, host, group, desc
    let mut widths = [4usize, 4, 4, 5, 4];
    for host in hosts {
        let cells = [&host.name, &host.user, &host.host, &host.group, &host.desc];
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(or_dash(cell).width());
        }
    }
    let index_width = hosts.len().to_string().len();

    let row = |index: &str, cells: [&str; 5]| {
        let mut line = format!(" {}", pad(index, index_width));
        for (cell, width) in cells.iter().zip(widths) {
            line.push_str("  ");
            line.push_str(&pad(cell, width));
        }
        line
    };

    let mut lines = Vec::with_capacity(hosts.len() + 1);
    let header = row("", ["NAME", "USER", "HOST", "GROUP", "DESC"]);
    lines.push(format!("   {}", paint(&header, YELLOW, colored)));
    for (i, host) in hosts.iter().enumerate() {
        let line = row(
            &(i + 1).to_string(),
            [
                or_dash(&host.name),
                or_dash(&host.user),
                or_dash(&host.host),
                or_dash(&host.group),
                or_dash(&host.desc),
            ],
        );
        lines.push(format!(
            "{}{}",
            paint(" **", BRIGHT_GREEN, colored),
            paint(&line, CYAN, colored)
        ));
    }
    lines
}

/// The full host screen: rule, table (or an empty notice), rule, page footer.
pub fn render_screen(browser: &Browser, colored: bool) -> String {
    let page = browser.page_list();
    let plain = summary_lines(&page, false);
    let rule_width = plain
        .iter()
        .map(|l| l.trim_end().width())
        .max()
        .unwrap_or(EMPTY_RULE_WIDTH);
    let rule = paint(&"-".repeat(rule_width), RED, colored);

    let mut out = Vec::new();
    out.push(rule.clone());
    if page.is_empty() {
        out.push(paint("   There are no remote servers.", YELLOW, colored));
    } else {
        out.extend(summary_lines(&page, colored));
    }
    out.push(rule);

    let footer = format!(
        "Page: {}/{}  Total: {}",
        browser.page(),
        browser.page_count(),
        browser.visible().len()
    );
    out.push(format!("{}{}", " ".repeat(7), paint(&footer, YELLOW, colored)));

    // Raw-mode safe line endings.
    out.join("\r\n") + "\r\n"
}

// =============================================================================
// Tests
// =============================================================================
