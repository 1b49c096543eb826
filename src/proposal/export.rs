//! Document export: plain-text file and print layout.

use std::path::Path;

use super::ProposalDocument;
use crate::config::BrandingConfig;
use crate::intake::ContactRecord;

const PRINT_WIDTH: usize = 72;

/// Write the cleaned document as a UTF-8 text file, replacing any existing one.
pub fn save_text(document: &ProposalDocument, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = document.cleaned();
    text.push('\n');
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), "Proposal saved");
    Ok(())
}

fn strip_inline(line: &str) -> String {
    line.replace("**", "").replace("__", "").replace('`', "")
}

fn underline(text: &str, ch: char) -> String {
    ch.to_string().repeat(text.chars().count().min(PRINT_WIDTH))
}

fn is_table_separator(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Flatten Markdown markers into a paper-friendly layout.
pub fn flatten_markdown(markdown: &str) -> String {
    let mut out = Vec::new();

    for raw in markdown.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if let Some(h) = trimmed.strip_prefix("# ") {
            let h = strip_inline(h).to_uppercase();
            out.push(underline(&h, '='));
            out.push(h.clone());
            out.push(underline(&h, '='));
        } else if let Some(h) = trimmed.strip_prefix("## ") {
            let h = strip_inline(h);
            out.push(h.clone());
            out.push(underline(&h, '-'));
        } else if trimmed.starts_with("###") {
            out.push(strip_inline(trimmed.trim_start_matches('#').trim()));
        } else if trimmed == "---" || trimmed == "***" {
            out.push("─".repeat(PRINT_WIDTH));
        } else if is_table_separator(trimmed) {
            out.push(underline(trimmed, '-'));
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = " ".repeat(line.len() - trimmed.len() + 2);
            out.push(format!("{indent}• {}", strip_inline(item)));
        } else {
            out.push(strip_inline(line));
        }
    }

    out.join("\n")
}

/// Full print layout: heading block, flattened document, branding footer.
pub fn render_for_print(
    document: &ProposalDocument,
    branding: &BrandingConfig,
    contact: Option<&ContactRecord>,
) -> String {
    let mut out = String::new();
    let title = format!("{} | Business Proposal", branding.company);
    out.push_str(&title);
    out.push('\n');
    out.push_str(&underline(&title, '='));
    out.push('\n');
    if let Some(c) = contact {
        out.push_str(&format!("Prepared for: {} ({})\n", c.name(), c.company()));
    }
    out.push_str(&format!(
        "Date: {}\n\n",
        document.generated_at().format("%d %B %Y")
    ));

    out.push_str(&flatten_markdown(&document.cleaned()));
    out.push_str("\n\n");
    out.push_str(&"─".repeat(PRINT_WIDTH));
    out.push('\n');
    out.push_str(&branding.company);
    for contact_line in [&branding.email, &branding.phone, &branding.website] {
        if !contact_line.is_empty() {
            out.push_str(" · ");
            out.push_str(contact_line);
        }
    }
    out.push('\n');
    out
}
