use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub label: String,
    pub url: String,
}

/// A parsed `Label | URL` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInput {
    pub label: String,
    pub url: String,
}

pub const MAX_LINKS_TEXT: usize = 1000;

/// Parse the newline-delimited links field.
///
/// Each non-blank line is `Label | URL` or `Label - URL`; a bare URL labels
/// itself. URLs carry no spaces, so the separator is the last one on the line.
/// A repeated URL keeps its last label.
pub fn parse_links(text: &str) -> Result<Vec<LinkInput>, String> {
    let mut links: Vec<LinkInput> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (label, url) = match line.rsplit_once('|').or_else(|| line.rsplit_once(" - ")) {
            Some((label, url)) => (label.trim(), url.trim()),
            None => (line, line),
        };

        if !is_web_url(url) {
            return Err(format!("Invalid link on line {}.", index + 1));
        }
        let label = if label.is_empty() { url } else { label };

        match links.iter_mut().find(|l| l.url == url) {
            Some(existing) => existing.label = label.to_string(),
            None => links.push(LinkInput {
                label: label.to_string(),
                url: url.to_string(),
            }),
        }
    }

    Ok(links)
}

fn is_web_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}

/// Render links back into the editable text form.
pub fn format_links(links: &[Link]) -> String {
    links
        .iter()
        .map(|l| format!("{} | {}", l.label, l.url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reconciliation plan keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDiff {
    pub insert: Vec<LinkInput>,
    pub delete: Vec<String>,
    pub relabel: Vec<LinkInput>,
}

impl LinkDiff {
    pub fn between(existing: &[Link], requested: &[LinkInput]) -> Self {
        let current: HashMap<&str, &str> = existing
            .iter()
            .map(|l| (l.url.as_str(), l.label.as_str()))
            .collect();
        let wanted: HashMap<&str, &str> = requested
            .iter()
            .map(|l| (l.url.as_str(), l.label.as_str()))
            .collect();

        let mut diff = LinkDiff::default();
        for link in requested {
            match current.get(link.url.as_str()) {
                None => diff.insert.push(link.clone()),
                Some(label) if *label != link.label => diff.relabel.push(link.clone()),
                Some(_) => {}
            }
        }
        for link in existing {
            if !wanted.contains_key(link.url.as_str()) {
                diff.delete.push(link.url.clone());
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.delete.is_empty() && self.relabel.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(label: &str, url: &str) -> Link {
        Link {
            id: Uuid::new_v4(),
            decision_id: Uuid::nil(),
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    fn input(label: &str, url: &str) -> LinkInput {
        LinkInput {
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn parses_both_separators() {
        let links = parse_links(
            "Incident postmortem | https://example.com/postmortem\nRunbook - https://example.com/run-book",
        )
        .unwrap();
        assert_eq!(
            links,
            vec![
                input("Incident postmortem", "https://example.com/postmortem"),
                input("Runbook", "https://example.com/run-book"),
            ]
        );
    }

    #[test]
    fn label_may_contain_a_dash() {
        let links = parse_links("Q3 - planning - https://example.com/q3").unwrap();
        assert_eq!(links, vec![input("Q3 - planning", "https://example.com/q3")]);
    }

    #[test]
    fn bare_url_labels_itself_and_blank_lines_skip() {
        let links = parse_links("\n  https://example.com/doc  \n\n").unwrap();
        assert_eq!(links, vec![input("https://example.com/doc", "https://example.com/doc")]);
    }

    #[test]
    fn rejects_non_web_urls_with_line_number() {
        let err = parse_links("Ok | https://example.com\nBad | ftp://example.com").unwrap_err();
        assert_eq!(err, "Invalid link on line 2.");
        assert!(parse_links("just some words").is_err());
    }

    #[test]
    fn repeated_url_keeps_last_label() {
        let links = parse_links("A | https://x.io\nB | https://x.io").unwrap();
        assert_eq!(links, vec![input("B", "https://x.io")]);
    }

    #[test]
    fn diff_by_url() {
        let existing = vec![
            stored("Keep", "https://keep.io"),
            stored("Old label", "https://relabel.io"),
            stored("Gone", "https://gone.io"),
        ];
        let requested = vec![
            input("Keep", "https://keep.io"),
            input("New label", "https://relabel.io"),
            input("Fresh", "https://fresh.io"),
        ];
        let diff = LinkDiff::between(&existing, &requested);
        assert_eq!(diff.insert, vec![input("Fresh", "https://fresh.io")]);
        assert_eq!(diff.delete, vec!["https://gone.io".to_string()]);
        assert_eq!(diff.relabel, vec![input("New label", "https://relabel.io")]);
    }

    #[test]
    fn identical_links_diff_empty() {
        let existing = vec![stored("Doc", "https://doc.io")];
        let requested = vec![input("Doc", "https://doc.io")];
        assert!(LinkDiff::between(&existing, &requested).is_empty());
    }
}
