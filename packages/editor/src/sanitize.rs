//! Paste cleanup for inline-editable regions.
//!
//! Pasted markup keeps its tags but loses script and style elements,
//! comments, and every attribute except `href` on links. `javascript:` links
//! lose their href. Embedding tags (`iframe`, `object`, `embed`) are dropped
//! along with any stray script or style tag left after stripping.

use regex::{Captures, Regex};

/// Upper bound on strip passes. Each pass that changes the text removes at
/// least one match, so real input settles in two or three.
const MAX_STRIP_PASSES: usize = 16;

const DROPPED_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed"];

pub struct PasteSanitizer {
    script: Regex,
    style: Regex,
    comment: Regex,
    tag: Regex,
    href: Regex,
}

impl PasteSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            script: Regex::new(r"(?is)<script\b[^>]*>.*?(?:</script\s*>|\z)")?,
            style: Regex::new(r"(?is)<style\b[^>]*>.*?(?:</style\s*>|\z)")?,
            comment: Regex::new(r"(?s)<!--.*?(?:-->|\z)")?,
            tag: Regex::new(r"(?i)<(/?)([a-z][a-z0-9-]*)\b([^>]*)>")?,
            href: Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)?,
        })
    }

    pub fn sanitize(&self, html: &str) -> String {
        let mut html = html.to_string();

        // Removing one element can splice its neighbours into a new one
        for _ in 0..MAX_STRIP_PASSES {
            let stripped = self.strip_once(&html);
            if stripped == html {
                break;
            }
            html = stripped;
        }

        self.tag
            .replace_all(&html, |caps: &Captures<'_>| self.rewrite_tag(caps))
            .into_owned()
    }

    fn strip_once(&self, html: &str) -> String {
        let html = self.script.replace_all(html, "");
        let html = self.style.replace_all(&html, "").into_owned();
        self.comment.replace_all(&html, "").into_owned()
    }

    fn rewrite_tag(&self, caps: &Captures<'_>) -> String {
        let closing = &caps[1];
        let name = caps[2].to_ascii_lowercase();

        if DROPPED_TAGS.contains(&name.as_str()) {
            return String::new();
        }

        if !closing.is_empty() {
            return format!("</{}>", name);
        }

        if name == "a" {
            if let Some(href) = self.safe_href(&caps[3]) {
                return format!("<a href=\"{}\">", href.replace('"', "&quot;"));
            }
        }

        format!("<{}>", name)
    }

    fn safe_href<'a>(&self, attributes: &'a str) -> Option<&'a str> {
        let caps = self.href.captures(attributes)?;
        let href = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))?
            .as_str();

        let scheme: String = href
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_control())
            .take(11)
            .collect::<String>()
            .to_ascii_lowercase();

        if scheme.starts_with("javascript:") {
            return None;
        }

        Some(href)
    }
}
