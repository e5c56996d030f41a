//! Output sanitizer: strip leaked internal phrasing from the reply.
//!
//! Three passes, in order:
//!
//! 1. remove at most one leading leakage prefix ("根据协调员的指令，" ...)
//!    plus the punctuation that follows it
//! 2. scrub internal markup (tool tags, tool ids, the words 协调员 / 指令)
//!    until nothing changes
//! 3. recover with a fixed sentence if nothing is left, if the text still
//!    opens with a leakage prefix, or if all that is left is a bare
//!    decision directive
//!
//! The result is idempotent: sanitizing a sanitized reply returns it as is.

use regex_lite::Regex;
use tracing::{debug, warn};
use zhifa_core::consultation::FinalReply;
use zhifa_core::decision::{ANSWER_DIRECT_DIRECTIVE, CLARIFY_DIRECTIVE, CLOSING_DIRECTIVE, TOOLS_DIRECTIVE};

/// Leakage prefixes, longest first.
const LEAKAGE_PREFIXES: &[&str] = &[
    "作为法律回复整合与生成专员",
    "作为法律执行与整合者",
    "作为法律工具执行专员",
    "好的，根据协调员的指令",
    "根据协调员的决策指令",
    "根据协调员的指令",
    "针对用户的问题",
    "协调员的指令是",
    "Final Answer:",
    "协调员指令",
    "根据指令",
    "按照指令",
    "收到指令",
    "最终回复",
    "最终答案",
    "针对您的问题",
    "关于您的问题",
];

const MARKER_WORDS: &str = "协调员|指令";

/// Hints in the raw text that the model meant to ask for more facts.
const CLARIFY_HINTS: &[&str] = &["澄清", "补充", "更多信息", "详细说明", "请提供"];

const CLARIFY_FALLBACK: &str =
    "为了更准确地分析您的问题，请补充相关的具体情况，例如涉及的当事人、事情经过以及您希望达到的目标。";
const GENERIC_FALLBACK: &str = "请提供更多细节，以便我更好地为您解答您的法律问题。";

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '，' | ':' | '：' | '。' | '.' | '、' | ';' | '；' | '!' | '！' | '-')
}

/// Strips leakage from replies; built once per tool registry.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    /// Pattern and its replacement, applied in order.
    patterns: Vec<(Regex, &'static str)>,
}

impl Sanitizer {
    /// Build a sanitizer that also scrubs the given tool ids.
    pub fn new<I, S>(tool_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = tool_ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| regex_lite::escape(&id))
            .collect();

        let mut sources = vec![(r"<[^<>]*?status\s*=[^<>]*>?".to_string(), "")];
        if !ids.is_empty() {
            let alternation = ids.join("|");
            sources.push((format!(r"</\s*(?:{alternation})\s*>"), ""));
            // Ids count only when not glued to other ASCII word characters.
            sources.push((
                format!(r"(^|[^A-Za-z0-9_])[\(（【\[]?\s*(?:{alternation})\s*[\)）】\]]?([^A-Za-z0-9_]|$)"),
                "${1}${2}",
            ));
        }
        sources.push((MARKER_WORDS.to_string(), ""));

        let patterns = sources
            .into_iter()
            .filter_map(|(src, replacement)| match Regex::new(&src) {
                Ok(re) => Some((re, replacement)),
                Err(e) => {
                    warn!(pattern = %src, error = %e, "Skipping invalid sanitizer pattern");
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn sanitize(&self, raw: &str) -> FinalReply {
        let stripped = strip_leakage_prefix(raw.trim());
        let cleaned = self.scrub(stripped);

        if cleaned.is_empty() || starts_with_leakage(&cleaned) || is_bare_directive(&cleaned) {
            debug!(raw_chars = raw.chars().count(), "Reply unusable after sanitizing, using fallback");
            return FinalReply::new(fallback_for(raw));
        }
        FinalReply::new(cleaned)
    }

    /// Remove internal markup until a fixed point is reached.
    fn scrub(&self, text: &str) -> String {
        let mut current = text.trim().to_string();
        loop {
            let mut next = current.clone();
            for (re, replacement) in &self.patterns {
                next = re.replace_all(&next, *replacement).into_owned();
            }
            let next = next.trim().to_string();
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

fn strip_leakage_prefix(text: &str) -> &str {
    match LEAKAGE_PREFIXES.iter().find(|p| text.starts_with(*p)) {
        Some(prefix) => text[prefix.len()..].trim_start_matches(is_separator),
        None => text,
    }
}

fn starts_with_leakage(text: &str) -> bool {
    LEAKAGE_PREFIXES.iter().any(|p| text.starts_with(p))
}

fn is_bare_directive(text: &str) -> bool {
    let text = text.trim_matches(|c: char| is_separator(c) || matches!(c, '\'' | '"' | '`' | '“' | '”'));
    [CLARIFY_DIRECTIVE, ANSWER_DIRECT_DIRECTIVE, CLOSING_DIRECTIVE].contains(&text)
        || text.starts_with(TOOLS_DIRECTIVE)
}

fn fallback_for(raw: &str) -> &'static str {
    if CLARIFY_HINTS.iter().any(|hint| raw.contains(hint)) {
        CLARIFY_FALLBACK
    } else {
        GENERIC_FALLBACK
    }
}
