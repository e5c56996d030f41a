//! The closed decision vocabulary.
//!
//! The decision model answers with one of four directive strings. They are
//! parsed into [`Decision`] immediately after generation, so later stages
//! never see free text:
//!
//! | Directive                 | Decision                         |
//! |---------------------------|----------------------------------|
//! | `需要澄清`                 | `Clarify`                        |
//! | `无需工具直接回答`          | `AnswerDirect`                   |
//! | `使用工具回答: LAS, SCM`    | `AnswerWithTools{[LAS, SCM]}`    |
//! | `生成结束语`               | `Closing`                        |

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::PipelineError;

pub const CLARIFY_DIRECTIVE: &str = "需要澄清";
pub const ANSWER_DIRECT_DIRECTIVE: &str = "无需工具直接回答";
pub const TOOLS_DIRECTIVE: &str = "使用工具回答";
pub const CLOSING_DIRECTIVE: &str = "生成结束语";

/// Upper bound on tools per request.
pub const MAX_TOOLS_PER_DECISION: usize = 2;

/// The next action chosen for a consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Clarify,
    AnswerDirect,
    /// 1–2 distinct registry keys, in invocation order.
    AnswerWithTools { tool_names: Vec<String> },
    Closing,
}

impl Decision {
    /// The canonical directive string for this decision.
    pub fn directive(&self) -> String {
        match self {
            Decision::Clarify => CLARIFY_DIRECTIVE.to_string(),
            Decision::AnswerDirect => ANSWER_DIRECT_DIRECTIVE.to_string(),
            Decision::AnswerWithTools { tool_names } => {
                format!("{TOOLS_DIRECTIVE}: {}", tool_names.join(", "))
            }
            Decision::Closing => CLOSING_DIRECTIVE.to_string(),
        }
    }

    pub fn tool_names(&self) -> &[String] {
        match self {
            Decision::AnswerWithTools { tool_names } => tool_names,
            _ => &[],
        }
    }

    /// Check the tool invariant against the set of known tool names.
    pub fn validate(&self, known_tools: &[&str]) -> Result<(), PipelineError> {
        let Decision::AnswerWithTools { tool_names } = self else {
            return Ok(());
        };
        if tool_names.is_empty() || tool_names.len() > MAX_TOOLS_PER_DECISION {
            return Err(PipelineError::MalformedDecision { raw: self.directive() });
        }
        for (i, name) in tool_names.iter().enumerate() {
            if tool_names[..i].contains(name) {
                return Err(PipelineError::MalformedDecision { raw: self.directive() });
            }
            if !known_tools.contains(&name.as_str()) {
                return Err(PipelineError::InvalidToolReference { name: name.clone() });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directive())
    }
}

/// Outcome of reading one decision-model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReply {
    /// A well-formed, validated decision.
    Final(Decision),
    /// The model is still reasoning (`Thought:` without a directive).
    Unfinished,
}

const QUOTES: &[char] = &['\'', '"', '`', '“', '”', '‘', '’', '「', '」', '*'];
const NAME_SEPARATORS: &[char] = &[',', '，', '、', ';', '；', '/', '+', '&', ' ', '\t'];
const NAME_BRACKETS: &[char] = &['[', ']', '【', '】', '(', ')', '（', '）', '\'', '"', '`'];

/// Parse a decision-model reply into the closed vocabulary.
///
/// Accepts a `Final Answer:` lead-in, surrounding quotes or backticks,
/// a trailing full stop and full-width separators. Replies that start a
/// reasoning step (`Thought:` / `思考：`) without reaching a directive are
/// reported as [`DecisionReply::Unfinished`]. Anything else is a
/// [`PipelineError::MalformedDecision`]; unknown tool names are
/// [`PipelineError::InvalidToolReference`].
pub fn parse_decision(raw: &str, known_tools: &[&str]) -> Result<DecisionReply, PipelineError> {
    let malformed = || PipelineError::MalformedDecision { raw: raw.to_string() };
    let text = raw.trim();
    if text.is_empty() {
        return Err(malformed());
    }

    if let Some(answer) = final_answer_section(text) {
        let decision = parse_directive(answer, raw)?;
        decision.validate(known_tools)?;
        return Ok(DecisionReply::Final(decision));
    }

    match parse_directive(text, raw) {
        Ok(decision) => {
            decision.validate(known_tools)?;
            Ok(DecisionReply::Final(decision))
        }
        Err(_) if starts_reasoning(text) => {
            // A trailing directive line after the reasoning is accepted as-is.
            let last = text.lines().rev().map(str::trim).find(|l| !l.is_empty());
            match last.map(|l| parse_directive(l, raw)) {
                Some(Ok(decision)) => {
                    decision.validate(known_tools)?;
                    Ok(DecisionReply::Final(decision))
                }
                _ => Ok(DecisionReply::Unfinished),
            }
        }
        Err(err) => Err(err),
    }
}

fn starts_reasoning(text: &str) -> bool {
    let lower = text.trim_start().to_ascii_lowercase();
    lower.starts_with("thought") || lower.starts_with("思考")
}

/// Text following the last `Final Answer` lead-in, if any.
fn final_answer_section(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let idx = lower.rfind("final answer")?;
    let rest = &text[idx + "final answer".len()..];
    let rest = rest.trim_start_matches([':', '：', ' ']);
    let line = rest.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line)
}

fn parse_directive(candidate: &str, raw: &str) -> Result<Decision, PipelineError> {
    let malformed = || PipelineError::MalformedDecision { raw: raw.to_string() };

    let text = candidate
        .trim()
        .trim_matches(QUOTES)
        .trim()
        .trim_end_matches(['。', '.', '！', '!'])
        .trim_matches(QUOTES)
        .trim();

    match text {
        CLARIFY_DIRECTIVE => return Ok(Decision::Clarify),
        ANSWER_DIRECT_DIRECTIVE => return Ok(Decision::AnswerDirect),
        CLOSING_DIRECTIVE => return Ok(Decision::Closing),
        _ => {}
    }

    let rest = text.strip_prefix(TOOLS_DIRECTIVE).ok_or_else(malformed)?;
    let rest = rest.trim_start().trim_start_matches([':', '：']).trim();

    let mut tool_names: Vec<String> = Vec::new();
    for part in rest.split(NAME_SEPARATORS) {
        let name = part.trim().trim_matches(NAME_BRACKETS).trim();
        if name.is_empty() {
            continue;
        }
        let name = name.to_ascii_uppercase();
        if tool_names.contains(&name) {
            return Err(malformed());
        }
        tool_names.push(name);
    }

    if tool_names.is_empty() || tool_names.len() > MAX_TOOLS_PER_DECISION {
        return Err(malformed());
    }
    Ok(Decision::AnswerWithTools { tool_names })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["LAS", "LCP", "LED", "LER", "LTS", "SCM", "WEB"];

    fn final_decision(raw: &str) -> Decision {
        match parse_decision(raw, KNOWN).unwrap() {
            DecisionReply::Final(d) => d,
            DecisionReply::Unfinished => panic!("expected final decision for {raw:?}"),
        }
    }

    #[test]
    fn parses_plain_directives() {
        assert_eq!(final_decision("需要澄清"), Decision::Clarify);
        assert_eq!(final_decision("无需工具直接回答"), Decision::AnswerDirect);
        assert_eq!(final_decision("生成结束语"), Decision::Closing);
    }

    #[test]
    fn parses_quoted_and_punctuated() {
        assert_eq!(final_decision("'需要澄清'"), Decision::Clarify);
        assert_eq!(final_decision("`生成结束语`。"), Decision::Closing);
        assert_eq!(final_decision("“无需工具直接回答”"), Decision::AnswerDirect);
    }

    #[test]
    fn parses_tool_lists() {
        assert_eq!(
            final_decision("使用工具回答: LAS, SCM"),
            Decision::AnswerWithTools { tool_names: vec!["LAS".into(), "SCM".into()] }
        );
        assert_eq!(
            final_decision("'使用工具回答：las、[SCM]'"),
            Decision::AnswerWithTools { tool_names: vec!["LAS".into(), "SCM".into()] }
        );
    }

    #[test]
    fn repeated_tool_names_are_malformed() {
        for raw in ["使用工具回答: LCP, LCP", "使用工具回答: LAS, SCM, LAS", "使用工具回答: las、LAS"] {
            let err = parse_decision(raw, KNOWN).unwrap_err();
            assert!(matches!(err, PipelineError::MalformedDecision { .. }), "{raw}");
        }
    }

    #[test]
    fn final_answer_lead_in() {
        let raw = "Thought: 用户问的是量刑标准，需要法条。\nFinal Answer: 使用工具回答: LAS";
        assert_eq!(
            final_decision(raw),
            Decision::AnswerWithTools { tool_names: vec!["LAS".into()] }
        );
    }

    #[test]
    fn thought_without_directive_is_unfinished() {
        let reply = parse_decision("Thought: 我需要再想一想用户的意图", KNOWN).unwrap();
        assert_eq!(reply, DecisionReply::Unfinished);
    }

    #[test]
    fn thought_with_trailing_directive_is_final() {
        assert_eq!(final_decision("思考：信息不全\n需要澄清"), Decision::Clarify);
    }

    #[test]
    fn free_text_is_malformed() {
        let err = parse_decision("我认为应该先询问用户更多细节", KNOWN).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDecision { .. }));
        assert!(parse_decision("", KNOWN).is_err());
        assert!(parse_decision("使用工具回答:", KNOWN).is_err());
    }

    #[test]
    fn too_many_tools_is_malformed() {
        let err = parse_decision("使用工具回答: LAS, SCM, WEB", KNOWN).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDecision { .. }));
    }

    #[test]
    fn unknown_tool_is_invalid_reference() {
        let err = parse_decision("使用工具回答: LAS, XYZ", KNOWN).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidToolReference { ref name } if name == "XYZ"));
    }

    #[test]
    fn directive_roundtrip() {
        let d = Decision::AnswerWithTools { tool_names: vec!["LAS".into(), "SCM".into()] };
        assert_eq!(d.directive(), "使用工具回答: LAS, SCM");
        assert_eq!(final_decision(&d.directive()), d);
    }

    #[test]
    fn validate_rejects_duplicates_and_empty() {
        let dup = Decision::AnswerWithTools { tool_names: vec!["LAS".into(), "LAS".into()] };
        assert!(dup.validate(KNOWN).is_err());
        let empty = Decision::AnswerWithTools { tool_names: vec![] };
        assert!(empty.validate(KNOWN).is_err());
        assert!(Decision::Clarify.validate(&[]).is_ok());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_name() -> impl Strategy<Value = String> {
            prop_oneof![
                prop::sample::select(KNOWN.to_vec()).prop_map(str::to_string),
                "[A-Z]{3}",
            ]
        }

        fn arb_separator() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec![", ", "，", "、", " ", ","])
        }

        proptest! {
            /// Any accepted tool decision satisfies the 1–2 known, distinct names invariant.
            #[test]
            fn accepted_tool_decisions_hold_invariant(
                names in prop::collection::vec(arb_name(), 0..5),
                sep in arb_separator(),
                colon in prop::sample::select(vec![": ", "：", ":"]),
            ) {
                let raw = format!("{TOOLS_DIRECTIVE}{colon}{}", names.join(sep));
                if let Ok(DecisionReply::Final(decision)) = parse_decision(&raw, KNOWN) {
                    let tools = decision.tool_names();
                    prop_assert!(!tools.is_empty() && tools.len() <= MAX_TOOLS_PER_DECISION);
                    for (i, t) in tools.iter().enumerate() {
                        prop_assert!(KNOWN.contains(&t.as_str()));
                        prop_assert!(!tools[..i].contains(t));
                    }
                }
            }

            /// Arbitrary text never parses into anything outside the vocabulary.
            #[test]
            fn arbitrary_text_is_vocabulary_or_error(raw in "\\PC{0,40}") {
                if let Ok(DecisionReply::Final(decision)) = parse_decision(&raw, KNOWN) {
                    prop_assert!(decision.validate(KNOWN).is_ok());
                }
            }
        }
    }
}
