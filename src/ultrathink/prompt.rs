//! Prompt construction for the reasoning strategies.

use std::fmt::Write as _;

use crate::util::format::{collapse_whitespace, truncate_chars};

use super::models::ReasoningRequest;

/// Characters of a reasoning trace or critique kept in a summary.
pub const SUMMARY_CHARS: usize = 500;

/// Characters of each search snippet included in a prompt.
const SNIPPET_CHARS: usize = 300;

/// At most this many search results are quoted.
const MAX_SNIPPETS: usize = 5;

pub const SYSTEM_PROMPT: &str = "You are a senior software engineer settling a disagreement between \
an implementer and a reviewer. Produce one concrete, actionable implementation proposal that \
resolves every listed concern. Prefer the simplest design that is correct.";

pub const CRITIC_SYSTEM_PROMPT: &str = "You are a meticulous code reviewer. Critique proposals \
honestly and specifically. Do not rewrite the proposal; list its problems.";

/// Render the task, concerns and grounding material as the user turn.
#[must_use]
pub fn build_prompt(request: &ReasoningRequest) -> String {
    let mut prompt = format!("## Task\n{}\n", request.title.trim());

    let description = request.description.trim();
    if !description.is_empty() {
        let _ = write!(prompt, "\n{description}\n");
    }

    if !request.concerns.is_empty() {
        prompt.push_str("\n## Reviewer concerns\n");
        for (i, concern) in request.concerns.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, concern.trim());
        }
    }

    if !request.search_results.is_empty() {
        prompt.push_str("\n## Reference material\n");
        for hit in request.search_results.iter().take(MAX_SNIPPETS) {
            let snippet = truncate_chars(&collapse_whitespace(&hit.snippet), SNIPPET_CHARS);
            let _ = writeln!(prompt, "- {} ({})\n  {snippet}", hit.title.trim(), hit.url);
        }
    }

    prompt.push_str(
        "\n## Instructions\nPropose a single implementation approach. Address each concern \
         explicitly and state the trade-offs you accepted.\n",
    );
    prompt
}

/// Second reflection turn: ask for a critique of `proposal`.
#[must_use]
pub fn critique_prompt(request: &ReasoningRequest, proposal: &str) -> String {
    format!(
        "## Task\n{}\n\n## Proposal\n{}\n\n## Instructions\nCritique this proposal. Look \
         specifically for:\n- edge cases it misses\n- security issues\n- performance issues\n\
         - maintainability issues\n- better alternatives\nBe concrete and brief.\n",
        request.title.trim(),
        proposal.trim()
    )
}

/// Third reflection turn: refine `proposal` using `critique`.
#[must_use]
pub fn refine_prompt(request: &ReasoningRequest, proposal: &str, critique: &str) -> String {
    format!(
        "{}\n## Draft proposal\n{}\n\n## Critique\n{}\n\n## Instructions\nRewrite the draft \
         into a final proposal that fixes every valid point in the critique. Output only the \
         final proposal.\n",
        build_prompt(request),
        proposal.trim(),
        critique.trim()
    )
}

/// Single-line summary of a long trace.
#[must_use]
pub fn summarize(text: &str, max_chars: usize) -> String {
    truncate_chars(&collapse_whitespace(text), max_chars)
}
