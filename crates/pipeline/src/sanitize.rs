//! Cleanup of raw completion text.
//!
//! Reasoning models interleave their scratch work with the answer inside
//! `<think>…</think>` markers, and structured answers often arrive wrapped in
//! a markdown code fence. [`strip_reasoning`] removes the former,
//! [`unwrap_fenced`] the latter, and [`sanitize`] applies both.
//!
//! None of these functions fail, and all of them are idempotent.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex compiles"));

static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex compiles"));

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
        .expect("static regex compiles")
});

/// Removes paired reasoning blocks, collapses the blank-line runs they leave
/// behind, and trims.
///
/// Unpaired markers are ordinary text and are kept.
pub fn strip_reasoning(text: &str) -> String {
    let mut without_blocks = text.to_string();
    // Removing one block can splice a new pair together.
    while REASONING_BLOCK.is_match(&without_blocks) {
        without_blocks = REASONING_BLOCK.replace_all(&without_blocks, "").into_owned();
    }
    BLANK_LINE_RUN
        .replace_all(&without_blocks, "\n\n")
        .trim()
        .to_string()
}

/// Returns the interior of the first fenced code block, or the trimmed input
/// when there is none.
pub fn unwrap_fenced(text: &str) -> String {
    match FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(interior) => interior.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Full cleanup for structured (JSON) responses.
pub fn sanitize(text: &str) -> String {
    unwrap_fenced(&strip_reasoning(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_reasoning_across_lines() {
        let raw = "<think>\nfirst I will\nconsider\n</think>\n\n\n# Headline\n\nBody";
        assert_eq!(strip_reasoning(raw), "# Headline\n\nBody");
    }

    #[test]
    fn reasoning_removal_is_non_greedy() {
        let raw = "<think>a</think>keep<think>b</think> this";
        assert_eq!(strip_reasoning(raw), "keep this");
    }

    #[test]
    fn unpaired_close_marker_is_kept() {
        let raw = "  # Why </think> tags leak\n\nModels emit a closing </think> marker. Keep this.\n";
        assert_eq!(
            sanitize(raw),
            "# Why </think> tags leak\n\nModels emit a closing </think> marker. Keep this."
        );
    }

    #[test]
    fn json_quoting_a_stray_marker_survives() {
        let raw = r#"{"passed": false, "issues": ["stray </think> left in body"]}"#;
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn spliced_markers_are_removed_in_one_call() {
        assert_eq!(strip_reasoning("<thi<think>x</think>nk>y</think>tail"), "tail");
    }

    #[test]
    fn collapses_blank_line_runs() {
        assert_eq!(strip_reasoning("a\n  \n\n \nb"), "a\n\nb");
    }

    #[test]
    fn unwraps_json_fence() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nHope that helps.";
        assert_eq!(unwrap_fenced(raw), "{\"a\": 1}");
    }

    #[test]
    fn unwraps_bare_fence() {
        assert_eq!(unwrap_fenced("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(unwrap_fenced("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn sanitize_handles_reasoning_inside_fence() {
        let raw = "```json\n<think>hmm</think>\n{\"ok\": true}\n```";
        assert_eq!(sanitize(raw), "{\"ok\": true}");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "",
            "plain text",
            "<think>x</think>\n\n\n```json\n{\"a\": 1}\n```",
            "intro\n```\n```json\nx\n```",
            "<thi<think>x</think>nk>y</think>tail",
            "a\n\n\n\nb\n \n c",
            "open <think> never closed\n\n\nend",
            "```md\nline\n\n\nline\n```\n```json\n{}\n```",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }
}
