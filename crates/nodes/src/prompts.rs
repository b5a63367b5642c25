//! Prompt templates for every stage.
//!
//! Each [`Prompt`] has a built-in template. A [`PromptLibrary`] may override
//! any of them (the CLI loads overrides from `<name>.md` files). Templates use
//! `{name}` placeholders; [`render_template`] substitutes only the keys it is
//! given, in a single pass, so JSON braces in a template and braces inside
//! substituted values are left alone.

use std::collections::HashMap;

use serde::Serialize;

/// Every template the pipeline renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    CopywriterSystem,
    ExtractSystem,
    ExtractUser,
    ScoreSystem,
    ScoreUser,
    SelectSystem,
    SelectUser,
    SynthesizeSystem,
    SynthesizeUser,
    ValidateSystem,
    ValidateUser,
}

impl Prompt {
    pub const ALL: [Prompt; 11] = [
        Prompt::CopywriterSystem,
        Prompt::ExtractSystem,
        Prompt::ExtractUser,
        Prompt::ScoreSystem,
        Prompt::ScoreUser,
        Prompt::SelectSystem,
        Prompt::SelectUser,
        Prompt::SynthesizeSystem,
        Prompt::SynthesizeUser,
        Prompt::ValidateSystem,
        Prompt::ValidateUser,
    ];

    /// File stem used for overrides.
    pub fn name(self) -> &'static str {
        match self {
            Prompt::CopywriterSystem => "copywriter_system",
            Prompt::ExtractSystem => "extract_system",
            Prompt::ExtractUser => "extract_user",
            Prompt::ScoreSystem => "score_system",
            Prompt::ScoreUser => "score_user",
            Prompt::SelectSystem => "select_system",
            Prompt::SelectUser => "select_user",
            Prompt::SynthesizeSystem => "synthesize_system",
            Prompt::SynthesizeUser => "synthesize_user",
            Prompt::ValidateSystem => "validate_system",
            Prompt::ValidateUser => "validate_user",
        }
    }

    pub fn builtin(self) -> &'static str {
        match self {
            Prompt::CopywriterSystem => COPYWRITER_SYSTEM,
            Prompt::ExtractSystem => EXTRACT_SYSTEM,
            Prompt::ExtractUser => EXTRACT_USER,
            Prompt::ScoreSystem => SCORE_SYSTEM,
            Prompt::ScoreUser => SCORE_USER,
            Prompt::SelectSystem => SELECT_SYSTEM,
            Prompt::SelectUser => SELECT_USER,
            Prompt::SynthesizeSystem => SYNTHESIZE_SYSTEM,
            Prompt::SynthesizeUser => SYNTHESIZE_USER,
            Prompt::ValidateSystem => VALIDATE_SYSTEM,
            Prompt::ValidateUser => VALIDATE_USER,
        }
    }
}

/// Built-in templates plus any overrides.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    overrides: HashMap<Prompt, String>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the template for `prompt`.
    pub fn set(&mut self, prompt: Prompt, template: impl Into<String>) {
        self.overrides.insert(prompt, template.into());
    }

    pub fn is_overridden(&self, prompt: Prompt) -> bool {
        self.overrides.contains_key(&prompt)
    }

    pub fn template(&self, prompt: Prompt) -> &str {
        self.overrides
            .get(&prompt)
            .map(String::as_str)
            .unwrap_or_else(|| prompt.builtin())
    }

    pub fn render(&self, prompt: Prompt, vars: &[(&str, &str)]) -> String {
        render_template(self.template(prompt), vars)
    }
}

/// Substitutes `{key}` for each `(key, value)` in `vars`.
///
/// Unknown placeholders and unmatched braces are copied through unchanged.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        let substituted = after_open.find('}').and_then(|close| {
            let key = &after_open[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after_open[close + 1..];
            }
            None => {
                out.push('{');
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Pretty JSON for embedding a record in a prompt.
pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

// ---------------------------------------------------------------------------
// Built-in templates
// ---------------------------------------------------------------------------

const COPYWRITER_SYSTEM: &str = r#"You are a skilled marketing copywriter. You write engaging blog articles that follow the style guide and draw on the context below.

{context}

When writing, always:
1. Follow the style guidance precisely.
2. Weave the company context in naturally.
3. Use the market research where it strengthens an argument.
4. Keep an engaging, conversational tone that educates while it excites.
5. Speak directly to professionals and hobbyists alike, without corporate jargon."#;

const EXTRACT_SYSTEM: &str = r#"You are a content analysis agent. Extract the essential elements of a marketing blog article into a structured record.

Respond with ONLY a valid JSON object. No markdown, no explanation, no preamble.

## Output Schema

{
  "article_id": <integer>,
  "headline_candidates": ["<the article's headline>", "<an alternative or subheading that could serve as the main headline>"],
  "opening_hook": "<the first 2-3 sentences, verbatim>",
  "core_argument": "<2-3 sentences summarizing the central thesis or value proposition>",
  "key_points": ["<supporting point>", "... up to 5"],
  "memorable_phrases": ["<verbatim quote of a well-written phrase or sentence>", "... up to 5"],
  "structural_approach": "<how the article is organized, e.g. 'Problem-Solution-CTA', 'Listicle', 'Story-driven'>",
  "evidence_used": ["<kind of evidence: statistic, case study, expert quote, analogy, ...>"],
  "tone": "<1-3 words>",
  "target_audience_signals": "<who the article seems written for and what it assumes about them>",
  "weaknesses": ["<specific weakness, e.g. 'opening is generic', 'no concrete examples'>"],
  "word_count_estimate": <integer>
}

## Rules
- Extract what IS there; do not invent or improve.
- Copy memorable_phrases VERBATIM from the article.
- Be specific about weaknesses; note anything the article lacks."#;

const EXTRACT_USER: &str = r#"Extract the article card for Article #{article_id}.

<article>
{article}
</article>

Respond with only the JSON object."#;

const SCORE_SYSTEM: &str = r#"You are a content quality evaluator. You will receive an article card (a structured summary of a blog article) and a set of scoring criteria.

Score the article on each criterion from 1 to 10 and justify each score briefly.

Respond with ONLY a valid JSON object. No markdown, no explanation.

## Scoring Guidelines
- 1-3: poor, or missing entirely
- 4-5: below average, present but weak
- 6-7: acceptable
- 8-9: strong, few improvements needed
- 10: exceptional

Be discriminating. If everything lands on 7-8 you are not being critical enough. Reserve 9-10 for genuinely standout work.

## Output Schema

{
  "article_id": <integer>,
  "scores": {
    "<criterion_name>": {"score": <integer 1-10>, "justification": "<1-2 sentences>"}
  },
  "standout_strengths": ["<what this article does notably well>"],
  "critical_weaknesses": ["<what would need fixing>"]
}"#;

const SCORE_USER: &str = r#"Score the following article card against the criteria.

## Article Card
{card}

## Scoring Criteria
{criteria}

Respond with only the JSON object."#;

const SELECT_SYSTEM: &str = r#"You are a content strategy agent. You will receive summaries and scores for several drafts on the same topic.

Build a synthesis blueprint: a plan for combining the best elements of the drafts into one superior article.

Respond with ONLY a valid JSON object.

## Selection Principles
- Do not just pick the highest-scoring draft. Recombine strengths.
- A draft scoring 6 overall may still own the single best headline or phrase.
- Look for complementary strengths: one draft's hook, another's structure, a third's evidence.
- Flag combinations that might contradict each other.
- Record, for every selection, the article_id it came from.

## Output Schema

{
  "synthesis_blueprint": {
    "selected_headline": {"source_article": <article_id>, "headline": "<headline>", "rationale": "<why>"},
    "selected_opening": {"source_article": <article_id>, "approach": "<opening approach>", "key_elements": ["<element to keep>"], "rationale": "<why>"},
    "selected_structure": {"source_article": <article_id>, "structure_type": "<e.g. Problem-Solution-CTA>", "section_flow": ["<section>"], "rationale": "<why>"},
    "selected_arguments": {
      "primary_source": <article_id>,
      "core_thesis": "<main argument>",
      "supporting_points": [{"point": "<point>", "source_article": <article_id>}],
      "rationale": "<why>"
    },
    "selected_evidence": [{"evidence": "<statistic, example or proof point>", "source_article": <article_id>, "where_to_use": "<section>"}],
    "phrases_to_preserve": [{"phrase": "<verbatim phrase>", "source_article": <article_id>, "suggested_placement": "<where>"}],
    "elements_to_avoid": ["<weakness not to carry over>"],
    "synthesis_notes": "<guidance on tone, length or approach>"
  },
  "confidence": {"level": "<high|medium|low>", "concerns": ["<concern about combining these elements>"]}
}"#;

const SELECT_USER: &str = r#"Analyze these {count} drafts and create a synthesis blueprint.

## Draft Summaries and Scores
{summaries}

Respond with only the JSON object."#;

const SYNTHESIZE_SYSTEM: &str = r#"You are a professional content writer. You will receive a synthesis blueprint specifying exactly which elements a marketing blog article must contain.

Write one cohesive, polished article that incorporates every specified element naturally.

## Brand Guidelines
{brand_guidelines}

## Target Length
Approximately {target_word_count} words.

## Writing Instructions
1. Use the specified headline exactly as given.
2. Follow the specified section flow as your outline.
3. Make the core thesis the article's argument.
4. Place the supporting points in the appropriate sections.
5. Include the selected evidence where specified.
6. Work the memorable phrases in VERBATIM.
7. Avoid every listed weakness.

## Rules
- Do not invent arguments or evidence that are not in the blueprint.
- Do not change the core thesis.
- Transitions should feel natural and the tone consistent throughout.

## Output Format
Return ONLY the article, starting with the headline:

# [Headline]

[Body with natural paragraph breaks]"#;

const SYNTHESIZE_USER: &str = r#"Write a marketing blog article following this synthesis blueprint.

## Original Brief
{brief}

## Synthesis Blueprint
{blueprint}

Write the complete article now. Start directly with the headline."#;

const VALIDATE_SYSTEM: &str = r#"You are a content quality assurance agent. You will receive a synthesized article, the blueprint it was meant to follow, and a quality threshold.

Verify the article against the blueprint and the threshold, and identify concrete issues.

Respond with ONLY a valid JSON object.

## Checks
1. Blueprint compliance: headline used, structure followed, core argument present, supporting points and evidence included, memorable phrases preserved verbatim, listed weaknesses avoided.
2. Quality: score the article on the same criteria used for the source drafts and compare the overall score to the threshold.
3. Coherence: natural flow, smooth transitions, consistent tone, reads as one piece rather than stitched fragments.

## Output Schema

{
  "passed": <boolean>,
  "blueprint_compliance": {
    "headline_used": <boolean>,
    "structure_followed": <boolean>,
    "core_argument_present": <boolean>,
    "supporting_points_included": <float 0-1>,
    "evidence_included": <float 0-1>,
    "phrases_preserved": <float 0-1>,
    "weaknesses_avoided": <boolean>,
    "compliance_score": <float 0-1>
  },
  "quality_scores": {
    "<criterion_name>": <integer 1-10>,
    "overall": <float>
  },
  "coherence_assessment": {
    "flow_natural": <boolean>,
    "transitions_smooth": <boolean>,
    "tone_consistent": <boolean>,
    "feels_unified": <boolean>
  },
  "issues": ["<specific issue>"],
  "improvement_suggestions": ["<specific suggestion>"],
  "target_threshold": {target_threshold},
  "threshold_met": <boolean>
}

## Scoring Criteria
{criteria}"#;

const VALIDATE_USER: &str = r#"Validate this synthesized article against its blueprint.

## Synthesized Article
{article}

## Blueprint It Should Follow
{blueprint}

## Target Quality Threshold
The article should reach an overall score of at least {target_threshold}.

Respond with the validation JSON."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_keys_only() {
        let out = render_template(
            "{\"id\": {id}, \"keep\": {other}}",
            &[("id", "7")],
        );
        assert_eq!(out, "{\"id\": 7, \"keep\": {other}}");
    }

    #[test]
    fn does_not_expand_placeholders_inside_values() {
        let out = render_template("A={a} B={b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "A={b} B=x");
    }

    #[test]
    fn unmatched_brace_is_copied() {
        assert_eq!(render_template("tail {", &[("x", "y")]), "tail {");
        assert_eq!(render_template("{x", &[("x", "y")]), "{x");
    }

    #[test]
    fn overrides_replace_builtins() {
        let mut library = PromptLibrary::new();
        assert!(!library.is_overridden(Prompt::ExtractUser));
        library.set(Prompt::ExtractUser, "card for {article_id}");
        assert_eq!(
            library.render(Prompt::ExtractUser, &[("article_id", "3")]),
            "card for 3"
        );
        assert_eq!(library.template(Prompt::ScoreUser), Prompt::ScoreUser.builtin());
    }

    #[test]
    fn builtin_user_prompts_carry_their_placeholders() {
        let extract = Prompt::ExtractUser.builtin();
        assert!(extract.contains("{article_id}") && extract.contains("{article}"));
        let validate = Prompt::ValidateSystem.builtin();
        assert!(validate.contains("{target_threshold}") && validate.contains("{criteria}"));
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = Prompt::ALL.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Prompt::ALL.len());
    }
}
