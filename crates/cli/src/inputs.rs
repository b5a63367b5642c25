//! Reading the brief, the context files and prompt overrides from disk.

use std::path::Path;

use anyhow::Context;
use nodes::{Prompt, PromptLibrary};
use tracing::{debug, info};

/// Reads a text file that must not be empty.
pub fn read_text(path: &Path) -> anyhow::Result<String> {
    if !path.is_file() {
        anyhow::bail!("not a readable file: {}", path.display());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if text.trim().is_empty() {
        anyhow::bail!("file is empty: {}", path.display());
    }
    Ok(text)
}

/// Heading a context file is placed under, from its file name:
/// `writing_style-enhanced.md` becomes `WRITING STYLE ENHANCED`.
pub fn context_heading(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the copywriter system prompt from the given context files, each
/// under its own heading, in the order given.
pub fn build_system_prompt(library: &PromptLibrary, context_files: &[impl AsRef<Path>]) -> anyhow::Result<String> {
    let mut sections = Vec::with_capacity(context_files.len());
    for path in context_files {
        let path = path.as_ref();
        let text = read_text(path).context("failed to build system prompt")?;
        debug!(file = %path.display(), chars = text.len(), "context file loaded");
        sections.push(format!("{}:\n{}", context_heading(path), text.trim()));
    }
    let context = sections.join("\n\n");
    Ok(library.render(Prompt::CopywriterSystem, &[("context", context.as_str())]))
}

/// Replaces built-in templates with any `<name>.md` found in `dir`.
///
/// Returns the number of templates overridden.
pub fn load_prompt_overrides(dir: &Path, library: &mut PromptLibrary) -> anyhow::Result<usize> {
    if !dir.is_dir() {
        anyhow::bail!("prompt directory does not exist: {}", dir.display());
    }
    let mut loaded = 0;
    for prompt in Prompt::ALL {
        let path = dir.join(format!("{}.md", prompt.name()));
        if path.is_file() {
            let template = read_text(&path)?;
            library.set(prompt, template);
            debug!(template = prompt.name(), file = %path.display(), "prompt override loaded");
            loaded += 1;
        }
    }
    info!(dir = %dir.display(), overridden = loaded, "prompt overrides loaded");
    Ok(loaded)
}
