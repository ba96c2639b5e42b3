//! Post-processing of raw model text into a bare, executable command.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // e.g. <function=read_file>{"path": "x"}</function> leaked into text
    static ref FUNCTION_MARKUP: Regex = Regex::new(r"<function=[^>]*>\{[^}]*\}</function>\s*")
        .expect("function markup regex is valid");
}

/// Clean model output into a bare command string.
///
/// Strips a single enclosing code fence, single-line backtick wrapping,
/// leaked function-call markup and a leading `$ ` marker, then prefers
/// the last command-looking line when the model prepended explanations.
/// Idempotent: cleaning already-clean output changes nothing.
pub fn clean_command(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    // Remove code block wrappers
    if text.starts_with("```") && text.ends_with("```") {
        let lines: Vec<&str> = text.split('\n').collect();
        let kept = if lines.len() > 2 {
            &lines[1..lines.len() - 1]
        } else {
            &lines[..]
        };
        text = kept.join("\n").trim().to_string();
    }

    // Remove single-line backtick wrapping
    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') && !text.contains('\n') {
        text = text.trim_matches('`').to_string();
    }

    text = FUNCTION_MARKUP.replace_all(&text, "").trim().to_string();

    // Remove leading "$ " prompt markers
    if let Some(stripped) = text.strip_prefix("$ ") {
        text = stripped.to_string();
    }

    // If multi-line, take the last line that is not a comment-prefixed
    // explanation (the final line always qualifies, comment or not)
    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() > 1 {
        let last = lines.len() - 1;
        if let Some(command) = lines
            .iter()
            .enumerate()
            .filter(|(i, line)| !line.starts_with('#') || *i == last)
            .map(|(_, line)| *line)
            .next_back()
        {
            text = command.to_string();
        }
    }

    text.trim().to_string()
}
