use crate::domain::model::{ExtractionOptions, TextChunk};

pub const SYSTEM_PROMPT: &str = "\
You are a senior requirements engineer reviewing project documents such as \
specifications, standards, contracts and design briefs. Extract every distinct, \
verifiable engineering requirement from the text you are given.

Respond with a JSON array only: no prose, no Markdown fences. Each element must be an object with:
- \"id\": a short identifier such as \"R1\"
- \"severity\": one of \"critical\", \"high\", \"medium\", \"low\"
  (critical = life safety or regulatory; high = mandatory \"shall/must\"; \
medium = \"should\"; low = advisory or optional)
- \"category\": a discipline or topic, e.g. Structural, Electrical, Mechanical, \
Fire, Civil, Environmental, Quality, Documentation, Safety
- \"requirement\": the requirement restated as one clear, self-contained sentence
- \"rationale\": why the requirement exists, if the text says or implies it; otherwise \"\"
- \"source\": the clause, section, table or page it came from, if identifiable; otherwise \"\"

Do not invent requirements that are not supported by the text. Merge exact repeats. \
If the text contains no requirements, respond with [].";

/// 每個 chunk 的 user 訊息：專案背景 + 來源 + 文字
pub fn build_user_prompt(chunk: &TextChunk, options: &ExtractionOptions) -> String {
    let mut prompt = String::new();

    if let Some(project) = options.project_name.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!("Project: {}\n", project.trim()));
    }
    if let Some(discipline) = options.discipline.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("Discipline: {}\n", discipline.trim()));
    }
    let focus: Vec<&str> = options
        .focus_areas
        .iter()
        .map(|area| area.trim())
        .filter(|area| !area.is_empty())
        .collect();
    if !focus.is_empty() {
        prompt.push_str(&format!(
            "Give particular attention to these areas: {}\n",
            focus.join(", ")
        ));
    }

    prompt.push_str(&format!("Source document: {}\n", chunk.source));
    if chunk.total > 1 {
        prompt.push_str(&format!(
            "This is part {} of {} of the document.\n",
            chunk.index, chunk.total
        ));
    }

    prompt.push_str("\n<document>\n");
    prompt.push_str(&chunk.text);
    prompt.push_str("\n</document>\n\nReturn the JSON array of requirements now.");
    prompt
}
