//! Prompt construction for the comparison call.
//!
//! One user message carries both documents plus the output contract. The
//! contract pins the exact JSON shape and the closed category and
//! change-type vocabularies so the normalizer can be strict on the way
//! back out.

/// Sanitizes extracted document text for safe inclusion in the prompt.
///
/// Policy PDFs are untrusted input; a crafted document could embed
/// instruction-style delimiter tokens. Breaking the delimiters up keeps
/// the text readable while defusing them.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("```", "` ` `")
}

/// Builds the single comparison prompt from the two prepared text bodies.
pub fn build_prompt(baseline_text: &str, renewal_text: &str) -> String {
    format!(
        "You are comparing two versions of a business insurance policy: the expiring \
         (baseline) policy and its proposed renewal. Identify every factual, observable \
         difference between them. Do not evaluate coverage adequacy and do not give advice; \
         report only what changed.\n\
         \n\
         === BASELINE POLICY ===\n\
         {baseline}\n\
         \n\
         === RENEWAL POLICY ===\n\
         {renewal}\n\
         \n\
         Respond with a single JSON object and nothing else, in this exact shape:\n\
         {{\n\
         \x20 \"summary\": \"one-paragraph factual overview of the changes\",\n\
         \x20 \"coverage_changes\": [\n\
         \x20   {{\n\
         \x20     \"category\": \"coverage_limit | deductible | exclusion | premium | terms_conditions | other\",\n\
         \x20     \"change_type\": \"increased | decreased | added | removed | modified\",\n\
         \x20     \"title\": \"short name of the change\",\n\
         \x20     \"description\": \"what changed, stated factually\",\n\
         \x20     \"baseline_value\": \"value in the baseline policy, as written\",\n\
         \x20     \"renewal_value\": \"value in the renewal policy, as written\",\n\
         \x20     \"change_amount\": \"signed amount, only when both values are numeric\",\n\
         \x20     \"percentage_change\": 0.0,\n\
         \x20     \"confidence\": 0.0,\n\
         \x20     \"page_references\": {{ \"baseline\": [], \"renewal\": [] }}\n\
         \x20   }}\n\
         \x20 ],\n\
         \x20 \"premium_comparison\": {{\n\
         \x20   \"baseline_premium\": null,\n\
         \x20   \"renewal_premium\": null,\n\
         \x20   \"difference\": null,\n\
         \x20   \"percentage_change\": null\n\
         \x20 }},\n\
         \x20 \"broker_questions\": [\"questions the policyholder could ask their broker\"]\n\
         }}\n\
         \n\
         Rules:\n\
         - Use only the category and change_type values listed above.\n\
         - confidence is a number between 0 and 1 for each change.\n\
         - A premium change is increased or decreased, never added or removed.\n\
         - Set a premium amount to null when the document does not state one; never guess.\n\
         - Omit change_amount and percentage_change when either side is non-numeric.",
        baseline = sanitize_for_prompt(baseline_text),
        renewal = sanitize_for_prompt(renewal_text),
    )
}
