//! Prompt templates for the three generation calls

/// Answer synthesis. Abstains only when no part of the context helps.
pub fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an AI assistant answering questions about the project documentation.\n\
         \n\
         If the answer can be inferred from ANY part of the context, answer it.\n\
         Only say \"I don't know\" if NO part of the context contains the answer.\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Answer clearly."
    )
}

/// Self-evaluation. The reply must be a JSON object of 1-5 scores.
pub fn evaluation_prompt(question: &str, context: &str, answer: &str) -> String {
    format!(
        "Score the answer from 1 to 5 on:\n\
         - relevance: does it address the question\n\
         - faithfulness: is every claim supported by the context\n\
         - clarity: is it easy to read\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Answer:\n\
         {answer}\n\
         \n\
         Return JSON only, with integer fields \"relevance\", \"faithfulness\" and \"clarity\"."
    )
}

/// Clarity-only rewrite. Facts stay frozen.
pub fn rewrite_prompt(answer: &str) -> String {
    format!(
        "You are an AI assistant improving clarity only.\n\
         \n\
         Rules:\n\
         - Do NOT add new information\n\
         - Do NOT change facts\n\
         - Improve structure and wording only\n\
         \n\
         Answer:\n\
         {answer}\n\
         \n\
         Rewrite clearly."
    )
}
