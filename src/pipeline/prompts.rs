use crate::markdown::citation_block;

pub(super) fn selection_prompt(question: &str, search_results: &str) -> String {
    format!(
        "You are an expert research analyst. You have been given a user's question and a list \
of search results from ArXiv.
Your task is to identify the single most relevant paper to answer the user's question.
You must extract the title and the PDF URL of that single most relevant paper.

Return the result as a single, clean line of text in the format:
Title: <paper title> | URL: <pdf url>

User's Question: {question}

Search Results:
---
{search_results}
---
"
    )
}

pub(super) fn report_prompt(question: &str, title: &str, url: &str, context: &str) -> String {
    let source = citation_block(title, url);
    format!(
        "You are a scientific research assistant. Your task is to generate a concise, \
well-structured report based on the user's question and the provided context from a research paper.

User's Question: {question}

Retrieved Context from the paper titled \"{title}\":
---
{context}
---

Based ONLY on the context provided, generate a report that directly answers the user's question.
At the end of the report, you MUST include a \"Source\" section with the paper's title and its URL.
Do not add a closing note after the source section.
Format the source section exactly like this:

{source}
"
    )
}
