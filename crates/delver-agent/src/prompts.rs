//! Prompt templates for each node.

use delver_llm::PromptTemplate;

pub const CLASSIFY: PromptTemplate = PromptTemplate::new(
    "classify",
    r#"You are Delver, an AI research assistant.
Classify the user's query into exactly one of three categories:
- 'research': a new request that needs external research.
- 'follow-up': a direct continuation of an earlier research discussion.
- 'general': casual chat or a question that needs no research.

Use the chat summary to decide whether the query continues a past research discussion.

Return only a single word: research, follow-up, or general. No explanation.

User query: {query}
Chat summary: {chat_summary}
"#,
);

pub const PLANNER: PromptTemplate = PromptTemplate::new(
    "planner",
    r#"Chat summary: {chat_summary}
User query: {query}

Generate exactly five search queries that will retrieve relevant, high-quality information from the web.
The queries should expand on different aspects of the topic so that together they give a complete research scope.

Guidelines:
- Cover different perspectives; avoid redundant or near-identical queries.
- Prefer precise wording that surfaces reputable sources.

Return a list literal of the five queries as strings, for example ["first query", "second query", ...], with no other text.
"#,
);

pub const RERANK: PromptTemplate = PromptTemplate::new(
    "rerank",
    r#"You are an AI research assistant filtering and reranking search results.
Judge each result's relevance to the user's query, using the chat summary as context.

Chat summary:
{chat_summary}

User query:
{query}

Search results (JSON, one batch per search query):
{documents}

Instructions:
1. Drop irrelevant, duplicate, or low-quality results.
2. Rank the remaining results by relevance to the query.
3. Answer strictly as a JSON array in this shape:

[
    {{
        "rank": 1,
        "title": "Document title",
        "url": "https://example.com",
        "summary": "Why this document is relevant."
    }}
]

Return only the JSON array, with no additional text.
"#,
);

pub const FORMULATE: PromptTemplate = PromptTemplate::new(
    "formulate",
    r#"You are an AI research assistant. Write a comprehensive research report that answers the user's query using the most relevant information from the extracted documents.
If the user has stated preferences for structure or format, follow them.
Otherwise use this structure:

## Research Report
### 1. Introduction
- Overview of the topic; define key terms where needed.
### 2. Background & Context
- Background, history, key developments or trends.
### 3. Key Insights & Findings
- The most important facts, statistics and arguments, including differing perspectives.
### 4. Analysis & Discussion
- In-depth analysis; compare viewpoints; note contradictions and limitations of the sources.
### 5. Conclusion
- Key takeaways and, where useful, recommendations or next steps.
### 6. References
- The sources used, as markdown links in [Title](URL) form.

Chat summary:
{chat_summary}

User query:
{query}

Extracted documents content:
{content}

Instructions:
1. Keep the report detailed, well organized and professional.
2. Cite sources with markdown links [Title](URL).
3. Synthesize information that several sources share instead of repeating it.
4. If no external content was available, say so plainly in the report and answer from general knowledge.
"#,
);

pub const GENERAL: PromptTemplate = PromptTemplate::new(
    "general",
    r#"You are Delver, a friendly AI research assistant.
Respond to the user's message: {query}
Use the chat summary for extra context if it helps: {chat_summary}
If the chat summary is empty, do not mention it.
"#,
);

pub const FOLLOW_UP: PromptTemplate = PromptTemplate::new(
    "follow_up",
    r#"You are Delver, an AI research assistant.
The user is asking a follow-up question about earlier research.

- Answer from the chat summary.
- If the question asks for clarification, summarize the most important details.
- If answering needs new information, say that fresh research is required.
- Keep the answer concise and informative.

Follow-up question: {query}
Chat summary: {chat_summary}

Answer:
"#,
);

pub const SUMMARIZE: PromptTemplate = PromptTemplate::new(
    "summarize",
    r#"You are summarizing a conversation.
Prioritize the user's requests, questions, data and needs, keeping the relevant assistant answers.
Every user preference and piece of user data must appear in the summary.
Be concise but informative.

Conversation history:
{history}
"#,
);

/// Text substituted for `{content}` when no document could be fetched.
pub const NO_CONTENT: &str =
    "No external content was available: none of the selected sources could be retrieved.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_render_with_their_variables() {
        let vars = [
            ("query", "q"),
            ("chat_summary", "s"),
            ("documents", "[]"),
            ("content", "c"),
            ("history", "h"),
        ];
        for t in [CLASSIFY, PLANNER, RERANK, FORMULATE, GENERAL, FOLLOW_UP, SUMMARIZE] {
            assert!(t.render(&vars).is_ok(), "{} failed to render", t.name());
        }
        let rerank = RERANK.render(&vars).unwrap();
        assert!(rerank.contains("\"rank\": 1"));
    }
}
