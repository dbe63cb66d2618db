//! Prompt building for LLM SQL generation

use crate::schema::egain_visitors;

/// System prompt for SQL generation
pub const ANALYSIS_SYSTEM_MESSAGE: &str = r#"
You are a PostgreSQL expert. Given an analysis request, you return a syntactically correct PostgreSQL query to get the data necessary to answer the request.

When generating the PostgreSQL queries, follow the instructions below:
- Remember to aggregate when possible to return only the necessary number of rows.
- Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (") to denote them as delimited identifiers.
- Pay attention to use only the column names you can see in the table given below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
- If the question involves "today", remember to use the CURRENT_DATE function.
- Always use the alias "value" for the numerical value in the query, whether it's a price or volume.
- Write the PostgreSQL query without formatting it in a code block.
- The table name is "egain_visitors".

Think step by step before writing the query plan.

Only return the PostgreSQL query, nothing else.
"#;

/// Template for the user turn. `$input` and `$table_info` are substituted.
pub const REQUEST_PROMPT_TEMPLATE: &str = r#"
Request: $input

Use the following tables:
$table_info

"#;

/// The two messages sent to the model for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Build a user prompt from the table description and natural language request
pub fn build_user_prompt(user_request: &str, table_info: &str) -> String {
    substitute(
        REQUEST_PROMPT_TEMPLATE,
        &[("input", user_request), ("table_info", table_info)],
    )
}

/// Build the full system + user prompt for a request against the visitor table.
pub fn build_request(user_request: &str) -> ChatPrompt {
    ChatPrompt {
        system: ANALYSIS_SYSTEM_MESSAGE.to_string(),
        user: build_user_prompt(user_request, &egain_visitors().table_info()),
    }
}

/// Replace `$name` placeholders in one pass.
///
/// Substituted text is never rescanned. `$$` produces a literal `$` and
/// placeholders without a value are copied through unchanged.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        let ident_len = after
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_alphanumeric() || *c == '_') || (*i == 0 && c.is_ascii_digit()))
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        let ident = &after[..ident_len];

        match values.iter().find(|(k, _)| *k == ident) {
            Some((_, v)) if !ident.is_empty() => out.push_str(v),
            _ => {
                out.push('$');
                out.push_str(ident);
            }
        }
        rest = &after[ident_len..];
    }

    out.push_str(rest);
    out
}
