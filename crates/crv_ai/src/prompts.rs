//! Few-shot templates for the completion calls. Every prompt is trimmed before it is sent.
//!
//! The parsers depend on these line shapes:
//! - question generation: one `I googled: <question>` per line
//! - agreement gate: the reasoning line, then `<n>. Therefore: <decision>`
//! - editor: the diagnosis line, then `<n>. My fix: <revised claim>`

pub const QUESTION_MARKER: &str = "I googled:";
pub const DECISION_MARKER: &str = "Therefore:";
pub const FIX_MARKER: &str = "My fix:";

pub fn question_prompt(claim: &str, context: Option<&str>) -> String {
    let prompt = match context {
        None => format!(
            r#"I will check things you said and ask questions.

You said: The Eiffel Tower was finished in 1889 for the World's Fair. It was designed by Gustave Eiffel and is about 200 meters tall.
To verify it,
1. I googled: When was the Eiffel Tower finished?
2. I googled: What event was the Eiffel Tower built for?
3. I googled: Who designed the Eiffel Tower?
4. I googled: How tall is the Eiffel Tower?

You said: Honey never spoils because its low water content stops bacteria from growing.
To verify it,
1. I googled: Does honey spoil?
2. I googled: Why does honey not spoil?

You said: The Rust programming language was first released as 1.0 in 2015 and was started at Mozilla.
To verify it,
1. I googled: When was Rust 1.0 released?
2. I googled: Where did the Rust programming language start?

You said: {claim}
To verify it,
"#
        ),
        Some(context) => format!(
            r#"I will check things you said and ask questions.

Context: The Eiffel Tower was finished in 1889 for the World's Fair.
You said: It was designed by Gustave Eiffel and is about 200 meters tall.
To verify what you just said,
1. I googled: Who designed the Eiffel Tower?
2. I googled: How tall is the Eiffel Tower?

Context: Honey is produced by bees from flower nectar.
You said: It never spoils because its low water content stops bacteria from growing.
To verify what you just said,
1. I googled: Does honey spoil?
2. I googled: Why does honey not spoil?

Context: The Rust programming language was started at Mozilla.
You said: Its 1.0 release came out in 2015.
To verify what you just said,
1. I googled: When was Rust 1.0 released?

Context: {context}
You said: {claim}
To verify what you just said,
"#
        ),
    };
    prompt.trim().to_string()
}

pub fn agreement_gate_prompt(
    claim: &str,
    query: &str,
    evidence: &str,
    context: Option<&str>,
) -> String {
    let prompt = match context {
        None => format!(
            r#"I will check some things you said.

1. You said: The Eiffel Tower is about 200 meters tall.
2. I checked: How tall is the Eiffel Tower?
3. I found this article: The Eiffel Tower stands 330 metres (1,083 ft) tall including its antennas, about the height of an 81-storey building.
4. Reasoning: The article said the Eiffel Tower is 330 meters tall and you said it is about 200 meters tall.
5. Therefore: This disagrees with what you said.

1. You said: Honey never spoils because its low water content stops bacteria from growing.
2. I checked: Why does honey not spoil?
3. I found this article: Honey has a very low moisture content and a high acidity, which make it an inhospitable environment for bacteria and other microorganisms.
4. Reasoning: The article said low moisture keeps bacteria from growing in honey and you said low water content stops bacteria from growing.
5. Therefore: This agrees with what you said.

1. You said: The Rust programming language was started at Mozilla.
2. I checked: Where did the Rust programming language start?
3. I found this article: Cargo is the Rust package manager. It downloads dependencies, compiles packages and uploads them to crates.io.
4. Reasoning: The article does not say where Rust started and you said it was started at Mozilla.
5. Therefore: This is irrelevant to what you said.

1. You said: {claim}
2. I checked: {query}
3. I found this article: {evidence}
4. Reasoning:
"#
        ),
        Some(context) => format!(
            r#"I will check some things you said.

1. Context: The Eiffel Tower was finished in 1889 for the World's Fair.
2. You said: It is about 200 meters tall.
3. I checked: How tall is the Eiffel Tower?
4. I found this article: The Eiffel Tower stands 330 metres (1,083 ft) tall including its antennas, about the height of an 81-storey building.
5. Reasoning: The article said the Eiffel Tower is 330 meters tall and you said it is about 200 meters tall.
6. Therefore: This disagrees with what you said.

1. Context: Honey is produced by bees from flower nectar.
2. You said: It never spoils because its low water content stops bacteria from growing.
3. I checked: Why does honey not spoil?
4. I found this article: Honey has a very low moisture content and a high acidity, which make it an inhospitable environment for bacteria and other microorganisms.
5. Reasoning: The article said low moisture keeps bacteria from growing in honey and you said low water content stops bacteria from growing.
6. Therefore: This agrees with what you said.

1. Context: Rust is a systems programming language.
2. You said: It was started at Mozilla.
3. I checked: Where did the Rust programming language start?
4. I found this article: Cargo is the Rust package manager. It downloads dependencies, compiles packages and uploads them to crates.io.
5. Reasoning: The article does not say where Rust started and you said it was started at Mozilla.
6. Therefore: This is irrelevant to what you said.

1. Context: {context}
2. You said: {claim}
3. I checked: {query}
4. I found this article: {evidence}
5. Reasoning:
"#
        ),
    };
    prompt.trim().to_string()
}

pub fn editor_prompt(claim: &str, query: &str, evidence: &str, context: Option<&str>) -> String {
    let prompt = match context {
        None => format!(
            r#"I will fix some things you said.

1. You said: The Eiffel Tower was finished in 1889 for the World's Fair. It is about 200 meters tall.
2. I checked: How tall is the Eiffel Tower?
3. I found this article: The Eiffel Tower stands 330 metres (1,083 ft) tall including its antennas, about the height of an 81-storey building.
4. This suggests the 200 meter height in your statement is wrong.
5. My fix: The Eiffel Tower was finished in 1889 for the World's Fair. It is about 330 meters tall.

1. You said: The Rust programming language was first released as 1.0 in 2012 and was started at Mozilla.
2. I checked: When was Rust 1.0 released?
3. I found this article: Rust 1.0, the first stable release of the language, was announced on May 15, 2015.
4. This suggests the 2012 release year in your statement is wrong.
5. My fix: The Rust programming language was first released as 1.0 in 2015 and was started at Mozilla.

1. You said: {claim}
2. I checked: {query}
3. I found this article: {evidence}
4. This suggests
"#
        ),
        Some(context) => format!(
            r#"I will fix some things you said.

1. Context: The Eiffel Tower was finished in 1889 for the World's Fair.
2. You said: It is about 200 meters tall.
3. I checked: How tall is the Eiffel Tower?
4. I found this article: The Eiffel Tower stands 330 metres (1,083 ft) tall including its antennas, about the height of an 81-storey building.
5. This suggests the 200 meter height in your statement is wrong.
6. My fix: It is about 330 meters tall.

1. Context: The Rust programming language was started at Mozilla.
2. You said: Its 1.0 release came out in 2012.
3. I checked: When was Rust 1.0 released?
4. I found this article: Rust 1.0, the first stable release of the language, was announced on May 15, 2015.
5. This suggests the 2012 release year in your statement is wrong.
6. My fix: Its 1.0 release came out in 2015.

1. Context: {context}
2. You said: {claim}
3. I checked: {query}
4. I found this article: {evidence}
5. This suggests
"#
        ),
    };
    prompt.trim().to_string()
}

pub fn hallucination_prompt(query: &str) -> String {
    format!(
        r#"Generate a paragraph that answers the question.

Question: How tall is the Eiffel Tower?
Text: The Eiffel Tower in Paris is 330 metres tall including its antennas. Without them it measures about 300 metres, and it was the tallest man-made structure in the world until 1930.

Question: Why does honey not spoil?
Text: Honey keeps for a very long time because it holds little water and is quite acidic. Few bacteria or molds can survive in it, so sealed honey can stay edible for years.

Question: {query}
Text:
"#
    )
    .trim()
    .to_string()
}
