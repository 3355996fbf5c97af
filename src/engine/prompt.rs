//! Prompt construction and output post-processing
//!
//! The templates are fixed: the adapter was tuned on exactly this phrasing,
//! and the trailing marker cues the model to start the quiz.

/// Response message on the success path
pub const SUCCESS_MESSAGE: &str = "Тест сгенерирован успешно";

/// Returned when generation produced nothing beyond the prompt echo
pub const FALLBACK_MESSAGE: &str = "Не удалось сгенерировать тест. Попробуйте другой текст.";

/// Build the instruction prompt for the given source text and parameters
pub fn build_prompt(text: &str, question_count: u32, difficulty: &str) -> String {
    format!(
        "Создай тест с {question_count} вопросами сложности '{difficulty}' по следующему тексту:\n\n{text}\n\nТест:"
    )
}

/// Remove the prompt echo from decoded output and trim.
///
/// The removal is a plain substring replace: if decoding altered the echo
/// (whitespace drift, truncation), the match fails silently and the decoded
/// text is returned as-is. An empty remainder becomes [`FALLBACK_MESSAGE`].
pub fn strip_prompt(decoded: &str, prompt: &str) -> String {
    let stripped = decoded.replace(prompt, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_parameters() {
        let prompt = build_prompt("Вода кипит при 100 градусах.", 7, "сложный");
        assert!(prompt.starts_with("Создай тест с 7 вопросами сложности 'сложный'"));
        assert!(prompt.contains("Вода кипит при 100 градусах."));
        assert!(prompt.ends_with("Тест:"));
    }

    #[test]
    fn test_strip_exact_echo() {
        let prompt = build_prompt("текст", 5, "легкий");
        let decoded = format!("{prompt}\n1. Вопрос первый?\n");
        assert_eq!(strip_prompt(&decoded, &prompt), "1. Вопрос первый?");
    }

    #[test]
    fn test_strip_empty_remainder_gives_fallback() {
        let prompt = build_prompt("текст", 5, "легкий");
        assert_eq!(strip_prompt(&prompt, &prompt), FALLBACK_MESSAGE);
        assert_eq!(strip_prompt("   \n  ", &prompt), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_perturbed_echo_is_not_stripped() {
        // decoding that drifts by one space defeats the substring match;
        // the echo survives in the output rather than becoming the fallback
        let prompt = build_prompt("текст", 5, "легкий");
        let drifted = prompt.replace("\n\n", "\n");
        let result = strip_prompt(&drifted, &prompt);
        assert_ne!(result, FALLBACK_MESSAGE);
        assert!(result.contains("Создай тест"));
    }
}
