use onb_core::citations::marker_numbers;
use onb_core::error::AppError;

/// Reject model output that cannot be shown as an answer.
pub fn enforce_answer_text(output: &str) -> Result<(), AppError> {
    if output.trim().is_empty() {
        return Err(AppError::new("AI_ANSWER_FAILED", "Model returned an empty answer"));
    }
    Ok(())
}

/// Marker numbers in `output` that point at one of `excerpt_count` excerpts.
/// Anything else stays in the text and renders as an unresolved citation.
pub fn cited_excerpt_numbers(output: &str, excerpt_count: usize) -> Vec<u32> {
    marker_numbers(output)
        .into_iter()
        .filter(|n| *n >= 1 && (*n as usize) <= excerpt_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_is_rejected() {
        assert!(enforce_answer_text("  \n").is_err());
        assert!(enforce_answer_text("An answer [1]").is_ok());
    }

    #[test]
    fn only_in_range_markers_count() {
        assert_eq!(cited_excerpt_numbers("a [0] b [2] c [9] d [1] e [2]", 3), vec![1, 2]);
    }
}
