use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Opening fence at the start of a line, optional language tag, newline,
/// then everything up to the first closing fence.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```[^\S\n]*(?:([\w+\-]+)[^\S\n]*)?\r?\n(.*?)```")
        .expect("fence pattern is valid")
});

/// A fenced code block pulled out of generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language tag from the opening fence, if any
    pub language: Option<String>,
    /// Block contents with surrounding whitespace trimmed
    pub code: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no fenced code block found in generated output")]
    NoCodeBlock,

    #[error("fenced code block is empty")]
    EmptyBlock,
}

/// Extract the first fenced code block from `text`.
pub fn extract_code_block(text: &str) -> Result<CodeBlock, ExtractionError> {
    let caps = FENCE_RE
        .captures(text)
        .ok_or(ExtractionError::NoCodeBlock)?;

    let code = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    if code.is_empty() {
        return Err(ExtractionError::EmptyBlock);
    }

    Ok(CodeBlock {
        language: caps.get(1).map(|m| m.as_str().to_string()),
        code: code.to_string(),
    })
}

/// Whether a block tagged `language` can run in the Python sandbox
pub fn is_supported_language(language: Option<&str>) -> bool {
    match language {
        None => true,
        Some(tag) => matches!(tag.to_lowercase().as_str(), "python" | "python3" | "py"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_tagged_block() {
        let text = "Here you go:\n```python\ndef square(x):\n    return x * x\n```\nEnjoy.";
        let block = extract_code_block(text).unwrap();
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.code, "def square(x):\n    return x * x");
    }

    #[test]
    fn test_extracts_untagged_block() {
        let block = extract_code_block("```\nprint('hi')\n```").unwrap();
        assert_eq!(block.language, None);
        assert_eq!(block.code, "print('hi')");
    }

    #[test]
    fn test_tag_allows_plus_and_dash() {
        let block = extract_code_block("```objective-c++\nint x;\n```").unwrap();
        assert_eq!(block.language.as_deref(), Some("objective-c++"));
    }

    #[test]
    fn test_stops_at_first_closing_fence() {
        let text = "```py\nfirst = 1\n```\ntext\n```py\nsecond = 2\n```";
        let block = extract_code_block(text).unwrap();
        assert_eq!(block.code, "first = 1");
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        let block = extract_code_block("```python\n\n\n   x = 1   \n\n```").unwrap();
        assert_eq!(block.code, "x = 1");
    }

    #[test]
    fn test_inline_backticks_are_not_a_fence() {
        let text = "Call it with ```square(3)``` then check:\n```python\nprint(square(3))\n```";
        let block = extract_code_block(text).unwrap();
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.code, "print(square(3))");
    }

    #[test]
    fn test_round_trips_injected_payload() {
        let payload = "import sys\n\nfor line in sys.stdin:\n    print(line.upper())";
        let text = format!("Plan done.\n```python\n{}\n```\n", payload);
        let block = extract_code_block(&text).unwrap();
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.code, payload);
    }

    #[test]
    fn test_no_block_is_distinguishable() {
        assert_eq!(
            extract_code_block("I cannot help with that."),
            Err(ExtractionError::NoCodeBlock)
        );
    }

    #[test]
    fn test_unterminated_block_is_not_a_match() {
        assert_eq!(
            extract_code_block("```python\nprint(1)\n"),
            Err(ExtractionError::NoCodeBlock)
        );
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(
            extract_code_block("```python\n   \n```"),
            Err(ExtractionError::EmptyBlock)
        );
    }

    #[test]
    fn test_supported_languages() {
        assert!(is_supported_language(None));
        assert!(is_supported_language(Some("Python")));
        assert!(is_supported_language(Some("py")));
        assert!(!is_supported_language(Some("javascript")));
    }
}
