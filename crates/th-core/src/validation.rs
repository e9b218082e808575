//! Input validation shared by the Coordinator (§4.8).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ValidationError;

static LANG_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]+)*$").expect("static lang code regex is valid"));

pub fn validate_lang_code(code: &str) -> Result<(), ValidationError> {
    if LANG_CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(ValidationError::InvalidLangCode(code.to_string()))
    }
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        Err(ValidationError::EmptyText)
    } else {
        Ok(())
    }
}

pub fn validate_target_langs(langs: &[String]) -> Result<(), ValidationError> {
    if langs.is_empty() {
        return Err(ValidationError::EmptyTargetLangs);
    }
    for lang in langs {
        validate_lang_code(lang)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bcp47_ish_codes() {
        assert!(validate_lang_code("fr").is_ok());
        assert!(validate_lang_code("en-US").is_ok());
        assert!(validate_lang_code("zh-Hans-CN").is_ok());
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(validate_lang_code("").is_err());
        assert!(validate_lang_code("1").is_err());
        assert!(validate_lang_code("toolongcode").is_err());
    }

    #[test]
    fn empty_target_langs_is_rejected() {
        assert_eq!(validate_target_langs(&[]), Err(ValidationError::EmptyTargetLangs));
    }

    #[test]
    fn empty_text_is_rejected() {
        assert_eq!(validate_text(""), Err(ValidationError::EmptyText));
    }
}
