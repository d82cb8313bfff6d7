//! `contentEncoding` and `contentMediaType`.
//!
//! Both apply only to strings. Encodings and media types without a checker
//! here pass as annotations.

use veld_value::DynValue;

use crate::context::ValidationContext;

/// `contentEncoding`: `base64` and `base64url` are checked character by
/// character; the transfer encodings (`7bit`, `8bit`, `binary`,
/// `quoted-printable`) hold for any string.
#[derive(Debug)]
pub(crate) struct ContentEncodingRule {
    encoding: String,
}

impl ContentEncodingRule {
    pub fn new(encoding: impl Into<String>) -> Self {
        ContentEncodingRule {
            encoding: encoding.into(),
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        match self.encoding.as_str() {
            "base64" => validate_base64(s, ctx),
            "base64url" => validate_base64url(s, ctx),
            _ => true,
        }
    }
}

fn encoding_error(ctx: &mut ValidationContext, message: String, s: &str) -> bool {
    ctx.add_error(message, "contentEncoding", DynValue::Str(s.to_string()));
    false
}

fn validate_base64(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.is_empty() {
        return true;
    }
    let mut padding_count = 0;
    let mut padding_started = false;
    for c in s.chars() {
        if c == '=' {
            padding_started = true;
            padding_count += 1;
            if padding_count > 2 {
                return encoding_error(ctx, "Base64 content has too much padding".into(), s);
            }
        } else if padding_started {
            return encoding_error(ctx, "Base64 content has characters after padding".into(), s);
        } else if !(c.is_ascii_alphanumeric() || c == '+' || c == '/') {
            return encoding_error(
                ctx,
                format!("Base64 content contains invalid character: '{c}'"),
                s,
            );
        }
    }
    if s.len() % 4 != 0 {
        return encoding_error(ctx, "Base64 content length must be multiple of 4".into(), s);
    }
    true
}

fn validate_base64url(s: &str, ctx: &mut ValidationContext) -> bool {
    for c in s.chars() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return encoding_error(
                ctx,
                format!("Base64url content contains invalid character: '{c}'"),
                s,
            );
        }
    }
    true
}

/// `contentMediaType`: `application/json` must parse; XML gets an
/// angle-bracket sanity check; other `text/*` and unknown media types pass.
#[derive(Debug)]
pub(crate) struct ContentMediaTypeRule {
    media_type: String,
}

impl ContentMediaTypeRule {
    pub fn new(media_type: impl Into<String>) -> Self {
        ContentMediaTypeRule {
            media_type: media_type.into(),
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        match self.media_type.as_str() {
            "application/json" => validate_json(s, ctx),
            "application/xml" | "text/xml" => validate_xml(s, ctx),
            _ => true,
        }
    }
}

fn media_error(ctx: &mut ValidationContext, message: String, s: &str) -> bool {
    ctx.add_error(message, "contentMediaType", DynValue::Str(s.to_string()));
    false
}

fn validate_json(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.is_empty() {
        return media_error(ctx, "JSON content cannot be empty".into(), s);
    }
    if serde_json::from_str::<serde_json::Value>(s).is_err() {
        return media_error(ctx, "Invalid JSON content".into(), s);
    }
    true
}

fn validate_xml(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.is_empty() {
        return media_error(ctx, "XML content cannot be empty".into(), s);
    }
    let trimmed = s.trim();
    if !trimmed.starts_with('<') {
        return media_error(ctx, "XML content must start with '<'".into(), s);
    }
    if !trimmed.ends_with('>') {
        return media_error(ctx, "XML content must end with '>'".into(), s);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding_passes(encoding: &str, input: &str) -> bool {
        let rule = ContentEncodingRule::new(encoding);
        let mut ctx = ValidationContext::new();
        rule.validate(&DynValue::Str(input.to_string()), &mut ctx)
    }

    fn media_passes(media_type: &str, input: &str) -> bool {
        let rule = ContentMediaTypeRule::new(media_type);
        let mut ctx = ValidationContext::new();
        rule.validate(&DynValue::Str(input.to_string()), &mut ctx)
    }

    #[test]
    fn base64_padding_rules() {
        assert!(encoding_passes("base64", "aGVsbG8="));
        assert!(encoding_passes("base64", "aGVsbA=="));
        assert!(encoding_passes("base64", ""));
        assert!(!encoding_passes("base64", "ab=c")); // chars after padding
        assert!(!encoding_passes("base64", "a===")); // too much padding
        assert!(!encoding_passes("base64", "abc")); // not multiple of 4
        assert!(!encoding_passes("base64", "ab!c"));
    }

    #[test]
    fn base64url_alphabet() {
        assert!(encoding_passes("base64url", "a-b_c"));
        assert!(!encoding_passes("base64url", "a+b"));
        assert!(!encoding_passes("base64url", "a=b"));
    }

    #[test]
    fn transfer_encodings_and_unknowns_pass() {
        assert!(encoding_passes("7bit", "anything"));
        assert!(encoding_passes("quoted-printable", "any=20thing"));
        assert!(encoding_passes("custom-encoding", "???"));
        // Non-strings never fail.
        let rule = ContentEncodingRule::new("base64");
        let mut ctx = ValidationContext::new();
        assert!(rule.validate(&DynValue::Int(1), &mut ctx));
    }

    #[test]
    fn json_media_type() {
        assert!(media_passes("application/json", r#"{"a": 1}"#));
        assert!(media_passes("application/json", "[1, 2]"));
        assert!(!media_passes("application/json", "{broken"));
        assert!(!media_passes("application/json", ""));
    }

    #[test]
    fn xml_media_type() {
        assert!(media_passes("application/xml", "<root><a/></root>"));
        assert!(media_passes("text/xml", "  <a/>  "));
        assert!(!media_passes("application/xml", "plain text"));
        assert!(!media_passes("text/xml", ""));
    }

    #[test]
    fn other_media_types_pass() {
        assert!(media_passes("text/plain", "anything"));
        assert!(media_passes("image/png", "binary-ish"));
    }
}
