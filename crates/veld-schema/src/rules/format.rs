//! The `format` keyword: a closed dispatch over known tokens.
//!
//! Formats apply to strings only; any other type passes. Unknown tokens are
//! annotations per Draft 7 and also pass. Date and time formats fully check
//! component ranges (months, days per month, leap years); `ipv6` handles
//! `::` compression and IPv4-mapped forms.

use std::sync::LazyLock;

use regex::Regex;
use veld_value::DynValue;

use crate::context::ValidationContext;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("hostname regex")
});

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("date regex"));

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]+))?(?:([Zz])|([+-])([0-9]{2}):([0-9]{2}))?$")
        .expect("time regex")
});

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9]{4})-([0-9]{2})-([0-9]{2})[Tt]([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]+))?(?:([Zz])|([+-])([0-9]{2}):([0-9]{2}))?$",
    )
    .expect("date-time regex")
});

static URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z][a-zA-Z0-9+\-.]+:(//)?([^.]+\.|[^:]+:)(.*)").expect("uri regex")
});

static URI_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s]*$").expect("uri-reference regex"));

static RELATIVE_JSON_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(?:#|/.*)?$").expect("relative-json-pointer regex"));

static BASE64: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("base64 regex"));

static BASE64URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]*$").expect("base64url regex"));

#[derive(Debug)]
pub(crate) struct FormatRule {
    format: String,
}

impl FormatRule {
    pub fn new(format: impl Into<String>) -> Self {
        FormatRule {
            format: format.into(),
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        match self.format.as_str() {
            "date-time" => validate_date_time(s, ctx),
            "date" => validate_date(s, ctx),
            "time" => validate_time(s, ctx),
            "email" => validate_email(s, ctx),
            "hostname" => check_regex(&HOSTNAME, "hostname", s, ctx),
            "ipv4" => validate_ipv4(s, ctx),
            "ipv6" => validate_ipv6(s, ctx),
            "uri" => validate_uri(s, ctx),
            "uri-reference" => check_regex(&URI_REFERENCE, "uri-reference", s, ctx),
            "json-pointer" => validate_json_pointer(s, ctx),
            "relative-json-pointer" => {
                check_regex(&RELATIVE_JSON_POINTER, "relative-json-pointer", s, ctx)
            }
            "regex" => validate_regex_format(s, ctx),
            "uuid" => check_regex(&UUID, "uuid", s, ctx),
            "base64" => validate_base64(s, ctx),
            "base64url" => check_regex(&BASE64URL, "base64url", s, ctx),
            // Unknown formats are annotations.
            _ => true,
        }
    }
}

fn format_error(ctx: &mut ValidationContext, message: String, s: &str) -> bool {
    ctx.add_error(message, "format", DynValue::Str(s.to_string()));
    false
}

fn check_regex(regex: &Regex, format: &str, s: &str, ctx: &mut ValidationContext) -> bool {
    if !regex.is_match(s) {
        return format_error(ctx, format!("Invalid {format}: \"{s}\""), s);
    }
    true
}

fn validate_email(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.contains("..") {
        return format_error(
            ctx,
            format!("Email cannot contain consecutive dots: \"{s}\""),
            s,
        );
    }
    let Some(at) = s.find('@') else {
        return format_error(ctx, format!("Email must contain @: \"{s}\""), s);
    };
    let local = &s[..at];
    if local.starts_with('.') || local.ends_with('.') {
        return format_error(
            ctx,
            format!("Email local part cannot start or end with dot: \"{s}\""),
            s,
        );
    }
    check_regex(&EMAIL, "email", s, ctx)
}

fn check_date_parts(year: i32, month: u32, day: u32, s: &str, ctx: &mut ValidationContext) -> bool {
    if !(1..=12).contains(&month) {
        return format_error(ctx, format!("Month must be 1-12, got {month}"), s);
    }
    if !(1..=31).contains(&day) {
        return format_error(ctx, format!("Day must be 1-31, got {day}"), s);
    }
    const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
    let mut max_day = DAYS_IN_MONTH[(month - 1) as usize];
    if month == 2 && leap {
        max_day = 29;
    }
    if day > max_day {
        return format_error(
            ctx,
            format!("Day {day} is invalid for month {month} in year {year}"),
            s,
        );
    }
    true
}

fn validate_date(s: &str, ctx: &mut ValidationContext) -> bool {
    let Some(caps) = DATE.captures(s) else {
        return format_error(
            ctx,
            format!("Invalid date format: \"{s}\" (expected YYYY-MM-DD)"),
            s,
        );
    };
    let year: i32 = caps[1].parse().unwrap_or(0);
    let month: u32 = caps[2].parse().unwrap_or(0);
    let day: u32 = caps[3].parse().unwrap_or(0);
    check_date_parts(year, month, day, s, ctx)
}

fn check_time_parts(
    hour: u32,
    minute: u32,
    second: u32,
    s: &str,
    ctx: &mut ValidationContext,
) -> bool {
    if hour > 23 {
        return format_error(ctx, format!("Hour must be 0-23, got {hour}"), s);
    }
    if minute > 59 {
        return format_error(ctx, format!("Minute must be 0-59, got {minute}"), s);
    }
    if second > 59 {
        return format_error(ctx, format!("Second must be 0-59, got {second}"), s);
    }
    true
}

fn check_offset(
    caps: &regex::Captures<'_>,
    sign_group: usize,
    s: &str,
    ctx: &mut ValidationContext,
) -> bool {
    if caps.get(sign_group).is_none() {
        return true;
    }
    let tz_hour: u32 = caps[sign_group + 1].parse().unwrap_or(99);
    let tz_minute: u32 = caps[sign_group + 2].parse().unwrap_or(99);
    if tz_hour > 23 {
        return format_error(ctx, format!("Timezone hour must be 0-23, got {tz_hour}"), s);
    }
    if tz_minute > 59 {
        return format_error(
            ctx,
            format!("Timezone minute must be 0-59, got {tz_minute}"),
            s,
        );
    }
    true
}

fn validate_time(s: &str, ctx: &mut ValidationContext) -> bool {
    let Some(caps) = TIME.captures(s) else {
        return format_error(ctx, format!("Invalid time format: \"{s}\""), s);
    };
    let hour: u32 = caps[1].parse().unwrap_or(99);
    let minute: u32 = caps[2].parse().unwrap_or(99);
    let second: u32 = caps[3].parse().unwrap_or(99);
    check_time_parts(hour, minute, second, s, ctx) && check_offset(&caps, 6, s, ctx)
}

fn validate_date_time(s: &str, ctx: &mut ValidationContext) -> bool {
    let Some(caps) = DATE_TIME.captures(s) else {
        return format_error(ctx, format!("Invalid date-time format: \"{s}\""), s);
    };
    let year: i32 = caps[1].parse().unwrap_or(0);
    let month: u32 = caps[2].parse().unwrap_or(0);
    let day: u32 = caps[3].parse().unwrap_or(0);
    let hour: u32 = caps[4].parse().unwrap_or(99);
    let minute: u32 = caps[5].parse().unwrap_or(99);
    let second: u32 = caps[6].parse().unwrap_or(99);
    check_date_parts(year, month, day, s, ctx)
        && check_time_parts(hour, minute, second, s, ctx)
        && check_offset(&caps, 9, s, ctx)
}

fn validate_ipv4(s: &str, ctx: &mut ValidationContext) -> bool {
    let octets: Vec<&str> = s.split('.').collect();
    if octets.len() != 4 {
        return format_error(
            ctx,
            format!("IPv4 address must have exactly 4 octets, got {}", octets.len()),
            s,
        );
    }
    for octet in octets {
        if octet.len() > 1 && octet.starts_with('0') {
            return format_error(
                ctx,
                format!("IPv4 octet cannot have leading zeros: \"{octet}\""),
                s,
            );
        }
        if octet.is_empty() || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return format_error(ctx, format!("IPv4 octet must be numeric: \"{octet}\""), s);
        }
        match octet.parse::<u32>() {
            Ok(value) if value <= 255 => {}
            _ => {
                return format_error(
                    ctx,
                    format!("IPv4 octet must be 0-255, got {octet}"),
                    s,
                );
            }
        }
    }
    true
}

fn validate_ipv6(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.matches("::").count() > 1 {
        return format_error(ctx, "IPv6 address cannot contain multiple '::'".into(), s);
    }
    if s == "::" || s == "::1" {
        return true;
    }
    if s.contains('.') {
        return validate_ipv6_with_ipv4(s, ctx);
    }

    let parts: Vec<&str> = if s.contains("::") {
        s.split("::").filter(|part| !part.is_empty()).collect()
    } else {
        let groups: Vec<&str> = s.split(':').collect();
        if groups.len() != 8 {
            return format_error(
                ctx,
                format!(
                    "IPv6 address without :: must have exactly 8 groups, got {}",
                    groups.len()
                ),
                s,
            );
        }
        vec![s]
    };

    for part in parts {
        for group in part.split(':') {
            if group.is_empty() {
                continue;
            }
            if group.len() > 4 {
                return format_error(
                    ctx,
                    format!("IPv6 group cannot be longer than 4 characters: \"{group}\""),
                    s,
                );
            }
            if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return format_error(
                    ctx,
                    format!("IPv6 group contains invalid hex character: \"{group}\""),
                    s,
                );
            }
        }
    }
    true
}

/// IPv4-mapped (`::ffff:1.2.3.4`) and IPv4-compatible (`::1.2.3.4`) forms.
fn validate_ipv6_with_ipv4(s: &str, ctx: &mut ValidationContext) -> bool {
    let Some(last_colon) = s.rfind(':') else {
        return format_error(ctx, "Invalid IPv6 with IPv4 format".into(), s);
    };
    let ipv4_part = &s[last_colon + 1..];
    if !validate_ipv4(ipv4_part, ctx) {
        return false;
    }
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("::ffff:") {
        return true;
    }
    if s.starts_with("::") && s.matches(':').count() == 3 {
        return true;
    }
    // The embedded IPv4 consumes the space of two 16-bit groups.
    let colon_count = s.matches(':').count();
    let has_compression = s.contains("::");
    let estimated_groups = colon_count as i64 + 1 - 2;
    if !has_compression && estimated_groups != 6 {
        return format_error(
            ctx,
            "IPv6 with embedded IPv4 must have 6 IPv6 groups".into(),
            s,
        );
    }
    true
}

fn validate_uri(s: &str, ctx: &mut ValidationContext) -> bool {
    let Some(colon) = s.find(':') else {
        return format_error(ctx, "URI must contain a scheme (e.g., \"http:\")".into(), s);
    };
    if !URI.is_match(s) {
        return format_error(ctx, format!("Invalid uri: \"{s}\""), s);
    }
    if s[colon + 1..].is_empty() {
        return format_error(ctx, "URI must have content after scheme".into(), s);
    }
    true
}

fn validate_json_pointer(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.is_empty() {
        return true;
    }
    if !s.starts_with('/') {
        return format_error(
            ctx,
            "JSON Pointer must start with '/' or be empty".into(),
            s,
        );
    }
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'~' {
            match bytes.get(i + 1) {
                None => {
                    return format_error(
                        ctx,
                        "JSON Pointer has incomplete escape sequence".into(),
                        s,
                    );
                }
                Some(b'0') | Some(b'1') => i += 1,
                Some(_) => {
                    return format_error(
                        ctx,
                        "JSON Pointer has invalid escape sequence".into(),
                        s,
                    );
                }
            }
        }
        i += 1;
    }
    true
}

fn validate_regex_format(s: &str, ctx: &mut ValidationContext) -> bool {
    if Regex::new(s).is_err() {
        return format_error(ctx, format!("Invalid regular expression: \"{s}\""), s);
    }
    true
}

fn validate_base64(s: &str, ctx: &mut ValidationContext) -> bool {
    if s.is_empty() {
        return true;
    }
    if !check_regex(&BASE64, "base64", s, ctx) {
        return false;
    }
    if s.len() % 4 != 0 {
        return format_error(ctx, "Base64 string length must be multiple of 4".into(), s);
    }
    true
}
