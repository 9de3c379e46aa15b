use crate::error::AppError;

pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;
pub const TITLE_MIN_CHARS: usize = 3;
pub const COURSE_TITLE_MIN_CHARS: usize = 1;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const MESSAGE_MAX_CHARS: usize = 2000;
const LINK_MAX_BYTES: usize = 512;
const EMAIL_MAX_BYTES: usize = 254;

/// Trims and lower-cases; the result is the stored and the lookup form.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let invalid = || AppError::invalid("email", "invalid email format");

    if email.len() < 5 || email.len() > EMAIL_MAX_BYTES || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(email)
}

pub fn password(raw: &str) -> Result<(), AppError> {
    let n = raw.chars().count();
    if n < PASSWORD_MIN_CHARS {
        return Err(AppError::invalid(
            "password",
            format!("password must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }
    if n > PASSWORD_MAX_CHARS {
        return Err(AppError::invalid(
            "password",
            format!("password must be at most {PASSWORD_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Material and assignment titles.
pub fn title(field: &'static str, raw: &str) -> Result<String, AppError> {
    bounded_title(field, raw, TITLE_MIN_CHARS)
}

/// Course titles only need one visible character ("C1" is a real course code).
pub fn course_title(raw: &str) -> Result<String, AppError> {
    bounded_title("title", raw, COURSE_TITLE_MIN_CHARS)
}

fn bounded_title(field: &'static str, raw: &str, min_chars: usize) -> Result<String, AppError> {
    let t = raw.trim();
    let n = t.chars().count();
    if !(min_chars..=TITLE_MAX_CHARS).contains(&n) {
        return Err(AppError::invalid(
            field,
            format!("{field} must be {min_chars}-{TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(t.to_string())
}

/// Blank strings collapse to `None`.
pub fn optional_text(
    field: &'static str,
    raw: Option<String>,
    max_chars: usize,
) -> Result<Option<String>, AppError> {
    let Some(s) = raw else {
        return Ok(None);
    };
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if s.chars().count() > max_chars {
        return Err(AppError::invalid(
            field,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }
    Ok(Some(s.to_string()))
}

pub fn link(field: &'static str, raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    let invalid = || AppError::invalid(field, format!("{field} must be an http(s) URL"));
    if raw.len() > LINK_MAX_BYTES {
        return Err(invalid());
    }
    let parsed = url::Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(raw.to_string())
}

pub fn optional_link(field: &'static str, raw: Option<String>) -> Result<Option<String>, AppError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => link(field, s).map(Some),
    }
}

pub fn message(raw: &str) -> Result<String, AppError> {
    let m = raw.trim();
    if m.is_empty() {
        return Err(AppError::invalid("message", "message must not be empty"));
    }
    if m.chars().count() > MESSAGE_MAX_CHARS {
        return Err(AppError::invalid(
            "message",
            format!("message must be at most {MESSAGE_MAX_CHARS} characters"),
        ));
    }
    Ok(m.to_string())
}

pub fn duration_minutes(raw: Option<i32>) -> Result<Option<i32>, AppError> {
    match raw {
        Some(m) if !(1..=100_000).contains(&m) => Err(AppError::invalid(
            "duration_minutes",
            "duration_minutes must be between 1 and 100000",
        )),
        other => Ok(other),
    }
}
