// Input validation for request bodies
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

pub type Validated<T> = Result<T, ValidationError>;

fn length(label: &str, value: &str, min: usize, max: usize) -> Validated<()> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError(if min == 1 {
            format!("{} is required", label)
        } else {
            format!("{} must be at least {} characters", label, min)
        }));
    }
    if len > max {
        return Err(ValidationError(format!(
            "{} must be at most {} characters",
            label, max
        )));
    }
    Ok(())
}

fn word_chars(label: &str, value: &str) -> Validated<()> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError(format!(
            "{} can only contain letters, numbers, and underscores",
            label
        )))
    }
}

pub fn email(raw: &str) -> Validated<String> {
    let value = raw.trim().to_lowercase();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(value)
    } else {
        Err(ValidationError("Invalid email address".into()))
    }
}

pub fn username(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Username", value, 3, 20)?;
    word_chars("Username", value)?;
    Ok(value.to_string())
}

pub fn display_name(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Display name", value, 1, 50)?;
    Ok(value.to_string())
}

pub fn password(raw: &str) -> Validated<String> {
    length("Password", raw, 6, 100)?;
    Ok(raw.to_string())
}

/// Community names are stored lowercase.
pub fn community_name(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Community name", value, 3, 21)?;
    word_chars("Community name", value)?;
    Ok(value.to_lowercase())
}

pub fn description(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Description", value, 1, 500)?;
    Ok(value.to_string())
}

pub fn title(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Title", value, 1, 300)?;
    Ok(value.to_string())
}

/// Optional post body; blank becomes `None`.
pub fn post_content(raw: Option<&str>) -> Validated<Option<String>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => {
            length("Content", value, 0, 10_000)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

pub fn comment_content(raw: &str) -> Validated<String> {
    let value = raw.trim();
    length("Comment", value, 1, 10_000)?;
    Ok(value.to_string())
}

pub fn bio(raw: Option<&str>) -> Validated<Option<String>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => {
            length("Bio", value, 0, 500)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

/// Optional http(s) URL; blank becomes `None`.
pub fn url(label: &str, raw: Option<&str>) -> Validated<Option<String>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => {
            let rest = value
                .strip_prefix("https://")
                .or_else(|| value.strip_prefix("http://"));
            match rest {
                Some(host) if !host.is_empty() && !value.chars().any(char::is_whitespace) => {
                    Ok(Some(value.to_string()))
                }
                _ => Err(ValidationError(format!("{} must be a valid URL", label))),
            }
        }
        None => Ok(None),
    }
}

pub fn rules(raw: &[String]) -> Validated<Vec<String>> {
    raw.iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(|r| {
            length("Rule", r, 1, 500)?;
            Ok(r.to_string())
        })
        .collect()
}
