//! Form, body and query validation shared by the gateway and the session client.
//!
//! Form messages are user-facing and localized (Spanish); the gateway wraps
//! [`missing_fields`] and [`validate_page`] into its own error taxonomy.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::types::PageRequest;

/// Largest page size the documents service accepts.
pub const MAX_PAGE_LIMIT: i64 = 50;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@(([^<>()\[\]\\.,;:\s@"]+\.)+[^<>()\[\]\\.,;:\s@"]{2,})$"#,
    )
    .expect("email pattern compiles")
});

/// A rejected input, carrying the message to show next to the form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new("Email es requerido"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::new("Email no tiene formato válido"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("Contraseña es requerida"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "La contraseña debe tener al menos 8 caracteres",
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("Nombre es requerido"));
    }
    if name.trim().chars().count() < 2 {
        return Err(ValidationError::new(
            "El nombre debe tener al menos 2 caracteres",
        ));
    }
    Ok(())
}

pub fn validate_id_citizen(id_citizen: u64) -> Result<(), ValidationError> {
    if id_citizen == 0 {
        return Err(ValidationError::new(
            "ID Ciudadano debe ser un número positivo",
        ));
    }
    Ok(())
}

/// Validates the login form before it is sent to the gateway.
pub fn validate_login_form(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("El usuario es requerido"));
    }
    validate_email(email)?;
    if password.trim().is_empty() {
        return Err(ValidationError::new("La contraseña es requerida"));
    }
    validate_password(password)
}

/// Validates the local part of an institutional username (no domain).
pub fn validate_user_local(user_local: &str) -> Result<(), ValidationError> {
    let trimmed = user_local.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("El usuario es requerido"));
    }
    if user_local.contains('@') {
        return Err(ValidationError::new(
            "No incluyas @ en el usuario. Solo escribe tu nombre de usuario (ej: juan.perez)",
        ));
    }
    if user_local.contains(' ') {
        return Err(ValidationError::new(
            "El usuario no puede contener espacios",
        ));
    }
    if trimmed.chars().count() < 3 {
        return Err(ValidationError::new(
            "El usuario debe tener al menos 3 caracteres",
        ));
    }
    Ok(())
}

/// Validates the registration form before it is sent to the gateway.
pub fn validate_register_form(
    email: &str,
    password: &str,
    name: &str,
    id_citizen: u64,
) -> Result<(), ValidationError> {
    validate_email(email)?;
    validate_password(password)?;
    validate_name(name)?;
    validate_id_citizen(id_citizen)
}

/// Checks the page bounds accepted by the documents service.
pub fn validate_page(page: PageRequest) -> Result<(), ValidationError> {
    if page.page < 1 {
        return Err(ValidationError::new("page must be greater than 0"));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&page.limit) {
        return Err(ValidationError::new(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok(())
}

/// Returns the names in `fields` whose value in `body` is absent or falsy
/// (`null`, `false`, `0`, `""`).
#[must_use]
pub fn missing_fields<'a>(body: &Value, fields: &[&'a str]) -> Vec<&'a str> {
    fields
        .iter()
        .copied()
        .filter(|field| !body.get(*field).is_some_and(is_truthy))
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("juan.perez@gov.co").is_ok());
        assert!(validate_email("A.B@Example.ORG").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("juan").is_err());
        assert!(validate_email("juan@localhost").is_err());
        assert!(validate_email("juan perez@gov.co").is_err());
        assert!(validate_email("juan@gov.c").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_login_form_order() {
        assert_eq!(
            validate_login_form("  ", "secret123").unwrap_err().0,
            "El usuario es requerido"
        );
        assert_eq!(
            validate_login_form("ana@gov.co", "   ").unwrap_err().0,
            "La contraseña es requerida"
        );
        assert!(validate_login_form("ana@gov.co", "secret123").is_ok());
    }

    #[test]
    fn test_user_local() {
        assert!(validate_user_local("juan.perez").is_ok());
        assert!(validate_user_local("juan@gov.co").is_err());
        assert!(validate_user_local("juan perez").is_err());
        assert!(validate_user_local("jp").is_err());
        assert!(validate_user_local("").is_err());
    }

    #[test]
    fn test_register_form() {
        assert!(validate_register_form("ana@gov.co", "secret123", "Ana", 1032).is_ok());
        assert!(validate_register_form("ana@gov.co", "secret123", " A ", 1032).is_err());
        assert!(validate_register_form("ana@gov.co", "secret123", "Ana", 0).is_err());
    }

    #[test]
    fn test_page_bounds() {
        assert!(validate_page(PageRequest::new(1, 1)).is_ok());
        assert!(validate_page(PageRequest::new(3, 50)).is_ok());
        assert!(validate_page(PageRequest::new(0, 10)).is_err());
        assert!(validate_page(PageRequest::new(1, 0)).is_err());
        assert!(validate_page(PageRequest::new(1, 51)).is_err());
    }

    #[test]
    fn test_missing_fields_truthiness() {
        let body = json!({
            "email": "ana@gov.co",
            "password": "",
            "name": null,
            "id_citizen": 0
        });
        assert_eq!(
            missing_fields(&body, &["email", "password", "name", "id_citizen"]),
            vec!["password", "name", "id_citizen"]
        );
        assert!(missing_fields(&json!({"email": "a", "password": "b"}), &["email", "password"])
            .is_empty());
    }
}
