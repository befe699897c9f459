//! User-facing (Spanish) messages for login and registration failures.
//!
//! Matching is a best-effort keyword lookup on the raw error text and code.

use serde_json::Value;

use super::error::ClientError;

const SERVICE_DOWN: &str =
    "El servicio está temporalmente no disponible. Intenta nuevamente en unos minutos.";
const CONNECTION: &str = "Problema de conexión. Verifica tu internet e intenta nuevamente.";

fn any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn shared_message(lower: &str) -> Option<&'static str> {
    if any(lower, &["service unavailable", "microservicio no disponible"]) {
        return Some(SERVICE_DOWN);
    }
    if any(lower, &["network", "connection", "timeout"]) {
        return Some(CONNECTION);
    }
    None
}

/// Message for a failed login.
#[must_use]
pub fn login_message(error: &str, code: Option<&str>) -> &'static str {
    let lower = error.to_lowercase();

    if any(&lower, &["invalid_credentials", "invalid credentials", "unauthorized"])
        || code == Some("INVALID_CREDENTIALS")
    {
        return "Email o contraseña incorrectos. Verifica tus credenciales e intenta nuevamente.";
    }
    if any(&lower, &["user not found", "usuario no encontrado"]) {
        return "No existe una cuenta con este email. Verifica tu email o regístrate.";
    }
    if lower.contains("password") && lower.contains("incorrect") {
        return "La contraseña es incorrecta. Intenta nuevamente o recupera tu contraseña.";
    }
    if any(&lower, &["account locked", "cuenta bloqueada"]) {
        return "Tu cuenta está temporalmente bloqueada. Contacta al soporte técnico.";
    }
    if let Some(message) = shared_message(&lower) {
        return message;
    }
    if any(&lower, &["validation", "campos requeridos"]) {
        return "Por favor completa todos los campos requeridos correctamente.";
    }
    "No se pudo iniciar sesión. Verifica tus credenciales e intenta nuevamente."
}

/// Message for a failed registration.
#[must_use]
pub fn register_message(error: &str, _code: Option<&str>) -> &'static str {
    let lower = error.to_lowercase();

    if lower.contains("id_citizen") && lower.contains("duplicate") {
        return "Este número de cédula ya está registrado. Verifica tu número de identificación.";
    }
    if any(&lower, &["email already exists", "email ya existe", "duplicate"]) {
        return "Ya existe una cuenta con este email. Intenta con otro email o inicia sesión.";
    }
    if any(&lower, &["validation", "campos requeridos"]) {
        return "Por favor completa todos los campos correctamente.";
    }
    if lower.contains("password") && any(&lower, &["weak", "débil"]) {
        return "La contraseña debe tener al menos 8 caracteres y ser más segura.";
    }
    if let Some(message) = shared_message(&lower) {
        return message;
    }
    "No se pudo crear la cuenta. Verifica los datos e intenta nuevamente."
}

/// Extracts `error` (then `code`) from a JSON error body; other input is
/// returned as-is.
#[must_use]
pub fn parse_error_message(raw: &str) -> String {
    let Ok(body) = serde_json::from_str::<Value>(raw) else {
        return raw.to_owned();
    };
    ["error", "code"]
        .into_iter()
        .find_map(|key| body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map_or_else(|| raw.to_owned(), str::to_owned)
}

/// Login message for a [`ClientError`]. Validation errors keep their own text.
#[must_use]
pub fn login_error_message(err: &ClientError) -> String {
    match err {
        ClientError::Validation(e) => e.0.clone(),
        other => login_message(&other.to_string(), other.code()).to_owned(),
    }
}

/// Registration message for a [`ClientError`]. Validation errors keep their own text.
#[must_use]
pub fn register_error_message(err: &ClientError) -> String {
    match err {
        ClientError::Validation(e) => e.0.clone(),
        other => register_message(&other.to_string(), other.code()).to_owned(),
    }
}
