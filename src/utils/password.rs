use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const ITERATIONS: u32 = 260000;
const KEY_LENGTH: usize = 32;

/// Taille minimale imposée par la politique de mot de passe
const MIN_PASSWORD_LENGTH: usize = 8;

/// Petite liste de mots de passe interdits (équivalent du validateur
/// "common password" de Django, en version réduite)
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "12345678", "123456789", "qwerty123", "azerty123", "letmein1",
    "iloveyou", "admin123", "welcome1",
];

/// Hash un mot de passe au format Werkzeug
/// Utilise PBKDF2-HMAC-SHA256 avec 260000 itérations et un salt de 16 bytes
pub fn hash_password(password: &str) -> Result<String, String> {
    // Générer un salt aléatoire de 16 bytes
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    // Calculer le hash PBKDF2
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, ITERATIONS, &mut key)
        .map_err(|e| format!("PBKDF2 hash generation failed: {}", e))?;

    let salt_b64 = URL_SAFE_NO_PAD.encode(salt);
    let hash_b64 = URL_SAFE_NO_PAD.encode(key);

    // Format: pbkdf2:sha256:iterations$salt$hash
    Ok(format!("pbkdf2:sha256:{}${}${}", ITERATIONS, salt_b64, hash_b64))
}

/// Vérifie un mot de passe contre un hash stocké
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, String> {
    // Parser le format: pbkdf2:sha256:iterations$salt$hash
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 {
        return Err("Invalid hash format".to_string());
    }

    let header_parts: Vec<&str> = parts[0].split(':').collect();
    if header_parts.len() != 3 {
        return Err("Invalid hash header".to_string());
    }

    let iterations = header_parts[2]
        .parse::<u32>()
        .map_err(|_| "Invalid iterations".to_string())?;

    let salt = decode_b64(parts[1])?;
    let expected_hash = decode_b64(parts[2])?;

    // Recalculer avec le même salt et les mêmes itérations
    let mut computed = vec![0u8; expected_hash.len()];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, iterations, &mut computed)
        .map_err(|e| format!("PBKDF2 hash verification failed: {}", e))?;

    // Comparaison en temps constant
    if computed.len() != expected_hash.len() {
        return Ok(false);
    }
    let mut diff = 0u8;
    for (a, b) in computed.iter().zip(expected_hash.iter()) {
        diff |= a ^ b;
    }
    Ok(diff == 0)
}

/// Décode une chaîne base64 URL-safe, avec ou sans padding
fn decode_b64(input: &str) -> Result<Vec<u8>, String> {
    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(input) {
        return Ok(decoded);
    }
    URL_SAFE
        .decode(input)
        .map_err(|e| format!("Base64 decode failed: {}", e))
}

/// Valide la robustesse d'un mot de passe (équivalent des validateurs
/// Django : longueur minimale, pas entièrement numérique, pas trop commun,
/// pas trop proche de l'adresse email).
/// Retourne le message de la première règle violée.
pub fn validate_password_strength(password: &str, email: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("This password is too common.".to_string());
    }

    // Similarité avec la partie locale de l'email (avant le @)
    let local_part = email.split('@').next().unwrap_or("").to_lowercase();
    if local_part.len() >= 4 && (lowered.contains(&local_part) || local_part.contains(&lowered)) {
        return Err("The password is too similar to the email address.".to_string());
    }

    Ok(())
}
