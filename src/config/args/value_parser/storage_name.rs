const INVALID_ACCOUNT_NAME: &str =
    "Storage account name must be 3-24 characters of lowercase letters and digits";
const INVALID_CONTAINER_NAME: &str = "Container name must be 3-63 characters of lowercase letters, digits and single hyphens, starting and ending with a letter or digit";

pub fn check_account_name(name: &str) -> Result<String, String> {
    let valid = (3..=24).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if !valid {
        return Err(INVALID_ACCOUNT_NAME.to_string());
    }
    Ok(name.to_string())
}

pub fn check_container_name(name: &str) -> Result<String, String> {
    let allowed_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (3..=63).contains(&name.len())
        && allowed_chars
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");

    if !valid {
        return Err(INVALID_CONTAINER_NAME.to_string());
    }
    Ok(name.to_string())
}
