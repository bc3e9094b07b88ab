/// Canonical stored format is E.164 for Russia: `+7NNNNNNNNNN`.
/// Input may arrive as `8NNNNNNNNNN`, `7NNNNNNNNNN` or the display form
/// `+7 (NNN) NNN NN NN`.
pub fn normalize(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        11 if digits.starts_with('7') || digits.starts_with('8') => &digits[1..],
        10 => digits.as_str(),
        _ => return None,
    };

    Some(format!("+7{}", national))
}

/// Display format: `+7 (NNN) NNN NN NN`.
pub fn display(canonical: &str) -> String {
    let d = canonical.trim_start_matches("+7");
    if d.len() != 10 {
        return canonical.to_string();
    }
    format!(
        "+7 ({}) {} {} {}",
        &d[0..3],
        &d[3..6],
        &d[6..8],
        &d[8..10]
    )
}

pub fn is_canonical(phone: &str) -> bool {
    phone.len() == 12
        && phone.starts_with("+7")
        && phone[2..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_forms() {
        assert_eq!(normalize("+7 (912) 345 67 89").as_deref(), Some("+79123456789"));
        assert_eq!(normalize("89123456789").as_deref(), Some("+79123456789"));
        assert_eq!(normalize("79123456789").as_deref(), Some("+79123456789"));
        assert_eq!(normalize("9123456789").as_deref(), Some("+79123456789"));
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert_eq!(normalize("12345"), None);
        assert_eq!(normalize("+7912345678901"), None);
    }

    #[test]
    fn displays_canonical() {
        assert_eq!(display("+79123456789"), "+7 (912) 345 67 89");
    }

    #[test]
    fn canonical_check() {
        assert!(is_canonical("+79123456789"));
        assert!(!is_canonical("89123456789"));
        assert!(!is_canonical("+7912345678"));
    }
}
