//! Formatting helpers for progress messages

/// `word`, or its plural when `count` is more than one
pub fn pluralize(word: &str, count: usize) -> String {
    if count > 1 {
        format!("{}s", word)
    } else {
        word.to_string()
    }
}

/// Join words as "a, b and c", sorted
pub fn friendly_join(words: &[String]) -> String {
    let mut words = words.to_vec();
    words.sort();
    match words.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}
