/// Splits free-form input into words on runs of newlines and commas.
///
/// Tokens are trimmed and blanks dropped; order and duplicates are kept.
pub fn split_words(text: &str) -> Vec<String> {
    text.split(['\n', '\r', ','])
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mixed_separators() {
        let words = split_words("run, jump\nswim\n\n,, fly ");
        assert_eq!(words, vec!["run", "jump", "swim", "fly"]);
    }

    #[test]
    fn test_split_keeps_inner_spaces_and_duplicates() {
        let words = split_words("ice cream\r\nice cream");
        assert_eq!(words, vec!["ice cream", "ice cream"]);
    }

    #[test]
    fn test_split_blank_input() {
        assert!(split_words("").is_empty());
        assert!(split_words(" \n , \t ").is_empty());
    }
}
