// Fuzzy matching utilities for display name suggestions

/// Calculate Levenshtein distance between two strings
/// Returns the minimum number of single-character edits (insertions, deletions, substitutions)
/// needed to transform one string into another
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    // Single rolling row of the edit matrix
    let mut prev: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut curr = vec![0; s2_chars.len() + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)      // deletion
                .min(curr[j] + 1)                // insertion
                .min(prev[j] + cost);            // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[s2_chars.len()]
}

/// Find display names close to what the operator typed
/// Returns up to 3 (id, name) pairs sorted by distance, then name
pub fn find_near_display_matches(
    search: &str,
    displays: &[(i64, String)],
    max_distance: usize,
) -> Vec<(i64, String)> {
    let search_lower = search.to_lowercase();
    let mut matches: Vec<(usize, i64, String)> = Vec::new();

    for (id, name) in displays {
        let name_lower = name.to_lowercase();
        let distance = if name_lower.contains(&search_lower) {
            // Substring hits ("bar" in "bar screen") always qualify
            0
        } else {
            levenshtein_distance(&search_lower, &name_lower)
        };
        if distance <= max_distance {
            matches.push((distance, *id, name.clone()));
        }
    }

    matches.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
    matches.into_iter().take(3).map(|(_, id, name)| (id, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_find_near_display_matches() {
        let displays = vec![
            (1, "Bar Screen".to_string()),
            (2, "Main Kitchen".to_string()),
            (3, "Grill".to_string()),
        ];

        let matches = find_near_display_matches("bar", &displays, 2);
        assert_eq!(matches, vec![(1, "Bar Screen".to_string())]);

        let matches = find_near_display_matches("gril", &displays, 2);
        assert_eq!(matches[0].0, 3);

        assert!(find_near_display_matches("pastry", &displays, 2).is_empty());
    }
}
