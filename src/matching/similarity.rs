//! String similarity primitives

/// Split lowercased text into alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Classic edit distance (insert, delete, substitute), two-row DP
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit distance normalized into `[0, 1]`; 1.0 means identical
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    (1.0 - levenshtein(a, b) as f64 / longest as f64).max(0.0)
}

/// Best similarity of `needle` against any of `candidates`
pub fn best_similarity<'a, I>(needle: &str, candidates: I) -> f64
where
    I: IntoIterator<Item = &'a String>,
{
    candidates
        .into_iter()
        .map(|c| similarity(needle, c))
        .fold(0.0, f64::max)
}
