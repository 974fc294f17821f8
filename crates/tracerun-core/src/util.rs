/// Single-line excerpt of captured process output.
///
/// Blank lines are dropped, the rest joined with ` | `; when longer than
/// `max_chars` the tail is kept, since errors usually come last.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");

    let count = joined.chars().count();
    if count <= max_chars {
        return joined;
    }
    let tail: String = joined.chars().skip(count - max_chars).collect();
    format!("…{tail}")
}
