use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};

static INLINE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\((.*?)\\\)").expect("valid regex"));

static DISPLAY_MATH: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\\\[(.*?)\\\]")
        .dot_matches_new_line(true)
        .build()
        .expect("valid regex")
});

/// Rewrites LaTeX `\( .. \)` to `$..$` and `\[ .. \]` to `$$..$$`.
///
/// Inline pairs must sit on one line; display pairs may span lines. Matching is
/// non-greedy. The rewrite is applied until nothing changes, so nested pairs are
/// fully converted and a second application is always a no-op.
pub fn rewrite_math_delimiters(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = rewrite_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn rewrite_once(text: &str) -> String {
    let inline = INLINE_MATH.replace_all(text, |caps: &Captures| format!("${}$", &caps[1]));
    DISPLAY_MATH
        .replace_all(&inline, |caps: &Captures| format!("$${}$$", &caps[1]))
        .into_owned()
}
