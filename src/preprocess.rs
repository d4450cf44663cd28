// src/preprocess.rs

//! Cleanup applied to rewritten code before any executor sees it.
//!
//! Model output tends to carry markdown fences, tabs, invisible Unicode and
//! `...` lines standing in for omitted code. `normalize` removes all of
//! these. It is pure and idempotent.

use crate::protocol::Language;
use regex::{Captures, Regex};
use std::sync::OnceLock;

const TAB_WIDTH: usize = 4;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```([A-Za-z0-9_+#.-]*)").expect("fence pattern is valid"))
}

/// A fence loses its tag only when the tag names a known language.
/// Unknown tags such as `json` stay behind as plain text.
fn strip_fence(caps: &Captures<'_>) -> String {
    let tag = caps.get(1).map_or("", |m| m.as_str());
    if tag.is_empty() || Language::from_tag(tag).is_some() {
        String::new()
    } else {
        tag.to_string()
    }
}

/// Strip formatting artifacts from model-rewritten code.
pub fn normalize(raw: &str) -> String {
    let ascii: String = raw.chars().filter(char::is_ascii).collect();
    let unfenced = fence_pattern().replace_all(&ascii, strip_fence);
    let detabbed = unfenced.replace('\t', &" ".repeat(TAB_WIDTH));

    let kept: Vec<&str> = detabbed
        .lines()
        .filter(|line| !line.trim_start().starts_with("..."))
        .collect();

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_for_known_tags() {
        let raw = "```Python\nprint('hi')\n```";
        assert_eq!(normalize(raw), "print('hi')");

        let raw = "```javascript\nconsole.log(1)\n```";
        assert_eq!(normalize(raw), "console.log(1)");

        let raw = "```C++\nint main() {}\n```";
        assert_eq!(normalize(raw), "int main() {}");
    }

    #[test]
    fn unknown_tags_are_not_cut_at_a_known_prefix() {
        assert_eq!(normalize("```json\n{\"a\": 1}\n```"), "json\n{\"a\": 1}");
        assert_eq!(normalize("```csharp\nint x;\n```"), "csharp\nint x;");
        assert_eq!(normalize("```jsx\n<App />\n```"), "jsx\n<App />");
    }

    #[test]
    fn known_aliases_are_removed_whole() {
        assert_eq!(normalize("```python3\nprint(1)\n```"), "print(1)");
        assert_eq!(normalize("```JS\nf()\n```"), "f()");
    }

    #[test]
    fn expands_tabs() {
        assert_eq!(normalize("if x:\n\tpass"), "if x:\n    pass");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(normalize("print('caf\u{e9}')\u{200b}"), "print('caf')");
    }

    #[test]
    fn removes_ellipsis_lines() {
        let raw = "def f():\n    ...rest of code\n    return 1\n... more";
        assert_eq!(normalize(raw), "def f():\n    return 1");
    }

    #[test]
    fn keeps_inline_ellipsis() {
        assert_eq!(normalize("x = [1, ...]"), "x = [1, ...]");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "",
            "   ",
            "```python\n\tprint(1)\n...\n```",
            "`````python`",
            "``\u{e9}`java\ncode",
            "a\r\n\tb\r\n ... c\r\n",
            "```\n```\n```",
            "caf\u{e9} ``` \u{2026} ...",
            "````sql\nSELECT 1;\n````",
            "```json\n{}\n```",
            "```csharp\nint x;```",
            "``````json",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input: {s:?}");
        }
    }
}
